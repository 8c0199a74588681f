//! Shared helpers for DeepDive integration tests.
//!
//! Every test gets its own in-memory database. The AI microservice is
//! pointed at a `wiremock` server when a test needs it.

#![allow(dead_code)]

use std::time::Duration;

use axum::http::HeaderValue;
use axum_test::TestServer;
use deepdive::config::Config;
use deepdive::db::{self, CreateResource, DbPool, Resource};
use deepdive::middleware::issue_token;
use deepdive::services::templates::seed_templates;
use deepdive::{api, AppState};
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;

pub const TEST_SECRET: &str = "test-secret";

/// Create a test database with the schema and built-in templates.
pub async fn setup_test_db() -> DbPool {
    let pool = db::init_pool(":memory:")
        .await
        .expect("Failed to create test database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    seed_templates(&pool).await.expect("Failed to seed templates");
    pool
}

/// Test configuration, optionally pointing the AI service at `ai_url`.
pub fn test_config(ai_url: Option<&str>) -> Config {
    let mut config = Config::for_tests();
    if let Some(url) = ai_url {
        config.ai.base_url = url.trim_end_matches('/').to_string();
    }
    config
}

pub async fn build_state(config: Config) -> AppState {
    let pool = setup_test_db().await;
    AppState::from_parts(pool, config).expect("Failed to build state")
}

/// Server over the full router, with its state for direct seeding.
pub async fn build_test_app(ai_url: Option<&str>) -> (TestServer, AppState) {
    build_test_app_with(test_config(ai_url)).await
}

pub async fn build_test_app_with(config: Config) -> (TestServer, AppState) {
    let state = build_state(config).await;
    let server = TestServer::new(api::router(state.clone())).expect("Failed to create test server");
    (server, state)
}

/// Signed token for `user_id`.
pub fn token_for(user_id: &str) -> String {
    issue_token(
        TEST_SECRET,
        user_id,
        Some(&format!("{}@example.com", user_id)),
        Some(user_id),
        Duration::from_secs(3600),
    )
    .expect("Failed to sign token")
}

/// Bearer Authorization header value for `user_id`.
pub fn bearer(user_id: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token_for(user_id))).unwrap()
}

/// Make sure a user row exists, as the auth middleware would.
pub async fn ensure_user(state: &AppState, user_id: &str) {
    db::ensure_user(
        &state.db,
        db::UpsertUser {
            id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
            username: Some(user_id.to_string()),
        },
    )
    .await
    .expect("Failed to create user");
}

/// Insert a paper with generated text.
pub async fn seed_resource(state: &AppState) -> Resource {
    let title: String = Sentence(3..6).fake();
    seed_resource_titled(state, &title).await
}

pub async fn seed_resource_titled(state: &AppState, title: &str) -> Resource {
    let abstract_text: String = Paragraph(1..3).fake();
    db::create_resource(
        &state.db,
        CreateResource {
            resource_type: "PAPER".to_string(),
            title: title.to_string(),
            abstract_text: Some(abstract_text),
            tags: vec!["ml".to_string()],
            categories: vec!["cs.AI".to_string()],
            primary_category: Some("cs.AI".to_string()),
            quality_score: Some(50.0),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create resource")
}

/// Seed `count` resources and return their ids.
pub async fn seed_resources(state: &AppState, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(seed_resource(state).await.id);
    }
    ids
}
