//! Cross-cutting HTTP behaviour: error envelope, health, auth and rate limits.

mod common;

use std::time::{Duration, Instant};

use axum::http::{header, header::AUTHORIZATION, HeaderValue, StatusCode};
use common::{bearer, build_test_app, build_test_app_with, test_config};
use serde_json::{json, Value};

// ============================================================================
// Error envelope
// ============================================================================

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let (server, _state) = build_test_app(None).await;

    let response = server.get("/api/v1/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["message"], "Cannot GET /api/v1/nope");
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(body["path"], "/api/v1/nope");
    assert!(body["timestamp"].is_string());
    // Stacks are only exposed in development
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn test_unprocessable_body_is_bad_request() {
    let (server, _state) = build_test_app(None).await;

    // Missing required `resourceId`
    let response = server
        .post("/api/v1/comments")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "content": "hi" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["method"], "POST");
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let (server, _state) = build_test_app(None).await;

    let response = server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_me_returns_token_user() {
    let (server, _state) = build_test_app(None).await;

    let response = server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let me: Value = response.json();
    assert_eq!(me["id"], "alice");
    assert_eq!(me["email"], "alice@example.com");
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let (server, _state) = build_test_app(None).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: Value = response.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    server.get("/health/live").await.assert_status_ok();

    let response = server.get("/health/ready").await;
    response.assert_status_ok();
    let ready: Value = response.json();
    assert_eq!(ready["ready"], true);
    assert_eq!(ready["checks"][0]["name"], "database");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let (server, _state) = build_test_app(None).await;

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    assert!(response
        .header(header::CONTENT_TYPE)
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(response.text().contains("deepdive_up 1"));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_auth_routes_use_strict_tier() {
    let mut config = test_config(None);
    config.rate_limit.enabled = true;
    let (server, _state) = build_test_app_with(config).await;

    for _ in 0..5 {
        server
            .get("/api/v1/auth/me")
            .add_header(AUTHORIZATION, bearer("alice"))
            .await
            .assert_status_ok();
    }

    let response = server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"], "RATE_LIMIT_EXCEEDED");

    // Reads have their own, larger quota
    server.get("/api/v1/resources").await.assert_status_ok();

    // A different forwarded client starts fresh
    server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, bearer("alice"))
        .add_header(
            header::HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.9"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_strict_quota_lasts_until_the_window_ends() {
    let mut config = test_config(None);
    config.rate_limit.enabled = true;
    config.rate_limit.window = Duration::from_millis(1500);
    let (server, _state) = build_test_app_with(config).await;
    let window_start = Instant::now();

    for _ in 0..5 {
        server
            .get("/api/v1/auth/me")
            .add_header(AUTHORIZATION, bearer("alice"))
            .await
            .assert_status_ok();
    }

    // Still rejected part way through the window
    tokio::time::sleep(Duration::from_millis(300)).await;
    let response = server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep_until((window_start + Duration::from_millis(1600)).into()).await;
    server
        .get("/api/v1/auth/me")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await
        .assert_status_ok();
}

// ============================================================================
// YouTube videos
// ============================================================================

#[tokio::test]
async fn test_youtube_videos_are_private_and_upserted() {
    let (server, _state) = build_test_app(None).await;
    let video = json!({
        "videoId": "dQw4w9WgXcQ",
        "title": "Lecture 1",
        "url": "https://youtube.com/watch?v=dQw4w9WgXcQ",
        "transcript": "hello",
    });

    let response = server
        .post("/api/v1/youtube-videos")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "videoId": "x" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "videoId, title and url are required"
    );

    let first: Value = server
        .post("/api/v1/youtube-videos")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&video)
        .await
        .json();

    // Saving again updates the same row and keeps the transcript
    let second: Value = server
        .post("/api/v1/youtube-videos")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({
            "videoId": "dQw4w9WgXcQ",
            "title": "Lecture 1 (final)",
            "url": "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "aiReport": "summary",
        }))
        .await
        .json();
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["title"], "Lecture 1 (final)");
    assert_eq!(second["transcript"], "hello");
    assert_eq!(second["aiReport"], "summary");

    let id = first["id"].as_str().unwrap();
    let response = server
        .get(&format!("/api/v1/youtube-videos/{}", id))
        .add_header(AUTHORIZATION, bearer("mallory"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let videos: Vec<Value> = server
        .get("/api/v1/youtube-videos")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await
        .json();
    assert_eq!(videos.len(), 1);

    let response = server
        .delete(&format!("/api/v1/youtube-videos/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Video deleted successfully");
}
