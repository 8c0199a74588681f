//! Resources Routes
//!
//! Routes:
//! - GET /resources - List with filters and pagination
//! - GET /resources/search/suggestions - Ranked title suggestions
//! - GET /resources/stats/summary - Totals by type
//! - GET /resources/:id - Get a resource
//! - POST /resources - Create (auth)
//! - POST /resources/batch - Bulk create, skipping known source URLs (auth)
//! - PATCH /resources/:id - Update (auth)
//! - DELETE /resources/:id - Delete (auth)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::db::{CreateResource, Resource, UpdateResource};
use crate::middleware::require_auth;
use crate::services::{BatchCreateInput, ResourceQuery, Suggestion};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_resources))
        .route("/search/suggestions", get(suggestions))
        .route("/stats/summary", get(stats))
        .route("/:id", get(get_resource));

    let protected = Router::new()
        .route("/", post(create_resource))
        .route("/batch", post(create_batch))
        .route("/:id", patch(update_resource).delete(delete_resource))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Value>> {
    Ok(Json(state.resources.list(query).await?))
}

async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Vec<Suggestion>>> {
    Ok(Json(state.resources.suggestions(&query.q, query.limit).await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.resources.stats().await?))
}

async fn get_resource(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Resource>> {
    Ok(Json(state.resources.get(&id).await?))
}

async fn create_resource(
    State(state): State<AppState>,
    Json(input): Json<CreateResource>,
) -> Result<(StatusCode, Json<Resource>)> {
    let resource = state.resources.create(input).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<BatchCreateInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let result = state.resources.create_batch(input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn update_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateResource>,
) -> Result<Json<Resource>> {
    Ok(Json(state.resources.update(&id, input).await?))
}

async fn delete_resource(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    Ok(Json(state.resources.delete(&id).await?))
}
