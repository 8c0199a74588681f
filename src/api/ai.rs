//! AI Routes
//!
//! Thin proxy over the AI microservice plus the model registry.
//!
//! Routes:
//! - GET /ai/models - Enabled models
//! - POST /ai/models - Register a model (auth)
//! - PATCH /ai/models/:id - Update a model (auth)
//! - POST /ai/simple-chat - Chat, streamed as SSE by default
//! - POST /ai/summary - Summarize content
//! - POST /ai/insights - Extract insights from content
//! - POST /ai/translate-single - Translate one text

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;

use crate::db::{AiModel, CreateAiModel, UpdateAiModel};
use crate::middleware::require_auth;
use crate::services::{ChatReply, ContentInput, SimpleChatInput, TranslateInput};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/models", get(list_models))
        .route("/simple-chat", post(simple_chat))
        .route("/summary", post(summary))
        .route("/insights", post(insights))
        .route("/translate-single", post(translate));

    let protected = Router::new()
        .route("/models", post(create_model))
        .route("/models/:id", patch(update_model))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<Value>>> {
    Ok(Json(state.assistant.list_models().await?))
}

async fn create_model(
    State(state): State<AppState>,
    Json(input): Json<CreateAiModel>,
) -> Result<(StatusCode, Json<AiModel>)> {
    let model = state.assistant.create_model(input).await?;
    Ok((StatusCode::CREATED, Json(model)))
}

async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateAiModel>,
) -> Result<Json<AiModel>> {
    Ok(Json(state.assistant.update_model(&id, input).await?))
}

/// POST /ai/simple-chat
///
/// Streams the upstream event stream byte for byte when `stream` is set.
async fn simple_chat(
    State(state): State<AppState>,
    Json(input): Json<SimpleChatInput>,
) -> Result<Response> {
    match state.assistant.simple_chat(input).await? {
        ChatReply::Stream(upstream) => Ok((
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(upstream.bytes_stream()),
        )
            .into_response()),
        ChatReply::Json(body) => Ok(Json(body).into_response()),
    }
}

async fn summary(State(state): State<AppState>, Json(input): Json<ContentInput>) -> Result<Json<Value>> {
    Ok(Json(state.assistant.summary(input).await?))
}

async fn insights(State(state): State<AppState>, Json(input): Json<ContentInput>) -> Result<Json<Value>> {
    Ok(Json(state.assistant.insights(input).await?))
}

async fn translate(
    State(state): State<AppState>,
    Json(input): Json<TranslateInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.assistant.translate(input).await?))
}
