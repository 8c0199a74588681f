//! Reports Routes
//!
//! Routes:
//! - POST /reports/generate - Generate a report from resources or a finished task
//! - POST /reports/chat - Chat about a report through the AI service
//! - GET /reports - The caller's reports, paginated
//! - GET /reports/:id - Get a report with its resources
//! - DELETE /reports/:id - Delete
//! - POST /reports/export - Render content as a downloadable document

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::middleware::{require_auth, AuthUser};
use crate::services::GenerateReportInput;
use crate::{AppState, Error, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports))
        .route("/generate", post(generate_report))
        .route("/chat", post(chat))
        .route("/export", post(export_document))
        .route("/:id", get(get_report).delete(delete_report))
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

/// Body of `POST /reports/export`. Fields are checked by hand so a missing
/// one is reported as a 400 naming the field.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
    pub content: Option<String>,
    pub title: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn generate_report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<GenerateReportInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let report = state.reports.generate(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn chat(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>> {
    Ok(Json(state.reports.chat(&body).await?))
}

async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Value>> {
    let reports = state
        .reports
        .list(&user.user_id, query.page, query.limit)
        .await?;
    Ok(Json(reports))
}

async fn get_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.reports.get(&user.user_id, &id).await?))
}

async fn delete_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.reports.delete(&user.user_id, &id).await?))
}

async fn export_document(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ExportRequest>,
) -> Result<Response> {
    let format = required(body.format, "format")?;
    let content = required(body.content, "content")?;
    let title = required(body.title, "title")?;

    let document = state.export.export(&format, &title, &content).await?;
    info!(
        user_id = %user.user_id,
        format = %format,
        bytes = document.bytes.len(),
        "Document exported"
    );

    let headers = [
        (header::CONTENT_TYPE, document.mime_type.to_string()),
        (header::CONTENT_DISPOSITION, document.content_disposition()),
        (header::CONTENT_LENGTH, document.bytes.len().to_string()),
        (header::ETAG, document.etag.clone()),
    ];
    Ok((headers, document.bytes).into_response())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Validation(format!("{} is required", field)))
}
