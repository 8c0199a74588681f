//! Notes Routes
//!
//! Routes:
//! - POST /notes - Create a note on a resource
//! - GET /notes - The caller's notes
//! - GET /notes/resource/:resourceId - Public notes plus the caller's own
//! - GET /notes/:id - Get a note (private notes are owner only)
//! - PATCH /notes/:id - Update
//! - DELETE /notes/:id - Delete
//! - POST /notes/:id/highlights - Add a highlight
//! - DELETE /notes/:id/highlights/:highlightId - Remove a highlight
//! - POST /notes/:id/ai-explain - Ask the AI service to explain a passage
//! - POST /notes/:id/graph-nodes - Link a knowledge graph node

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::db::Note;
use crate::middleware::{optional_auth, require_auth, AuthUser, MaybeUser};
use crate::services::{CreateNoteInput, ExplainInput, GraphNodeInput, HighlightInput, UpdateNoteInput};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let optional = Router::new()
        .route("/resource/:resource_id", get(list_resource_notes))
        .route("/:id", get(get_note))
        .layer(axum::middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected = Router::new()
        .route("/", get(list_my_notes).post(create_note))
        .route("/:id", patch(update_note).delete(delete_note))
        .route("/:id/highlights", post(add_highlight))
        .route("/:id/highlights/:highlight_id", delete(remove_highlight))
        .route("/:id/ai-explain", post(explain))
        .route("/:id/graph-nodes", post(add_graph_node))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    optional.merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_take")]
    pub take: i64,
}

fn default_take() -> i64 {
    50
}

async fn create_note(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateNoteInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let note = state.notes.create(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn list_my_notes(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<Value>> {
    let notes = state
        .notes
        .list_own(&user.user_id, query.skip, query.take)
        .await?;
    Ok(Json(notes))
}

async fn list_resource_notes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<Note>>> {
    let notes = state
        .notes
        .list_for_resource(&resource_id, viewer.user_id())
        .await?;
    Ok(Json(notes))
}

async fn get_note(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.notes.get(&id, viewer.user_id()).await?))
}

async fn update_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateNoteInput>,
) -> Result<Json<Note>> {
    Ok(Json(state.notes.update(&user.user_id, &id, input).await?))
}

async fn delete_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.notes.delete(&user.user_id, &id).await?))
}

async fn add_highlight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<HighlightInput>,
) -> Result<Json<Note>> {
    Ok(Json(state.notes.add_highlight(&user.user_id, &id, input).await?))
}

async fn remove_highlight(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, highlight_id)): Path<(String, String)>,
) -> Result<Json<Note>> {
    let note = state
        .notes
        .remove_highlight(&user.user_id, &id, &highlight_id)
        .await?;
    Ok(Json(note))
}

async fn explain(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ExplainInput>,
) -> Result<Json<Note>> {
    Ok(Json(state.notes.explain(&user.user_id, &id, input).await?))
}

async fn add_graph_node(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<GraphNodeInput>,
) -> Result<Json<Note>> {
    Ok(Json(state.notes.add_graph_node(&user.user_id, &id, input).await?))
}
