//! Workspaces Routes
//!
//! A workspace is a set of resources analysed together by AI tasks.
//!
//! Routes:
//! - POST /workspaces - Create from at least two resources
//! - GET /workspaces/templates - Report templates
//! - GET /workspaces/:id - Get with resources and tasks
//! - PATCH /workspaces/:id - Add and remove resources
//! - POST /workspaces/:id/tasks - Start an AI task
//! - GET /workspaces/:id/tasks/:taskId - Task with result (syncs once)
//! - GET /workspaces/:id/tasks/:taskId/events - Task status stream (SSE)

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::ReportTemplate;
use crate::middleware::{require_auth, AuthUser};
use crate::services::{CreateTaskInput, TaskEvent};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_workspace))
        .route("/templates", get(list_templates))
        .route("/:id", get(get_workspace).patch(update_workspace))
        .route("/:id/tasks", post(create_task))
        .route("/:id/tasks/:task_id", get(get_task))
        .route("/:id/tasks/:task_id/events", get(task_events))
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkspaceRequest {
    #[serde(default)]
    pub add_resource_ids: Vec<String>,
    #[serde(default)]
    pub remove_resource_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_workspace(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let workspace = state
        .workspaces
        .create_workspace(&user.user_id, &body.resource_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<ReportTemplate>>> {
    let templates = state
        .workspaces
        .list_templates(query.category.as_deref())
        .await?;
    Ok(Json(templates))
}

async fn get_workspace(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.workspaces.get_workspace(&user.user_id, &id).await?))
}

async fn update_workspace(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateWorkspaceRequest>,
) -> Result<Json<Value>> {
    let workspace = state
        .workspaces
        .update_resources(
            &user.user_id,
            &id,
            &body.add_resource_ids,
            &body.remove_resource_ids,
        )
        .await?;
    Ok(Json(workspace))
}

async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<CreateTaskInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let task = state.workspaces.create_task(&user.user_id, &id, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    Ok(Json(state.workspaces.get_task(&user.user_id, &id, &task_id).await?))
}

/// Stream status changes of one task.
///
/// The first event is the current state; later events arrive as the
/// background poller observes changes. The stream ends after the first
/// SUCCESS or FAILED event.
async fn task_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    state.workspaces.ensure_owner(&user.user_id, &id).await?;

    // Subscribe before reading the snapshot so no change is missed
    let updates = BroadcastStream::new(state.workspaces.subscribe());
    let task = state.workspaces.find_task(&id, &task_id).await?;

    let cursor = EventCursor {
        updates,
        task_id,
        pending: Some(TaskEvent::from_task(&task)),
        finished: false,
    };
    let stream = futures::stream::unfold(cursor, |mut cursor| async move {
        if cursor.finished {
            return None;
        }
        let event = match cursor.pending.take() {
            Some(event) => event,
            None => cursor.next_update().await?,
        };
        cursor.finished = event.status.is_terminal();
        Some((status_event(&event), cursor))
    })
    .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

struct EventCursor {
    updates: BroadcastStream<TaskEvent>,
    task_id: String,
    pending: Option<TaskEvent>,
    finished: bool,
}

impl EventCursor {
    async fn next_update(&mut self) -> Option<TaskEvent> {
        while let Some(message) = self.updates.next().await {
            match message {
                Ok(event) if event.task_id == self.task_id => return Some(event),
                // Lagged receivers skip ahead; the next event carries the latest state
                _ => continue,
            }
        }
        None
    }
}

fn status_event(event: &TaskEvent) -> Event {
    Event::default()
        .event("status")
        .json_data(event)
        .unwrap_or_else(|_| Event::default().event("status"))
}
