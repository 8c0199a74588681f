//! Workspace task queries.

use crate::models::{new_id, now_rfc3339, to_json_text, TaskStatus};
use crate::{Error, Result};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::DbPool;

/// AI task run against a workspace. JSON fields are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceTask {
    pub id: String,
    pub workspace_id: String,
    pub template_id: String,
    pub external_task_id: Option<String>,
    pub model: String,
    pub status: String,
    pub queue_position: Option<i64>,
    pub estimated_time: Option<i64>,
    pub parameters: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkspaceTask {
    pub fn status_enum(&self) -> TaskStatus {
        TaskStatus::from_str(&self.status).unwrap_or(TaskStatus::Pending)
    }

    pub fn result_json(&self) -> Option<Value> {
        self.result.as_deref().map(crate::models::parse_json)
    }

    pub fn metadata_json(&self) -> Option<Value> {
        self.metadata.as_deref().map(crate::models::parse_json)
    }

    pub fn parameters_json(&self) -> Option<Value> {
        self.parameters.as_deref().map(crate::models::parse_json)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct CreateWorkspaceTask {
    pub workspace_id: String,
    pub template_id: String,
    pub model: String,
    pub parameters: Value,
}

/// Input for updating a task. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateWorkspaceTask {
    pub external_task_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub queue_position: Option<i64>,
    pub estimated_time: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub metadata: Option<Value>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Create a new PENDING task.
pub async fn create_workspace_task(pool: &DbPool, input: CreateWorkspaceTask) -> Result<WorkspaceTask> {
    sqlx::query_as::<_, WorkspaceTask>(
        r#"
        INSERT INTO workspace_tasks (id, workspace_id, template_id, model, status, parameters)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.workspace_id)
    .bind(&input.template_id)
    .bind(&input.model)
    .bind(TaskStatus::Pending.as_str())
    .bind(to_json_text(&input.parameters))
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_workspace_task(pool: &DbPool, id: &str) -> Result<Option<WorkspaceTask>> {
    sqlx::query_as::<_, WorkspaceTask>("SELECT * FROM workspace_tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Tasks of a workspace, newest first.
pub async fn list_workspace_tasks(pool: &DbPool, workspace_id: &str) -> Result<Vec<WorkspaceTask>> {
    sqlx::query_as::<_, WorkspaceTask>(
        "SELECT * FROM workspace_tasks WHERE workspace_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Update a task.
pub async fn update_workspace_task(
    pool: &DbPool,
    id: &str,
    input: UpdateWorkspaceTask,
) -> Result<WorkspaceTask> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE workspace_tasks SET ");
    let mut set = qb.separated(", ");

    if let Some(v) = input.external_task_id {
        set.push("external_task_id = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.status {
        set.push("status = ").push_bind_unseparated(v.as_str());
    }
    if let Some(v) = input.queue_position {
        set.push("queue_position = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.estimated_time {
        set.push("estimated_time = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.result {
        set.push("result = ").push_bind_unseparated(to_json_text(&v));
    }
    if let Some(v) = input.error {
        set.push("error = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.metadata {
        set.push("metadata = ").push_bind_unseparated(to_json_text(&v));
    }
    if let Some(v) = input.started_at {
        set.push("started_at = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.finished_at {
        set.push("finished_at = ").push_bind_unseparated(v);
    }
    set.push("updated_at = ").push_bind_unseparated(now_rfc3339());

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    qb.build_query_as::<WorkspaceTask>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Task not found".to_string()))
}
