//! Workspace queries.
//!
//! A workspace is a user-owned set of resources that AI tasks and reports
//! run against. Resource membership changes are transactional.

use crate::models::{new_id, now_rfc3339, serialize_json_text_opt};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::FromRow;

use super::DbPool;

/// Workspace record.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Membership of a resource in a workspace.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceResource {
    pub id: String,
    pub workspace_id: String,
    pub resource_id: String,
    #[serde(serialize_with = "serialize_json_text_opt")]
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Create a workspace holding `resource_ids`, in one transaction.
pub async fn create_workspace(
    pool: &DbPool,
    user_id: &str,
    resource_ids: &[String],
) -> Result<Workspace> {
    let mut tx = pool.begin().await?;

    let workspace = sqlx::query_as::<_, Workspace>(
        "INSERT INTO workspaces (id, user_id) VALUES (?, ?) RETURNING *",
    )
    .bind(new_id())
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    for resource_id in resource_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO workspace_resources (id, workspace_id, resource_id) VALUES (?, ?, ?)",
        )
        .bind(new_id())
        .bind(&workspace.id)
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(workspace)
}

/// Get a workspace by ID.
pub async fn get_workspace(pool: &DbPool, id: &str) -> Result<Workspace> {
    sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Workspace not found".to_string()))
}

/// Resources in a workspace, in the order they were added.
pub async fn list_workspace_resources(
    pool: &DbPool,
    workspace_id: &str,
) -> Result<Vec<WorkspaceResource>> {
    sqlx::query_as::<_, WorkspaceResource>(
        r#"
        SELECT * FROM workspace_resources
        WHERE workspace_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Add and remove workspace resources in one transaction.
pub async fn update_workspace_resources(
    pool: &DbPool,
    workspace_id: &str,
    add: &[String],
    remove: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for resource_id in add {
        sqlx::query(
            "INSERT OR IGNORE INTO workspace_resources (id, workspace_id, resource_id) VALUES (?, ?, ?)",
        )
        .bind(new_id())
        .bind(workspace_id)
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;
    }

    for resource_id in remove {
        sqlx::query("DELETE FROM workspace_resources WHERE workspace_id = ? AND resource_id = ?")
            .bind(workspace_id)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE workspaces SET updated_at = ? WHERE id = ?")
        .bind(now_rfc3339())
        .bind(workspace_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}
