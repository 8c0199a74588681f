//! Report queries.

use crate::models::{new_id, serialize_json_text, serialize_json_text_opt, to_json_text};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use super::DbPool;

/// Generated report. Sections, resource ids and metadata are JSON text.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub workspace_id: Option<String>,
    pub title: String,
    pub template: String,
    pub template_name: String,
    pub template_icon: String,
    pub summary: String,
    #[serde(serialize_with = "serialize_json_text")]
    pub sections: String,
    #[serde(serialize_with = "serialize_json_text")]
    pub resource_ids: String,
    pub resource_count: i64,
    #[serde(serialize_with = "serialize_json_text_opt")]
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Report {
    pub fn resource_ids_vec(&self) -> Vec<String> {
        crate::models::parse_string_list(&self.resource_ids)
    }
}

/// Input for storing a report.
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub user_id: String,
    pub workspace_id: Option<String>,
    pub title: String,
    pub template: String,
    pub template_name: String,
    pub template_icon: String,
    pub summary: String,
    pub sections: Value,
    pub resource_ids: Vec<String>,
    pub metadata: Value,
}

pub async fn create_report(pool: &DbPool, input: CreateReport) -> Result<Report> {
    sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (
            id, user_id, workspace_id, title, template, template_name, template_icon,
            summary, sections, resource_ids, resource_count, metadata
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.user_id)
    .bind(&input.workspace_id)
    .bind(&input.title)
    .bind(&input.template)
    .bind(&input.template_name)
    .bind(&input.template_icon)
    .bind(&input.summary)
    .bind(to_json_text(&input.sections))
    .bind(to_json_text(&input.resource_ids))
    .bind(input.resource_ids.len() as i64)
    .bind(to_json_text(&input.metadata))
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_report(pool: &DbPool, id: &str) -> Result<Report> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Report not found".to_string()))
}

/// A user's reports, newest first, with the total count.
pub async fn list_user_reports(
    pool: &DbPool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Report>, i64)> {
    let reports = sqlx::query_as::<_, Report>(
        r#"
        SELECT * FROM reports
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((reports, total))
}

/// Reports generated from a workspace, newest first.
pub async fn list_workspace_reports(pool: &DbPool, workspace_id: &str) -> Result<Vec<Report>> {
    sqlx::query_as::<_, Report>(
        "SELECT * FROM reports WHERE workspace_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn delete_report(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM reports WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Report not found".to_string()));
    }

    Ok(())
}
