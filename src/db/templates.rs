//! Report template queries.

use crate::models::{serialize_json_text, to_json_text};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::FromRow;

use super::DbPool;

/// Report template record.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTemplate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub min_items: i64,
    pub max_items: i64,
    #[serde(serialize_with = "serialize_json_text")]
    pub sections: String,
    pub estimated_time: Option<String>,
    pub model: String,
    pub version: i64,
    #[serde(skip)]
    pub created_at: String,
}

/// Input for seeding a template.
#[derive(Debug, Clone)]
pub struct CreateReportTemplate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub min_items: i64,
    pub max_items: i64,
    pub sections: Vec<String>,
    pub estimated_time: Option<String>,
    pub model: String,
}

/// Insert a template unless one with the same id exists.
/// Returns true when a row was inserted.
pub async fn insert_template_if_missing(pool: &DbPool, input: &CreateReportTemplate) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO report_templates (
            id, name, category, description, icon, min_items, max_items,
            sections, estimated_time, model
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.id)
    .bind(&input.name)
    .bind(&input.category)
    .bind(&input.description)
    .bind(&input.icon)
    .bind(input.min_items)
    .bind(input.max_items)
    .bind(to_json_text(&input.sections))
    .bind(&input.estimated_time)
    .bind(&input.model)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_template(pool: &DbPool, id: &str) -> Result<Option<ReportTemplate>> {
    sqlx::query_as::<_, ReportTemplate>("SELECT * FROM report_templates WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// List templates, optionally restricted to one category.
pub async fn list_templates(pool: &DbPool, category: Option<&str>) -> Result<Vec<ReportTemplate>> {
    sqlx::query_as::<_, ReportTemplate>(
        r#"
        SELECT * FROM report_templates
        WHERE ? IS NULL OR category = ?
        ORDER BY min_items ASC, id ASC
        "#,
    )
    .bind(category)
    .bind(category)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}
