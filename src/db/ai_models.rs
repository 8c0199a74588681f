//! AI model registry queries.

use crate::models::{new_id, now_rfc3339};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::DbPool;

/// Chat model offered to clients.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModel {
    pub id: String,
    /// Short identifier clients send, e.g. `grok` or `gemini`.
    pub name: String,
    pub display_name: String,
    pub provider: String,
    /// Identifier forwarded to the AI service.
    pub model_id: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub is_enabled: bool,
    pub is_default: bool,
    pub api_endpoint: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AiModel {
    /// Match a client-supplied model name against `name` or `model_id`, ignoring case.
    pub fn matches(&self, requested: &str) -> bool {
        self.name.eq_ignore_ascii_case(requested) || self.model_id.eq_ignore_ascii_case(requested)
    }
}

/// Input for registering a model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAiModel {
    pub name: String,
    pub display_name: String,
    pub provider: String,
    pub model_id: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub is_enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub api_endpoint: Option<String>,
}

/// Input for updating a model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAiModel {
    pub display_name: Option<String>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub is_enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub api_endpoint: Option<String>,
}

pub async fn create_ai_model(pool: &DbPool, input: CreateAiModel) -> Result<AiModel> {
    sqlx::query_as::<_, AiModel>(
        r#"
        INSERT INTO ai_models (
            id, name, display_name, provider, model_id, icon, color, description,
            is_enabled, is_default, api_endpoint
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.name)
    .bind(&input.display_name)
    .bind(&input.provider)
    .bind(&input.model_id)
    .bind(&input.icon)
    .bind(&input.color)
    .bind(&input.description)
    .bind(input.is_enabled.unwrap_or(true))
    .bind(input.is_default.unwrap_or(false))
    .bind(&input.api_endpoint)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn update_ai_model(pool: &DbPool, id: &str, input: UpdateAiModel) -> Result<AiModel> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE ai_models SET ");
    let mut set = qb.separated(", ");

    if let Some(v) = input.display_name {
        set.push("display_name = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.provider {
        set.push("provider = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.model_id {
        set.push("model_id = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.icon {
        set.push("icon = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.color {
        set.push("color = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.description {
        set.push("description = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.is_enabled {
        set.push("is_enabled = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.is_default {
        set.push("is_default = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.api_endpoint {
        set.push("api_endpoint = ").push_bind_unseparated(v);
    }
    set.push("updated_at = ").push_bind_unseparated(now_rfc3339());

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    qb.build_query_as::<AiModel>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("AI model not found: {}", id)))
}

/// Enabled models, default first.
pub async fn list_enabled_models(pool: &DbPool) -> Result<Vec<AiModel>> {
    sqlx::query_as::<_, AiModel>(
        "SELECT * FROM ai_models WHERE is_enabled = 1 ORDER BY is_default DESC, display_name ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}
