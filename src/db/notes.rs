//! Note database queries.

use crate::models::{new_id, now_rfc3339, serialize_json_text, serialize_json_text_opt, to_json_text};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::DbPool;

/// Note record. Highlights, tags, AI insights and graph nodes are JSON text.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub resource_id: String,
    pub content: String,
    #[serde(serialize_with = "serialize_json_text")]
    pub highlights: String,
    #[serde(serialize_with = "serialize_json_text")]
    pub tags: String,
    pub is_public: bool,
    #[serde(serialize_with = "serialize_json_text_opt")]
    pub ai_insights: Option<String>,
    #[serde(serialize_with = "serialize_json_text")]
    pub graph_nodes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Note {
    pub fn highlights_vec(&self) -> Vec<Value> {
        serde_json::from_str(&self.highlights).unwrap_or_default()
    }

    pub fn graph_nodes_vec(&self) -> Vec<Value> {
        serde_json::from_str(&self.graph_nodes).unwrap_or_default()
    }

    pub fn ai_insights_json(&self) -> Value {
        self.ai_insights
            .as_deref()
            .map(crate::models::parse_json)
            .unwrap_or(Value::Null)
    }
}

/// Input for creating a note.
#[derive(Debug, Clone)]
pub struct CreateNote {
    pub user_id: String,
    pub resource_id: String,
    pub content: String,
    pub highlights: Vec<Value>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

/// Input for updating a note.
#[derive(Debug, Clone, Default)]
pub struct UpdateNote {
    pub content: Option<String>,
    pub highlights: Option<Vec<Value>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub ai_insights: Option<Value>,
    pub graph_nodes: Option<Vec<Value>>,
}

/// Create a new note.
pub async fn create_note(pool: &DbPool, input: CreateNote) -> Result<Note> {
    sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes (id, user_id, resource_id, content, highlights, tags, is_public)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.user_id)
    .bind(&input.resource_id)
    .bind(&input.content)
    .bind(to_json_text(&input.highlights))
    .bind(to_json_text(&input.tags))
    .bind(input.is_public)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a note by ID.
pub async fn get_note(pool: &DbPool, id: &str) -> Result<Note> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Note not found".to_string()))
}

/// List a user's notes, most recently updated first.
pub async fn list_user_notes(
    pool: &DbPool,
    user_id: &str,
    skip: i64,
    take: i64,
) -> Result<(Vec<Note>, i64)> {
    let notes = sqlx::query_as::<_, Note>(
        r#"
        SELECT * FROM notes
        WHERE user_id = ?
        ORDER BY updated_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(take)
    .bind(skip)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((notes, total))
}

/// Notes on a resource visible to `viewer`: every public note plus the viewer's own.
pub async fn list_resource_notes(
    pool: &DbPool,
    resource_id: &str,
    viewer: Option<&str>,
) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>(
        r#"
        SELECT * FROM notes
        WHERE resource_id = ? AND (is_public = 1 OR user_id = ?)
        ORDER BY created_at DESC
        "#,
    )
    .bind(resource_id)
    .bind(viewer)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Update a note.
pub async fn update_note(pool: &DbPool, id: &str, input: UpdateNote) -> Result<Note> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE notes SET ");
    let mut set = qb.separated(", ");

    if let Some(content) = input.content {
        set.push("content = ").push_bind_unseparated(content);
    }
    if let Some(highlights) = input.highlights {
        set.push("highlights = ").push_bind_unseparated(to_json_text(&highlights));
    }
    if let Some(tags) = input.tags {
        set.push("tags = ").push_bind_unseparated(to_json_text(&tags));
    }
    if let Some(is_public) = input.is_public {
        set.push("is_public = ").push_bind_unseparated(is_public);
    }
    if let Some(ai_insights) = input.ai_insights {
        set.push("ai_insights = ").push_bind_unseparated(to_json_text(&ai_insights));
    }
    if let Some(graph_nodes) = input.graph_nodes {
        set.push("graph_nodes = ").push_bind_unseparated(to_json_text(&graph_nodes));
    }
    set.push("updated_at = ").push_bind_unseparated(now_rfc3339());

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    qb.build_query_as::<Note>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Note not found".to_string()))
}

/// Delete a note.
pub async fn delete_note(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Note not found".to_string()));
    }

    Ok(())
}
