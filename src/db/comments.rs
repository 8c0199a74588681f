//! Comment queries. Comments form a tree through `parent_id` and are
//! soft-deleted.

use crate::models::{new_id, now_rfc3339};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::FromRow;

use super::DbPool;

/// Placeholder content left behind by a soft delete.
pub const DELETED_COMMENT_CONTENT: &str = "[This comment has been deleted]";

/// Comment record.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub resource_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub is_deleted: bool,
    pub is_edited: bool,
    pub upvote_count: i64,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a comment.
#[derive(Debug, Clone)]
pub struct CreateComment {
    pub user_id: String,
    pub resource_id: String,
    pub parent_id: Option<String>,
    pub content: String,
}

/// Comment counts for a resource, deleted comments excluded.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStats {
    pub total: i64,
    pub top_level: i64,
    pub replies: i64,
}

/// Create a new comment.
pub async fn create_comment(pool: &DbPool, input: CreateComment) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (id, user_id, resource_id, parent_id, content)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.user_id)
    .bind(&input.resource_id)
    .bind(&input.parent_id)
    .bind(&input.content)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a comment by ID, including soft-deleted ones.
pub async fn get_comment(pool: &DbPool, id: &str) -> Result<Comment> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Comment not found".to_string()))
}

/// Live top-level comments on a resource, newest first.
pub async fn list_top_level_comments(pool: &DbPool, resource_id: &str) -> Result<Vec<Comment>> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT * FROM comments
        WHERE resource_id = ? AND parent_id IS NULL AND is_deleted = 0
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Live replies to a comment, oldest first.
pub async fn list_replies(pool: &DbPool, parent_id: &str) -> Result<Vec<Comment>> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT * FROM comments
        WHERE parent_id = ? AND is_deleted = 0
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Replace a comment's content and mark it edited.
pub async fn update_comment_content(pool: &DbPool, id: &str, content: &str) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments SET content = ?, is_edited = 1, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(content)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound("Comment not found".to_string()))
}

/// Soft-delete a comment, replacing its content with a placeholder.
pub async fn soft_delete_comment(pool: &DbPool, id: &str) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments SET is_deleted = 1, content = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(DELETED_COMMENT_CONTENT)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound("Comment not found".to_string()))
}

/// Adjust a comment's reply count. The count never drops below zero.
pub async fn adjust_reply_count(pool: &DbPool, id: &str, delta: i64) -> Result<()> {
    sqlx::query("UPDATE comments SET reply_count = MAX(0, reply_count + ?) WHERE id = ?")
        .bind(delta)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upvote_comment(pool: &DbPool, id: &str) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(
        "UPDATE comments SET upvote_count = upvote_count + 1 WHERE id = ? RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound("Comment not found".to_string()))
}

pub async fn comment_stats(pool: &DbPool, resource_id: &str) -> Result<CommentStats> {
    let (total, top_level): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(CASE WHEN parent_id IS NULL THEN 1 ELSE 0 END), 0)
        FROM comments
        WHERE resource_id = ? AND is_deleted = 0
        "#,
    )
    .bind(resource_id)
    .fetch_one(pool)
    .await?;

    Ok(CommentStats {
        total,
        top_level,
        replies: total - top_level,
    })
}
