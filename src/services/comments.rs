//! Comment service: threaded discussion on resources.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::db::{self, Comment, CommentStats, CreateComment, DbPool};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub resource_id: String,
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentInput {
    pub content: String,
}

#[derive(Clone)]
pub struct CommentService {
    db: DbPool,
}

impl CommentService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: &str, input: CreateCommentInput) -> Result<Value> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }
        db::get_resource(&self.db, &input.resource_id).await?;

        if let Some(parent_id) = &input.parent_id {
            let parent = db::get_comment(&self.db, parent_id).await?;
            if parent.is_deleted {
                return Err(Error::Forbidden(
                    "Cannot reply to a deleted comment".to_string(),
                ));
            }
            if parent.resource_id != input.resource_id {
                return Err(Error::Validation(
                    "Parent comment belongs to another resource".to_string(),
                ));
            }
        }

        let comment = db::create_comment(
            &self.db,
            CreateComment {
                user_id: user_id.to_string(),
                resource_id: input.resource_id,
                parent_id: input.parent_id,
                content: content.to_string(),
            },
        )
        .await?;

        if let Some(parent_id) = &comment.parent_id {
            db::adjust_reply_count(&self.db, parent_id, 1).await?;
        }
        debug!(comment_id = %comment.id, "Comment created");

        let mut users = UserCache::default();
        self.comment_json(&comment, &mut users).await
    }

    /// Two-level comment tree: top-level comments newest first, replies oldest first.
    pub async fn tree(&self, resource_id: &str) -> Result<Vec<Value>> {
        let mut users = UserCache::default();
        let top_level = db::list_top_level_comments(&self.db, resource_id).await?;

        let mut out = Vec::with_capacity(top_level.len());
        for comment in &top_level {
            let mut body = self.comment_json(comment, &mut users).await?;
            let replies = db::list_replies(&self.db, &comment.id).await?;
            let mut reply_values = Vec::with_capacity(replies.len());
            for reply in &replies {
                reply_values.push(self.comment_json(reply, &mut users).await?);
            }
            body["replies"] = Value::Array(reply_values);
            out.push(body);
        }
        Ok(out)
    }

    /// A comment with its parent excerpt and live replies.
    pub async fn get(&self, id: &str) -> Result<Value> {
        let mut users = UserCache::default();
        let comment = db::get_comment(&self.db, id).await?;
        let mut body = self.comment_json(&comment, &mut users).await?;

        body["parent"] = match &comment.parent_id {
            Some(parent_id) => {
                let parent = db::get_comment(&self.db, parent_id).await?;
                json!({ "id": parent.id, "content": parent.content })
            }
            None => Value::Null,
        };

        let replies = db::list_replies(&self.db, &comment.id).await?;
        let mut reply_values = Vec::with_capacity(replies.len());
        for reply in &replies {
            reply_values.push(self.comment_json(reply, &mut users).await?);
        }
        body["replies"] = Value::Array(reply_values);
        Ok(body)
    }

    pub async fn update(&self, user_id: &str, id: &str, input: UpdateCommentInput) -> Result<Value> {
        let comment = self.owned(user_id, id).await?;
        if comment.is_deleted {
            return Err(Error::Forbidden(
                "Cannot edit a deleted comment".to_string(),
            ));
        }
        let content = input.content.trim();
        if content.is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }

        let updated = db::update_comment_content(&self.db, id, content).await?;
        let mut users = UserCache::default();
        self.comment_json(&updated, &mut users).await
    }

    /// Soft delete: the comment stays in place with placeholder content.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<Value> {
        let comment = self.owned(user_id, id).await?;
        if comment.is_deleted {
            return Ok(json!({ "message": "Comment deleted successfully" }));
        }

        db::soft_delete_comment(&self.db, id).await?;
        if let Some(parent_id) = &comment.parent_id {
            db::adjust_reply_count(&self.db, parent_id, -1).await?;
        }
        debug!(comment_id = %id, "Comment deleted");
        Ok(json!({ "message": "Comment deleted successfully" }))
    }

    pub async fn upvote(&self, id: &str) -> Result<Comment> {
        let comment = db::get_comment(&self.db, id).await?;
        if comment.is_deleted {
            return Err(Error::Forbidden(
                "Cannot upvote a deleted comment".to_string(),
            ));
        }
        db::upvote_comment(&self.db, id).await
    }

    pub async fn stats(&self, resource_id: &str) -> Result<CommentStats> {
        db::comment_stats(&self.db, resource_id).await
    }

    async fn owned(&self, user_id: &str, id: &str) -> Result<Comment> {
        let comment = db::get_comment(&self.db, id).await?;
        if comment.user_id != user_id {
            return Err(Error::Forbidden(
                "You can only modify your own comments".to_string(),
            ));
        }
        Ok(comment)
    }

    async fn comment_json(&self, comment: &Comment, users: &mut UserCache) -> Result<Value> {
        let author = users.get(&self.db, &comment.user_id).await?;
        let mut body = serde_json::to_value(comment).map_err(|e| Error::Internal(e.to_string()))?;
        body["user"] = author;
        Ok(body)
    }
}

/// Author lookups shared across one response.
#[derive(Default)]
struct UserCache {
    users: HashMap<String, Value>,
}

impl UserCache {
    async fn get(&mut self, db: &DbPool, user_id: &str) -> Result<Value> {
        if let Some(user) = self.users.get(user_id) {
            return Ok(user.clone());
        }
        let user = match db::get_user_optional(db, user_id).await? {
            Some(u) => json!({ "id": u.id, "username": u.username, "avatarUrl": u.avatar_url }),
            None => json!({ "id": user_id, "username": null, "avatarUrl": null }),
        };
        self.users.insert(user_id.to_string(), user.clone());
        Ok(user)
    }
}
