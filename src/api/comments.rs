//! Comments Routes
//!
//! Routes:
//! - POST /comments - Comment or reply (auth)
//! - GET /comments/resource/:resourceId - Two-level comment tree
//! - GET /comments/resource/:resourceId/stats - Counts
//! - GET /comments/:id - Get with parent and replies
//! - PATCH /comments/:id - Edit (auth, owner)
//! - DELETE /comments/:id - Soft delete (auth, owner)
//! - POST /comments/:id/upvote - Upvote

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;

use crate::db::{Comment, CommentStats};
use crate::middleware::{require_auth, AuthUser};
use crate::services::{CreateCommentInput, UpdateCommentInput};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/resource/:resource_id", get(comment_tree))
        .route("/resource/:resource_id/stats", get(comment_stats))
        .route("/:id", get(get_comment))
        .route("/:id/upvote", post(upvote));

    let protected = Router::new()
        .route("/", post(create_comment))
        .route("/:id", patch(update_comment).delete(delete_comment))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let comment = state.comments.create(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn comment_tree(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<Value>>> {
    Ok(Json(state.comments.tree(&resource_id).await?))
}

async fn comment_stats(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<CommentStats>> {
    Ok(Json(state.comments.stats(&resource_id).await?))
}

async fn get_comment(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    Ok(Json(state.comments.get(&id).await?))
}

async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateCommentInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.comments.update(&user.user_id, &id, input).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.comments.delete(&user.user_id, &id).await?))
}

async fn upvote(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Comment>> {
    Ok(Json(state.comments.upvote(&id).await?))
}
