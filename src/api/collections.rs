//! Collections Routes
//!
//! Routes:
//! - POST /collections - Create
//! - GET /collections - The caller's collections with items
//! - GET /collections/:id - Get (private collections are owner only)
//! - PATCH /collections/:id - Update
//! - DELETE /collections/:id - Delete
//! - POST /collections/:id/items - Add a resource
//! - DELETE /collections/:id/items/:resourceId - Remove a resource
//! - PATCH /collections/:id/items/:resourceId/note - Set an item note
//! - GET /collections/check/:resourceId - Which collections hold a resource
//! - GET /collections/tags/all - Item tags with counts
//! - GET /collections/stats/summary - Reading statistics
//! - GET /collections/items/paginated - Filtered item view across collections
//! - PATCH /collections/items/:itemId - Update item status, progress, tags
//! - POST /collections/items/batch/{move,delete,tags,status} - Batch item operations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::db::{Collection, CollectionItem};
use crate::middleware::{optional_auth, require_auth, AuthUser, MaybeUser};
use crate::services::{
    AddItemInput, BatchDeleteInput, BatchMoveInput, BatchStatusInput, BatchTagsInput,
    CreateCollectionInput, ItemQuery, UpdateCollectionInput, UpdateItemInput,
};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let optional = Router::new()
        .route("/:id", get(get_collection))
        .layer(axum::middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected = Router::new()
        .route("/", get(list_collections).post(create_collection))
        .route("/check/:resource_id", get(check_resource))
        .route("/tags/all", get(all_tags))
        .route("/stats/summary", get(stats))
        .route("/items/paginated", get(paginated_items))
        .route("/items/batch/move", post(batch_move))
        .route("/items/batch/delete", post(batch_delete))
        .route("/items/batch/tags", post(batch_tags))
        .route("/items/batch/status", post(batch_status))
        .route("/items/:item_id", patch(update_item))
        .route("/:id", patch(update_collection).delete(delete_collection))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:resource_id", axum::routing::delete(remove_item))
        .route("/:id/items/:resource_id/note", patch(update_item_note))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    optional.merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct ItemNoteRequest {
    pub note: Option<String>,
}

// ============================================================================
// Collections
// ============================================================================

async fn create_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateCollectionInput>,
) -> Result<(StatusCode, Json<Collection>)> {
    let collection = state.collections.create(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn list_collections(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Value>>> {
    Ok(Json(state.collections.list(&user.user_id).await?))
}

async fn get_collection(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.get(&id, viewer.user_id()).await?))
}

async fn update_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateCollectionInput>,
) -> Result<Json<Collection>> {
    Ok(Json(state.collections.update(&user.user_id, &id, input).await?))
}

async fn delete_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.delete(&user.user_id, &id).await?))
}

// ============================================================================
// Items
// ============================================================================

async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<AddItemInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.add_item(&user.user_id, &id, input).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, resource_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let result = state
        .collections
        .remove_item(&user.user_id, &id, &resource_id)
        .await?;
    Ok(Json(result))
}

async fn update_item_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, resource_id)): Path<(String, String)>,
    Json(body): Json<ItemNoteRequest>,
) -> Result<Json<CollectionItem>> {
    let item = state
        .collections
        .update_item_note(&user.user_id, &id, &resource_id, body.note)
        .await?;
    Ok(Json(item))
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<String>,
    Json(input): Json<UpdateItemInput>,
) -> Result<Json<CollectionItem>> {
    Ok(Json(state.collections.update_item(&user.user_id, &item_id, input).await?))
}

async fn check_resource(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.check_resource(&user.user_id, &resource_id).await?))
}

async fn all_tags(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Value>>> {
    Ok(Json(state.collections.tags(&user.user_id).await?))
}

async fn stats(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>> {
    Ok(Json(state.collections.stats(&user.user_id).await?))
}

async fn paginated_items(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.paginated_items(&user.user_id, query).await?))
}

// ============================================================================
// Batch operations
// ============================================================================

async fn batch_move(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<BatchMoveInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.batch_move(&user.user_id, input).await?))
}

async fn batch_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<BatchDeleteInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.batch_delete(&user.user_id, input).await?))
}

async fn batch_tags(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<BatchTagsInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.batch_tags(&user.user_id, input).await?))
}

async fn batch_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<BatchStatusInput>,
) -> Result<Json<Value>> {
    Ok(Json(state.collections.batch_status(&user.user_id, input).await?))
}
