//! Collection and collection item queries.

use crate::models::{new_id, now_rfc3339, serialize_json_text, to_json_text, ReadStatus};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::DbPool;

// ============================================================================
// Types
// ============================================================================

/// Collection record.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_public: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Resource saved in a collection.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub id: String,
    pub collection_id: String,
    pub resource_id: String,
    pub note: Option<String>,
    pub position: i64,
    pub read_status: String,
    pub read_progress: f64,
    pub last_read_at: Option<String>,
    #[serde(serialize_with = "serialize_json_text")]
    pub tags: String,
    pub added_at: String,
}

impl CollectionItem {
    pub fn tags_vec(&self) -> Vec<String> {
        crate::models::parse_string_list(&self.tags)
    }
}

/// Input for creating a collection.
#[derive(Debug, Clone)]
pub struct CreateCollection {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_public: bool,
}

/// Input for updating a collection.
#[derive(Debug, Clone, Default)]
pub struct UpdateCollection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_public: Option<bool>,
    pub sort_order: Option<i64>,
}

/// Input for updating a collection item.
#[derive(Debug, Clone, Default)]
pub struct UpdateCollectionItem {
    pub note: Option<String>,
    pub read_status: Option<ReadStatus>,
    pub read_progress: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub position: Option<i64>,
}

/// Sortable item columns for the paginated item view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    #[default]
    AddedAt,
    Title,
    PublishedAt,
    ReadProgress,
    Position,
}

impl ItemSort {
    pub fn column(&self) -> &'static str {
        match self {
            Self::AddedAt => "ci.added_at",
            Self::Title => "r.title",
            Self::PublishedAt => "r.published_at",
            Self::ReadProgress => "ci.read_progress",
            Self::Position => "ci.position",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "addedAt" => Some(Self::AddedAt),
            "title" => Some(Self::Title),
            "publishedAt" => Some(Self::PublishedAt),
            "readProgress" => Some(Self::ReadProgress),
            "position" => Some(Self::Position),
            _ => None,
        }
    }
}

/// Filters for the cross-collection item view.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub user_id: String,
    pub collection_id: Option<String>,
    pub read_status: Option<ReadStatus>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: ItemSort,
    pub ascending: bool,
    pub offset: i64,
    pub limit: i64,
}

// ============================================================================
// Collection Queries
// ============================================================================

/// Create a new collection.
pub async fn create_collection(pool: &DbPool, input: CreateCollection) -> Result<Collection> {
    sqlx::query_as::<_, Collection>(
        r#"
        INSERT INTO collections (id, user_id, name, description, icon, color, is_public)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.icon)
    .bind(&input.color)
    .bind(input.is_public)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a collection by ID.
pub async fn get_collection(pool: &DbPool, id: &str) -> Result<Collection> {
    sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Collection not found".to_string()))
}

/// List a user's collections.
pub async fn list_user_collections(pool: &DbPool, user_id: &str) -> Result<Vec<Collection>> {
    sqlx::query_as::<_, Collection>(
        "SELECT * FROM collections WHERE user_id = ? ORDER BY sort_order ASC, created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Update a collection.
pub async fn update_collection(
    pool: &DbPool,
    id: &str,
    input: UpdateCollection,
) -> Result<Collection> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE collections SET ");
    let mut set = qb.separated(", ");

    if let Some(name) = input.name {
        set.push("name = ").push_bind_unseparated(name);
    }
    if let Some(description) = input.description {
        set.push("description = ").push_bind_unseparated(description);
    }
    if let Some(icon) = input.icon {
        set.push("icon = ").push_bind_unseparated(icon);
    }
    if let Some(color) = input.color {
        set.push("color = ").push_bind_unseparated(color);
    }
    if let Some(is_public) = input.is_public {
        set.push("is_public = ").push_bind_unseparated(is_public);
    }
    if let Some(sort_order) = input.sort_order {
        set.push("sort_order = ").push_bind_unseparated(sort_order);
    }
    set.push("updated_at = ").push_bind_unseparated(now_rfc3339());

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    qb.build_query_as::<Collection>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Collection not found".to_string()))
}

/// Delete a collection. Items cascade.
pub async fn delete_collection(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM collections WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Collection not found".to_string()));
    }

    Ok(())
}

/// Collections owned by `user_id` that contain `resource_id`.
pub async fn collections_containing(
    pool: &DbPool,
    user_id: &str,
    resource_id: &str,
) -> Result<Vec<(String, String)>> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT c.id, c.name FROM collections c
        JOIN collection_items ci ON ci.collection_id = c.id
        WHERE c.user_id = ? AND ci.resource_id = ?
        ORDER BY c.sort_order ASC, c.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(resource_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

// ============================================================================
// Item Queries
// ============================================================================

/// Items of a collection, by position.
pub async fn list_collection_items(pool: &DbPool, collection_id: &str) -> Result<Vec<CollectionItem>> {
    sqlx::query_as::<_, CollectionItem>(
        "SELECT * FROM collection_items WHERE collection_id = ? ORDER BY position ASC, added_at ASC",
    )
    .bind(collection_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn count_collection_items(pool: &DbPool, collection_id: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM collection_items WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn find_collection_item(
    pool: &DbPool,
    collection_id: &str,
    resource_id: &str,
) -> Result<Option<CollectionItem>> {
    sqlx::query_as::<_, CollectionItem>(
        "SELECT * FROM collection_items WHERE collection_id = ? AND resource_id = ?",
    )
    .bind(collection_id)
    .bind(resource_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_collection_item(pool: &DbPool, item_id: &str) -> Result<CollectionItem> {
    sqlx::query_as::<_, CollectionItem>("SELECT * FROM collection_items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Collection item not found".to_string()))
}

/// Add a resource to a collection at `position`.
pub async fn add_collection_item(
    pool: &DbPool,
    collection_id: &str,
    resource_id: &str,
    note: Option<&str>,
    position: i64,
) -> Result<CollectionItem> {
    sqlx::query_as::<_, CollectionItem>(
        r#"
        INSERT INTO collection_items (id, collection_id, resource_id, note, position)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(collection_id)
    .bind(resource_id)
    .bind(note)
    .bind(position)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Remove a resource from a collection. Returns false when it was not there.
pub async fn remove_collection_item(
    pool: &DbPool,
    collection_id: &str,
    resource_id: &str,
) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM collection_items WHERE collection_id = ? AND resource_id = ?")
            .bind(collection_id)
            .bind(resource_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Update a collection item.
pub async fn update_collection_item(
    pool: &DbPool,
    item_id: &str,
    input: UpdateCollectionItem,
) -> Result<CollectionItem> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE collection_items SET ");
    let mut set = qb.separated(", ");
    let mut any = false;

    if let Some(note) = input.note {
        set.push("note = ").push_bind_unseparated(note);
        any = true;
    }
    if let Some(status) = input.read_status {
        set.push("read_status = ").push_bind_unseparated(status.as_str());
        any = true;
    }
    if let Some(progress) = input.read_progress {
        set.push("read_progress = ").push_bind_unseparated(progress);
        if progress > 0.0 {
            set.push("last_read_at = ").push_bind_unseparated(now_rfc3339());
        }
        any = true;
    }
    if let Some(tags) = input.tags {
        set.push("tags = ").push_bind_unseparated(to_json_text(&tags));
        any = true;
    }
    if let Some(position) = input.position {
        set.push("position = ").push_bind_unseparated(position);
        any = true;
    }

    if !any {
        return get_collection_item(pool, item_id).await;
    }

    qb.push(" WHERE id = ").push_bind(item_id).push(" RETURNING *");

    qb.build_query_as::<CollectionItem>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Collection item not found".to_string()))
}

/// Every item across a user's collections.
pub async fn list_user_items(pool: &DbPool, user_id: &str) -> Result<Vec<CollectionItem>> {
    sqlx::query_as::<_, CollectionItem>(
        r#"
        SELECT ci.* FROM collection_items ci
        JOIN collections c ON c.id = ci.collection_id
        WHERE c.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Item counts grouped by read status for a user.
pub async fn count_user_items_by_status(pool: &DbPool, user_id: &str) -> Result<Vec<(String, i64)>> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT ci.read_status, COUNT(*) FROM collection_items ci
        JOIN collections c ON c.id = ci.collection_id
        WHERE c.user_id = ?
        GROUP BY ci.read_status
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Items added by a user since `since` (RFC 3339).
pub async fn count_user_items_since(pool: &DbPool, user_id: &str, since: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM collection_items ci
        JOIN collections c ON c.id = ci.collection_id
        WHERE c.user_id = ? AND ci.added_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

fn push_item_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ItemFilter) {
    qb.push(
        " FROM collection_items ci \
         JOIN collections c ON c.id = ci.collection_id \
         JOIN resources r ON r.id = ci.resource_id \
         WHERE c.user_id = ",
    )
    .push_bind(filter.user_id.clone());

    if let Some(collection_id) = &filter.collection_id {
        qb.push(" AND ci.collection_id = ").push_bind(collection_id.clone());
    }
    if let Some(status) = filter.read_status {
        qb.push(" AND ci.read_status = ").push_bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(ci.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
    if let Some(search) = &filter.search {
        qb.push(" AND r.title LIKE ")
            .push_bind(super::like_pattern(search))
            .push(" ESCAPE '\\'");
    }
}

/// Paginated items across a user's collections. Returns the page and the total.
pub async fn list_items_paginated(
    pool: &DbPool,
    filter: &ItemFilter,
) -> Result<(Vec<CollectionItem>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
    push_item_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ci.*");
    push_item_filters(&mut qb, filter);
    qb.push(format!(
        " ORDER BY {} {}",
        filter.sort.column(),
        if filter.ascending { "ASC" } else { "DESC" }
    ));
    qb.push(" LIMIT ").push_bind(filter.limit);
    qb.push(" OFFSET ").push_bind(filter.offset);

    let items = qb.build_query_as::<CollectionItem>().fetch_all(pool).await?;
    Ok((items, total))
}

// ============================================================================
// Batch Queries
// ============================================================================

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

/// Number of `item_ids` that sit in collections owned by `user_id`.
pub async fn count_owned_items(pool: &DbPool, user_id: &str, item_ids: &[String]) -> Result<i64> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM collection_items ci JOIN collections c ON c.id = ci.collection_id WHERE c.user_id = ",
    );
    qb.push_bind(user_id.to_string());
    qb.push(" AND ci.id IN ");
    push_id_list(&mut qb, item_ids);
    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

pub async fn get_items_by_ids(pool: &DbPool, item_ids: &[String]) -> Result<Vec<CollectionItem>> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM collection_items WHERE id IN ");
    push_id_list(&mut qb, item_ids);
    Ok(qb.build_query_as::<CollectionItem>().fetch_all(pool).await?)
}

pub async fn move_items(pool: &DbPool, item_ids: &[String], target_collection_id: &str) -> Result<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE collection_items SET collection_id = ");
    qb.push_bind(target_collection_id.to_string());
    qb.push(" WHERE id IN ");
    push_id_list(&mut qb, item_ids);
    Ok(qb.build().execute(pool).await?.rows_affected())
}

pub async fn delete_items(pool: &DbPool, item_ids: &[String]) -> Result<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM collection_items WHERE id IN ");
    push_id_list(&mut qb, item_ids);
    Ok(qb.build().execute(pool).await?.rows_affected())
}

pub async fn set_items_status(pool: &DbPool, item_ids: &[String], status: ReadStatus) -> Result<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE collection_items SET read_status = ");
    qb.push_bind(status.as_str());
    qb.push(" WHERE id IN ");
    push_id_list(&mut qb, item_ids);
    Ok(qb.build().execute(pool).await?.rows_affected())
}

pub async fn set_item_tags(pool: &DbPool, item_id: &str, tags: &[String]) -> Result<()> {
    sqlx::query("UPDATE collection_items SET tags = ? WHERE id = ?")
        .bind(to_json_text(&tags))
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}
