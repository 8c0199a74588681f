//! Collection service.
//!
//! Collections group saved resources. Items carry a reading status,
//! progress and their own tags, and can be managed in batches across
//! collections.

use std::collections::HashMap;

use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::db::{
    self, Collection, CollectionItem, CreateCollection, DbPool, ItemFilter, ItemSort,
    UpdateCollection, UpdateCollectionItem,
};
use crate::error::{Error, Result};
use crate::models::{unique_ids, ReadStatus, TagOperation};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionInput {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_public: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemInput {
    pub resource_id: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemInput {
    pub note: Option<String>,
    pub read_status: Option<ReadStatus>,
    pub read_progress: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub position: Option<i64>,
}

/// Query of the cross-collection item view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    pub collection_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMoveInput {
    pub item_ids: Vec<String>,
    pub target_collection_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteInput {
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTagsInput {
    pub item_ids: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub operation: TagOperation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusInput {
    pub item_ids: Vec<String>,
    pub status: ReadStatus,
}

#[derive(Clone)]
pub struct CollectionService {
    db: DbPool,
}

impl CollectionService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn create(&self, user_id: &str, input: CreateCollectionInput) -> Result<Collection> {
        if input.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        let collection = db::create_collection(
            &self.db,
            CreateCollection {
                user_id: user_id.to_string(),
                name: input.name.trim().to_string(),
                description: input.description,
                icon: input.icon,
                color: input.color,
                is_public: input.is_public,
            },
        )
        .await?;
        debug!(collection_id = %collection.id, "Collection created");
        Ok(collection)
    }

    /// The caller's collections with their items.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Value>> {
        let collections = db::list_user_collections(&self.db, user_id).await?;
        let mut out = Vec::with_capacity(collections.len());
        for collection in &collections {
            out.push(self.with_items(collection).await?);
        }
        Ok(out)
    }

    pub async fn get(&self, id: &str, viewer: Option<&str>) -> Result<Value> {
        let collection = db::get_collection(&self.db, id).await?;
        if !collection.is_public && viewer != Some(collection.user_id.as_str()) {
            return Err(Error::Forbidden(
                "You do not have access to this collection".to_string(),
            ));
        }
        self.with_items(&collection).await
    }

    pub async fn update(&self, user_id: &str, id: &str, input: UpdateCollectionInput) -> Result<Collection> {
        self.owned(user_id, id).await?;
        if input.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        db::update_collection(
            &self.db,
            id,
            UpdateCollection {
                name: input.name,
                description: input.description,
                icon: input.icon,
                color: input.color,
                is_public: input.is_public,
                sort_order: input.sort_order,
            },
        )
        .await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<Value> {
        self.owned(user_id, id).await?;
        db::delete_collection(&self.db, id).await?;
        info!(collection_id = %id, "Collection deleted");
        Ok(json!({ "message": "Collection deleted successfully" }))
    }

    async fn owned(&self, user_id: &str, id: &str) -> Result<Collection> {
        let collection = db::get_collection(&self.db, id).await?;
        if collection.user_id != user_id {
            return Err(Error::Forbidden(
                "You can only modify your own collections".to_string(),
            ));
        }
        Ok(collection)
    }

    async fn with_items(&self, collection: &Collection) -> Result<Value> {
        let items = db::list_collection_items(&self.db, &collection.id).await?;
        let items = self.attach_resources(&items).await?;

        let mut body = to_value(collection)?;
        body["itemCount"] = json!(items.len());
        body["items"] = Value::Array(items);
        Ok(body)
    }

    /// Item JSON with a short resource summary attached.
    async fn attach_resources(&self, items: &[CollectionItem]) -> Result<Vec<Value>> {
        let ids: Vec<String> = items.iter().map(|i| i.resource_id.clone()).collect();
        let resources = db::get_resources_by_ids(&self.db, &ids).await?;

        items
            .iter()
            .map(|item| {
                let mut body = to_value(item)?;
                body["resource"] = resources
                    .iter()
                    .find(|r| r.id == item.resource_id)
                    .map(|r| {
                        json!({
                            "id": r.id,
                            "type": r.resource_type,
                            "title": r.title,
                            "abstract": r.abstract_text,
                            "thumbnailUrl": r.thumbnail_url,
                            "publishedAt": r.published_at,
                        })
                    })
                    .unwrap_or(Value::Null);
                Ok(body)
            })
            .collect()
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub async fn add_item(&self, user_id: &str, id: &str, input: AddItemInput) -> Result<Value> {
        self.owned(user_id, id).await?;
        db::get_resource(&self.db, &input.resource_id).await?;

        if db::find_collection_item(&self.db, id, &input.resource_id)
            .await?
            .is_some()
        {
            return Ok(json!({ "success": false, "message": "Resource already in collection" }));
        }

        let position = db::count_collection_items(&self.db, id).await?;
        let item = db::add_collection_item(
            &self.db,
            id,
            &input.resource_id,
            input.note.as_deref(),
            position,
        )
        .await?;
        Ok(json!({ "success": true, "item": item }))
    }

    pub async fn remove_item(&self, user_id: &str, id: &str, resource_id: &str) -> Result<Value> {
        self.owned(user_id, id).await?;
        if !db::remove_collection_item(&self.db, id, resource_id).await? {
            return Err(Error::NotFound("Item not found in collection".to_string()));
        }
        Ok(json!({ "success": true, "message": "Resource removed from collection" }))
    }

    pub async fn update_item_note(
        &self,
        user_id: &str,
        id: &str,
        resource_id: &str,
        note: Option<String>,
    ) -> Result<CollectionItem> {
        self.owned(user_id, id).await?;
        let item = db::find_collection_item(&self.db, id, resource_id)
            .await?
            .ok_or_else(|| Error::NotFound("Item not found in collection".to_string()))?;
        db::update_collection_item(
            &self.db,
            &item.id,
            UpdateCollectionItem {
                note: Some(note.unwrap_or_default()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn update_item(&self, user_id: &str, item_id: &str, input: UpdateItemInput) -> Result<CollectionItem> {
        let item = db::get_collection_item(&self.db, item_id).await?;
        self.owned(user_id, &item.collection_id).await?;

        if let Some(progress) = input.read_progress {
            if !(0.0..=1.0).contains(&progress) {
                return Err(Error::Validation(
                    "readProgress must be between 0 and 1".to_string(),
                ));
            }
        }

        db::update_collection_item(
            &self.db,
            item_id,
            UpdateCollectionItem {
                note: input.note,
                read_status: input.read_status,
                read_progress: input.read_progress,
                tags: input.tags.map(|t| unique_ids(&t)),
                position: input.position,
            },
        )
        .await
    }

    /// Which of the caller's collections hold `resource_id`.
    pub async fn check_resource(&self, user_id: &str, resource_id: &str) -> Result<Value> {
        let collections = db::collections_containing(&self.db, user_id, resource_id).await?;
        Ok(json!({
            "isCollected": !collections.is_empty(),
            "collections": collections
                .into_iter()
                .map(|(id, name)| json!({ "id": id, "name": name }))
                .collect::<Vec<_>>(),
        }))
    }

    /// Every item tag with its usage count, most used first.
    pub async fn tags(&self, user_id: &str) -> Result<Vec<Value>> {
        let items = db::list_user_items(&self.db, user_id).await?;
        Ok(count_tags(&items)
            .into_iter()
            .map(|(name, count)| json!({ "name": name, "count": count }))
            .collect())
    }

    pub async fn stats(&self, user_id: &str) -> Result<Value> {
        let by_status = db::count_user_items_by_status(&self.db, user_id).await?;
        let since = (Utc::now() - Duration::days(RECENT_DAYS)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let recent = db::count_user_items_since(&self.db, user_id, &since).await?;

        let mut statuses = serde_json::Map::new();
        for status in [
            ReadStatus::Unread,
            ReadStatus::Reading,
            ReadStatus::Completed,
            ReadStatus::Archived,
        ] {
            statuses.insert(status.as_str().to_string(), json!(0));
        }
        let mut total = 0;
        for (status, count) in by_status {
            total += count;
            statuses.insert(status, json!(count));
        }

        Ok(json!({
            "totalItems": total,
            "recentItems": recent,
            "byStatus": statuses,
        }))
    }

    /// Items across the caller's collections, filtered and paginated.
    pub async fn paginated_items(&self, user_id: &str, query: ItemQuery) -> Result<Value> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let read_status = match query.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(ReadStatus::from_str(s).ok_or_else(|| {
                Error::Validation(format!("Invalid status: {}", s))
            })?),
            None => None,
        };

        let filter = ItemFilter {
            user_id: user_id.to_string(),
            collection_id: query.collection_id.filter(|c| !c.is_empty()),
            read_status,
            tag: query.tag.filter(|t| !t.is_empty()),
            search: query.search.filter(|s| !s.trim().is_empty()),
            sort: query
                .sort_by
                .as_deref()
                .and_then(ItemSort::from_str)
                .unwrap_or_default(),
            ascending: query.sort_order.as_deref() == Some("asc"),
            offset: (page - 1).saturating_mul(limit),
            limit,
        };

        let (items, total) = db::list_items_paginated(&self.db, &filter).await?;
        let items = self.attach_resources(&items).await?;
        let total_pages = (total + limit - 1) / limit;

        Ok(json!({
            "items": items,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": total_pages,
                "hasMore": page < total_pages,
            },
        }))
    }

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Deduplicate `item_ids` and check they all belong to the caller.
    async fn owned_items(&self, user_id: &str, item_ids: &[String]) -> Result<Vec<String>> {
        let ids = unique_ids(item_ids);
        if ids.is_empty() {
            return Err(Error::Validation("itemIds must not be empty".to_string()));
        }
        let owned = db::count_owned_items(&self.db, user_id, &ids).await?;
        if owned != ids.len() as i64 {
            return Err(Error::Forbidden(
                "Some items do not belong to you".to_string(),
            ));
        }
        Ok(ids)
    }

    pub async fn batch_move(&self, user_id: &str, input: BatchMoveInput) -> Result<Value> {
        let ids = self.owned_items(user_id, &input.item_ids).await?;
        self.owned(user_id, &input.target_collection_id).await?;
        let moved = db::move_items(&self.db, &ids, &input.target_collection_id).await?;
        info!(count = moved, target = %input.target_collection_id, "Collection items moved");
        Ok(json!({ "success": true, "movedCount": moved }))
    }

    pub async fn batch_delete(&self, user_id: &str, input: BatchDeleteInput) -> Result<Value> {
        let ids = self.owned_items(user_id, &input.item_ids).await?;
        let deleted = db::delete_items(&self.db, &ids).await?;
        info!(count = deleted, "Collection items deleted");
        Ok(json!({ "success": true, "deletedCount": deleted }))
    }

    pub async fn batch_tags(&self, user_id: &str, input: BatchTagsInput) -> Result<Value> {
        let ids = self.owned_items(user_id, &input.item_ids).await?;
        let tags = unique_ids(&input.tags);

        let items = db::get_items_by_ids(&self.db, &ids).await?;
        for item in &items {
            let updated = input.operation.apply(&item.tags_vec(), &tags);
            db::set_item_tags(&self.db, &item.id, &updated).await?;
        }
        Ok(json!({ "success": true, "updatedCount": items.len() }))
    }

    pub async fn batch_status(&self, user_id: &str, input: BatchStatusInput) -> Result<Value> {
        let ids = self.owned_items(user_id, &input.item_ids).await?;
        let updated = db::set_items_status(&self.db, &ids, input.status).await?;
        Ok(json!({ "success": true, "updatedCount": updated }))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Internal(e.to_string()))
}

/// Tag usage counts, sorted by count descending then name.
fn count_tags(items: &[CollectionItem]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        for tag in item.tags_vec() {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
