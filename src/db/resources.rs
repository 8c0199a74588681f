//! Resource database queries.

use crate::models::{new_id, now_rfc3339, serialize_json_text, to_json_text};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::DbPool;

// ============================================================================
// Types
// ============================================================================

/// Imported resource (paper, article, video...).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub resource_type: String,
    pub title: String,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub content: Option<String>,
    pub source_url: Option<String>,
    pub pdf_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(serialize_with = "serialize_json_text")]
    pub authors: String,
    pub published_at: Option<String>,
    #[serde(serialize_with = "serialize_json_text")]
    pub tags: String,
    #[serde(serialize_with = "serialize_json_text")]
    pub categories: String,
    pub primary_category: Option<String>,
    pub ai_summary: Option<String>,
    pub quality_score: f64,
    pub trending_score: f64,
    pub upvote_count: i64,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Resource {
    pub fn tags_vec(&self) -> Vec<String> {
        crate::models::parse_string_list(&self.tags)
    }

    pub fn authors_json(&self) -> Value {
        crate::models::parse_json(&self.authors)
    }
}

/// Input for creating a resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub content: Option<String>,
    pub source_url: Option<String>,
    pub pdf_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub authors: Option<Value>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
    pub ai_summary: Option<String>,
    pub quality_score: Option<f64>,
    pub trending_score: Option<f64>,
}

/// Input for updating a resource. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResource {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub content: Option<String>,
    pub source_url: Option<String>,
    pub pdf_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub authors: Option<Value>,
    pub published_at: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub primary_category: Option<String>,
    pub ai_summary: Option<String>,
    pub quality_score: Option<f64>,
    pub trending_score: Option<f64>,
}

/// Sortable resource columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceSort {
    #[default]
    PublishedAt,
    QualityScore,
    TrendingScore,
}

impl ResourceSort {
    pub fn column(&self) -> &'static str {
        match self {
            Self::PublishedAt => "published_at",
            Self::QualityScore => "quality_score",
            Self::TrendingScore => "trending_score",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "publishedAt" => Some(Self::PublishedAt),
            "qualityScore" => Some(Self::QualityScore),
            "trendingScore" => Some(Self::TrendingScore),
            _ => None,
        }
    }
}

/// Filters for listing resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub resource_type: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: ResourceSort,
    pub ascending: bool,
    pub skip: i64,
    pub take: i64,
}

// ============================================================================
// Queries
// ============================================================================

/// Create a new resource.
pub async fn create_resource(pool: &DbPool, input: CreateResource) -> Result<Resource> {
    let authors = input.authors.unwrap_or_else(|| Value::Array(Vec::new()));

    sqlx::query_as::<_, Resource>(
        r#"
        INSERT INTO resources (
            id, type, title, abstract, content, source_url, pdf_url, thumbnail_url,
            authors, published_at, tags, categories, primary_category, ai_summary,
            quality_score, trending_score
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.resource_type)
    .bind(&input.title)
    .bind(&input.abstract_text)
    .bind(&input.content)
    .bind(&input.source_url)
    .bind(&input.pdf_url)
    .bind(&input.thumbnail_url)
    .bind(to_json_text(&authors))
    .bind(&input.published_at)
    .bind(to_json_text(&input.tags))
    .bind(to_json_text(&input.categories))
    .bind(&input.primary_category)
    .bind(&input.ai_summary)
    .bind(input.quality_score.unwrap_or(0.0))
    .bind(input.trending_score.unwrap_or(0.0))
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a resource by ID.
pub async fn get_resource(pool: &DbPool, id: &str) -> Result<Resource> {
    sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Resource with ID {} not found", id)))
}

/// Fetch resources by id, returned in the order of `ids`. Unknown ids are skipped.
pub async fn get_resources_by_ids(pool: &DbPool, ids: &[String]) -> Result<Vec<Resource>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM resources WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = qb.build_query_as::<Resource>().fetch_all(pool).await?;

    let mut ordered = Vec::with_capacity(rows.len());
    for id in ids {
        if let Some(row) = rows.iter().find(|r| &r.id == id) {
            ordered.push(row.clone());
        }
    }
    Ok(ordered)
}

/// Update a resource.
pub async fn update_resource(pool: &DbPool, id: &str, input: UpdateResource) -> Result<Resource> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE resources SET ");
    let mut set = qb.separated(", ");

    if let Some(v) = input.resource_type {
        set.push("type = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.title {
        set.push("title = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.abstract_text {
        set.push("abstract = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.content {
        set.push("content = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.source_url {
        set.push("source_url = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.pdf_url {
        set.push("pdf_url = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.thumbnail_url {
        set.push("thumbnail_url = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.authors {
        set.push("authors = ").push_bind_unseparated(to_json_text(&v));
    }
    if let Some(v) = input.published_at {
        set.push("published_at = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.tags {
        set.push("tags = ").push_bind_unseparated(to_json_text(&v));
    }
    if let Some(v) = input.categories {
        set.push("categories = ").push_bind_unseparated(to_json_text(&v));
    }
    if let Some(v) = input.primary_category {
        set.push("primary_category = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.ai_summary {
        set.push("ai_summary = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.quality_score {
        set.push("quality_score = ").push_bind_unseparated(v);
    }
    if let Some(v) = input.trending_score {
        set.push("trending_score = ").push_bind_unseparated(v);
    }
    set.push("updated_at = ").push_bind_unseparated(now_rfc3339());

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    qb.build_query_as::<Resource>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Resource with ID {} not found", id)))
}

/// Delete a resource.
pub async fn delete_resource(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Resource with ID {} not found", id)));
    }

    Ok(())
}

fn push_resource_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ResourceFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(t) = &filter.resource_type {
        qb.push(" AND type = ").push_bind(t.clone());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(resources.categories) WHERE json_each.value = ")
            .push_bind(category.clone())
            .push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = super::like_pattern(search);
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR abstract LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// List resources matching a filter. Returns the page and the total match count.
pub async fn list_resources(pool: &DbPool, filter: &ResourceFilter) -> Result<(Vec<Resource>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM resources");
    push_resource_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM resources");
    push_resource_filters(&mut qb, filter);
    qb.push(format!(
        " ORDER BY {} {}, created_at DESC",
        filter.sort.column(),
        if filter.ascending { "ASC" } else { "DESC" }
    ));
    qb.push(" LIMIT ").push_bind(filter.take);
    qb.push(" OFFSET ").push_bind(filter.skip);

    let rows = qb.build_query_as::<Resource>().fetch_all(pool).await?;
    Ok((rows, total))
}

/// Candidate resources for search suggestions, best quality first.
pub async fn search_resources(pool: &DbPool, query: &str, limit: i64) -> Result<Vec<Resource>> {
    let pattern = super::like_pattern(query);
    sqlx::query_as::<_, Resource>(
        r#"
        SELECT * FROM resources
        WHERE title LIKE ? ESCAPE '\' OR abstract LIKE ? ESCAPE '\' OR content LIKE ? ESCAPE '\'
        ORDER BY quality_score DESC
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn count_resources(pool: &DbPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Resource counts grouped by type, largest first.
pub async fn count_resources_by_type(pool: &DbPool) -> Result<Vec<(String, i64)>> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT type, COUNT(*) AS count FROM resources GROUP BY type ORDER BY count DESC, type ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn source_url_exists(pool: &DbPool, source_url: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources WHERE source_url = ?")
        .bind(source_url)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}
