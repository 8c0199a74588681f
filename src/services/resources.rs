//! Resource service: listing, search suggestions and bulk import.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::db::{self, CreateResource, DbPool, Resource, ResourceFilter, ResourceSort, UpdateResource};
use crate::error::{Error, Result};
use crate::models::{parse_timestamp, ResourceType};

const DEFAULT_TAKE: i64 = 20;
const MAX_TAKE: i64 = 100;
const DEFAULT_SUGGESTIONS: i64 = 5;
const SNIPPET_RADIUS: usize = 30;

/// Query of `GET /resources`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub skip: Option<i64>,
    pub take: Option<i64>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCreateInput {
    pub resources: Vec<CreateResource>,
}

/// One search suggestion.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub highlight: String,
}

#[derive(Clone)]
pub struct ResourceService {
    db: DbPool,
}

impl ResourceService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: ResourceQuery) -> Result<Value> {
        let skip = query.skip.unwrap_or(0).max(0);
        let take = query.take.unwrap_or(DEFAULT_TAKE).clamp(1, MAX_TAKE);

        let filter = ResourceFilter {
            resource_type: query.resource_type.filter(|t| !t.is_empty()),
            category: query.category.filter(|c| !c.is_empty()),
            search: query.search.filter(|s| !s.trim().is_empty()),
            sort: query
                .sort_by
                .as_deref()
                .and_then(ResourceSort::from_str)
                .unwrap_or_default(),
            ascending: query.sort_order.as_deref() == Some("asc"),
            skip,
            take,
        };

        let (data, total) = db::list_resources(&self.db, &filter).await?;
        debug!(found = data.len(), total, skip, take, "Listed resources");

        Ok(json!({
            "data": data,
            "pagination": {
                "total": total,
                "skip": skip,
                "take": take,
                "hasMore": skip.saturating_add(take) < total,
            },
        }))
    }

    pub async fn get(&self, id: &str) -> Result<Resource> {
        db::get_resource(&self.db, id).await
    }

    pub async fn create(&self, input: CreateResource) -> Result<Resource> {
        validate_new_resource(&input)?;
        let resource = db::create_resource(&self.db, input).await?;
        info!(resource_id = %resource.id, resource_type = %resource.resource_type, "Resource created");
        Ok(resource)
    }

    /// Create many resources, skipping those whose source URL is already stored.
    pub async fn create_batch(&self, input: BatchCreateInput) -> Result<Value> {
        for resource in &input.resources {
            validate_new_resource(resource)?;
        }

        let mut created = 0;
        let mut skipped = 0;
        for resource in input.resources {
            if let Some(url) = resource.source_url.as_deref().filter(|u| !u.is_empty()) {
                if db::source_url_exists(&self.db, url).await? {
                    skipped += 1;
                    continue;
                }
            }
            db::create_resource(&self.db, resource).await?;
            created += 1;
        }

        info!(created, skipped, "Batch resource import finished");
        Ok(json!({ "created": created, "skipped": skipped }))
    }

    pub async fn update(&self, id: &str, input: UpdateResource) -> Result<Resource> {
        if let Some(t) = &input.resource_type {
            ResourceType::from_str(t)
                .ok_or_else(|| Error::Validation(format!("Invalid resource type: {}", t)))?;
        }
        db::get_resource(&self.db, id).await?;
        db::update_resource(&self.db, id, input).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        db::delete_resource(&self.db, id).await?;
        info!(resource_id = %id, "Resource deleted");
        Ok(json!({ "message": "Resource deleted successfully" }))
    }

    pub async fn stats(&self) -> Result<Value> {
        let total = db::count_resources(&self.db).await?;
        let by_type = db::count_resources_by_type(&self.db).await?;
        Ok(json!({
            "total": total,
            "byType": by_type
                .into_iter()
                .map(|(t, count)| json!({ "type": t, "count": count }))
                .collect::<Vec<_>>(),
        }))
    }

    /// Ranked search suggestions for an incremental search box.
    pub async fn suggestions(&self, query: &str, limit: Option<i64>) -> Result<Vec<Suggestion>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(DEFAULT_SUGGESTIONS).clamp(1, 50);

        let candidates = db::search_resources(&self.db, &query, limit * 2).await?;
        let now = Utc::now();

        let mut scored: Vec<(f64, &Resource)> = candidates
            .iter()
            .map(|r| {
                let days = r
                    .published_at
                    .as_deref()
                    .and_then(parse_timestamp)
                    .map(|p| (now - p).num_days());
                (suggestion_score(r, &query, days), r)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(_, r)| Suggestion {
                id: r.id.clone(),
                title: r.title.clone(),
                resource_type: r.resource_type.clone(),
                abstract_text: r
                    .abstract_text
                    .as_deref()
                    .map(|a| format!("{}...", take_chars(a, 150))),
                highlight: highlight_snippet(
                    if r.title.is_empty() {
                        r.abstract_text.as_deref().unwrap_or_default()
                    } else {
                        r.title.as_str()
                    },
                    &query,
                ),
            })
            .collect())
    }
}

fn validate_new_resource(input: &CreateResource) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    ResourceType::from_str(&input.resource_type).ok_or_else(|| {
        Error::Validation(format!("Invalid resource type: {}", input.resource_type))
    })?;
    Ok(())
}

/// Relevance of a resource for a lowercase query. `days_old` is the age of
/// the publication date, when known.
pub fn suggestion_score(resource: &Resource, query: &str, days_old: Option<i64>) -> f64 {
    let mut score = 0.0;
    let title = resource.title.to_lowercase();

    if title.contains(query) {
        score += 10.0;
        if title == query {
            score += 20.0;
        }
        if title.starts_with(query) {
            score += 5.0;
        }
    }
    if resource
        .abstract_text
        .as_deref()
        .map_or(false, |a| a.to_lowercase().contains(query))
    {
        score += 5.0;
    }

    score += resource.quality_score * 0.1;

    score += match days_old {
        Some(d) if d < 7 => 3.0,
        Some(d) if d < 30 => 2.0,
        Some(d) if d < 90 => 1.0,
        _ => 0.0,
    };
    score
}

/// Text around the first match with ellipses, or the first 100 characters.
pub fn highlight_snippet(text: &str, query: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = text.to_lowercase().chars().collect();
    let needle: Vec<char> = query.to_lowercase().chars().collect();

    let found = if needle.is_empty() || lower.len() != chars.len() {
        None
    } else {
        lower.windows(needle.len()).position(|w| w == needle.as_slice())
    };

    let Some(index) = found else {
        return format!("{}...", take_chars(text, 100));
    };

    let start = index.saturating_sub(SNIPPET_RADIUS);
    let end = (index + needle.len() + SNIPPET_RADIUS).min(chars.len());

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet = format!("...{}", snippet);
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(title: &str, abstract_text: Option<&str>, quality: f64) -> Resource {
        Resource {
            id: "r1".into(),
            resource_type: "PAPER".into(),
            title: title.into(),
            abstract_text: abstract_text.map(String::from),
            content: None,
            source_url: None,
            pdf_url: None,
            thumbnail_url: None,
            authors: "[]".into(),
            published_at: None,
            tags: "[]".into(),
            categories: "[]".into(),
            primary_category: None,
            ai_summary: None,
            quality_score: quality,
            trending_score: 0.0,
            upvote_count: 0,
            view_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_exact_title_match_scores_highest() {
        let exact = resource("Transformers", None, 0.0);
        let prefix = resource("Transformers in vision", None, 0.0);
        let inside = resource("Vision transformers", None, 0.0);

        assert_eq!(suggestion_score(&exact, "transformers", None), 35.0);
        assert_eq!(suggestion_score(&prefix, "transformers", None), 15.0);
        assert_eq!(suggestion_score(&inside, "transformers", None), 10.0);
    }

    #[test]
    fn test_abstract_quality_and_recency() {
        let r = resource("Other", Some("About transformers"), 50.0);
        assert_eq!(suggestion_score(&r, "transformers", Some(3)), 5.0 + 5.0 + 3.0);
        assert_eq!(suggestion_score(&r, "transformers", Some(20)), 12.0);
        assert_eq!(suggestion_score(&r, "transformers", Some(60)), 11.0);
        assert_eq!(suggestion_score(&r, "transformers", Some(400)), 10.0);
    }

    #[test]
    fn test_highlight_snippet_around_match() {
        let text = format!("{}needle{}", "a".repeat(40), "b".repeat(40));
        let snippet = highlight_snippet(&text, "NEEDLE");
        assert_eq!(
            snippet,
            format!("...{}needle{}...", "a".repeat(30), "b".repeat(30))
        );
    }

    #[test]
    fn test_highlight_snippet_without_match() {
        let text = "x".repeat(120);
        assert_eq!(highlight_snippet(&text, "zzz"), format!("{}...", "x".repeat(100)));
    }

    #[test]
    fn test_highlight_snippet_short_text_has_no_ellipses() {
        assert_eq!(highlight_snippet("Deep learning", "learn"), "Deep learning");
    }
}
