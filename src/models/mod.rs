//! Data models for DeepDive.
//!
//! Shared enums and helpers used by the database layer and the API.
//! JSON payloads are stored as TEXT columns and emitted as JSON values
//! through the `serialize_json_text*` helpers.

mod collection;
mod resource;
mod task;

pub use collection::*;
pub use resource::*;
pub use task::*;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;
use serde_json::Value;
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp in the RFC 3339 form stored in the database.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp, accepting both RFC 3339 and SQLite's
/// `YYYY-MM-DD HH:MM:SS` form.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

/// Parse a JSON text column. Invalid or empty text yields `Value::Null`.
pub fn parse_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

/// Parse a JSON text column holding an array of strings.
pub fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Serialize a value into JSON text for storage.
pub fn to_json_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn serialize_json_text<S: Serializer>(raw: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serde::Serialize::serialize(&parse_json(raw), serializer)
}

pub fn serialize_json_text_opt<S: Serializer>(
    raw: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match raw {
        Some(raw) => serialize_json_text(raw, serializer),
        None => serializer.serialize_none(),
    }
}

/// Deduplicate ids preserving first occurrence and dropping empty strings.
pub fn unique_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_preserves_order() {
        let ids = unique_ids(["b", "a", "", "b", "c", "a"]);
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T10:00:00.000Z").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_json_falls_back_to_null() {
        assert_eq!(parse_json("[1,2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_json("not json"), Value::Null);
    }
}
