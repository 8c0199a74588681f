//! Collection item enums.

use serde::{Deserialize, Serialize};

/// Reading progress of a collected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadStatus {
    Unread,
    Reading,
    Completed,
    Archived,
}

impl ReadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "UNREAD",
            Self::Reading => "READING",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UNREAD" => Some(Self::Unread),
            "READING" => Some(Self::Reading),
            "COMPLETED" => Some(Self::Completed),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// How a batch tag update combines with existing tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOperation {
    Add,
    Remove,
    #[default]
    Set,
}

impl TagOperation {
    /// Apply the operation to `current`. `Add` keeps existing order and
    /// appends unseen tags.
    pub fn apply(&self, current: &[String], tags: &[String]) -> Vec<String> {
        match self {
            Self::Add => {
                let mut merged = current.to_vec();
                for tag in tags {
                    if !merged.contains(tag) {
                        merged.push(tag.clone());
                    }
                }
                merged
            }
            Self::Remove => current
                .iter()
                .filter(|t| !tags.contains(t))
                .cloned()
                .collect(),
            Self::Set => tags.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tag_operations() {
        let current = tags(&["rust", "async"]);

        assert_eq!(
            TagOperation::Add.apply(&current, &tags(&["async", "db"])),
            tags(&["rust", "async", "db"])
        );
        assert_eq!(
            TagOperation::Remove.apply(&current, &tags(&["rust"])),
            tags(&["async"])
        );
        assert_eq!(
            TagOperation::Set.apply(&current, &tags(&["new"])),
            tags(&["new"])
        );
    }

    #[test]
    fn test_read_status_round_trip() {
        for status in [
            ReadStatus::Unread,
            ReadStatus::Reading,
            ReadStatus::Completed,
            ReadStatus::Archived,
        ] {
            assert_eq!(ReadStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ReadStatus::from_str("unread"), None);
    }
}
