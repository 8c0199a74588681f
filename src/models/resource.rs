//! Resource kinds.

use serde::{Deserialize, Serialize};

/// Kind of imported resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Paper,
    Blog,
    News,
    YoutubeVideo,
    Project,
    Event,
    Rss,
    Report,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "PAPER",
            Self::Blog => "BLOG",
            Self::News => "NEWS",
            Self::YoutubeVideo => "YOUTUBE_VIDEO",
            Self::Project => "PROJECT",
            Self::Event => "EVENT",
            Self::Rss => "RSS",
            Self::Report => "REPORT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PAPER" => Some(Self::Paper),
            "BLOG" => Some(Self::Blog),
            "NEWS" => Some(Self::News),
            "YOUTUBE_VIDEO" => Some(Self::YoutubeVideo),
            "PROJECT" => Some(Self::Project),
            "EVENT" => Some(Self::Event),
            "RSS" => Some(Self::Rss),
            "REPORT" => Some(Self::Report),
            _ => None,
        }
    }
}
