//! News data structures: feed sources, articles and personalized feed views

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by every successful ingestion run
pub const INGESTION_ACK: &str = "news collected successfully";

/// Offset all publish timestamps are presented in (UTC-3)
pub const LOCAL_UTC_OFFSET_SECS: i32 = -3 * 3600;

/// The fixed UTC-3 offset used for publish timestamps
pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// How a source is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Api,
    Scraping,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Api => "api",
            SourceKind::Scraping => "scraping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rss" => Some(SourceKind::Rss),
            "api" => Some(SourceKind::Api),
            "scraping" => Some(SourceKind::Scraping),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured external feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// Feed URL (unique)
    pub url: String,
    pub kind: SourceKind,
}

/// An article staged by ingestion, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub published_at: DateTime<FixedOffset>,
    /// Canonical article URL, the dedup key
    pub url: String,
    pub source_id: i64,
    pub collected_at: DateTime<Utc>,
}

/// A persisted article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub published_at: DateTime<FixedOffset>,
    pub url: String,
    pub source_id: i64,
    pub collected_at: DateTime<Utc>,
}

/// An article enriched for a specific reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    /// Live like count
    pub likes: i64,
    /// Whether the requesting user likes this article
    pub liked: bool,
    pub source: Source,
}

/// Supported feed orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrder {
    /// Newest publish timestamp first
    #[default]
    Recency,
    /// Most liked first
    Popularity,
}

/// Outcome of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: i64,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub detail: String,
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub inserted: usize,
    pub skipped_duplicates: usize,
    pub skipped_without_image: usize,
}

impl IngestionReport {
    pub fn new() -> Self {
        Self {
            detail: INGESTION_ACK.to_string(),
            ..Default::default()
        }
    }
}
