//! News ingestion primitives
//!
//! This crate provides the pieces the ingestion pipeline is assembled from:
//! - Feed entries: a typed view of one RSS/Atom item with ordered fallbacks
//! - RSS client: fetches and parses RSS 2.0 and Atom feeds
//! - Text normalizer: turns entry HTML into plain text
//! - Summarizer: sentence-aware extractive summaries with a hard length cap
//! - Date normalizer: permissive date parsing into UTC-3

pub mod dates;
pub mod entry;
pub mod error;
pub mod rss_client;
pub mod summarizer;
pub mod text;

pub use dates::normalize_date;
pub use entry::{Enclosure, EntryContent, FeedEntry, MediaContent};
pub use error::NewsError;
pub use rss_client::{parse_feed, FeedFetcher, RssClient};
pub use summarizer::{summarize, DEFAULT_MAX_LENGTH, SUMMARY_PLACEHOLDER};
pub use text::{clean_text, extract_image_from_html, strip_html};
