//! RSS Feed Client for news ingestion
//!
//! Fetches and parses RSS/Atom feeds into [`FeedEntry`] values.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::entry::{Enclosure, EntryContent, FeedEntry, MediaContent};
use crate::error::NewsError;

/// Default per-request timeout
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of feed entries
///
/// The ingestion pipeline only depends on this trait, so runs can be driven
/// from canned entries in tests.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse every entry of the feed at `url`
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>, NewsError>;
}

/// RSS feed client
pub struct RssClient {
    client: Client,
}

impl RssClient {
    /// Create a new RSS client with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FEED_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for RssClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for RssClient {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>, NewsError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "Econnect/1.0")
            .send()
            .await
            .map_err(|e| NewsError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NewsError::ApiError {
                status: response.status().as_u16(),
                message: format!("Failed to fetch {}", url),
            });
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| NewsError::RequestFailed(e.to_string()))?;

        let entries = parse_feed(&content)?;
        debug!("Fetched {} entries from {}", entries.len(), url);
        Ok(entries)
    }
}

/// Parse a feed body, trying RSS first, then Atom
pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedEntry>, NewsError> {
    if let Ok(channel) = rss::Channel::read_from(content) {
        return Ok(channel.items().iter().map(entry_from_rss_item).collect());
    }

    if let Ok(atom_feed) = atom_syndication::Feed::read_from(content) {
        return Ok(atom_feed.entries().iter().map(entry_from_atom_entry).collect());
    }

    Err(NewsError::ParseError(
        "body is neither RSS nor Atom".to_string(),
    ))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Map an RSS item; the RSS `description` doubles as the entry summary
fn entry_from_rss_item(item: &rss::Item) -> FeedEntry {
    let media_content = item
        .extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .map(|list| {
            list.iter()
                .map(|content| MediaContent {
                    url: content.attrs().get("url").cloned(),
                })
                .collect()
        })
        .unwrap_or_default();

    FeedEntry {
        link: owned(item.link()),
        title: owned(item.title()),
        summary: None,
        description: owned(item.description()),
        content: item
            .content()
            .map(|value| {
                vec![EntryContent {
                    value: Some(value.to_string()),
                }]
            })
            .unwrap_or_default(),
        media_content,
        enclosures: item
            .enclosure()
            .map(|enclosure| {
                vec![Enclosure {
                    href: Some(enclosure.url().to_string()),
                }]
            })
            .unwrap_or_default(),
        pub_date: owned(item.pub_date()),
        published: None,
        updated: None,
        date: item
            .dublin_core_ext()
            .and_then(|dc| dc.dates().first().cloned()),
    }
}

fn entry_from_atom_entry(entry: &atom_syndication::Entry) -> FeedEntry {
    let link = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| entry.links().first())
        .map(|l| l.href().to_string());

    let enclosures = entry
        .links()
        .iter()
        .filter(|l| l.rel() == "enclosure")
        .map(|l| Enclosure {
            href: Some(l.href().to_string()),
        })
        .collect();

    let media_content = entry
        .extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .map(|list| {
            list.iter()
                .map(|content| MediaContent {
                    url: content.attrs().get("url").cloned(),
                })
                .collect()
        })
        .unwrap_or_default();

    FeedEntry {
        link,
        title: Some(entry.title().as_str().to_string()),
        summary: entry.summary().map(|s| s.as_str().to_string()),
        description: None,
        content: entry
            .content()
            .and_then(|c| c.value())
            .map(|value| {
                vec![EntryContent {
                    value: Some(value.to_string()),
                }]
            })
            .unwrap_or_default(),
        media_content,
        enclosures,
        pub_date: None,
        published: entry.published().map(|d| d.to_rfc3339()),
        updated: Some(entry.updated().to_rfc3339()),
        date: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:media="http://search.yahoo.com/mrss/"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Economia</title>
    <link>https://news.example.com</link>
    <description>Feed</description>
    <item>
      <title>Juros caem</title>
      <link>https://news.example.com/juros</link>
      <description>&lt;p&gt;O Banco Central cortou a taxa.&lt;/p&gt;</description>
      <content:encoded><![CDATA[<p>Texto <img src="https://img.example.com/inline.jpg"></p>]]></content:encoded>
      <media:content url="https://img.example.com/media.jpg" medium="image"/>
      <enclosure url="https://img.example.com/enc.jpg" length="1" type="image/jpeg"/>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Sem data</title>
      <link>https://news.example.com/dc</link>
      <dc:date>2024-02-01T10:00:00Z</dc:date>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Mercados</title>
  <id>urn:example:feed</id>
  <updated>2024-03-01T12:00:00Z</updated>
  <entry>
    <title>Bolsa sobe</title>
    <id>urn:example:1</id>
    <link rel="enclosure" href="https://img.example.com/atom.png"/>
    <link rel="alternate" href="https://news.example.com/bolsa"/>
    <updated>2024-03-01T12:00:00Z</updated>
    <published>2024-03-01T09:00:00-03:00</published>
    <summary type="html">&lt;b&gt;Alta&lt;/b&gt; de 2%</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.url(), "https://news.example.com/juros");
        assert_eq!(first.description.as_deref(), Some("<p>O Banco Central cortou a taxa.</p>"));
        assert_eq!(first.content.len(), 1);
        assert_eq!(first.image_url().as_deref(), Some("https://img.example.com/media.jpg"));
        assert_eq!(first.enclosures[0].href.as_deref(), Some("https://img.example.com/enc.jpg"));
        assert_eq!(first.raw_date(), Some("Mon, 01 Jan 2024 00:00:00 +0000"));

        let second = &entries[1];
        assert_eq!(second.raw_date(), Some("2024-02-01T10:00:00Z"));
        assert_eq!(second.image_url(), None);
    }

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.url(), "https://news.example.com/bolsa");
        assert_eq!(entry.image_url().as_deref(), Some("https://img.example.com/atom.png"));
        assert_eq!(entry.summary.as_deref(), Some("<b>Alta</b> de 2%"));
        assert_eq!(entry.raw_date(), Some("2024-03-01T09:00:00-03:00"));
    }

    #[test]
    fn test_rejects_non_feed() {
        let err = parse_feed(b"<html><body>nope</body></html>").unwrap_err();
        assert!(matches!(err, NewsError::ParseError(_)));
    }
}
