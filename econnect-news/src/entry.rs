//! Feed entry model
//!
//! A format-neutral view of one RSS item or Atom entry. Every field is
//! optional because feeds in the wild omit almost anything; the accessors
//! below encode the fallback order used when building an article.

use serde::{Deserialize, Serialize};

use crate::text::extract_image_from_html;

/// Title used when an entry has none
pub const DEFAULT_TITLE: &str = "no title";

/// Maximum stored title length, in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// One content block of an entry (`content:encoded`, Atom `<content>`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContent {
    pub value: Option<String>,
}

/// A `media:content` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaContent {
    pub url: Option<String>,
}

/// An `<enclosure>` element or Atom `rel="enclosure"` link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub href: Option<String>,
}

/// A parsed feed entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub content: Vec<EntryContent>,
    #[serde(default)]
    pub media_content: Vec<MediaContent>,
    #[serde(default)]
    pub enclosures: Vec<Enclosure>,
    pub pub_date: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub date: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// HTML fields only fall through when truly empty
fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl FeedEntry {
    /// Entry link, empty when missing
    pub fn url(&self) -> &str {
        self.link.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Title, defaulted and truncated to [`MAX_TITLE_CHARS`]
    pub fn display_title(&self) -> String {
        match non_empty(self.title.as_ref()) {
            Some(title) => title.trim().chars().take(MAX_TITLE_CHARS).collect(),
            None => DEFAULT_TITLE.to_string(),
        }
    }

    fn first_content(&self) -> Option<&str> {
        self.content.first().and_then(|c| present(c.value.as_ref()))
    }

    /// HTML the article text is taken from: summary, then description,
    /// then the first content block
    pub fn text_html(&self) -> Option<&str> {
        present(self.summary.as_ref())
            .or_else(|| present(self.description.as_ref()))
            .or_else(|| self.first_content())
    }

    /// HTML searched for an inline `<img>`: the first content block when
    /// present, else the summary or description
    pub fn image_html(&self) -> Option<&str> {
        self.first_content()
            .or_else(|| present(self.summary.as_ref()))
            .or_else(|| present(self.description.as_ref()))
    }

    /// Representative image: media content, then enclosure, then the first
    /// `<img>` in the entry HTML
    pub fn image_url(&self) -> Option<String> {
        self.media_content
            .first()
            .and_then(|m| non_empty(m.url.as_ref()))
            .or_else(|| {
                self.enclosures
                    .first()
                    .and_then(|e| non_empty(e.href.as_ref()))
            })
            .map(|url| url.trim().to_string())
            .or_else(|| self.image_html().and_then(extract_image_from_html))
    }

    /// Raw publish date: pubDate, published, updated, date
    pub fn raw_date(&self) -> Option<&str> {
        non_empty(self.pub_date.as_ref())
            .or_else(|| non_empty(self.published.as_ref()))
            .or_else(|| non_empty(self.updated.as_ref()))
            .or_else(|| non_empty(self.date.as_ref()))
    }
}
