//! Feed Ingestion Pipeline
//!
//! One run walks every RSS source in order, turns each entry into a staged
//! article and persists everything staged in a single transaction. A source
//! that fails to fetch or parse is logged and skipped.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info, warn};

use econnect_core::{
    local_offset, EconnectError, EconnectResult, IngestionReport, NewArticle, Source, SourceKind,
};
use econnect_news::{
    clean_text, normalize_date, summarize, FeedEntry, FeedFetcher, NewsError, DEFAULT_MAX_LENGTH,
};

use crate::db::Database;

/// Why a single source was abandoned
#[derive(Debug, Error)]
enum SourceError {
    #[error(transparent)]
    Fetch(#[from] NewsError),

    #[error(transparent)]
    Storage(#[from] EconnectError),
}

/// What happened to one entry
enum EntryOutcome {
    Staged(NewArticle),
    Duplicate,
    NoImage,
}

/// Articles staged from one source
#[derive(Default)]
struct SourceBatch {
    articles: Vec<NewArticle>,
    skipped_duplicates: usize,
    skipped_without_image: usize,
}

/// Fetches configured feeds and stores new articles
pub struct IngestionPipeline {
    db: Arc<Database>,
    fetcher: Arc<dyn FeedFetcher>,
}

impl IngestionPipeline {
    pub fn new(db: Arc<Database>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self { db, fetcher }
    }

    /// Run one ingestion pass over every RSS source
    ///
    /// Fails when no RSS source is configured or when the final commit
    /// fails; in the latter case nothing from the run is persisted.
    pub async fn run(&self) -> EconnectResult<IngestionReport> {
        let sources = self.db.sources_by_kind(SourceKind::Rss)?;
        if sources.is_empty() {
            return Err(EconnectError::config("No RSS sources configured"));
        }

        info!("Starting ingestion over {} sources", sources.len());

        let mut report = IngestionReport::new();
        let mut staged: Vec<NewArticle> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for source in &sources {
            match self.collect_source(source, &seen).await {
                Ok(batch) => {
                    debug!(
                        "Staged {} articles from {}",
                        batch.articles.len(),
                        source.name
                    );
                    report.sources_processed += 1;
                    report.skipped_duplicates += batch.skipped_duplicates;
                    report.skipped_without_image += batch.skipped_without_image;
                    seen.extend(batch.articles.iter().map(|a| a.url.clone()));
                    staged.extend(batch.articles);
                }
                Err(e) => {
                    report.sources_failed += 1;
                    warn!("Failed to ingest source {} ({}): {}", source.name, source.url, e);
                }
            }
        }

        report.inserted = self.commit(&staged)?;

        info!(
            "Ingestion finished: {} inserted, {} duplicates, {} without image, {} sources failed",
            report.inserted,
            report.skipped_duplicates,
            report.skipped_without_image,
            report.sources_failed
        );
        Ok(report)
    }

    async fn collect_source(
        &self,
        source: &Source,
        seen: &HashSet<String>,
    ) -> Result<SourceBatch, SourceError> {
        let entries = self.fetcher.fetch_entries(&source.url).await?;
        let collected_at = Utc::now();

        let mut batch = SourceBatch::default();
        let mut staged_here: HashSet<String> = HashSet::new();

        for entry in &entries {
            let url = entry.url();
            if seen.contains(url) || staged_here.contains(url) {
                debug!("Skipping {}: already staged in this run", url);
                batch.skipped_duplicates += 1;
                continue;
            }

            match self.process_entry(entry, source, collected_at)? {
                EntryOutcome::Staged(article) => {
                    staged_here.insert(article.url.clone());
                    batch.articles.push(article);
                }
                EntryOutcome::Duplicate => batch.skipped_duplicates += 1,
                EntryOutcome::NoImage => batch.skipped_without_image += 1,
            }
        }

        Ok(batch)
    }

    fn process_entry(
        &self,
        entry: &FeedEntry,
        source: &Source,
        collected_at: DateTime<Utc>,
    ) -> EconnectResult<EntryOutcome> {
        let url = entry.url();

        if self.article_exists(url)? {
            debug!("Skipping {}: already stored", url);
            return Ok(EntryOutcome::Duplicate);
        }

        let Some(image_url) = entry.image_url() else {
            debug!("Skipping {}: no image", url);
            return Ok(EntryOutcome::NoImage);
        };

        let published_at = entry
            .raw_date()
            .and_then(normalize_date)
            .unwrap_or_else(|| collected_at.with_timezone(&local_offset()));

        Ok(EntryOutcome::Staged(NewArticle {
            title: entry.display_title(),
            summary: summarize(&clean_text(entry), DEFAULT_MAX_LENGTH),
            image_url,
            published_at,
            url: url.to_string(),
            source_id: source.id,
            collected_at,
        }))
    }

    fn article_exists(&self, url: &str) -> EconnectResult<bool> {
        let conn = self.db.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM articles WHERE url = ?1",
                params![url],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn commit(&self, staged: &[NewArticle]) -> EconnectResult<usize> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO articles (title, summary, image_url, published_at, url, source_id, collected_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for article in staged {
                stmt.execute(params![
                    article.title,
                    article.summary,
                    article.image_url,
                    article.published_at.timestamp(),
                    article.url,
                    article.source_id,
                    article.collected_at.timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(staged.len())
    }
}
