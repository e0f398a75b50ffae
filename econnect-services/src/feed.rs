//! Feed Query Engine
//!
//! Paginated article feeds enriched with like counts, the reader's liked
//! flag and the article's source.

use std::sync::Arc;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use econnect_core::{
    Article, ArticleView, EconnectError, EconnectResult, FeedOrder, Source, SourceKind,
};

use crate::db::{local_from_secs, utc_from_secs, Database};

const VIEW_COLUMNS: &str = r#"
    a.id, a.title, a.summary, a.image_url, a.published_at, a.url, a.source_id, a.collected_at,
    s.name, s.url, s.kind
"#;

/// Liked flag for the reader bound to `?1`; NULL never matches
const LIKED_COLUMN: &str =
    "EXISTS(SELECT 1 FROM likes m WHERE m.article_id = a.id AND m.user_id = ?1)";

const LIKE_COUNT_COLUMN: &str = "(SELECT COUNT(*) FROM likes c WHERE c.article_id = a.id)";

fn feed_sql(order: FeedOrder) -> String {
    match order {
        FeedOrder::Recency => format!(
            r#"
            SELECT {VIEW_COLUMNS}, {LIKE_COUNT_COLUMN} AS likes, {LIKED_COLUMN} AS liked
            FROM articles a
            JOIN sources s ON s.id = a.source_id
            ORDER BY a.published_at DESC, a.id DESC
            LIMIT ?2 OFFSET ?3
            "#
        ),
        FeedOrder::Popularity => format!(
            r#"
            SELECT {VIEW_COLUMNS}, COUNT(l.user_id) AS likes, {LIKED_COLUMN} AS liked
            FROM articles a
            JOIN sources s ON s.id = a.source_id
            LEFT JOIN likes l ON l.article_id = a.id
            GROUP BY a.id
            ORDER BY likes DESC, a.published_at DESC, a.id DESC
            LIMIT ?2 OFFSET ?3
            "#
        ),
    }
}

fn view_from_row(row: &Row) -> rusqlite::Result<ArticleView> {
    let kind: String = row.get(10)?;
    let kind = SourceKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(10, Type::Text, "unknown source kind".into())
    })?;
    let source_id: i64 = row.get(6)?;

    Ok(ArticleView {
        article: Article {
            id: row.get(0)?,
            title: row.get(1)?,
            summary: row.get(2)?,
            image_url: row.get(3)?,
            published_at: local_from_secs(4, row.get(4)?)?,
            url: row.get(5)?,
            source_id,
            collected_at: utc_from_secs(7, row.get(7)?)?,
        },
        source: Source {
            id: source_id,
            name: row.get(8)?,
            url: row.get(9)?,
            kind,
        },
        likes: row.get(11)?,
        liked: row.get(12)?,
    })
}

/// Read side for articles
pub struct FeedService {
    db: Arc<Database>,
}

impl FeedService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// One page of the feed in the requested order
    pub fn get_feed(
        &self,
        user_id: Option<i64>,
        skip: u32,
        limit: u32,
        order: FeedOrder,
    ) -> EconnectResult<Vec<ArticleView>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&feed_sql(order))?;
        let items = stmt
            .query_map(
                params![user_id, i64::from(limit), i64::from(skip)],
                view_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Articles the user liked, most recently liked first
    pub fn get_liked_feed(
        &self,
        user_id: i64,
        skip: u32,
        limit: u32,
    ) -> EconnectResult<Vec<ArticleView>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {VIEW_COLUMNS}, {LIKE_COUNT_COLUMN} AS likes, {LIKED_COLUMN} AS liked
            FROM likes ul
            JOIN articles a ON a.id = ul.article_id
            JOIN sources s ON s.id = a.source_id
            WHERE ul.user_id = ?1
            ORDER BY ul.liked_at DESC, ul.rowid DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))?;
        let items = stmt
            .query_map(
                params![user_id, i64::from(limit), i64::from(skip)],
                view_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// A single article
    pub fn get_article(&self, user_id: Option<i64>, article_id: i64) -> EconnectResult<ArticleView> {
        let conn = self.db.conn()?;
        conn.query_row(
            &format!(
                r#"
                SELECT {VIEW_COLUMNS}, {LIKE_COUNT_COLUMN} AS likes, {LIKED_COLUMN} AS liked
                FROM articles a
                JOIN sources s ON s.id = a.source_id
                WHERE a.id = ?2
                "#
            ),
            params![user_id, article_id],
            view_from_row,
        )
        .optional()?
        .ok_or_else(|| EconnectError::not_found(format!("article {}", article_id)))
    }
}
