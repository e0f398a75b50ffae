//! Database Service
//!
//! SQLite storage shared by every service: sources, articles, users, likes,
//! refresh tokens and rate limit windows.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::Connection;
use tracing::info;

use econnect_core::{local_offset, EconnectError, EconnectResult};

/// Shared SQLite handle
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and its tables
    pub fn new<P: AsRef<Path>>(db_path: P) -> EconnectResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EconnectError::storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        info!("Opened database at {}", db_path.as_ref().display());

        Self::from_connection(conn)
    }

    /// Create an in-memory database (useful for testing)
    pub fn new_in_memory() -> EconnectResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> EconnectResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> EconnectResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK (kind IN ('rss', 'api', 'scraping'))
            );

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                image_url TEXT NOT NULL,
                published_at INTEGER NOT NULL,
                url TEXT NOT NULL UNIQUE,
                source_id INTEGER NOT NULL REFERENCES sources(id),
                collected_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_articles_published
            ON articles(published_at DESC, id DESC);

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                profile_image TEXT,
                registered_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS likes (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                liked_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, article_id)
            );

            CREATE INDEX IF NOT EXISTS idx_likes_article
            ON likes(article_id);

            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS rate_limit_windows (
                client_key TEXT NOT NULL,
                window_start INTEGER NOT NULL,
                count INTEGER NOT NULL,
                PRIMARY KEY (client_key, window_start)
            );
            "#,
        )?;

        Ok(())
    }

    /// Lock the connection
    pub(crate) fn conn(&self) -> EconnectResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EconnectError::storage("Failed to acquire lock"))
    }

    /// Round-trip a trivial query; used by the health check
    pub fn ping(&self) -> EconnectResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Read a stored unix timestamp as UTC
pub(crate) fn utc_from_secs(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

/// Read a stored unix timestamp in the UTC-3 presentation offset
pub(crate) fn local_from_secs(idx: usize, secs: i64) -> rusqlite::Result<DateTime<FixedOffset>> {
    utc_from_secs(idx, secs).map(|dt| dt.with_timezone(&local_offset()))
}
