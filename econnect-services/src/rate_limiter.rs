//! Shared rate limiter for incoming requests
//!
//! Sliding window counter persisted in the database, so every API instance
//! pointing at the same database enforces one shared limit per client.
//!
//! Each client has one counter per fixed window. A request at time `t` is
//! judged against an estimate of the last full window:
//!
//! `previous * (1 - elapsed / window) + current`
//!
//! where `elapsed` is how far `t` is into the current window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use econnect_core::EconnectResult;

use crate::db::Database;

/// Default request budget per window
pub const DEFAULT_MAX_REQUESTS: u32 = 60;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// How often (in requests) stale windows of all clients are purged
const PURGE_EVERY: u64 = 256;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[cfg(test)]
impl RateDecision {
    fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub struct RateLimiter {
    db: Arc<Database>,
    max_requests: u32,
    window_ms: i64,
    /// Name for logging purposes
    name: String,
    total_requests: AtomicU64,
    limited_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(db: Arc<Database>, max_requests: u32, window: Duration, name: &str) -> Self {
        Self {
            db,
            max_requests,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX).max(1),
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            limited_requests: AtomicU64::new(0),
        }
    }

    /// Record a request from `client_key` unless it is over the limit
    pub fn check(&self, client_key: &str) -> EconnectResult<RateDecision> {
        self.check_at(client_key, Utc::now().timestamp_millis())
    }

    fn check_at(&self, client_key: &str, now_ms: i64) -> EconnectResult<RateDecision> {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        let window_start = now_ms - now_ms.rem_euclid(self.window_ms);
        let previous_start = window_start - self.window_ms;
        let elapsed = now_ms - window_start;

        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count_at = |start: i64| -> rusqlite::Result<i64> {
            Ok(tx
                .query_row(
                    "SELECT count FROM rate_limit_windows WHERE client_key = ?1 AND window_start = ?2",
                    params![client_key, start],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or(0))
        };
        let previous = count_at(previous_start)?;
        let current = count_at(window_start)?;

        let weight = (self.window_ms - elapsed) as f64 / self.window_ms as f64;
        let estimate = previous as f64 * weight + current as f64;

        if estimate + 1.0 > f64::from(self.max_requests) {
            tx.commit()?;
            self.limited_requests.fetch_add(1, Ordering::Relaxed);
            let retry_after_ms = self.window_ms - elapsed;
            let retry_after_secs = u64::try_from((retry_after_ms + 999) / 1000).unwrap_or(1).max(1);
            debug!(
                "[RATE_LIMITER:{}] #{} LIMITED {} (estimate {:.1}/{})",
                self.name, request_num, client_key, estimate, self.max_requests
            );
            return Ok(RateDecision::Limited { retry_after_secs });
        }

        tx.execute(
            r#"
            INSERT INTO rate_limit_windows (client_key, window_start, count) VALUES (?1, ?2, 1)
            ON CONFLICT(client_key, window_start) DO UPDATE SET count = count + 1
            "#,
            params![client_key, window_start],
        )?;
        tx.execute(
            "DELETE FROM rate_limit_windows WHERE client_key = ?1 AND window_start < ?2",
            params![client_key, previous_start],
        )?;
        if request_num % PURGE_EVERY == 0 {
            let purged = tx.execute(
                "DELETE FROM rate_limit_windows WHERE window_start < ?1",
                params![previous_start],
            )?;
            info!("[RATE_LIMITER:{}] purged {} stale windows", self.name, purged);
        }
        tx.commit()?;

        let used = (estimate + 1.0).ceil() as u32;
        Ok(RateDecision::Allowed {
            remaining: self.max_requests.saturating_sub(used),
        })
    }

    /// Get statistics about this rate limiter
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            limited_requests: self.limited_requests.load(Ordering::Relaxed),
            max_requests: self.max_requests,
            window_ms: self.window_ms,
            name: self.name.clone(),
        }
    }
}

/// Statistics about rate limiter usage
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub limited_requests: u64,
    pub max_requests: u32,
    pub window_ms: i64,
    pub name: String,
}
