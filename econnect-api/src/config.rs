//! Server configuration from environment variables

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use econnect_services::auth::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_DAYS};
use econnect_services::rate_limiter::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use econnect_services::scheduler::DEFAULT_INGEST_INTERVAL;
use econnect_services::SourceSeed;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DATABASE_PATH: &str = "data/econnect.db";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;
const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 365 * 24 * 3600;
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 10 * 365;

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    /// Required value of the `api_key` header; unset disables the check
    pub api_key: Option<String>,
    pub static_dir: PathBuf,
    /// Zero disables the background scheduler
    pub ingest_interval: Duration,
    pub feed_timeout: Duration,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    pub feed_sources: Vec<SourceSeed>,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
}

impl ApiConfig {
    /// Load configuration from the process environment
    ///
    /// Requires `JWT_SECRET_KEY`; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let feed_sources = match get("FEED_SOURCES") {
            Some(json) => SourceSeed::parse_list(&json).map_err(|e| ConfigError::InvalidJson {
                field: "FEED_SOURCES".to_string(),
                error: e.to_string(),
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            port: parse_or(&get, "SERVER_PORT", DEFAULT_PORT)?,
            database_path: get("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),
            jwt_secret,
            api_key: get("API_KEY"),
            static_dir: get("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
            ingest_interval: Duration::from_secs(parse_or(
                &get,
                "INGEST_INTERVAL_SECS",
                DEFAULT_INGEST_INTERVAL.as_secs(),
            )?),
            feed_timeout: Duration::from_secs(parse_or(
                &get,
                "FEED_TIMEOUT_SECS",
                DEFAULT_FEED_TIMEOUT_SECS,
            )?),
            rate_limit_max_requests: parse_or(&get, "RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?,
            rate_limit_window: Duration::from_secs(parse_or(
                &get,
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_WINDOW.as_secs(),
            )?),
            feed_sources,
            access_token_ttl_secs: parse_in_range(
                &get,
                "ACCESS_TOKEN_TTL_SECS",
                ACCESS_TOKEN_TTL_SECS,
                1..=MAX_ACCESS_TOKEN_TTL_SECS,
            )?,
            refresh_token_ttl_days: parse_in_range(
                &get,
                "REFRESH_TOKEN_TTL_DAYS",
                REFRESH_TOKEN_TTL_DAYS,
                1..=MAX_REFRESH_TOKEN_TTL_DAYS,
            )?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            field: key.to_string(),
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_in_range<G>(
    get: &G,
    key: &'static str,
    default: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid {
            field: key.to_string(),
            error: format!("must be between {} and {}", range.start(), range.end()),
        });
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },

    #[error("Invalid JSON in {field}: {error}")]
    InvalidJson { field: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET_KEY", "s3cret")]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.database_path, PathBuf::from("data/econnect.db"));
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.ingest_interval, Duration::from_secs(3600));
        assert_eq!(config.feed_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_max_requests, 60);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.access_token_ttl_secs, 3600);
        assert_eq!(config.refresh_token_ttl_days, 30);
        assert!(config.api_key.is_none());
        assert!(config.feed_sources.is_empty());
    }

    #[test]
    fn test_secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("JWT_SECRET_KEY"))));
        assert!(matches!(
            load(&[("JWT_SECRET_KEY", "  ")]),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("SERVER_PORT", "8080"),
            ("API_KEY", "k"),
            ("INGEST_INTERVAL_SECS", "0"),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(config.ingest_interval.is_zero());
        assert_eq!(config.rate_limit_max_requests, 5);
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[("JWT_SECRET_KEY", "s"), ("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "SERVER_PORT"));
    }

    #[test]
    fn test_token_lifetimes_are_bounded() {
        let config = load(&[
            ("JWT_SECRET_KEY", "s"),
            ("ACCESS_TOKEN_TTL_SECS", "900"),
            ("REFRESH_TOKEN_TTL_DAYS", "3650"),
        ])
        .unwrap();
        assert_eq!(config.access_token_ttl_secs, 900);
        assert_eq!(config.refresh_token_ttl_days, 3650);

        let err = load(&[("JWT_SECRET_KEY", "s"), ("REFRESH_TOKEN_TTL_DAYS", "100000000")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "REFRESH_TOKEN_TTL_DAYS"));

        for value in ["0", "-5", "9223372036854775807"] {
            let err = load(&[("JWT_SECRET_KEY", "s"), ("ACCESS_TOKEN_TTL_SECS", value)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "ACCESS_TOKEN_TTL_SECS"));
        }
    }

    #[test]
    fn test_feed_sources() {
        let config = load(&[
            ("JWT_SECRET_KEY", "s"),
            (
                "FEED_SOURCES",
                r#"[{"name": "G1", "url": "https://g1.globo.com/rss/g1/economia/"}]"#,
            ),
        ])
        .unwrap();
        assert_eq!(
            config.feed_sources,
            vec![SourceSeed::rss("G1", "https://g1.globo.com/rss/g1/economia/")]
        );

        let err = load(&[("JWT_SECRET_KEY", "s"), ("FEED_SOURCES", "[{")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }
}
