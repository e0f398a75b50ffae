//! Feed source registry
//!
//! Sources are seeded from configuration at startup and read by ingestion.

use rusqlite::params;
use serde::Deserialize;
use tracing::{debug, info};

use econnect_core::{EconnectError, EconnectResult, Source, SourceKind};

use crate::db::Database;

/// A source as declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSeed {
    pub name: String,
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
}

fn default_kind() -> SourceKind {
    SourceKind::Rss
}

impl SourceSeed {
    pub fn rss(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: SourceKind::Rss,
        }
    }

    /// Parse a JSON array of `{name, url, kind}` objects
    pub fn parse_list(json: &str) -> EconnectResult<Vec<Self>> {
        serde_json::from_str(json)
            .map_err(|e| EconnectError::config(format!("Invalid source list: {}", e)))
    }
}

impl Database {
    /// Insert sources that are not registered yet; returns how many were new
    pub fn seed_sources(&self, seeds: &[SourceSeed]) -> EconnectResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO sources (name, url, kind) VALUES (?1, ?2, ?3)")?;
            for seed in seeds {
                let changed = stmt.execute(params![seed.name, seed.url, seed.kind.as_str()])?;
                if changed > 0 {
                    debug!("Registered source {} ({})", seed.name, seed.url);
                }
                inserted += changed;
            }
        }
        tx.commit()?;

        info!("Seeded {} new sources ({} configured)", inserted, seeds.len());
        Ok(inserted)
    }

    /// All sources collected with the given kind
    pub fn sources_by_kind(&self, kind: SourceKind) -> EconnectResult<Vec<Source>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, url FROM sources WHERE kind = ?1 ORDER BY id")?;

        let sources = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok(Source {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                    kind,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_defaults_to_rss() {
        let seeds = SourceSeed::parse_list(
            r#"[{"name": "G1", "url": "https://g1.example.com/rss"},
                {"name": "Api", "url": "https://api.example.com", "kind": "api"}]"#,
        )
        .unwrap();
        assert_eq!(seeds[0].kind, SourceKind::Rss);
        assert_eq!(seeds[1].kind, SourceKind::Api);

        assert!(matches!(
            SourceSeed::parse_list("{not json"),
            Err(EconnectError::Config(_))
        ));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::new_in_memory().unwrap();
        let seeds = vec![
            SourceSeed::rss("A", "https://a.example.com/rss"),
            SourceSeed::rss("B", "https://b.example.com/rss"),
            SourceSeed {
                name: "C".to_string(),
                url: "https://c.example.com".to_string(),
                kind: SourceKind::Scraping,
            },
        ];

        assert_eq!(db.seed_sources(&seeds).unwrap(), 3);
        assert_eq!(db.seed_sources(&seeds).unwrap(), 0);

        let rss = db.sources_by_kind(SourceKind::Rss).unwrap();
        assert_eq!(rss.len(), 2);
        assert_eq!(rss[0].name, "A");
        assert!(db.sources_by_kind(SourceKind::Api).unwrap().is_empty());
    }
}
