//! Engagement Store
//!
//! Likes are rows in `likes`; the composite primary key makes a double
//! insert for the same (user, article) pair impossible.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use econnect_core::{EconnectError, EconnectResult, LikeToggle};

use crate::db::Database;

pub struct EngagementStore {
    db: Arc<Database>,
}

impl EngagementStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Flip the like state of `article_id` for `user_id`
    ///
    /// The returned count is read inside the same transaction as the
    /// mutation.
    pub fn toggle_like(&self, user_id: Option<i64>, article_id: i64) -> EconnectResult<LikeToggle> {
        let user_id = user_id.ok_or_else(|| EconnectError::validation("user id is required"))?;

        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;

        let article_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1)",
            params![article_id],
            |row| row.get(0),
        )?;
        if !article_exists {
            return Err(EconnectError::not_found(format!("article {}", article_id)));
        }

        let user_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(EconnectError::not_found(format!("user {}", user_id)));
        }

        let removed = tx.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND article_id = ?2",
            params![user_id, article_id],
        )?;

        let liked = if removed == 0 {
            tx.execute(
                r#"
                INSERT INTO likes (user_id, article_id, liked_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id, article_id) DO NOTHING
                "#,
                params![user_id, article_id, Utc::now().timestamp()],
            )?;
            true
        } else {
            false
        };

        let likes = count_likes(&tx, article_id)?;
        tx.commit()?;

        debug!(
            "User {} {} article {} ({} likes)",
            user_id,
            if liked { "liked" } else { "unliked" },
            article_id,
            likes
        );
        Ok(LikeToggle { liked, likes })
    }
}

fn count_likes(conn: &Connection, article_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE article_id = ?1",
        params![article_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Database>, EngagementStore) {
        let db = Arc::new(Database::new_in_memory().unwrap());
        {
            let conn = db.conn().unwrap();
            conn.execute_batch(
                r#"
                INSERT INTO sources (id, name, url, kind) VALUES (1, 'A', 'https://a.example.com', 'rss');
                INSERT INTO articles (id, title, summary, image_url, published_at, url, source_id, collected_at)
                VALUES (10, 't', 's', 'i', 0, 'https://a.example.com/10', 1, 0);
                INSERT INTO users (id, name, email, password_hash, registered_at)
                VALUES (1, 'Ana', 'ana@example.com', 'x', 0), (2, 'Bia', 'bia@example.com', 'x', 0);
                "#,
            )
            .unwrap();
        }
        let store = EngagementStore::new(db.clone());
        (db, store)
    }

    #[test]
    fn test_toggle_parity() {
        let (db, store) = setup();

        for n in 1..=5 {
            let toggle = store.toggle_like(Some(1), 10).unwrap();
            assert_eq!(toggle.liked, n % 2 == 1);
            assert_eq!(toggle.likes, count_likes(&db.conn().unwrap(), 10).unwrap());
            let liked: bool = db
                .conn()
                .unwrap()
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = 1 AND article_id = 10)",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(liked, toggle.liked);
        }
    }

    #[test]
    fn test_count_spans_users() {
        let (_db, store) = setup();
        store.toggle_like(Some(1), 10).unwrap();
        let toggle = store.toggle_like(Some(2), 10).unwrap();
        assert_eq!(toggle, LikeToggle { liked: true, likes: 2 });

        let toggle = store.toggle_like(Some(1), 10).unwrap();
        assert_eq!(toggle, LikeToggle { liked: false, likes: 1 });
    }

    #[test]
    fn test_missing_user_or_article() {
        let (db, store) = setup();
        assert!(matches!(
            store.toggle_like(None, 10),
            Err(EconnectError::Validation(_))
        ));
        assert!(matches!(
            store.toggle_like(Some(1), 999),
            Err(EconnectError::NotFound(_))
        ));
        assert!(matches!(
            store.toggle_like(Some(99), 10),
            Err(EconnectError::NotFound(_))
        ));
        assert_eq!(count_likes(&db.conn().unwrap(), 10).unwrap(), 0);
    }
}
