//! User accounts: registration, login and profile maintenance

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use econnect_core::{EconnectError, EconnectResult, NewUser, User, UserUpdate};

use crate::auth::{hash_password, verify_password};
use crate::db::{utc_from_secs, Database};
use crate::images::{ImageUpload, ProfileImageStore};

/// Maximum display name length, in characters
pub const MAX_NAME_CHARS: usize = 30;

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_image, registered_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_image: row.get(4)?,
        registered_at: utc_from_secs(5, row.get(5)?)?,
    })
}

fn validate_name(name: &str) -> EconnectResult<()> {
    if name.trim().is_empty() {
        return Err(EconnectError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(EconnectError::validation(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> EconnectResult<()> {
    if email.trim().is_empty() {
        return Err(EconnectError::validation("email is required"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(EconnectError::validation("invalid email address")),
    }
}

fn validate_password(password: &str) -> EconnectResult<()> {
    if password.trim().is_empty() {
        return Err(EconnectError::validation("password is required"));
    }
    Ok(())
}

pub struct UserService {
    db: Arc<Database>,
    images: ProfileImageStore,
}

impl UserService {
    pub fn new(db: Arc<Database>, images: ProfileImageStore) -> Self {
        Self { db, images }
    }

    /// Create an account, optionally with a profile image
    ///
    /// If the image cannot be stored the new user is removed again.
    pub fn register(&self, new_user: NewUser, image: Option<ImageUpload>) -> EconnectResult<User> {
        validate_name(&new_user.name)?;
        validate_email(&new_user.email)?;
        validate_password(&new_user.password)?;

        if self.find_by_email(&new_user.email)?.is_some() {
            return Err(EconnectError::conflict("email already registered"));
        }

        let password_hash = hash_password(&new_user.password)?;
        let user_id = {
            let conn = self.db.conn()?;
            conn.execute(
                r#"
                INSERT INTO users (name, email, password_hash, profile_image, registered_at)
                VALUES (?1, ?2, ?3, NULL, ?4)
                "#,
                params![new_user.name, new_user.email, password_hash, Utc::now().timestamp()],
            )?;
            conn.last_insert_rowid()
        };

        if let Some(image) = image.filter(|i| !i.is_empty()) {
            let saved = self.images.save(user_id, &image).and_then(|path| {
                self.set_profile_image(user_id, &path)?;
                self.images.remove_stale(user_id, &path);
                Ok(())
            });
            if let Err(e) = saved {
                warn!("Failed to save profile image for user {}: {}", user_id, e);
                self.images.delete(user_id);
                let conn = self.db.conn()?;
                conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
                return Err(EconnectError::validation(
                    "failed to save profile image; user was not created",
                ));
            }
        }

        info!("Registered user {}", user_id);
        self.get(user_id)
    }

    /// Check credentials and return the user
    pub fn authenticate(&self, email: &str, password: &str) -> EconnectResult<User> {
        let user = self
            .find_by_email(email)?
            .ok_or_else(|| EconnectError::unauthorized("invalid email or password"))?;
        if !verify_password(password, &user.password_hash) {
            return Err(EconnectError::unauthorized("invalid email or password"));
        }
        Ok(user)
    }

    pub fn get(&self, user_id: i64) -> EconnectResult<User> {
        let conn = self.db.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| EconnectError::not_found(format!("user {}", user_id)))
    }

    pub fn find_by_email(&self, email: &str) -> EconnectResult<Option<User>> {
        let conn = self.db.conn()?;
        Ok(find_by_email_on(&conn, email)?)
    }

    /// Apply a partial update; empty fields are ignored
    pub fn update(
        &self,
        user_id: i64,
        update: UserUpdate,
        image: Option<ImageUpload>,
    ) -> EconnectResult<User> {
        let update = update.normalized();
        let mut user = self.get(user_id)?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(EconnectError::validation("name cannot be empty"));
            }
            validate_name(&name)?;
            user.name = name;
        }

        if let Some(email) = update.email {
            if email != user.email {
                validate_email(&email)?;
                if self.find_by_email(&email)?.is_some() {
                    return Err(EconnectError::conflict("email already registered"));
                }
                user.email = email;
            }
        }

        if let Some(password) = update.password {
            if password.trim().is_empty() {
                return Err(EconnectError::validation("password cannot be empty"));
            }
            if !verify_password(&password, &user.password_hash) {
                user.password_hash = hash_password(&password)?;
            }
        }

        let previous_image = user.profile_image.clone();
        let new_image = match image.filter(|i| !i.is_empty()) {
            Some(image) => Some(self.images.save(user_id, &image)?),
            None => None,
        };
        if new_image.is_some() {
            user.profile_image = new_image.clone();
        }

        let stored = self.db.conn().and_then(|conn| {
            conn.execute(
                r#"
                UPDATE users SET name = ?1, email = ?2, password_hash = ?3, profile_image = ?4
                WHERE id = ?5
                "#,
                params![user.name, user.email, user.password_hash, user.profile_image, user_id],
            )?;
            Ok(())
        });

        match (stored, new_image) {
            (Ok(()), Some(path)) => self.images.remove_stale(user_id, &path),
            (Ok(()), None) => {}
            (Err(e), Some(path)) => {
                // the row still points at the previous image
                if previous_image.as_deref() != Some(path.as_str()) {
                    self.images.remove_stale(user_id, previous_image.as_deref().unwrap_or_default());
                }
                return Err(e);
            }
            (Err(e), None) => return Err(e),
        }

        info!("Updated user {}", user_id);
        Ok(user)
    }

    /// Delete the account with its likes, refresh tokens and image
    pub fn delete(&self, user_id: i64) -> EconnectResult<User> {
        let user = self.get(user_id)?;

        {
            let mut conn = self.db.conn()?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM likes WHERE user_id = ?1", params![user_id])?;
            tx.execute("DELETE FROM refresh_tokens WHERE user_id = ?1", params![user_id])?;
            tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            tx.commit()?;
        }
        self.images.delete(user_id);

        info!("Deleted user {}", user_id);
        Ok(user)
    }

    fn set_profile_image(&self, user_id: i64, path: &str) -> EconnectResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "UPDATE users SET profile_image = ?1 WHERE id = ?2",
            params![path, user_id],
        )?;
        Ok(())
    }
}

fn find_by_email_on(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        user_from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::engagement::EngagementStore;

    fn setup() -> (Arc<Database>, UserService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new_in_memory().unwrap());
        let users = UserService::new(db.clone(), ProfileImageStore::new(dir.path()));
        (db, users, dir)
    }

    fn ana() -> NewUser {
        NewUser {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "s3nha".to_string(),
        }
    }

    #[test]
    fn test_register_and_authenticate() {
        let (_db, users, _dir) = setup();
        let user = users.register(ana(), None).unwrap();
        assert_eq!(user.name, "Ana");
        assert_ne!(user.password_hash, "s3nha");

        assert_eq!(users.authenticate("ana@example.com", "s3nha").unwrap().id, user.id);
        assert!(matches!(
            users.authenticate("ana@example.com", "wrong"),
            Err(EconnectError::Unauthorized(_))
        ));
        assert!(matches!(
            users.authenticate("nobody@example.com", "s3nha"),
            Err(EconnectError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_register_validation_and_conflict() {
        let (_db, users, _dir) = setup();
        let mut bad = ana();
        bad.name = "  ".to_string();
        assert!(matches!(users.register(bad, None), Err(EconnectError::Validation(_))));

        let mut bad = ana();
        bad.name = "x".repeat(31);
        assert!(matches!(users.register(bad, None), Err(EconnectError::Validation(_))));

        let mut bad = ana();
        bad.password = String::new();
        assert!(matches!(users.register(bad, None), Err(EconnectError::Validation(_))));

        users.register(ana(), None).unwrap();
        assert!(matches!(users.register(ana(), None), Err(EconnectError::Conflict(_))));
    }

    #[test]
    fn test_register_with_image() {
        let (_db, users, dir) = setup();
        let image = ImageUpload {
            filename: Some("me.png".to_string()),
            bytes: b"png".to_vec(),
        };
        let user = users.register(ana(), Some(image)).unwrap();
        let expected = format!("static/images/{}.png", user.id);
        assert_eq!(user.profile_image.as_deref(), Some(expected.as_str()));
        assert!(dir.path().join("images").join(format!("{}.png", user.id)).exists());
    }

    #[test]
    fn test_register_image_failure_removes_user() {
        let dir = tempfile::tempdir().unwrap();
        // a file where the image directory should be makes saving fail
        std::fs::write(dir.path().join("images"), b"").unwrap();
        let db = Arc::new(Database::new_in_memory().unwrap());
        let users = UserService::new(db, ProfileImageStore::new(dir.path()));

        let image = ImageUpload {
            filename: Some("me.png".to_string()),
            bytes: b"png".to_vec(),
        };
        let err = users.register(ana(), Some(image)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: failed to save profile image; user was not created"
        );
        assert!(users.find_by_email("ana@example.com").unwrap().is_none());
    }

    #[test]
    fn test_update_fields() {
        let (_db, users, _dir) = setup();
        let user = users.register(ana(), None).unwrap();
        users
            .register(
                NewUser {
                    name: "Bia".to_string(),
                    email: "bia@example.com".to_string(),
                    password: "x".to_string(),
                },
                None,
            )
            .unwrap();

        let updated = users
            .update(
                user.id,
                UserUpdate {
                    name: Some("Ana Maria".to_string()),
                    email: Some(String::new()),
                    password: Some("nova".to_string()),
                },
                None,
            )
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, "ana@example.com");
        assert!(users.authenticate("ana@example.com", "nova").is_ok());

        let taken = users.update(
            user.id,
            UserUpdate {
                email: Some("bia@example.com".to_string()),
                ..Default::default()
            },
            None,
        );
        assert!(matches!(taken, Err(EconnectError::Conflict(_))));

        let blank = users.update(
            user.id,
            UserUpdate {
                name: Some("   ".to_string()),
                ..Default::default()
            },
            None,
        );
        assert!(matches!(blank, Err(EconnectError::Validation(_))));
    }

    #[test]
    fn test_update_image_replaces_old_file() {
        let (_db, users, dir) = setup();
        let images = dir.path().join("images");
        let first = ImageUpload {
            filename: Some("a.jpg".to_string()),
            bytes: b"jpg".to_vec(),
        };
        let user = users.register(ana(), Some(first)).unwrap();

        let second = ImageUpload {
            filename: Some("b.png".to_string()),
            bytes: b"png".to_vec(),
        };
        let updated = users.update(user.id, UserUpdate::default(), Some(second)).unwrap();
        let expected = format!("static/images/{}.png", user.id);
        assert_eq!(updated.profile_image.as_deref(), Some(expected.as_str()));
        assert!(images.join(format!("{}.png", user.id)).exists());
        assert!(!images.join(format!("{}.jpg", user.id)).exists());
    }

    #[test]
    fn test_failed_image_update_keeps_previous_image() {
        let (_db, users, dir) = setup();
        let images = dir.path().join("images");
        let first = ImageUpload {
            filename: Some("a.jpg".to_string()),
            bytes: b"jpg".to_vec(),
        };
        let user = users.register(ana(), Some(first)).unwrap();

        // a directory at the new image's path makes the write fail
        std::fs::create_dir_all(images.join(format!("{}.png", user.id)).join("x")).unwrap();
        let second = ImageUpload {
            filename: Some("b.png".to_string()),
            bytes: b"png".to_vec(),
        };
        let name_change = UserUpdate {
            name: Some("Ana Maria".to_string()),
            ..Default::default()
        };
        assert!(users.update(user.id, name_change, Some(second)).is_err());

        let stored = users.get(user.id).unwrap();
        let expected = format!("static/images/{}.jpg", user.id);
        assert_eq!(stored.profile_image.as_deref(), Some(expected.as_str()));
        assert_eq!(stored.name, "Ana");
        assert_eq!(
            std::fs::read(images.join(format!("{}.jpg", user.id))).unwrap(),
            b"jpg"
        );
    }

    #[test]
    fn test_delete_cascades() {
        let (db, users, dir) = setup();
        let image = ImageUpload {
            filename: None,
            bytes: b"jpg".to_vec(),
        };
        let user = users.register(ana(), Some(image)).unwrap();

        {
            let conn = db.conn().unwrap();
            conn.execute_batch(
                r#"
                INSERT INTO sources (id, name, url, kind) VALUES (1, 'A', 'https://a.example.com', 'rss');
                INSERT INTO articles (id, title, summary, image_url, published_at, url, source_id, collected_at)
                VALUES (1, 't', 's', 'i', 0, 'https://a.example.com/1', 1, 0);
                "#,
            )
            .unwrap();
        }
        let likes = EngagementStore::new(db.clone());
        likes.toggle_like(Some(user.id), 1).unwrap();
        let tokens = TokenService::new(db.clone(), "secret");
        let pair = tokens.issue_pair(user.id).unwrap();

        let deleted = users.delete(user.id).unwrap();
        assert_eq!(deleted.email, "ana@example.com");
        let remaining_likes: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM likes WHERE article_id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining_likes, 0);
        assert!(tokens.refresh(&pair.refresh_token).is_err());
        assert!(!dir.path().join("images").join(format!("{}.jpg", user.id)).exists());
        assert!(matches!(users.get(user.id), Err(EconnectError::NotFound(_))));
    }
}
