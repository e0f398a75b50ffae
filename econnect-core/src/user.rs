//! User account data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Stored profile image path, relative to the static root
    pub profile_image: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Public view of a user's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            registered_at: user.registered_at,
            profile_image: user.profile_image.clone(),
        }
    }
}

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Partial profile update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserUpdate {
    /// Treat empty form fields as absent
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            name: keep(self.name),
            email: keep(self.email),
            password: keep(self.password),
        }
    }
}

/// Access/refresh token pair issued on login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 7,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            profile_image: None,
            registered_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("ana@example.com"));
    }

    #[test]
    fn test_update_drops_empty_fields() {
        let update = UserUpdate {
            name: Some(String::new()),
            email: Some("new@example.com".to_string()),
            password: None,
        }
        .normalized();
        assert!(update.name.is_none());
        assert_eq!(update.email.as_deref(), Some("new@example.com"));
    }
}
