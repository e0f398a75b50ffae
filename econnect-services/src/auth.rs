//! Authentication: password hashing and signed tokens
//!
//! Tokens are compact HS256 JWTs. Access tokens are stateless; refresh
//! tokens are also persisted so they can be rotated and revoked.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use econnect_core::{EconnectError, EconnectResult, TokenPair};

use crate::db::Database;

type HmacSha256 = Hmac<Sha256>;

/// Default access token lifetime
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Default refresh token lifetime
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> EconnectResult<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| EconnectError::internal(format!("Failed to build salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| EconnectError::internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Token purpose, carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub typ: TokenKind,
    /// Unique id, set on refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> EconnectResult<i64> {
        self.sub
            .parse()
            .map_err(|_| EconnectError::unauthorized("Invalid token subject"))
    }
}

/// Issues, verifies, rotates and revokes tokens
pub struct TokenService {
    db: Arc<Database>,
    secret: Vec<u8>,
    access_ttl_secs: i64,
    refresh_ttl_days: i64,
}

/// Timestamps shared by both tokens of a pair
struct PairTimes {
    issued_at: i64,
    access_exp: i64,
    refresh_exp: i64,
}

impl TokenService {
    /// Create with the default lifetimes
    pub fn new(db: Arc<Database>, secret: &str) -> Self {
        Self::with_ttls(db, secret, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_DAYS)
    }

    pub fn with_ttls(
        db: Arc<Database>,
        secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            db,
            secret: secret.as_bytes().to_vec(),
            access_ttl_secs,
            refresh_ttl_days,
        }
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user_id: i64) -> EconnectResult<TokenPair> {
        let times = self.pair_times(Utc::now())?;
        let conn = self.db.conn()?;
        let pair = self.issue_pair_on(&conn, user_id, &times)?;
        debug!("Issued token pair for user {}", user_id);
        Ok(pair)
    }

    /// Verify an access token and return its user id
    pub fn verify_access(&self, token: &str) -> EconnectResult<i64> {
        let claims = self.decode(token)?;
        if claims.typ != TokenKind::Access {
            return Err(EconnectError::unauthorized("Invalid token type"));
        }
        claims.user_id()
    }

    /// Rotate a refresh token: the presented token is deactivated and a new
    /// pair is issued in the same transaction
    pub fn refresh(&self, refresh_token: &str) -> EconnectResult<TokenPair> {
        let claims = self.decode(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(EconnectError::unauthorized("Invalid token type"));
        }
        let user_id = claims.user_id()?;
        let times = self.pair_times(Utc::now())?;

        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;

        let stored: Option<(i64, i64, bool)> = tx
            .query_row(
                "SELECT id, expires_at, active FROM refresh_tokens WHERE token = ?1",
                params![refresh_token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((token_id, expires_at, true)) = stored else {
            return Err(EconnectError::unauthorized("Invalid or revoked refresh token"));
        };
        if expires_at < times.issued_at {
            return Err(EconnectError::unauthorized("Refresh token expired"));
        }

        let deactivated = tx.execute(
            "UPDATE refresh_tokens SET active = 0 WHERE id = ?1 AND active = 1",
            params![token_id],
        )?;
        if deactivated == 0 {
            return Err(EconnectError::unauthorized("Invalid or revoked refresh token"));
        }

        let pair = self.issue_pair_on(&tx, user_id, &times)?;
        tx.commit()?;

        info!("Rotated refresh token for user {}", user_id);
        Ok(pair)
    }

    /// Deactivate a refresh token; unknown tokens are ignored
    pub fn revoke(&self, refresh_token: &str) -> EconnectResult<()> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE refresh_tokens SET active = 0 WHERE token = ?1",
            params![refresh_token],
        )?;
        debug!("Revoked {} refresh tokens", changed);
        Ok(())
    }

    /// Expiry times for a pair issued at `now`; lifetimes that overflow
    /// the calendar are an error
    fn pair_times(&self, now: DateTime<Utc>) -> EconnectResult<PairTimes> {
        let expiry = |ttl: Option<TimeDelta>, kind: &str| {
            ttl.and_then(|ttl| now.checked_add_signed(ttl))
                .map(|at| at.timestamp())
                .ok_or_else(|| EconnectError::internal(format!("{} token lifetime out of range", kind)))
        };

        Ok(PairTimes {
            issued_at: now.timestamp(),
            access_exp: expiry(TimeDelta::try_seconds(self.access_ttl_secs), "access")?,
            refresh_exp: expiry(TimeDelta::try_days(self.refresh_ttl_days), "refresh")?,
        })
    }

    fn issue_pair_on(
        &self,
        conn: &Connection,
        user_id: i64,
        times: &PairTimes,
    ) -> EconnectResult<TokenPair> {
        let access = self.encode(&Claims {
            sub: user_id.to_string(),
            exp: times.access_exp,
            iat: times.issued_at,
            typ: TokenKind::Access,
            jti: None,
        })?;

        let refresh = self.encode(&Claims {
            sub: user_id.to_string(),
            exp: times.refresh_exp,
            iat: times.issued_at,
            typ: TokenKind::Refresh,
            jti: Some(uuid::Uuid::new_v4().to_string()),
        })?;

        conn.execute(
            r#"
            INSERT INTO refresh_tokens (user_id, token, created_at, expires_at, active)
            VALUES (?1, ?2, ?3, ?4, 1)
            "#,
            params![user_id, refresh, times.issued_at, times.refresh_exp],
        )?;

        Ok(TokenPair::bearer(access, refresh))
    }

    fn sign(&self, message: &str) -> EconnectResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| EconnectError::internal(format!("Failed to create HMAC: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(mac)
    }

    /// Serialize and sign claims
    pub fn encode(&self, claims: &Claims) -> EconnectResult<String> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| EconnectError::internal(format!("Failed to encode claims: {}", e)))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&signing_input)?.finalize().into_bytes());
        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Check signature and expiry, returning the claims
    pub fn decode(&self, token: &str) -> EconnectResult<Claims> {
        let invalid = || EconnectError::unauthorized("Invalid token");

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let header_json: serde_json::Value = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;
        if header_json.get("alg").and_then(|alg| alg.as_str()) != Some("HS256") {
            return Err(invalid());
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        self.sign(&format!("{}.{}", header, payload))?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(EconnectError::unauthorized("Token expired"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Database>, TokenService) {
        let db = Arc::new(Database::new_in_memory().unwrap());
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, registered_at) \
                 VALUES (7, 'Ana', 'ana@example.com', 'x', 0)",
                [],
            )
            .unwrap();
        let tokens = TokenService::new(db.clone(), "test-secret");
        (db, tokens)
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("s3nha").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3nha", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3nha", "not-a-hash"));
    }

    #[test]
    fn test_access_token_verifies() {
        let (_db, tokens) = setup();
        let pair = tokens.issue_pair(7).unwrap();
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(tokens.verify_access(&pair.access_token).unwrap(), 7);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let (_db, tokens) = setup();
        let pair = tokens.issue_pair(7).unwrap();
        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(EconnectError::Unauthorized(_))
        ));
        assert!(tokens.refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_tampered_and_foreign_tokens_rejected() {
        let (db, tokens) = setup();
        let pair = tokens.issue_pair(7).unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.push('x');
        assert!(tokens.verify_access(&tampered).is_err());
        assert!(tokens.verify_access("a.b").is_err());

        let other = TokenService::new(db, "other-secret");
        assert!(other.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let (_db, tokens) = setup();
        let now = Utc::now().timestamp();
        let token = tokens
            .encode(&Claims {
                sub: "7".to_string(),
                exp: now - 10,
                iat: now - 100,
                typ: TokenKind::Access,
                jti: None,
            })
            .unwrap();
        let err = tokens.verify_access(&token).unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: Token expired");
    }

    #[test]
    fn test_refresh_rotation() {
        let (_db, tokens) = setup();
        let first = tokens.issue_pair(7).unwrap();
        let second = tokens.refresh(&first.refresh_token).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(tokens.verify_access(&second.access_token).unwrap(), 7);

        // the rotated token cannot be replayed
        assert!(tokens.refresh(&first.refresh_token).is_err());
        assert!(tokens.refresh(&second.refresh_token).is_ok());
    }

    #[test]
    fn test_revoked_and_expired_refresh_rejected() {
        let (db, tokens) = setup();
        let pair = tokens.issue_pair(7).unwrap();
        tokens.revoke(&pair.refresh_token).unwrap();
        assert!(tokens.refresh(&pair.refresh_token).is_err());
        tokens.revoke("unknown").unwrap();

        let pair = tokens.issue_pair(7).unwrap();
        db.conn()
            .unwrap()
            .execute(
                "UPDATE refresh_tokens SET expires_at = 0 WHERE token = ?1",
                params![pair.refresh_token],
            )
            .unwrap();
        let err = tokens.refresh(&pair.refresh_token).unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: Refresh token expired");
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let (db, tokens) = setup();
        let huge = TokenService::with_ttls(db.clone(), "test-secret", 3600, 100_000_000);
        assert!(matches!(huge.issue_pair(7), Err(EconnectError::Internal(_))));
        let huge = TokenService::with_ttls(db.clone(), "test-secret", i64::MAX, 30);
        assert!(huge.issue_pair(7).is_err());

        // the database stays usable afterwards
        db.ping().unwrap();
        let pair = tokens.issue_pair(7).unwrap();
        assert!(tokens.refresh(&pair.refresh_token).is_ok());
    }
}
