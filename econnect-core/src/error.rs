//! Error types for the backend

use thiserror::Error;

/// Backend-wide error type
///
/// Each variant maps to one class of client-facing failure; the API layer
/// turns them into HTTP status codes.
#[derive(Error, Debug)]
pub enum EconnectError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EconnectError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EconnectError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EconnectError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EconnectError::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        EconnectError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        EconnectError::Forbidden(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EconnectError::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        EconnectError::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EconnectError::Internal(msg.into())
    }

    /// Whether the error is caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EconnectError::Validation(_)
                | EconnectError::NotFound(_)
                | EconnectError::Conflict(_)
                | EconnectError::Unauthorized(_)
                | EconnectError::Forbidden(_)
                | EconnectError::RateLimited
        )
    }
}

/// Result type alias for backend operations
pub type EconnectResult<T> = Result<T, EconnectError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for EconnectError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EconnectError::Conflict(msg.unwrap_or_else(|| e.to_string()))
            }
            other => EconnectError::Storage(other.to_string()),
        }
    }
}
