//! Mapping of backend errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};

use econnect_core::EconnectError;

/// Handler error; serializes as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(pub EconnectError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<EconnectError> for ApiError {
    fn from(err: EconnectError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError(EconnectError::validation(msg))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError(EconnectError::unauthorized(msg))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EconnectError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EconnectError::NotFound(_) => StatusCode::NOT_FOUND,
            EconnectError::Conflict(_) => StatusCode::CONFLICT,
            EconnectError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            EconnectError::Forbidden(_) => StatusCode::FORBIDDEN,
            EconnectError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            EconnectError::Config(_) | EconnectError::Storage(_) | EconnectError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message; server faults stay in the logs
    fn message(&self) -> String {
        match &self.0 {
            EconnectError::Validation(msg)
            | EconnectError::NotFound(msg)
            | EconnectError::Conflict(msg)
            | EconnectError::Unauthorized(msg)
            | EconnectError::Forbidden(msg) => msg.clone(),
            EconnectError::RateLimited => "Too many requests".to_string(),
            EconnectError::Config(_) | EconnectError::Storage(_) | EconnectError::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            debug!("Request rejected: {}", self.0);
        } else {
            error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}
