//! Request guards applied as axum middleware

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use econnect_core::EconnectError;
use econnect_services::RateDecision;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the shared API key
pub const API_KEY_HEADER: &str = "api_key";

/// Requests left in the current window, set on allowed responses
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Reject requests whose `api_key` header does not match the configured key
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            debug!("Rejected request to {} without valid API key", request.uri().path());
            return ApiError(EconnectError::forbidden("Could not validate API key")).into_response();
        }
    }
    next.run(request).await
}

/// Client identity for rate limiting: first `X-Forwarded-For` hop, else the
/// peer address
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Apply the shared sliding-window limit to every request
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);

    match state.rate_limiter.check(&key) {
        Ok(RateDecision::Allowed { remaining }) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Ok(RateDecision::Limited { retry_after_secs }) => {
            let mut response = ApiError(EconnectError::RateLimited).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
        Err(e) => {
            warn!("Rate limiter unavailable, letting request through: {}", e);
            next.run(request).await
        }
    }
}
