//! Request extractors for the authenticated user

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use econnect_core::{EconnectError, User};

use crate::error::ApiError;
use crate::AppState;

/// The user owning a valid bearer access token
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the user no longer exists.
pub struct AuthUser(pub User);

/// Like [`AuthUser`] but a missing `Authorization` header yields `None`
pub struct MaybeUser(pub Option<User>);

fn bearer_token(parts: &Parts) -> Option<Result<&str, ApiError>> {
    let value = parts.headers.get(header::AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"));
    Some(token)
}

fn resolve_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let user_id = state.tokens.verify_access(token)?;
    match state.users.get(user_id) {
        Ok(user) => Ok(user),
        Err(EconnectError::NotFound(_)) => Err(ApiError::unauthorized("Could not validate credentials")),
        Err(e) => Err(e.into()),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .unwrap_or_else(|| Err(ApiError::unauthorized("Not authenticated")))?;
        Ok(AuthUser(resolve_user(state, token)?))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(MaybeUser(None)),
            Some(token) => Ok(MaybeUser(Some(resolve_user(state, token?)?))),
        }
    }
}
