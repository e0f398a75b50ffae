//! Account registration and token endpoints

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use econnect_core::{NewUser, TokenPair};

use crate::error::ApiResult;
use crate::routes::read_form;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

/// POST /auth/register - multipart `name`, `email`, `password`, optional `image`
async fn register(State(state): State<AppState>, multipart: Multipart) -> ApiResult<impl IntoResponse> {
    let mut form = read_form(multipart).await?;
    let new_user = NewUser {
        name: form.take("name").unwrap_or_default(),
        email: form.take("email").unwrap_or_default(),
        password: form.take("password").unwrap_or_default(),
    };

    let user = state.users.register(new_user, form.image)?;
    info!("New account {} registered", user.id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "user registered successfully"
        })),
    ))
}

/// POST /auth/login - exchange credentials for a token pair
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = state.users.authenticate(&request.email, &request.password)?;
    Ok(Json(state.tokens.issue_pair(user.id)?))
}

/// POST /auth/refresh - rotate a refresh token
async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(state.tokens.refresh(&request.refresh_token)?))
}

/// POST /auth/logout - revoke a refresh token
async fn logout(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.tokens.revoke(&request.refresh_token)?;
    Ok(Json(serde_json::json!({ "detail": "logged out" })))
}
