//! Endpoints for the authenticated user's own account

use axum::{
    extract::{Multipart, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use econnect_core::{UserProfile, UserUpdate};

use crate::error::ApiResult;
use crate::extract::AuthUser;
use crate::routes::read_form;
use crate::AppState;

/// Identity fields echoed after an update
#[derive(Debug, Serialize)]
struct UpdatedUser {
    name: String,
    email: String,
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/user",
        get(get_profile).patch(update_profile).delete(delete_account),
    )
}

/// GET /user - profile of the caller
async fn get_profile(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// PATCH /user - multipart `name`, `email`, `password`, `image`; empty fields are ignored
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<UpdatedUser>> {
    let mut form = read_form(multipart).await?;
    let update = UserUpdate {
        name: form.take("name"),
        email: form.take("email"),
        password: form.take("password"),
    };

    let updated = state.users.update(user.id, update, form.image)?;
    Ok(Json(UpdatedUser {
        name: updated.name,
        email: updated.email,
    }))
}

/// DELETE /user - remove the account with its likes, tokens and image
async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state.users.delete(user.id)?;
    info!("Account {} deleted", deleted.id);
    Ok(Json(serde_json::json!({
        "detail": format!("user {} and their likes were removed", deleted.email)
    })))
}
