//! API route definitions

mod auth;
mod health;
mod home;
mod news;
mod user;

use std::collections::HashMap;

use axum::{extract::Multipart, Router};

use econnect_services::ImageUpload;

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_api_key;
use crate::AppState;

/// Create all routes; account and news routes sit behind the API key check
pub fn all_routes(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .merge(auth::routes())
        .merge(news::routes())
        .merge(user::routes())
        .route_layer(axum::middleware::from_fn_with_state(state, require_api_key));

    Router::new()
        .merge(home::routes())
        .merge(health::routes())
        .merge(guarded)
}

/// Text fields and the optional `image` file of a multipart form
#[derive(Debug, Default)]
pub(crate) struct FormData {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl FormData {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

pub(crate) async fn read_form(mut multipart: Multipart) -> ApiResult<FormData> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ApiError::validation(format!("Invalid form data: {}", e))
    };

    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(invalid)?;
            let upload = ImageUpload {
                filename,
                bytes: bytes.to_vec(),
            };
            // browsers send an empty part when no file was chosen
            if !upload.is_empty() {
                form.image = Some(upload);
            }
        } else {
            let value = field.text().await.map_err(invalid)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}
