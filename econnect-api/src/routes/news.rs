//! News feed endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use econnect_core::{ArticleView, FeedOrder, IngestionReport, LikeToggle};

use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, MaybeUser};
use crate::AppState;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 10;

/// Query parameters for paged feeds
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Number of items to skip
    pub skip: Option<i64>,
    /// Page size, 1 to 10
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Validated `(skip, limit)`
    fn bounds(&self) -> ApiResult<(u32, u32)> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(MAX_PAGE_SIZE);
        if skip < 0 {
            return Err(ApiError::validation("skip must be greater than or equal to 0"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let skip = u32::try_from(skip).map_err(|_| ApiError::validation("skip is too large"))?;
        // bounded by MAX_PAGE_SIZE above
        Ok((skip, limit as u32))
    }
}

/// Create news routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/news/feed/latest", get(latest_feed))
        .route("/news/feed/hottest", get(hottest_feed))
        .route("/news/feed/liked", get(liked_feed))
        .route("/news/fetch-rss", post(fetch_rss))
        .route("/news/{id}", get(get_article))
        .route("/news/{id}/like", post(toggle_like))
}

/// GET /news/feed/latest - newest articles first
async fn latest_feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ArticleView>>> {
    let (skip, limit) = page.bounds()?;
    let items = state
        .feed
        .get_feed(Some(user.id), skip, limit, FeedOrder::Recency)?;
    Ok(Json(items))
}

/// GET /news/feed/hottest - most liked articles first
async fn hottest_feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ArticleView>>> {
    let (skip, limit) = page.bounds()?;
    let items = state
        .feed
        .get_feed(Some(user.id), skip, limit, FeedOrder::Popularity)?;
    Ok(Json(items))
}

/// GET /news/feed/liked - the caller's liked articles, latest like first
async fn liked_feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ArticleView>>> {
    let (skip, limit) = page.bounds()?;
    Ok(Json(state.feed.get_liked_feed(user.id, skip, limit)?))
}

/// GET /news/{id} - one article; `liked` reflects the caller when authenticated
async fn get_article(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArticleView>> {
    let user_id = user.map(|u| u.id);
    Ok(Json(state.feed.get_article(user_id, id)?))
}

/// POST /news/{id}/like - toggle the caller's like
async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LikeToggle>> {
    Ok(Json(state.engagement.toggle_like(Some(user.id), id)?))
}

/// POST /news/fetch-rss - run ingestion now
async fn fetch_rss(State(state): State<AppState>) -> ApiResult<Json<IngestionReport>> {
    info!("Manual ingestion requested");
    let report = state.ingestion.run().await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(skip: Option<i64>, limit: Option<i64>) -> PageQuery {
        PageQuery { skip, limit }
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(PageQuery::default().bounds().unwrap(), (0, 10));
        assert_eq!(page(Some(20), Some(1)).bounds().unwrap(), (20, 1));
    }

    #[test]
    fn test_page_rejects_out_of_range() {
        assert!(page(Some(-1), None).bounds().is_err());
        assert!(page(None, Some(0)).bounds().is_err());
        assert!(page(None, Some(11)).bounds().is_err());
    }
}
