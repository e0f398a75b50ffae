//! Econnect API Server
//!
//! HTTP API serving economic news collected from RSS feeds, with accounts,
//! likes and personalized feeds.

mod config;
mod error;
mod extract;
mod middleware;
mod routes;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use econnect_news::{FeedFetcher, RssClient};
use econnect_services::{
    Database, EngagementStore, FeedService, IngestionPipeline, IngestionScheduler,
    ProfileImageStore, RateLimiter, TokenService, UserService,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ApiConfig;

/// Upper bound for request bodies, profile image uploads included
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub feed: Arc<FeedService>,
    pub engagement: Arc<EngagementStore>,
    pub users: Arc<UserService>,
    pub tokens: Arc<TokenService>,
    pub ingestion: Arc<IngestionPipeline>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Expected `api_key` header (optional - unset disables the check)
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(config: &ApiConfig, db: Arc<Database>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            feed: Arc::new(FeedService::new(db.clone())),
            engagement: Arc::new(EngagementStore::new(db.clone())),
            users: Arc::new(UserService::new(
                db.clone(),
                ProfileImageStore::new(&config.static_dir),
            )),
            tokens: Arc::new(TokenService::with_ttls(
                db.clone(),
                &config.jwt_secret,
                config.access_token_ttl_secs,
                config.refresh_token_ttl_days,
            )),
            ingestion: Arc::new(IngestionPipeline::new(db.clone(), fetcher)),
            rate_limiter: Arc::new(RateLimiter::new(
                db.clone(),
                config.rate_limit_max_requests,
                config.rate_limit_window,
                "api",
            )),
            api_key: config.api_key.clone(),
            db,
        }
    }
}

/// Build the router with every layer applied
pub fn build_app(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::API_KEY_HEADER),
        ]);

    Router::new()
        .merge(routes::all_routes(state.clone()))
        .nest_service("/static/images", ServeDir::new(static_dir.join("images")))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables, .env.local taking precedence
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_filename(file) {
            // Not an error if the file doesn't exist
            if !matches!(e, dotenvy::Error::Io(_)) {
                eprintln!("Warning: Failed to load {}: {}", file, e);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,econnect_api=debug")),
        )
        .init();

    info!("Starting Econnect API");

    let config = ApiConfig::from_env()?;

    if config.api_key.is_none() {
        warn!("API_KEY not set - api_key header check is disabled");
    }

    info!("Opening database at: {}", config.database_path.display());
    let db = Arc::new(Database::new(&config.database_path)?);

    if config.feed_sources.is_empty() {
        warn!("FEED_SOURCES not set - ingestion will fail until sources are registered");
    } else {
        let added = db.seed_sources(&config.feed_sources)?;
        info!(
            "{} feed sources configured ({} new)",
            config.feed_sources.len(),
            added
        );
    }

    let fetcher = Arc::new(RssClient::with_timeout(config.feed_timeout));
    let state = AppState::new(&config, db, fetcher);

    // Start hourly ingestion in background
    if config.ingest_interval.is_zero() {
        info!("Scheduled ingestion disabled (INGEST_INTERVAL_SECS=0)");
    } else {
        IngestionScheduler::new(state.ingestion.clone(), config.ingest_interval).start();
    }

    let app = build_app(state, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
