//! Business logic services for the Econnect news backend
//!
//! This crate provides the service layer on top of the shared SQLite
//! database: ingestion, engagement, feeds, accounts and request limiting.

pub mod auth;
pub mod db;
pub mod engagement;
pub mod feed;
pub mod images;
pub mod ingestion;
pub mod rate_limiter;
pub mod scheduler;
pub mod sources;
pub mod users;

pub use auth::{hash_password, verify_password, Claims, TokenKind, TokenService};
pub use db::Database;
pub use engagement::EngagementStore;
pub use feed::FeedService;
pub use images::{ImageUpload, ProfileImageStore};
pub use ingestion::IngestionPipeline;
pub use rate_limiter::{RateDecision, RateLimiter, RateLimiterStats};
pub use scheduler::IngestionScheduler;
pub use sources::SourceSeed;
pub use users::UserService;
