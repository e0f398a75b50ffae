//! Core types for the Econnect news backend
//!
//! This crate defines the shared data structures used across the backend:
//! feed sources, articles, feed views, users and the crate-wide error type.

pub mod error;
pub mod news;
pub mod user;

pub use error::{EconnectError, EconnectResult};
pub use news::{
    local_offset, Article, ArticleView, FeedOrder, IngestionReport, LikeToggle, NewArticle, Source,
    SourceKind, INGESTION_ACK,
};
pub use user::{NewUser, TokenPair, User, UserProfile, UserUpdate};
