//! # Feedback Box
//!
//! A small HTTP backend that collects categorized feedback, stores it in
//! MongoDB, and serves the most recent entries back.
//!
//! ## Features
//!
//! - **Validated input**: closed set of categories, bounded text length
//! - **Markup stripping**: every submission is reduced to inert plain text
//! - **Per-client rate limits**: separate fixed-window quotas for writes and reads
//! - **Hardened responses**: CORS allow-list, body size cap, security headers
//! - **Signed session cookie**: stateless HMAC-SHA256 `sid` cookie
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`feedback`] - Domain types, validation and sanitizing
//! - [`store`] - Persistence gateway trait and the MongoDB implementation
//! - [`server`] - Axum routes, handlers and middleware stages
//! - [`config`] - CLI and environment configuration
//! - [`error`] - Error types shared across the layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use feedback_box::{create_router, FeedbackStore, MongoFeedbackStore, MongoSettings, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = MongoSettings::new("mongodb://localhost:27017");
//!     let store = MongoFeedbackStore::connect(&settings).await.unwrap();
//!     store.ping().await.unwrap();
//!
//!     let router = create_router(store, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(
//!         listener,
//!         router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//!     )
//!     .await
//!     .unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod feedback;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, StoreError, ValidationError};
pub use feedback::{
    validate_submission, ClientInfo, FeedbackRecord, FeedbackSubmission, FeedbackType,
    NewFeedback, Sanitizer, ValidFeedback, MAX_FEEDBACK_LENGTH, MIN_FEEDBACK_LENGTH,
};
pub use server::{
    create_router, AppState, ErrorResponse, FixedWindowLimiter, RateLimitPolicy, RouterConfig,
    Session, SessionSigner,
};
pub use store::{FeedbackStore, MongoFeedbackStore, MongoSettings, DEFAULT_LIST_LIMIT};
