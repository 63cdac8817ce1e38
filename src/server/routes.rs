//! Router configuration for the feedback service.
//!
//! This module defines the HTTP routes and the order of the middleware
//! stages wrapped around them.
//!
//! # Route Structure
//!
//! ```text
//! POST /api/feedback   - Submit feedback   (write limiter)
//! GET  /api/feedback   - List feedback     (read limiter)
//! GET  /api/health     - Health check
//! *                    - 404
//! ```
//!
//! # Stage Order
//!
//! ```text
//! request ─▶ trace ─▶ security headers ─▶ CORS guard ─▶ CORS headers
//!         ─▶ body cap ─▶ session ─▶ route limiter ─▶ handler
//! ```
//!
//! # Example
//!
//! ```ignore
//! use feedback_box::server::routes::{create_router, RouterConfig};
//! use feedback_box::store::{MongoFeedbackStore, MongoSettings};
//!
//! let store = MongoFeedbackStore::connect(&MongoSettings::new(uri)).await?;
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(store, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! ```

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers::{
    health_handler, list_feedback_handler, not_found_handler, submit_feedback_handler, AppState,
};
use super::rate_limit::{rate_limit_middleware, FixedWindowLimiter, RateLimitPolicy};
use super::security::{
    body_limit_middleware, cors_guard_middleware, security_headers_middleware, AllowedOrigins,
    BodyLimit, SecurityHeaders, DEFAULT_BODY_LIMIT,
};
use super::session::{session_middleware, SessionSigner};
use crate::store::{FeedbackStore, DEFAULT_LIST_LIMIT};

/// Origins allowed when none are configured.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = [
    "https://kotaksaran-ketaqwaanman1jember.vercel.app",
    "http://localhost:3000",
];

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (an empty list rejects every cross-origin request)
    pub cors_origins: Vec<String>,

    /// Number of records returned by `GET /api/feedback`
    pub list_limit: u32,

    /// Quota for `POST /api/feedback`
    pub write_limit: RateLimitPolicy,

    /// Quota for `GET /api/feedback`
    pub read_limit: RateLimitPolicy,

    /// Maximum request body size in bytes
    pub body_limit: usize,

    /// Session signing secret (None = random per process)
    pub session_secret: Option<String>,

    /// Environment tag reported by the health check
    pub environment: String,

    /// Production mode: secure cookies, no internal error details
    pub production: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration with the service defaults.
    ///
    /// By default:
    /// - CORS allows the two default origins
    /// - 10 records per list request
    /// - 5 writes per 15 minutes, 10 reads per 5 minutes
    /// - 10 KiB body cap
    /// - Development mode with tracing enabled
    pub fn new() -> Self {
        Self {
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            list_limit: DEFAULT_LIST_LIMIT,
            write_limit: RateLimitPolicy::writes(),
            read_limit: RateLimitPolicy::reads(),
            body_limit: DEFAULT_BODY_LIMIT,
            session_secret: None,
            environment: "development".to_string(),
            production: false,
            enable_tracing: true,
        }
    }

    /// Set the allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Set the list endpoint limit.
    pub fn with_list_limit(mut self, limit: u32) -> Self {
        self.list_limit = limit;
        self
    }

    /// Set the write and read quotas.
    pub fn with_rate_limits(mut self, write: RateLimitPolicy, read: RateLimitPolicy) -> Self {
        self.write_limit = write;
        self.read_limit = read;
        self
    }

    /// Set the body cap in bytes.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Set the session signing secret.
    pub fn with_session_secret(mut self, secret: impl Into<String>) -> Self {
        self.session_secret = Some(secret.into());
        self
    }

    /// Set the environment tag and whether it is production.
    pub fn with_environment(mut self, environment: impl Into<String>, production: bool) -> Self {
        self.environment = environment.into();
        self.production = production;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `store` - The persistence gateway
/// * `config` - Router configuration
///
/// # Returns
///
/// A configured Axum router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the rate limiters
/// can key on the client address.
pub fn create_router<S>(store: S, config: RouterConfig) -> Router
where
    S: FeedbackStore,
{
    let app_state = AppState::new(store)
        .with_list_limit(config.list_limit)
        .with_environment(config.environment.clone(), config.production);

    let write_limiter = Arc::new(FixedWindowLimiter::new("write", config.write_limit));
    let read_limiter = Arc::new(FixedWindowLimiter::new("read", config.read_limit));

    let signer = match &config.session_secret {
        Some(secret) => SessionSigner::new(secret),
        None => SessionSigner::with_random_secret(),
    }
    .with_secure(config.production);

    let allowed = Arc::new(AllowedOrigins::new(config.cors_origins.iter().cloned()));
    let security = Arc::new(SecurityHeaders::new(allowed.as_slice()));
    let cors = build_cors_layer(allowed.as_slice());

    // `route_layer` keeps the limiters off the 405 fallback for other methods
    let feedback_route = post(submit_feedback_handler::<S>)
        .route_layer(middleware::from_fn_with_state(
            write_limiter,
            rate_limit_middleware,
        ))
        .merge(
            get(list_feedback_handler::<S>).route_layer(middleware::from_fn_with_state(
                read_limiter,
                rate_limit_middleware,
            )),
        );

    // Layers wrap outwards: the last one added sees the request first
    let router = Router::new()
        .route("/api/feedback", feedback_route)
        .route("/api/health", get(health_handler::<S>))
        .fallback(not_found_handler)
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(signer, session_middleware))
        .layer(middleware::from_fn_with_state(
            BodyLimit(config.body_limit),
            body_limit_middleware,
        ))
        .layer(cors)
        .layer(middleware::from_fn_with_state(allowed, cors_guard_middleware))
        .layer(middleware::from_fn_with_state(
            security,
            security_headers_middleware,
        ));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer for the allow-listed origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Skipping CORS origin that is not a valid header value");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([
            HeaderName::from_static("content-range"),
            HeaderName::from_static("x-content-range"),
        ])
        .allow_credentials(true)
}

// =============================================================================
// Tests
// =============================================================================
