//! Configuration management for the feedback service.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables (the names the deployment already uses)
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use feedback_box::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `FEEDBACK_HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3000)
//! - `MONGODB_URI` - MongoDB connection string (required)
//! - `FEEDBACK_DATABASE` - Database name (default: feedbackDB)
//! - `FEEDBACK_COLLECTION` - Collection name (default: feedbacks)
//! - `SESSION_SECRET` - Session cookie signing secret (default: random per process)
//! - `APP_ENV` - Environment tag; `production` enables secure cookies (default: development)
//! - `CORS_ORIGINS` - Comma-separated allowed origins
//! - `FEEDBACK_LIST_LIMIT` - Records returned per list request (default: 10)
//! - `WRITE_LIMIT` / `WRITE_WINDOW_SECS` - Submission quota (default: 5 per 900 s)
//! - `READ_LIMIT` / `READ_WINDOW_SECS` - Listing quota (default: 10 per 300 s)
//! - `BODY_LIMIT` - Maximum request body in bytes (default: 10240)
//! - `MONGODB_MAX_POOL_SIZE` - Connection pool size (default: 50)
//! - `MONGODB_MAX_IDLE_MS` - Idle connection eviction (default: 10000)
//! - `MONGODB_WRITE_TIMEOUT_MS` - Write acknowledgement timeout (default: 2500)
//! - `MONGODB_SERVER_SELECTION_TIMEOUT_MS` - Server selection timeout (default: 5000)

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::server::{RateLimitPolicy, RouterConfig, DEFAULT_BODY_LIMIT, DEFAULT_CORS_ORIGINS};
use crate::store::{MongoSettings, DEFAULT_LIST_LIMIT};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "feedbackDB";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "feedbacks";

/// Default environment tag.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Largest accepted list limit.
pub const MAX_LIST_LIMIT: u32 = 100;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Feedback Box - a small HTTP backend for anonymous feedback.
///
/// Accepts categorized feedback, stores it in MongoDB, and serves the most
/// recent entries back.
#[derive(Parser, Debug, Clone)]
#[command(name = "feedback-box")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FEEDBACK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Environment tag reported by the health check.
    ///
    /// `production` marks session cookies `Secure` and hides internal error
    /// messages from clients.
    #[arg(long, default_value = DEFAULT_ENVIRONMENT, env = "APP_ENV")]
    pub environment: String,

    // =========================================================================
    // MongoDB Configuration
    // =========================================================================
    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,

    /// Database holding the feedback collection.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "FEEDBACK_DATABASE")]
    pub database: String,

    /// Feedback collection name.
    #[arg(long, default_value = DEFAULT_COLLECTION, env = "FEEDBACK_COLLECTION")]
    pub collection: String,

    /// Maximum number of pooled connections.
    #[arg(long, default_value_t = 50, env = "MONGODB_MAX_POOL_SIZE")]
    pub max_pool_size: u32,

    /// Idle connections are closed after this many milliseconds.
    #[arg(long, default_value_t = 10_000, env = "MONGODB_MAX_IDLE_MS")]
    pub max_idle_ms: u64,

    /// Write acknowledgement timeout in milliseconds.
    #[arg(long, default_value_t = 2_500, env = "MONGODB_WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: u64,

    /// How long to wait for a reachable server, in milliseconds.
    #[arg(long, default_value_t = 5_000, env = "MONGODB_SERVER_SELECTION_TIMEOUT_MS")]
    pub server_selection_timeout_ms: u64,

    // =========================================================================
    // Session Configuration
    // =========================================================================
    /// Secret for signing session cookies.
    ///
    /// If not provided, a random secret is generated at startup and sessions
    /// do not survive a restart.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    // =========================================================================
    // Request Limits
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_CORS_ORIGINS.map(String::from)
    )]
    pub cors_origins: Vec<String>,

    /// Number of records returned by the list endpoint (1-100).
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT, env = "FEEDBACK_LIST_LIMIT")]
    pub list_limit: u32,

    /// Submissions allowed per client per write window.
    #[arg(long, default_value_t = 5, env = "WRITE_LIMIT")]
    pub write_limit: u32,

    /// Write window length in seconds.
    #[arg(long, default_value_t = 900, env = "WRITE_WINDOW_SECS")]
    pub write_window_secs: u64,

    /// List requests allowed per client per read window.
    #[arg(long, default_value_t = 10, env = "READ_LIMIT")]
    pub read_limit: u32,

    /// Read window length in seconds.
    #[arg(long, default_value_t = 300, env = "READ_WINDOW_SECS")]
    pub read_window_secs: u64,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, env = "BODY_LIMIT")]
    pub body_limit: usize,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_uri.trim().is_empty() {
            return Err("MongoDB URI is required. Set --mongodb-uri or MONGODB_URI".to_string());
        }

        if self.database.is_empty() {
            return Err("database name must not be empty".to_string());
        }

        if self.collection.is_empty() {
            return Err("collection name must not be empty".to_string());
        }

        if self.list_limit == 0 || self.list_limit > MAX_LIST_LIMIT {
            return Err(format!(
                "list_limit must be between 1 and {}",
                MAX_LIST_LIMIT
            ));
        }

        if self.write_limit == 0 || self.read_limit == 0 {
            return Err("rate limits must be greater than 0".to_string());
        }

        if self.write_window_secs == 0 || self.read_window_secs == 0 {
            return Err("rate limit windows must be greater than 0 seconds".to_string());
        }

        if self.body_limit == 0 {
            return Err("body_limit must be greater than 0".to_string());
        }

        if self.max_pool_size == 0 {
            return Err("max_pool_size must be greater than 0".to_string());
        }

        if matches!(self.session_secret.as_deref(), Some("")) {
            return Err("session secret must not be empty when set".to_string());
        }

        for origin in &self.cors_origins {
            validate_origin(origin)?;
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the service runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Connection settings for the MongoDB store.
    pub fn mongo_settings(&self) -> MongoSettings {
        MongoSettings {
            uri: self.mongodb_uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            max_pool_size: self.max_pool_size,
            max_idle_time: Duration::from_millis(self.max_idle_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            server_selection_timeout: Duration::from_millis(self.server_selection_timeout_ms),
        }
    }

    /// Build the router configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_cors_origins(self.cors_origins.clone())
            .with_list_limit(self.list_limit)
            .with_rate_limits(
                RateLimitPolicy::new(self.write_limit, Duration::from_secs(self.write_window_secs)),
                RateLimitPolicy::new(self.read_limit, Duration::from_secs(self.read_window_secs)),
            )
            .with_body_limit(self.body_limit)
            .with_environment(self.environment.clone(), self.is_production())
            .with_tracing(!self.no_tracing);

        if let Some(ref secret) = self.session_secret {
            router_config = router_config.with_session_secret(secret.clone());
        }

        router_config
    }
}

/// An origin must be a bare `http(s)://host[:port]` with no path or query.
fn validate_origin(origin: &str) -> Result<(), String> {
    let url = Url::parse(origin).map_err(|e| format!("invalid CORS origin '{}': {}", origin, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("CORS origin '{}' must use http or https", origin));
    }

    if url.host_str().is_none() {
        return Err(format!("CORS origin '{}' has no host", origin));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!(
            "CORS origin '{}' must not contain a path, query, or fragment",
            origin
        ));
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
