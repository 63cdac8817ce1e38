//! HTTP server layer for the feedback service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /api/feedback   GET /api/feedback   GET /api/health │
//! │                                                                 │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌────────┐  │
//! │  │   security   │ │   session    │ │  rate_limit  │ │ routes │  │
//! │  │ (CORS, body, │ │ (signed sid  │ │ (fixed window│ │ (stage │  │
//! │  │   headers)   │ │   cookie)    │ │   per IP)    │ │ order) │  │
//! │  └──────────────┘ └──────────────┘ └──────────────┘ └────────┘  │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │ handlers (validate → sanitize → store, error responder)  │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod security;
pub mod session;

pub use handlers::{
    health_handler, list_feedback_handler, not_found_handler, submit_feedback_handler, ApiFailure,
    AppState, ErrorResponse, HealthResponse, ListResponse, SubmitResponse,
};
pub use rate_limit::{
    client_ip, rate_limit_middleware, FixedWindowLimiter, RateLimitDecision, RateLimitPolicy,
};
pub use routes::{create_router, RouterConfig, DEFAULT_CORS_ORIGINS};
pub use security::{
    body_limit_middleware, cors_guard_middleware, security_headers_middleware, AllowedOrigins,
    BodyLimit, SecurityHeaders, DEFAULT_BODY_LIMIT,
};
pub use session::{session_middleware, Session, SessionError, SessionSigner, SESSION_COOKIE};
