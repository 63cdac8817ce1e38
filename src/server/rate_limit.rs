//! Fixed-window rate limiting keyed by client IP.
//!
//! Each limiter counts requests per client in windows of fixed length. The
//! first request from a client opens a window; once `max_requests` have been
//! admitted, further requests are rejected with `429 Too Many Requests` until
//! the window ends.
//!
//! Every response passing through a limiter carries the draft IETF headers:
//!
//! ```text
//! RateLimit-Policy: 5;w=900
//! RateLimit-Limit: 5
//! RateLimit-Remaining: 3
//! RateLimit-Reset: 812
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

/// Key shared by all requests that arrive without connection info.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Message returned with every 429 response.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Window tables larger than this are swept for expired entries.
const PRUNE_THRESHOLD: usize = 1024;

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

// =============================================================================
// Policy
// =============================================================================

/// Quota for one limiter: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Default quota for submissions: 5 per 15 minutes.
    pub const fn writes() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// Default quota for listing: 10 per 5 minutes.
    pub const fn reads() -> Self {
        Self::new(10, Duration::from_secs(5 * 60))
    }

    /// `RateLimit-Policy` header value, e.g. `5;w=900`.
    fn header_value(&self) -> String {
        format!("{};w={}", self.max_requests, self.window.as_secs())
    }
}

// =============================================================================
// Limiter
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single [`FixedWindowLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's current window ends
    pub reset_after: Duration,
}

/// Per-client fixed-window counter.
pub struct FixedWindowLimiter {
    name: &'static str,
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, policy: RateLimitPolicy) -> Self {
        Self {
            name,
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count a request from `key` and decide whether it is admitted.
    ///
    /// Rejected requests do not extend or reset the window.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let window_len = self.policy.window;

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window_len);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= window_len {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = window.count < self.policy.max_requests;
        if allowed {
            window.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(window.count),
            reset_after: window_len.saturating_sub(now.duration_since(window.started)),
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Client IP of the request, or [`UNKNOWN_CLIENT`] when the server was not
/// started with connection info.
pub fn client_ip(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

// =============================================================================
// Axum Middleware
// =============================================================================

#[derive(Debug, Serialize)]
struct RateLimitBody {
    status: &'static str,
    message: &'static str,
}

/// Rate limiting middleware.
///
/// Use with `axum::middleware::from_fn_with_state` on a single route so
/// each route group keeps its own quota.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(request.extensions());
    let decision = limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(
            limiter = limiter.name,
            client = %key,
            retry_after_secs = ceil_secs(decision.reset_after),
            "Rate limit exceeded"
        );
        let mut rejected = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitBody {
                status: "error",
                message: RATE_LIMIT_MESSAGE,
            }),
        )
            .into_response();
        rejected.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from(ceil_secs(decision.reset_after)),
        );
        rejected
    };

    apply_headers(response.headers_mut(), &limiter.policy, &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, policy: &RateLimitPolicy, decision: &RateLimitDecision) {
    if let Ok(value) = HeaderValue::from_str(&policy.header_value()) {
        headers.insert(RATELIMIT_POLICY, value);
    }
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(
        RATELIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATELIMIT_RESET,
        HeaderValue::from(ceil_secs(decision.reset_after)),
    );
}

/// Whole seconds, rounded up.
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

// =============================================================================
// Tests
// =============================================================================
