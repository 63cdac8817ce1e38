//! Request hardening stages.
//!
//! Three independent middlewares, each either passing the request on or
//! answering it directly:
//!
//! - [`cors_guard_middleware`]: rejects requests whose `Origin` is not on the
//!   allow-list with `403`. Requests without an `Origin` header (same-origin,
//!   curl, server-to-server) pass.
//! - [`body_limit_middleware`]: rejects bodies larger than the configured cap
//!   with `413`, before any rate limit quota is consumed.
//! - [`security_headers_middleware`]: adds the hardening header set to every
//!   response, including rejections produced by the other stages.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, ORIGIN},
        HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use super::handlers::ErrorResponse;

/// Default request body cap (10 KiB).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024;

// =============================================================================
// CORS Guard
// =============================================================================

/// Origins allowed to make cross-origin requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    pub fn new<I, T>(origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            origins: origins
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Exact, case-sensitive match against the allow-list.
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.origins
    }
}

/// Reject requests from origins that are not allow-listed.
pub async fn cors_guard_middleware(
    State(allowed): State<Arc<AllowedOrigins>>,
    request: Request,
    next: Next,
) -> Response {
    let permitted = match request.headers().get(ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .map(|origin| allowed.is_allowed(origin))
            .unwrap_or(false),
    };

    if permitted {
        next.run(request).await
    } else {
        warn!(
            origin = ?request.headers().get(ORIGIN),
            method = %request.method(),
            path = %request.uri().path(),
            "Blocked cross-origin request"
        );
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Not allowed by CORS")),
        )
            .into_response()
    }
}

// =============================================================================
// Body Size Cap
// =============================================================================

/// Maximum accepted request body size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimit(pub usize);

impl Default for BodyLimit {
    fn default() -> Self {
        Self(DEFAULT_BODY_LIMIT)
    }
}

fn payload_too_large() -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(ErrorResponse::new("Request body too large")),
    )
        .into_response()
}

/// Buffer the request body, rejecting it once it exceeds the cap.
///
/// A declared `Content-Length` over the cap is rejected without reading the
/// body. Chunked bodies are read up to the cap and rejected if they go past it.
pub async fn body_limit_middleware(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(length) = declared {
        if length > limit as u64 {
            debug!(length, limit, "Rejected oversized body by Content-Length");
            return payload_too_large();
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, limit, "Rejected oversized body");
            return payload_too_large();
        }
    };

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

// =============================================================================
// Security Headers
// =============================================================================

/// The hardening header set added to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    /// Build the header set. `connect_origins` extend the CSP `connect-src`.
    pub fn new(connect_origins: &[String]) -> Self {
        let csp = content_security_policy(connect_origins);

        let fixed: [(&'static str, &'static str); 12] = [
            ("cross-origin-embedder-policy", "require-corp"),
            ("cross-origin-opener-policy", "same-origin"),
            ("cross-origin-resource-policy", "cross-origin"),
            ("origin-agent-cluster", "?1"),
            ("referrer-policy", "no-referrer"),
            (
                "strict-transport-security",
                "max-age=15552000; includeSubDomains",
            ),
            ("x-content-type-options", "nosniff"),
            ("x-dns-prefetch-control", "off"),
            ("x-download-options", "noopen"),
            ("x-frame-options", "SAMEORIGIN"),
            ("x-permitted-cross-domain-policies", "none"),
            ("x-xss-protection", "0"),
        ];

        let mut headers: Vec<(HeaderName, HeaderValue)> = fixed
            .into_iter()
            .map(|(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();

        match HeaderValue::from_str(&csp) {
            Ok(value) => headers.insert(
                0,
                (HeaderName::from_static("content-security-policy"), value),
            ),
            Err(e) => warn!(error = %e, "Content-Security-Policy is not a valid header value"),
        }

        Self { headers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }
}

fn content_security_policy(connect_origins: &[String]) -> String {
    let mut connect_src = String::from("'self'");
    for origin in connect_origins {
        connect_src.push(' ');
        connect_src.push_str(origin);
    }

    [
        "default-src 'self'".to_string(),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "script-src 'self'".to_string(),
        "img-src 'self' data: https:".to_string(),
        format!("connect-src {}", connect_src),
        "base-uri 'self'".to_string(),
        "font-src 'self' https: data:".to_string(),
        "form-action 'self'".to_string(),
        "frame-ancestors 'self'".to_string(),
        "object-src 'none'".to_string(),
        "script-src-attr 'none'".to_string(),
        "upgrade-insecure-requests".to_string(),
    ]
    .join(";")
}

/// Add the hardening headers to the response, leaving any header an inner
/// stage already set untouched.
pub async fn security_headers_middleware(
    State(security): State<Arc<SecurityHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in security.iter() {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    response
}

// =============================================================================
// Tests
// =============================================================================
