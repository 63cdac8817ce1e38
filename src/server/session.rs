//! Signed session cookies.
//!
//! Every visitor gets an opaque session id in a `sid` cookie. The cookie
//! value is bound to its expiry and signed with HMAC-SHA256 so the server
//! can recognise its own sessions without keeping any server-side state:
//!
//! ```text
//! sid = "{session_id}.{expiry}.{hex(HMAC-SHA256(secret, "{session_id}.{expiry}"))}"
//! ```
//!
//! A request without a valid cookie (missing, tampered, expired, or signed
//! with another secret) is given a fresh session and a `Set-Cookie` header.
//! Cookies are `HttpOnly`, `SameSite=Strict`, scoped to `/`, and marked
//! `Secure` when the service runs in production.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Default session lifetime (1 hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// Types
// =============================================================================

/// Reasons a presented session cookie is not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Cookie value does not have the `id.expiry.signature` shape
    #[error("Malformed session cookie")]
    Malformed,

    /// Cookie expired at the given Unix time
    #[error("Session expired at {expired_at}")]
    Expired { expired_at: u64 },

    /// Signature does not match
    #[error("Invalid session signature")]
    InvalidSignature,
}

/// The session attached to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,

    /// Whether the session was created for this request
    pub is_new: bool,
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Issues and verifies signed session cookies.
#[derive(Clone)]
pub struct SessionSigner {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,

    /// How long an issued cookie stays valid
    ttl: Duration,

    /// Whether to add the `Secure` attribute
    secure: bool,
}

impl SessionSigner {
    /// Create a signer with the given secret and the default one-hour lifetime.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl: DEFAULT_SESSION_TTL,
            secure: false,
        }
    }

    /// Create a signer with a random, process-local secret.
    ///
    /// Sessions issued by one process are not recognised by another.
    pub fn with_random_secret() -> Self {
        Self::new(Uuid::new_v4().as_bytes())
    }

    /// Set the session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mark cookies `Secure` (HTTPS only).
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Produce a cookie value for `session_id` that expires at `expiry` (Unix seconds).
    pub fn sign_with_expiry(&self, session_id: &str, expiry: u64) -> String {
        let signature = self.compute_signature(session_id, expiry);
        format!("{}.{}.{}", session_id, expiry, signature)
    }

    /// Verify a cookie value and return the session id it carries.
    pub fn verify(&self, cookie_value: &str) -> Result<String, SessionError> {
        let mut parts = cookie_value.rsplitn(3, '.');
        let signature = parts.next().ok_or(SessionError::Malformed)?;
        let expiry = parts.next().ok_or(SessionError::Malformed)?;
        let session_id = parts.next().ok_or(SessionError::Malformed)?;

        if session_id.is_empty() {
            return Err(SessionError::Malformed);
        }

        let expiry: u64 = expiry.parse().map_err(|_| SessionError::Malformed)?;
        if unix_now() > expiry {
            return Err(SessionError::Expired { expired_at: expiry });
        }

        let provided = hex::decode(signature).map_err(|_| SessionError::Malformed)?;
        let expected = self.compute_mac(session_id, expiry);

        if provided.ct_eq(&expected).into() {
            Ok(session_id.to_string())
        } else {
            Err(SessionError::InvalidSignature)
        }
    }

    /// Start a new session, returning it with its `Set-Cookie` header value.
    pub fn issue(&self) -> (Session, String) {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            is_new: true,
        };
        let value = self.sign_with_expiry(&session.id, unix_now() + self.ttl.as_secs());
        (session, self.set_cookie(&value))
    }

    /// Render a `Set-Cookie` header value for an already signed cookie value.
    fn set_cookie(&self, value: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
            SESSION_COOKIE,
            value,
            self.ttl.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn compute_mac(&self, session_id: &str, expiry: u64) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(session_id.as_bytes());
        mac.update(b".");
        mac.update(expiry.to_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn compute_signature(&self, session_id: &str, expiry: u64) -> String {
        hex::encode(self.compute_mac(session_id, expiry))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Find a cookie by name across all `Cookie` headers.
fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Attach a [`Session`] to every request, issuing a cookie when needed.
pub async fn session_middleware(
    State(signer): State<SessionSigner>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = match read_cookie(request.headers(), SESSION_COOKIE) {
        Some(value) => match signer.verify(value) {
            Ok(id) => Some(id),
            Err(SessionError::InvalidSignature) => {
                warn!("Rejected session cookie with invalid signature");
                None
            }
            Err(e) => {
                debug!(error = %e, "Ignoring session cookie");
                None
            }
        },
        None => None,
    };

    let (session, set_cookie) = match existing {
        Some(id) => (Session { id, is_new: false }, None),
        None => {
            let (session, cookie) = signer.issue();
            (session, Some(cookie))
        }
    };

    request.extensions_mut().insert(session);
    let mut response = next.run(request).await;

    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Could not encode session cookie"),
        }
    }

    response
}

// =============================================================================
// Tests
// =============================================================================
