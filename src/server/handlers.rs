//! HTTP request handlers for the feedback API.
//!
//! # Endpoints
//!
//! - `POST /api/feedback` - Submit feedback
//! - `GET /api/feedback` - List the most recent feedback
//! - `GET /api/health` - Health check (pings the store)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ValidationError};
use crate::feedback::{
    validate_submission, ClientInfo, FeedbackRecord, FeedbackSubmission, NewFeedback, Sanitizer,
};
use crate::store::{FeedbackStore, DEFAULT_LIST_LIMIT};

use super::session::Session;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: FeedbackStore> {
    /// Persistence gateway
    pub store: Arc<S>,

    /// Markup stripper applied to every submission
    pub sanitizer: Arc<Sanitizer>,

    /// Number of records returned by the list endpoint
    pub list_limit: u32,

    /// Environment tag reported by the health endpoint
    pub environment: Arc<str>,

    /// Whether 500 responses may carry the underlying error message
    pub expose_details: bool,
}

impl<S: FeedbackStore> AppState<S> {
    /// Create application state with development defaults.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Create application state around an already shared store.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            sanitizer: Arc::new(Sanitizer::new()),
            list_limit: DEFAULT_LIST_LIMIT,
            environment: Arc::from("development"),
            expose_details: true,
        }
    }

    /// Set the list endpoint limit.
    pub fn with_list_limit(mut self, list_limit: u32) -> Self {
        self.list_limit = list_limit;
        self
    }

    /// Set the environment tag. Production hides internal error messages.
    pub fn with_environment(mut self, environment: impl Into<String>, production: bool) -> Self {
        self.environment = Arc::from(environment.into());
        self.expose_details = !production;
        self
    }

    fn failure(&self, error: impl Into<ApiError>) -> ApiFailure {
        ApiFailure {
            error: error.into(),
            expose_details: self.expose_details,
        }
    }
}

impl<S: FeedbackStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sanitizer: Arc::clone(&self.sanitizer),
            list_limit: self.list_limit,
            environment: Arc::clone(&self.environment),
            expose_details: self.expose_details,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned by the feedback routes and the security stages.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
}

/// Response from the list endpoint.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<FeedbackRecord>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `OK` or `ERROR`
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// The single place where handler errors become HTTP responses.
///
/// 4xx errors are logged at WARN level, 5xx at ERROR level with the full
/// underlying message. The client only sees the full message when
/// `expose_details` is set.
#[derive(Debug)]
pub struct ApiFailure {
    pub error: ApiError,
    pub expose_details: bool,
}

impl ApiFailure {
    fn status_and_message(&self) -> (StatusCode, String) {
        match &self.error {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::MalformedBody(_) => {
                (StatusCode::BAD_REQUEST, "Invalid JSON body".to_string())
            }
            ApiError::Store(e) if e.is_transient() => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database error occurred".to_string(),
            ),
            ApiError::Store(e) => {
                let message = if self.expose_details {
                    e.to_string()
                } else {
                    "Internal server error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.error, "Server error");
        } else {
            warn!(status = status.as_u16(), error = %self.error, "Client error");
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// =============================================================================
// Extractors
// =============================================================================

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ClientInfo { address, agent })
    }
}

/// Parse the request body.
///
/// Bodies that are not declared as JSON, and empty bodies, are read as an
/// empty submission so they fail field validation instead of parsing.
fn parse_submission(headers: &HeaderMap, body: &[u8]) -> Result<FeedbackSubmission, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false);

    if !is_json || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FeedbackSubmission::default());
    }

    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle feedback submissions.
///
/// # Endpoint
///
/// `POST /api/feedback`
///
/// # Request
///
/// ```json
/// { "type": "critique", "feedback": "The canteen queue is too long" }
/// ```
///
/// # Response
///
/// - `201 Created`: `{"success":true,"message":"Feedback saved successfully","id":"..."}`
/// - `400 Bad Request`: Validation failure or malformed JSON
/// - `503 Service Unavailable`: Store unreachable or write not acknowledged
/// - `500 Internal Server Error`: Any other storage failure
pub async fn submit_feedback_handler<S: FeedbackStore>(
    State(state): State<AppState<S>>,
    session: Session,
    client: ClientInfo,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiFailure> {
    let submission = parse_submission(&headers, &body).map_err(|e| state.failure(e))?;
    let valid = validate_submission(&submission).map_err(|e| state.failure(e))?;

    let feedback = state.sanitizer.sanitize(&valid.text);
    if feedback.is_empty() {
        return Err(state.failure(ValidationError::InvalidLength));
    }

    let id = state
        .store
        .insert(NewFeedback {
            kind: valid.kind,
            feedback,
            client,
        })
        .await
        .map_err(|e| state.failure(e))?;

    info!(id = %id, kind = %valid.kind, session = %session.id, "Feedback saved");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "Feedback saved successfully".to_string(),
            id,
        }),
    ))
}

/// Handle list requests.
///
/// # Endpoint
///
/// `GET /api/feedback`
///
/// # Response
///
/// `200 OK` with the newest records first:
/// ```json
/// {
///   "success": true,
///   "data": [{ "id": "...", "type": "suggestion", "feedback": "...", "createdAt": "..." }]
/// }
/// ```
pub async fn list_feedback_handler<S: FeedbackStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ListResponse>, ApiFailure> {
    let data = state
        .store
        .list_recent(state.list_limit)
        .await
        .map_err(|e| state.failure(e))?;

    debug!(count = data.len(), "Listed feedback");

    Ok(Json(ListResponse {
        success: true,
        data,
    }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /api/health`
///
/// # Response
///
/// - `200 OK`: `{"status":"OK","timestamp":"...","environment":"production"}`
/// - `503 Service Unavailable`: `{"status":"ERROR","message":"Database connection failed"}`
///
/// The store error is logged and never returned.
pub async fn health_handler<S: FeedbackStore>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".to_string(),
                timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                environment: Some(state.environment.to_string()),
                message: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "ERROR".to_string(),
                    timestamp: None,
                    environment: None,
                    message: Some("Database connection failed".to_string()),
                }),
            )
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}

// =============================================================================
// Tests
// =============================================================================
