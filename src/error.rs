use thiserror::Error;

/// Reasons a feedback submission is rejected before it reaches storage.
///
/// The display strings are user-facing and returned verbatim in 400 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `type` or `feedback` is absent, null, false, zero, or blank
    #[error("Type and feedback are required")]
    MissingField,

    /// `type` is not one of the accepted categories
    #[error("Invalid feedback type")]
    InvalidType,

    /// `feedback` is not text, or its trimmed length is outside 5..=500
    #[error("Feedback must be between 5 and 500 characters")]
    InvalidLength,
}

/// Errors raised by the persistence gateway.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached within the server selection timeout
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write was sent but not acknowledged within the write timeout
    #[error("Write acknowledgement timed out: {0}")]
    WriteTimeout(String),

    /// Any other driver or (de)serialization failure
    #[error("Storage error: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether the failure is a transient server-side condition (HTTP 503).
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::WriteTimeout(_))
    }
}

/// Everything a feedback route handler can fail with.
///
/// Converted into an HTTP response in exactly one place,
/// [`ApiFailure`](crate::server::handlers::ApiFailure).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body was not a JSON object
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Persistence gateway failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
