//! Feedback domain types, validation, and input cleaning.
//!
//! A submission travels through this module before it ever touches storage:
//!
//! ```text
//! JSON body ──▶ FeedbackSubmission ──▶ validate ──▶ ValidFeedback
//!                                                      │
//!                                                      ▼
//!                              NewFeedback ◀── sanitize (text only)
//! ```

mod sanitize;
mod validate;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sanitize::Sanitizer;
pub use validate::{
    validate_submission, FeedbackSubmission, ValidFeedback, MAX_FEEDBACK_LENGTH,
    MIN_FEEDBACK_LENGTH,
};

// =============================================================================
// Feedback Category
// =============================================================================

/// The closed set of feedback categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    #[serde(alias = "kritik")]
    Critique,
    #[serde(alias = "saran")]
    Suggestion,
    #[serde(alias = "apresiasi")]
    Appreciation,
}

impl FeedbackType {
    /// All categories, in display order.
    pub const ALL: [FeedbackType; 3] = [
        FeedbackType::Critique,
        FeedbackType::Suggestion,
        FeedbackType::Appreciation,
    ];

    /// Parse a wire value.
    ///
    /// Accepts the canonical names and the Indonesian labels used by the web
    /// form (`kritik`, `saran`, `apresiasi`). Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "critique" | "kritik" => Some(FeedbackType::Critique),
            "suggestion" | "saran" => Some(FeedbackType::Suggestion),
            "appreciation" | "apresiasi" => Some(FeedbackType::Appreciation),
            _ => None,
        }
    }

    /// Canonical name as stored and returned.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Critique => "critique",
            FeedbackType::Suggestion => "suggestion",
            FeedbackType::Appreciation => "appreciation",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// Where a submission came from. Stored for abuse monitoring, never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Remote IP address of the connection
    pub address: Option<String>,

    /// `User-Agent` header, if sent
    pub agent: Option<String>,
}

/// A validated, sanitized submission ready to be inserted.
///
/// `createdAt` is stamped by the gateway at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    pub kind: FeedbackType,
    pub feedback: String,
    pub client: ClientInfo,
}

/// A stored record as exposed to readers.
///
/// Has no client fields at all, so a serialized record can never leak them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRecord {
    /// Store-assigned identifier
    pub id: String,

    #[serde(rename = "type")]
    pub kind: FeedbackType,

    pub feedback: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
