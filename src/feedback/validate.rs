//! Field validation for incoming submissions.
//!
//! Rules are checked in a fixed order and the first failure wins:
//!
//! 1. `type` and `feedback` are both present and non-blank
//! 2. `type` names a known category
//! 3. `feedback` is text with a trimmed length in `5..=500`
//!
//! Fields are kept as raw JSON values so that a wrongly-typed field is
//! reported by the rule it violates instead of as a parse failure.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;

use super::FeedbackType;

/// Minimum trimmed feedback length, in characters.
pub const MIN_FEEDBACK_LENGTH: usize = 5;

/// Maximum trimmed feedback length, in characters.
pub const MAX_FEEDBACK_LENGTH: usize = 500;

/// Raw submission body, before any checks.
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(rename = "type", default)]
    pub kind: Option<Value>,

    #[serde(default)]
    pub feedback: Option<Value>,
}

/// A submission that passed validation. The text is trimmed but not yet sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeedback {
    pub kind: FeedbackType,
    pub text: String,
}

/// Validate a raw submission.
pub fn validate_submission(
    submission: &FeedbackSubmission,
) -> Result<ValidFeedback, ValidationError> {
    let (kind, feedback) = match (&submission.kind, &submission.feedback) {
        (Some(kind), Some(feedback)) if !is_blank(kind) && !is_blank(feedback) => {
            (kind, feedback)
        }
        _ => return Err(ValidationError::MissingField),
    };

    let kind = kind
        .as_str()
        .and_then(FeedbackType::parse)
        .ok_or(ValidationError::InvalidType)?;

    let text = feedback
        .as_str()
        .map(str::trim)
        .ok_or(ValidationError::InvalidLength)?;

    let length = text.chars().count();
    if !(MIN_FEEDBACK_LENGTH..=MAX_FEEDBACK_LENGTH).contains(&length) {
        return Err(ValidationError::InvalidLength);
    }

    Ok(ValidFeedback {
        kind,
        text: text.to_string(),
    })
}

/// Absent-like values: `null`, `false`, zero, and blank text.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
