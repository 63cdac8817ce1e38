//! Markup stripping for free-text feedback.
//!
//! Uses an `ammonia` cleaner with an empty tag and attribute allow-list, so
//! only text content survives. `script` and `style` elements are dropped
//! together with their content. Whatever `<`, `>` or `&` remains in the text
//! is entity-escaped, which makes the stored value inert when rendered.
//!
//! The cleaner is a pure string transformation: it builds an in-memory
//! fragment tree and never resolves or fetches external resources.

use std::collections::HashSet;

use ammonia::Builder;

/// Strips all markup from user-supplied text.
pub struct Sanitizer {
    cleaner: Builder<'static>,
}

impl Sanitizer {
    /// Create a sanitizer that allows no tags and no attributes.
    pub fn new() -> Self {
        let mut cleaner = Builder::empty();
        cleaner
            .clean_content_tags(HashSet::from(["script", "style"]))
            .strip_comments(true);
        Self { cleaner }
    }

    /// Return the plain-text content of `raw`, trimmed.
    ///
    /// Idempotent: sanitizing an already sanitized string returns it unchanged.
    pub fn sanitize(&self, raw: &str) -> String {
        self.cleaner.clean(raw).to_string().trim().to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
