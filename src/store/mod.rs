//! Persistence gateway.
//!
//! The rest of the service talks to storage only through [`FeedbackStore`].
//! The production implementation is [`MongoFeedbackStore`]; tests plug in an
//! in-memory store.
//!
//! ```text
//! ┌──────────────┐   insert / list_recent / ping   ┌─────────────────────┐
//! │   handlers   │ ───────────────────────────────▶│  FeedbackStore impl │
//! └──────────────┘                                 └──────────┬──────────┘
//!                                                             │ pooled client
//!                                                             ▼
//!                                                      ┌─────────────┐
//!                                                      │   MongoDB   │
//!                                                      └─────────────┘
//! ```

mod mongo;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::feedback::{FeedbackRecord, NewFeedback};

pub use mongo::{MongoFeedbackStore, MongoSettings};

/// Default number of records returned by [`FeedbackStore::list_recent`].
pub const DEFAULT_LIST_LIMIT: u32 = 10;

/// Append-only storage for feedback records.
///
/// Implementations own their connection handle and acquire a connection per
/// call; nothing is held across requests.
#[async_trait]
pub trait FeedbackStore: Send + Sync + 'static {
    /// Persist a submission, stamping `createdAt` with the current time.
    ///
    /// Returns the identifier assigned by the store.
    async fn insert(&self, feedback: NewFeedback) -> Result<String, StoreError>;

    /// Return up to `limit` records, newest first.
    ///
    /// Records never carry client address or user agent.
    async fn list_recent(&self, limit: u32) -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the underlying connection pool.
    async fn close(&self) {}
}
