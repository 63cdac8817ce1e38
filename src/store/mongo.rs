//! MongoDB-backed feedback store.
//!
//! The driver's `Client` is itself a connection pool; this type holds one
//! client for the lifetime of the process and a typed handle to the
//! feedback collection.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, WriteConcern};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::feedback::{FeedbackRecord, FeedbackType, NewFeedback};

use super::FeedbackStore;

/// Server error code for a write concern that was not satisfied in time.
const WRITE_CONCERN_FAILED: i32 = 64;

// =============================================================================
// Settings
// =============================================================================

/// Connection and pool settings for [`MongoFeedbackStore`].
#[derive(Debug, Clone)]
pub struct MongoSettings {
    /// Connection string (`mongodb://` or `mongodb+srv://`)
    pub uri: String,

    /// Database holding the feedback collection
    pub database: String,

    /// Collection name
    pub collection: String,

    /// Maximum number of pooled connections
    pub max_pool_size: u32,

    /// Idle connections are evicted after this long
    pub max_idle_time: Duration,

    /// How long an insert waits for write acknowledgement
    pub write_timeout: Duration,

    /// How long an operation waits for a reachable server
    pub server_selection_timeout: Duration,
}

impl MongoSettings {
    /// Settings with the service defaults for everything but the URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: "feedbackDB".to_string(),
            collection: "feedbacks".to_string(),
            max_pool_size: 50,
            max_idle_time: Duration::from_millis(10_000),
            write_timeout: Duration::from_millis(2_500),
            server_selection_timeout: Duration::from_millis(5_000),
        }
    }
}

// =============================================================================
// Document Shape
// =============================================================================

/// Stored document layout.
#[derive(Debug, Serialize, Deserialize)]
struct FeedbackDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,

    #[serde(rename = "type")]
    kind: FeedbackType,

    feedback: String,

    #[serde(rename = "createdAt")]
    created_at: BsonDateTime,

    #[serde(
        rename = "clientAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    client_address: Option<String>,

    #[serde(rename = "clientAgent", default, skip_serializing_if = "Option::is_none")]
    client_agent: Option<String>,
}

impl FeedbackDocument {
    fn from_new(feedback: NewFeedback, created_at: BsonDateTime) -> Self {
        Self {
            id: None,
            kind: feedback.kind,
            feedback: feedback.feedback,
            created_at,
            client_address: feedback.client.address,
            client_agent: feedback.client.agent,
        }
    }

    /// Decode a raw document read back from the collection.
    fn decode(raw: Document) -> Result<FeedbackRecord, StoreError> {
        mongodb::bson::from_document::<Self>(raw)
            .map_err(|e| StoreError::Other(e.to_string()))?
            .into_record()
    }

    fn into_record(self) -> Result<FeedbackRecord, StoreError> {
        let id = self
            .id
            .ok_or_else(|| StoreError::Other("stored document has no _id".to_string()))?;

        Ok(FeedbackRecord {
            id: id.to_hex(),
            kind: self.kind,
            feedback: self.feedback,
            created_at: DateTime::<Utc>::from_timestamp_millis(self.created_at.timestamp_millis())
                .unwrap_or_default(),
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// [`FeedbackStore`] backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoFeedbackStore {
    client: Client,
    collection: Collection<FeedbackDocument>,

    /// Same collection, read as untyped documents so one bad entry cannot
    /// fail a whole listing
    raw: Collection<Document>,
}

impl MongoFeedbackStore {
    /// Build the pooled client.
    ///
    /// The driver connects lazily; call [`FeedbackStore::ping`] afterwards to
    /// find out whether the server is actually reachable.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(settings.uri.as_str())
            .await
            .map_err(classify)?;

        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.max_pool_size = Some(settings.max_pool_size);
        options.max_idle_time = Some(settings.max_idle_time);
        options.server_selection_timeout = Some(settings.server_selection_timeout);
        options.connect_timeout = Some(settings.server_selection_timeout);

        let mut write_concern = WriteConcern::default();
        write_concern.w_timeout = Some(settings.write_timeout);
        options.write_concern = Some(write_concern);

        let client = Client::with_options(options).map_err(classify)?;
        let collection = client
            .database(&settings.database)
            .collection::<FeedbackDocument>(&settings.collection);

        info!(
            database = %settings.database,
            collection = %settings.collection,
            max_pool_size = settings.max_pool_size,
            "MongoDB client configured"
        );

        let raw = collection.clone_with_type::<Document>();

        Ok(Self {
            client,
            collection,
            raw,
        })
    }
}

#[async_trait]
impl FeedbackStore for MongoFeedbackStore {
    async fn insert(&self, feedback: NewFeedback) -> Result<String, StoreError> {
        let document = FeedbackDocument::from_new(feedback, BsonDateTime::now());

        let result = self
            .collection
            .insert_one(&document)
            .await
            .map_err(classify)?;

        let id = match result.inserted_id.as_object_id() {
            Some(oid) => oid.to_hex(),
            None => result.inserted_id.to_string(),
        };

        debug!(id = %id, kind = %document.kind, "Feedback inserted");
        Ok(id)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<FeedbackRecord>, StoreError> {
        let mut cursor = self
            .raw
            .find(doc! {})
            .projection(doc! { "clientAddress": 0, "clientAgent": 0, "ip": 0, "userAgent": 0 })
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .limit(i64::from(limit))
            .await
            .map_err(classify)?;

        let mut records = Vec::new();
        while let Some(raw) = cursor.try_next().await.map_err(classify)? {
            let id = raw.get_object_id("_id").map(|oid| oid.to_hex()).ok();
            match FeedbackDocument::decode(raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(id = ?id, error = %e, "Skipping unreadable feedback document"),
            }
        }

        Ok(records)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing MongoDB client");
        self.client.clone().shutdown().await;
    }
}

/// Map a driver error onto the gateway's error kinds.
fn classify(err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Unavailable(err.to_string())
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(concern))
            if concern.code == WRITE_CONCERN_FAILED =>
        {
            StoreError::WriteTimeout(err.to_string())
        }
        _ => StoreError::Other(err.to_string()),
    }
}
