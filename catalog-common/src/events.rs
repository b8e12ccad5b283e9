//! Event types for the catalog event system
//!
//! Events are broadcast in-process over a tokio broadcast channel. Upload jobs
//! report their progress here so SSE clients can follow a job without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Catalog event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// A file was accepted and its upload job persisted
    UploadSubmitted {
        job_id: Uuid,
        entity_kind: String,
        timestamp: DateTime<Utc>,
    },

    /// An upload job advanced (one record added or skipped)
    UploadProgress {
        job_id: Uuid,
        processed: usize,
        succeeded: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// An upload job reached `Completed`
    UploadCompleted {
        job_id: Uuid,
        succeeded: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// An upload job reached `Failed`
    UploadFailed {
        job_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A category was created, updated or deleted
    CategoryChanged {
        category_id: i64,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },

    /// A product was created, updated or deleted
    ProductChanged {
        product_id: i64,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl CatalogEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::UploadSubmitted { .. } => "UploadSubmitted",
            CatalogEvent::UploadProgress { .. } => "UploadProgress",
            CatalogEvent::UploadCompleted { .. } => "UploadCompleted",
            CatalogEvent::UploadFailed { .. } => "UploadFailed",
            CatalogEvent::CategoryChanged { .. } => "CategoryChanged",
            CatalogEvent::ProductChanged { .. } => "ProductChanged",
        }
    }

    /// True for the upload job lifecycle events
    pub fn is_upload_event(&self) -> bool {
        matches!(
            self,
            CatalogEvent::UploadSubmitted { .. }
                | CatalogEvent::UploadProgress { .. }
                | CatalogEvent::UploadCompleted { .. }
                | CatalogEvent::UploadFailed { .. }
        )
    }
}

/// Broadcast bus for [`CatalogEvent`]s
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CatalogEvent,
    ) -> Result<usize, broadcast::error::SendError<CatalogEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CatalogEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
