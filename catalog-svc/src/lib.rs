//! catalog-svc library interface
//!
//! Exposes the service's building blocks for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, CatalogError, CatalogResult};

use axum::Router;
use catalog_common::events::EventBus;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::queue::{MessageQueue, QueueReceivers};
use crate::services::{CatalogCommands, UploadOrchestrator};

/// Default buffer size of each message queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default buffer size of the event bus
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Default upper bound on retrying a locked database
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Application state shared across handlers and queue consumers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Sending side of the message queues
    pub queue: MessageQueue,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Bound on lock retries for store writes
    pub max_lock_wait_ms: u64,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        queue: MessageQueue,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            db,
            event_bus,
            queue,
            startup_time: Utc::now(),
            max_lock_wait_ms,
        }
    }

    /// State with default capacities; the caller owns the queue receivers
    pub fn with_defaults(db: SqlitePool) -> (Self, QueueReceivers) {
        let (queue, receivers) = MessageQueue::new(DEFAULT_QUEUE_CAPACITY);
        let state = Self::new(
            db,
            EventBus::new(DEFAULT_EVENT_CAPACITY),
            queue,
            DEFAULT_MAX_LOCK_WAIT_MS,
        );
        (state, receivers)
    }

    /// Upload orchestrator over this state's store, bus and queue
    pub fn uploads(&self) -> UploadOrchestrator {
        UploadOrchestrator::new(
            self.db.clone(),
            self.event_bus.clone(),
            self.queue.clone(),
            self.max_lock_wait_ms,
        )
    }

    /// Single-item command handlers over this state's store and bus
    pub fn commands(&self) -> CatalogCommands {
        CatalogCommands::new(self.db.clone(), self.event_bus.clone(), self.max_lock_wait_ms)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::category_routes())
        .merge(api::product_routes())
        .merge(api::upload_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
