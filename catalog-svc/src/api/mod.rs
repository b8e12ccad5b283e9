//! HTTP API handlers for catalog-svc
//!
//! Thin callers of the command handlers and the upload orchestrator; all
//! rules live in `services`.

pub mod categories;
pub mod health;
pub mod products;
pub mod uploads;

pub use categories::category_routes;
pub use health::health_routes;
pub use products::product_routes;
pub use uploads::{upload_event_stream, upload_routes};

use serde::Deserialize;

/// `?include_deleted=true` on read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct IncludeDeleted {
    #[serde(default)]
    pub include_deleted: bool,
}
