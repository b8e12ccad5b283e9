//! Catalog services
//!
//! Pure helpers (reconciler, validator, record parser) and the two
//! stateful services built on them: the upload orchestrator for batch
//! files and the single-item command handlers.

pub mod catalog_commands;
pub mod reconciler;
pub mod record_parser;
pub mod upload_orchestrator;
pub mod validator;

pub use catalog_commands::CatalogCommands;
pub use reconciler::reconcile;
pub use upload_orchestrator::UploadOrchestrator;
pub use validator::{FieldErrors, Validate, ValidationResult};
