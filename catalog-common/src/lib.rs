//! # Catalog Common Library
//!
//! Shared code for the product-catalog service including:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Event types (CatalogEvent enum) and the broadcast event bus
//! - Time and identifier helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
