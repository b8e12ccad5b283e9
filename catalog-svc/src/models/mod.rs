//! Data models for the catalog service
//!
//! Categories and products are independent records keyed by id; a product
//! belongs to a category through `category_id` only.

pub mod category;
pub mod product;
pub mod upload_job;

pub use category::{normalize_specifications, Category, CreateCategoryModel, UpdateCategoryModel};
pub use product::{
    CreateProductModel, Product, ProductView, SpecificationData, UpdateProductModel,
};
pub use upload_job::{
    EntityKind, FileFormat, UploadJob, UploadPhase, UploadProgress, UploadStatusSummary,
};

/// Permanent "Uncategorized" category; fallback for unknown category ids, never deletable
pub const DEFAULT_CATEGORY_ID: i64 = 1;

/// Display name of the default category
pub const DEFAULT_CATEGORY_NAME: &str = "Uncategorized";
