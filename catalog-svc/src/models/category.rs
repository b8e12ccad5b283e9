//! Category entity and its create/update models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted category (also the display model returned by the API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Canonical specification keys; order defines display and merge order
    pub specifications: Vec<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_deleted: Option<DateTime<Utc>>,
}

impl Category {
    pub fn is_deleted(&self) -> bool {
        self.date_deleted.is_some()
    }
}

/// Input for creating a category (HTTP body, queue message, or upload row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCategoryModel {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "Specifications")]
    pub specifications: Vec<String>,
}

/// Input for updating a category; the target id travels separately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCategoryModel {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "Specifications")]
    pub specifications: Vec<String>,
}

/// Trim names, drop blanks and repeated keys while keeping first-seen order
pub fn normalize_specifications(specifications: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(specifications.len());
    for spec in specifications {
        let spec = spec.trim();
        if !spec.is_empty() && !normalized.iter().any(|s| s == spec) {
            normalized.push(spec.to_string());
        }
    }
    normalized
}
