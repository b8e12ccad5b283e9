//! Per-record validation rules
//!
//! Validation never mutates the record and never fails: it reports a
//! [`ValidationResult`] and the caller decides whether to skip the record
//! (batch uploads) or reject the request (single-item commands).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CatalogError;
use crate::models::{
    CreateCategoryModel, CreateProductModel, UpdateCategoryModel, UpdateProductModel,
};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MIN_CHARS: usize = 4;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Field name to ordered messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Outcome of validating one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: FieldErrors,
}

impl ValidationResult {
    fn from_errors(errors: FieldErrors) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Single-item path: turn a failed validation into an error
    pub fn into_result(self) -> Result<(), CatalogError> {
        if self.valid {
            Ok(())
        } else {
            Err(CatalogError::Validation(self.errors))
        }
    }
}

/// Records that can be validated
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("Name", "Name is required.");
        return;
    }
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        errors.add(
            "Name",
            format!(
                "Name must be between {} and {} characters.",
                NAME_MIN_CHARS, NAME_MAX_CHARS
            ),
        );
    }
}

fn check_description(errors: &mut FieldErrors, description: Option<&str>) {
    let Some(description) = description else {
        return;
    };
    let len = description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&len) {
        errors.add(
            "Description",
            format!(
                "Description must be between {} and {} characters.",
                DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS
            ),
        );
    }
}

// Create and update share the same lower bound.
fn check_category_id(errors: &mut FieldErrors, category_id: i64) {
    if category_id <= 0 {
        errors.add("CategoryId", "CategoryId must be greater than 0.");
    }
}

impl Validate for CreateCategoryModel {
    fn validate(&self) -> ValidationResult {
        let mut errors = FieldErrors::default();
        check_name(&mut errors, &self.name);
        check_description(&mut errors, self.description.as_deref());
        ValidationResult::from_errors(errors)
    }
}

impl Validate for UpdateCategoryModel {
    fn validate(&self) -> ValidationResult {
        let mut errors = FieldErrors::default();
        check_name(&mut errors, &self.name);
        check_description(&mut errors, self.description.as_deref());
        ValidationResult::from_errors(errors)
    }
}

impl Validate for CreateProductModel {
    fn validate(&self) -> ValidationResult {
        let mut errors = FieldErrors::default();
        check_name(&mut errors, &self.name);
        check_description(&mut errors, self.description.as_deref());
        check_category_id(&mut errors, self.category_id);
        ValidationResult::from_errors(errors)
    }
}

impl Validate for UpdateProductModel {
    fn validate(&self) -> ValidationResult {
        let mut errors = FieldErrors::default();
        check_name(&mut errors, &self.name);
        check_description(&mut errors, self.description.as_deref());
        check_category_id(&mut errors, self.category_id);
        ValidationResult::from_errors(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, description: Option<&str>) -> CreateCategoryModel {
        CreateCategoryModel {
            name: name.to_string(),
            description: description.map(str::to_string),
            specifications: Vec::new(),
        }
    }

    fn product(name: &str, category_id: i64) -> CreateProductModel {
        CreateProductModel {
            name: name.to_string(),
            description: None,
            category_id,
            specification_data: Default::default(),
        }
    }

    #[test]
    fn test_valid_category() {
        let result = category("Phones", Some("Mobile phones")).validate();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_name_rules() {
        let empty = category("   ", None).validate();
        assert!(!empty.valid);
        assert_eq!(empty.errors.get("Name").unwrap(), ["Name is required."]);

        assert!(!category("A", None).validate().valid);
        assert!(category("AB", None).validate().valid);
        assert!(category(&"x".repeat(50), None).validate().valid);
        assert!(!category(&"x".repeat(51), None).validate().valid);
    }

    #[test]
    fn test_name_length_counts_characters() {
        // Two multi-byte characters are still two characters
        assert!(category("éé", None).validate().valid);
    }

    #[test]
    fn test_description_rules() {
        assert!(category("Phones", None).validate().valid);
        let short = category("Phones", Some("abc")).validate();
        assert!(!short.valid);
        assert!(short.errors.get("Description").is_some());
        assert!(category("Phones", Some("abcd")).validate().valid);
        assert!(!category("Phones", Some(&"d".repeat(1001))).validate().valid);
    }

    #[test]
    fn test_category_id_bound_is_shared() {
        assert!(!product("Phone", 0).validate().valid);
        assert!(product("Phone", 1).validate().valid);

        let update = UpdateProductModel {
            name: "Phone".to_string(),
            description: None,
            category_id: 1,
            specification_data: None,
        };
        assert!(update.validate().valid);
        let update = UpdateProductModel {
            category_id: -3,
            ..update
        };
        assert_eq!(
            update.validate().errors.get("CategoryId").unwrap(),
            ["CategoryId must be greater than 0."]
        );
    }

    #[test]
    fn test_errors_accumulate_per_field() {
        let result = CreateProductModel {
            name: "".to_string(),
            description: Some("no".to_string()),
            category_id: 0,
            specification_data: Default::default(),
        }
        .validate();
        let fields: Vec<&str> = result.errors.fields().collect();
        assert_eq!(fields, vec!["Name", "Description", "CategoryId"]);
        assert!(matches!(
            result.into_result(),
            Err(CatalogError::Validation(_))
        ));
    }
}
