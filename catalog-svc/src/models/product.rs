//! Product entity and its create/update models

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Specification key to value, in the owning category's key order
pub type SpecificationData = IndexMap<String, String>;

/// Persisted product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub specification_data: SpecificationData,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_deleted: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_deleted(&self) -> bool {
        self.date_deleted.is_some()
    }
}

/// Product display model: the product plus its category's name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
}

/// Input for creating a product (HTTP body, queue message, or upload row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProductModel {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(alias = "CategoryId", alias = "categoryId")]
    pub category_id: i64,
    #[serde(default, alias = "SpecificationData", alias = "specificationData")]
    pub specification_data: SpecificationData,
}

/// Input for updating a product; the target id travels separately
///
/// When `specification_data` is omitted the product's current values are
/// carried over and reconciled against the (possibly new) category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProductModel {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(alias = "CategoryId", alias = "categoryId")]
    pub category_id: i64,
    #[serde(default, alias = "SpecificationData", alias = "specificationData")]
    pub specification_data: Option<SpecificationData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_flattens_product_fields() {
        let now = Utc::now();
        let mut data = SpecificationData::new();
        data.insert("Color".to_string(), "Red".to_string());
        let view = ProductView {
            product: Product {
                id: 3,
                name: "Phone".to_string(),
                description: None,
                category_id: 2,
                specification_data: data,
                date_created: now,
                date_updated: now,
                date_deleted: None,
            },
            category_name: Some("Phones".to_string()),
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["category_name"], "Phones");
        assert_eq!(json["specification_data"]["Color"], "Red");
    }

    #[test]
    fn test_create_model_accepts_camel_case() {
        let model: CreateProductModel = serde_json::from_str(
            r#"{"name":"Phone","categoryId":4,"specificationData":{"Size":"M","Color":"Red"}}"#,
        )
        .unwrap();
        assert_eq!(model.category_id, 4);
        let keys: Vec<&str> = model.specification_data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Size", "Color"]);
    }
}
