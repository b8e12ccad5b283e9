//! Single-item command handlers
//!
//! Synchronous create/update/delete for one category or product, plus the
//! read paths the HTTP API needs. No upload job is involved.

use catalog_common::events::{CatalogEvent, ChangeKind, EventBus};
use catalog_common::Error;
use sqlx::SqlitePool;

use crate::db::products::ProductRecord;
use crate::db::{categories, products};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    normalize_specifications, Category, CreateCategoryModel, CreateProductModel, Product,
    ProductView, UpdateCategoryModel, UpdateProductModel, DEFAULT_CATEGORY_ID,
};
use crate::services::reconciler::reconcile;
use crate::services::validator::Validate;
use crate::utils::retry_on_lock;

/// Category a product with `requested` category id ends up in.
///
/// Unknown and soft-deleted categories fall back to the default category.
pub async fn resolve_category(db: &SqlitePool, requested: i64) -> CatalogResult<Category> {
    if let Some(category) = categories::get_category(db, requested, false).await? {
        return Ok(category);
    }

    tracing::info!(
        requested_category_id = requested,
        fallback_category_id = DEFAULT_CATEGORY_ID,
        "Category not found, using default category"
    );

    categories::get_category(db, DEFAULT_CATEGORY_ID, false)
        .await?
        .ok_or_else(|| {
            CatalogError::Common(Error::Internal("Default category is missing".to_string()))
        })
}

/// Handlers for single-item catalog commands
#[derive(Clone)]
pub struct CatalogCommands {
    db: SqlitePool,
    event_bus: EventBus,
    max_lock_wait_ms: u64,
}

impl CatalogCommands {
    pub fn new(db: SqlitePool, event_bus: EventBus, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            event_bus,
            max_lock_wait_ms,
        }
    }

    fn emit_category(&self, category_id: i64, change: ChangeKind) {
        self.event_bus.emit_lossy(CatalogEvent::CategoryChanged {
            category_id,
            change,
            timestamp: catalog_common::time::now(),
        });
    }

    fn emit_product(&self, product_id: i64, change: ChangeKind) {
        self.event_bus.emit_lossy(CatalogEvent::ProductChanged {
            product_id,
            change,
            timestamp: catalog_common::time::now(),
        });
    }

    // ---- Categories ----

    pub async fn get_category(&self, id: i64, include_deleted: bool) -> CatalogResult<Category> {
        categories::get_category(&self.db, id, include_deleted)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn list_categories(&self, include_deleted: bool) -> CatalogResult<Vec<Category>> {
        Ok(categories::list_categories(&self.db, include_deleted).await?)
    }

    /// Active products of an active category
    pub async fn list_category_products(&self, id: i64) -> CatalogResult<Vec<Product>> {
        self.get_category(id, false).await?;
        Ok(products::list_products_in_category(&self.db, id, false).await?)
    }

    pub async fn create_category(&self, model: CreateCategoryModel) -> CatalogResult<Category> {
        model.validate().into_result()?;

        let specifications = normalize_specifications(&model.specifications);
        let db = &self.db;
        let name = model.name.as_str();
        let description = model.description.as_deref();
        let specs = specifications.as_slice();

        let category = retry_on_lock("create category", self.max_lock_wait_ms, || async move {
            categories::insert_category(db, name, description, specs).await
        })
        .await?;

        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        self.emit_category(category.id, ChangeKind::Created);
        Ok(category)
    }

    /// Update a category and re-reconcile its products against the new
    /// specification list, all in one transaction
    pub async fn update_category(
        &self,
        id: i64,
        model: UpdateCategoryModel,
    ) -> CatalogResult<Category> {
        self.get_category(id, false).await?;
        model.validate().into_result()?;

        let specifications = normalize_specifications(&model.specifications);
        let db = &self.db;
        let name = model.name.as_str();
        let description = model.description.as_deref();
        let specs = specifications.as_slice();

        let (category, reconciled) =
            retry_on_lock("update category", self.max_lock_wait_ms, || async move {
                let mut tx = db.begin().await?;
                let category =
                    categories::update_category(&mut *tx, id, name, description, specs).await?;

                let owned = products::list_products_in_category(&mut *tx, id, false).await?;
                let mut reconciled = 0usize;
                for product in owned {
                    let data = reconcile(specs, &product.specification_data);
                    if data != product.specification_data {
                        products::update_specification_data(&mut *tx, product.id, &data).await?;
                        reconciled += 1;
                    }
                }

                tx.commit().await?;
                Ok::<_, Error>((category, reconciled))
            })
            .await?;

        tracing::info!(
            category_id = id,
            products_reconciled = reconciled,
            "Category updated"
        );
        self.emit_category(id, ChangeKind::Updated);
        Ok(category)
    }

    /// Soft-delete a category and every product in it.
    ///
    /// The default category can never be deleted.
    pub async fn delete_category(&self, id: i64) -> CatalogResult<()> {
        if id == DEFAULT_CATEGORY_ID {
            return Err(CatalogError::InvalidOperation(
                "The default category cannot be deleted".to_string(),
            ));
        }
        self.get_category(id, false).await?;

        let db = &self.db;
        let (products_deleted, categories_deleted) =
            retry_on_lock("delete category", self.max_lock_wait_ms, || async move {
                let at = catalog_common::time::now();
                let mut tx = db.begin().await?;
                let products_deleted =
                    products::soft_delete_products_in_category(&mut *tx, id, at).await?;
                let categories_deleted = categories::soft_delete_category(&mut *tx, id, at).await?;
                tx.commit().await?;
                Ok::<_, Error>((products_deleted, categories_deleted))
            })
            .await?;

        // Lost a race with another delete
        if categories_deleted == 0 {
            return Err(CatalogError::NotFound(format!("Category {} not found", id)));
        }

        tracing::info!(category_id = id, products_deleted, "Category deleted");
        self.emit_category(id, ChangeKind::Deleted);
        Ok(())
    }

    // ---- Products ----

    pub async fn get_product(&self, id: i64, include_deleted: bool) -> CatalogResult<ProductView> {
        products::get_product(&self.db, id, include_deleted)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Product {} not found", id)))
    }

    pub async fn list_products(&self, include_deleted: bool) -> CatalogResult<Vec<ProductView>> {
        Ok(products::list_products(&self.db, include_deleted).await?)
    }

    pub async fn create_product(&self, model: CreateProductModel) -> CatalogResult<ProductView> {
        model.validate().into_result()?;

        let category = resolve_category(&self.db, model.category_id).await?;
        let record = ProductRecord {
            specification_data: reconcile(&category.specifications, &model.specification_data),
            name: model.name,
            description: model.description,
            category_id: category.id,
        };

        let db = &self.db;
        let record_ref = &record;
        let id = retry_on_lock("create product", self.max_lock_wait_ms, || async move {
            products::insert_product(db, record_ref).await
        })
        .await?;

        tracing::info!(product_id = id, category_id = category.id, "Product created");
        self.emit_product(id, ChangeKind::Created);
        self.get_product(id, false).await
    }

    /// Update a product.
    ///
    /// Without supplied specification data the product's current data is
    /// carried over and reconciled against the (possibly new) category.
    pub async fn update_product(
        &self,
        id: i64,
        model: UpdateProductModel,
    ) -> CatalogResult<ProductView> {
        let existing = self.get_product(id, false).await?;
        model.validate().into_result()?;

        let category = resolve_category(&self.db, model.category_id).await?;
        let supplied = model
            .specification_data
            .unwrap_or(existing.product.specification_data);
        let record = ProductRecord {
            specification_data: reconcile(&category.specifications, &supplied),
            name: model.name,
            description: model.description,
            category_id: category.id,
        };

        let db = &self.db;
        let record_ref = &record;
        let affected = retry_on_lock("update product", self.max_lock_wait_ms, || async move {
            products::update_product(db, id, record_ref).await
        })
        .await?;

        if affected == 0 {
            return Err(CatalogError::NotFound(format!("Product {} not found", id)));
        }

        tracing::info!(product_id = id, category_id = category.id, "Product updated");
        self.emit_product(id, ChangeKind::Updated);
        self.get_product(id, false).await
    }

    pub async fn delete_product(&self, id: i64) -> CatalogResult<()> {
        let db = &self.db;
        let affected = retry_on_lock("delete product", self.max_lock_wait_ms, || async move {
            products::soft_delete_product(db, id, catalog_common::time::now()).await
        })
        .await?;

        if affected == 0 {
            return Err(CatalogError::NotFound(format!("Product {} not found", id)));
        }

        tracing::info!(product_id = id, "Product deleted");
        self.emit_product(id, ChangeKind::Deleted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::SpecificationData;

    async fn commands() -> CatalogCommands {
        let pool = connect_in_memory().await.unwrap();
        CatalogCommands::new(pool, EventBus::new(16), 1000)
    }

    fn category(name: &str, specs: &[&str]) -> CreateCategoryModel {
        CreateCategoryModel {
            name: name.to_string(),
            description: None,
            specifications: specs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn product(name: &str, category_id: i64, data: &[(&str, &str)]) -> CreateProductModel {
        CreateProductModel {
            name: name.to_string(),
            description: None,
            category_id,
            specification_data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_product_reconciles_against_category() {
        let commands = commands().await;
        let phones = commands
            .create_category(category("Phones", &["Color", "Size"]))
            .await
            .unwrap();

        let view = commands
            .create_product(product("P1", phones.id, &[("Color", "Red"), ("Weight", "5kg")]))
            .await
            .unwrap();

        let mut expected = SpecificationData::new();
        expected.insert("Color".to_string(), "Red".to_string());
        expected.insert("Size".to_string(), String::new());
        assert_eq!(view.product.specification_data, expected);
        assert_eq!(view.category_name.as_deref(), Some("Phones"));
    }

    #[tokio::test]
    async fn test_unknown_category_falls_back_to_default() {
        let commands = commands().await;
        let view = commands
            .create_product(product("Widget", 999, &[]))
            .await
            .unwrap();
        assert_eq!(view.product.category_id, DEFAULT_CATEGORY_ID);
    }

    #[tokio::test]
    async fn test_invalid_create_is_validation_error() {
        let commands = commands().await;
        let result = commands.create_category(category("A", &[])).await;
        match result {
            Err(CatalogError::Validation(fields)) => assert!(fields.get("Name").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_category_rereconciles_products() {
        let commands = commands().await;
        let phones = commands
            .create_category(category("Phones", &["Color"]))
            .await
            .unwrap();
        let view = commands
            .create_product(product("P1", phones.id, &[("Color", "Red")]))
            .await
            .unwrap();

        commands
            .update_category(
                phones.id,
                UpdateCategoryModel {
                    name: "Phones".to_string(),
                    description: None,
                    specifications: vec!["Size".to_string(), "Color".to_string()],
                },
            )
            .await
            .unwrap();

        let reloaded = commands.get_product(view.product.id, false).await.unwrap();
        let pairs: Vec<(&str, &str)> = reloaded
            .product
            .specification_data
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Size", ""), ("Color", "Red")]);
    }

    #[tokio::test]
    async fn test_default_category_cannot_be_deleted() {
        let commands = commands().await;
        assert!(matches!(
            commands.delete_category(DEFAULT_CATEGORY_ID).await,
            Err(CatalogError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_category_cascades() {
        let commands = commands().await;
        let shirts = commands
            .create_category(category("Shirts", &[]))
            .await
            .unwrap();
        let a = commands
            .create_product(product("Tee", shirts.id, &[]))
            .await
            .unwrap();

        commands.delete_category(shirts.id).await.unwrap();

        assert!(matches!(
            commands.get_category(shirts.id, false).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(commands.get_product(a.product.id, false).await.is_err());
        let deleted = commands.get_product(a.product.id, true).await.unwrap();
        assert!(deleted.product.is_deleted());

        assert!(matches!(
            commands.delete_category(shirts.id).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_product_without_data_keeps_existing_values() {
        let commands = commands().await;
        let phones = commands
            .create_category(category("Phones", &["Color"]))
            .await
            .unwrap();
        let view = commands
            .create_product(product("P1", phones.id, &[("Color", "Blue")]))
            .await
            .unwrap();

        let updated = commands
            .update_product(
                view.product.id,
                UpdateProductModel {
                    name: "P1 Pro".to_string(),
                    description: Some("Upgraded".to_string()),
                    category_id: phones.id,
                    specification_data: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.product.name, "P1 Pro");
        assert_eq!(
            updated.product.specification_data.get("Color").map(String::as_str),
            Some("Blue")
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let commands = commands().await;
        assert!(matches!(
            commands.delete_product(42).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            commands
                .update_category(42, UpdateCategoryModel {
                    name: "Valid".to_string(),
                    description: None,
                    specifications: vec![],
                })
                .await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            commands.list_category_products(42).await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
