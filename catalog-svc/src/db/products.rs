//! Product persistence

use catalog_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use crate::models::{Product, ProductView, SpecificationData};

/// Product fields as they are written (after category fallback and reconciliation)
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub name: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub specification_data: SpecificationData,
}

const PRODUCT_COLUMNS: &str = "p.id AS id, p.name AS name, p.description AS description, \
     p.category_id AS category_id, p.specification_data AS specification_data, \
     p.date_created AS date_created, p.date_updated AS date_updated, p.date_deleted AS date_deleted";

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    let specification_data: String = row.try_get("specification_data")?;
    let specification_data: SpecificationData = serde_json::from_str(&specification_data)
        .map_err(|e| Error::Internal(format!("Failed to deserialize specification data: {}", e)))?;

    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category_id: row.try_get("category_id")?,
        specification_data,
        date_created: row.try_get("date_created")?,
        date_updated: row.try_get("date_updated")?,
        date_deleted: row.try_get("date_deleted")?,
    })
}

fn view_from_row(row: &SqliteRow) -> Result<ProductView> {
    Ok(ProductView {
        product: product_from_row(row)?,
        category_name: row.try_get("category_name")?,
    })
}

fn specification_json(data: &SpecificationData) -> Result<String> {
    serde_json::to_string(data)
        .map_err(|e| Error::Internal(format!("Failed to serialize specification data: {}", e)))
}

/// Insert a product and return its id
pub async fn insert_product<'e>(
    executor: impl SqliteExecutor<'e>,
    record: &ProductRecord,
) -> Result<i64> {
    let now = catalog_common::time::now();
    let data = specification_json(&record.specification_data)?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO products (name, description, category_id, specification_data, date_created, date_updated)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.category_id)
    .bind(data)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Insert a product that came from row `row_index` of an upload job.
///
/// Returns `false` when that row was already stored by an earlier attempt.
pub async fn insert_uploaded_product<'e>(
    executor: impl SqliteExecutor<'e>,
    job_id: Uuid,
    row_index: usize,
    record: &ProductRecord,
) -> Result<bool> {
    let now = catalog_common::time::now();
    let data = specification_json(&record.specification_data)?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO products
            (name, description, category_id, specification_data, source_job_id, source_row, date_created, date_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.category_id)
    .bind(data)
    .bind(job_id.to_string())
    .bind(row_index as i64)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load one product with its category name
pub async fn get_product<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    include_deleted: bool,
) -> Result<Option<ProductView>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {}, c.name AS category_name
        FROM products p
        LEFT JOIN categories c ON c.id = p.category_id
        WHERE p.id = ? AND (? OR p.date_deleted IS NULL)
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(id)
    .bind(include_deleted)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(view_from_row).transpose()
}

/// List products with their category names, ordered by id
pub async fn list_products<'e>(
    executor: impl SqliteExecutor<'e>,
    include_deleted: bool,
) -> Result<Vec<ProductView>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, c.name AS category_name
        FROM products p
        LEFT JOIN categories c ON c.id = p.category_id
        WHERE (? OR p.date_deleted IS NULL)
        ORDER BY p.id
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(include_deleted)
    .fetch_all(executor)
    .await?;

    rows.iter().map(view_from_row).collect()
}

/// Products whose `category_id` is `category_id`
pub async fn list_products_in_category<'e>(
    executor: impl SqliteExecutor<'e>,
    category_id: i64,
    include_deleted: bool,
) -> Result<Vec<Product>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM products p
        WHERE p.category_id = ? AND (? OR p.date_deleted IS NULL)
        ORDER BY p.id
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(category_id)
    .bind(include_deleted)
    .fetch_all(executor)
    .await?;

    rows.iter().map(product_from_row).collect()
}

/// Overwrite the mutable fields of an active product; returns rows affected
pub async fn update_product<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    record: &ProductRecord,
) -> Result<u64> {
    let now = catalog_common::time::now();
    let data = specification_json(&record.specification_data)?;

    let result = sqlx::query(
        r#"
        UPDATE products
        SET name = ?, description = ?, category_id = ?, specification_data = ?, date_updated = ?
        WHERE id = ? AND date_deleted IS NULL
        "#,
    )
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.category_id)
    .bind(data)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Replace only a product's specification data
pub async fn update_specification_data<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    data: &SpecificationData,
) -> Result<()> {
    let now = catalog_common::time::now();
    let data = specification_json(data)?;

    sqlx::query("UPDATE products SET specification_data = ?, date_updated = ? WHERE id = ?")
        .bind(data)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Mark one active product deleted; returns rows affected
pub async fn soft_delete_product<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE products SET date_deleted = ?, date_updated = ? WHERE id = ? AND date_deleted IS NULL",
    )
    .bind(at)
    .bind(at)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Mark every active product of a category deleted; returns rows affected
pub async fn soft_delete_products_in_category<'e>(
    executor: impl SqliteExecutor<'e>,
    category_id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE products SET date_deleted = ?, date_updated = ? WHERE category_id = ? AND date_deleted IS NULL",
    )
    .bind(at)
    .bind(at)
    .bind(category_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
