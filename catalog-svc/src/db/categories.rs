//! Category persistence

use catalog_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use crate::models::Category;

const CATEGORY_COLUMNS: &str =
    "id, name, description, specifications, date_created, date_updated, date_deleted";

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    let specifications: String = row.try_get("specifications")?;
    let specifications: Vec<String> = serde_json::from_str(&specifications).map_err(|e| {
        Error::Internal(format!("Failed to deserialize specifications: {}", e))
    })?;

    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        specifications,
        date_created: row.try_get("date_created")?,
        date_updated: row.try_get("date_updated")?,
        date_deleted: row.try_get("date_deleted")?,
    })
}

fn specifications_json(specifications: &[String]) -> Result<String> {
    serde_json::to_string(specifications)
        .map_err(|e| Error::Internal(format!("Failed to serialize specifications: {}", e)))
}

/// Insert a category and return it with its generated id
pub async fn insert_category<'e>(
    executor: impl SqliteExecutor<'e>,
    name: &str,
    description: Option<&str>,
    specifications: &[String],
) -> Result<Category> {
    let now = catalog_common::time::now();
    let specifications = specifications_json(specifications)?;

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO categories (name, description, specifications, date_created, date_updated)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        CATEGORY_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(specifications)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    category_from_row(&row)
}

/// Insert a category that came from row `row_index` of an upload job.
///
/// Returns `false` when that row was already stored by an earlier attempt.
pub async fn insert_uploaded_category<'e>(
    executor: impl SqliteExecutor<'e>,
    job_id: Uuid,
    row_index: usize,
    name: &str,
    description: Option<&str>,
    specifications: &[String],
) -> Result<bool> {
    let now = catalog_common::time::now();
    let specifications = specifications_json(specifications)?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO categories
            (name, description, specifications, source_job_id, source_row, date_created, date_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(specifications)
    .bind(job_id.to_string())
    .bind(row_index as i64)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load a category; soft-deleted rows only when `include_deleted`
pub async fn get_category<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    include_deleted: bool,
) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE id = ? AND (? OR date_deleted IS NULL)",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .bind(include_deleted)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(category_from_row).transpose()
}

/// List categories ordered by id
pub async fn list_categories<'e>(
    executor: impl SqliteExecutor<'e>,
    include_deleted: bool,
) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE (? OR date_deleted IS NULL) ORDER BY id",
        CATEGORY_COLUMNS
    ))
    .bind(include_deleted)
    .fetch_all(executor)
    .await?;

    rows.iter().map(category_from_row).collect()
}

/// Overwrite the mutable fields of an active category
pub async fn update_category<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    name: &str,
    description: Option<&str>,
    specifications: &[String],
) -> Result<Category> {
    let now = catalog_common::time::now();
    let specifications = specifications_json(specifications)?;

    let row = sqlx::query(&format!(
        r#"
        UPDATE categories
        SET name = ?, description = ?, specifications = ?, date_updated = ?
        WHERE id = ? AND date_deleted IS NULL
        RETURNING {}
        "#,
        CATEGORY_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(specifications)
    .bind(now)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => category_from_row(&row),
        None => Err(Error::NotFound(format!("Category {} not found", id))),
    }
}

/// Mark an active category deleted; returns rows affected
pub async fn soft_delete_category<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE categories SET date_deleted = ?, date_updated = ? WHERE id = ? AND date_deleted IS NULL",
    )
    .bind(at)
    .bind(at)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
