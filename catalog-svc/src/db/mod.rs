//! Catalog store: SQLite persistence for categories, products and upload jobs
//!
//! Single-statement functions take any `SqliteExecutor`, so callers can pass
//! either `&SqlitePool` or `&mut *tx` when several writes must commit together.

pub mod categories;
pub mod dead_letters;
pub mod products;
pub mod upload_jobs;

use catalog_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::models::{DEFAULT_CATEGORY_ID, DEFAULT_CATEGORY_NAME};

/// Initialize database connection pool
///
/// Creates the database file if needed and the catalog tables if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the catalog schema
///
/// Limited to one connection: every connection to `sqlite::memory:` is a
/// separate database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create catalog tables and seed the default category (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            specifications TEXT NOT NULL DEFAULT '[]',
            source_job_id TEXT,
            source_row INTEGER,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL,
            date_deleted TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            specification_data TEXT NOT NULL DEFAULT '{}',
            source_job_id TEXT,
            source_row INTEGER,
            date_created TEXT NOT NULL,
            date_updated TEXT NOT NULL,
            date_deleted TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Upload rows are keyed by (job, row) so a replayed job cannot insert twice
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_source ON categories(source_job_id, source_row)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_products_source ON products(source_job_id, source_row)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_jobs (
            id TEXT PRIMARY KEY,
            entity_kind TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_format TEXT NOT NULL,
            payload TEXT NOT NULL,
            phase TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            total INTEGER NOT NULL DEFAULT 0,
            succeeded INTEGER NOT NULL DEFAULT 0,
            failure TEXT,
            status TEXT NOT NULL,
            claimed INTEGER NOT NULL DEFAULT 0,
            submitted_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dead_letters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue TEXT NOT NULL,
            message_type TEXT NOT NULL,
            body TEXT NOT NULL,
            error TEXT NOT NULL,
            failed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let now = catalog_common::time::now();
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO categories (id, name, description, specifications, date_created, date_updated)
        VALUES (?, ?, NULL, '[]', ?, ?)
        "#,
    )
    .bind(DEFAULT_CATEGORY_ID)
    .bind(DEFAULT_CATEGORY_NAME)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (categories, products, upload_jobs, dead_letters)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent_and_seeds_default() {
        let pool = connect_in_memory().await.unwrap();
        init_tables(&pool).await.unwrap();

        let default = categories::get_category(&pool, DEFAULT_CATEGORY_ID, false)
            .await
            .unwrap()
            .expect("default category seeded");
        assert_eq!(default.name, DEFAULT_CATEGORY_NAME);

        let all = categories::list_categories(&pool, true).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_file_database_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("catalog.db");
        let pool = init_database_pool(&path).await.unwrap();
        assert!(path.exists());
        pool.close().await;
    }
}
