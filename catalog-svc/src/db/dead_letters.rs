//! Dead-letter store for queue messages whose handler failed
//!
//! Dead-lettered messages are kept for inspection only; nothing replays them.

use catalog_common::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteExecutor};

/// A message that could not be handled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    pub id: i64,
    pub queue: String,
    pub message_type: String,
    pub body: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Record a failed message
pub async fn record_dead_letter<'e>(
    executor: impl SqliteExecutor<'e>,
    queue: &str,
    message_type: &str,
    body: &str,
    error: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO dead_letters (queue, message_type, body, error, failed_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(queue)
    .bind(message_type)
    .bind(body)
    .bind(error)
    .bind(catalog_common::time::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// All dead letters, oldest first
pub async fn list_dead_letters<'e>(executor: impl SqliteExecutor<'e>) -> Result<Vec<DeadLetter>> {
    let rows = sqlx::query(
        "SELECT id, queue, message_type, body, error, failed_at FROM dead_letters ORDER BY id",
    )
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DeadLetter {
                id: row.try_get("id")?,
                queue: row.try_get("queue")?,
                message_type: row.try_get("message_type")?,
                body: row.try_get("body")?,
                error: row.try_get("error")?,
                failed_at: row.try_get("failed_at")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_record_and_list() {
        let pool = connect_in_memory().await.unwrap();
        record_dead_letter(&pool, "product-upload", "ProductUpload", "{}", "boom")
            .await
            .unwrap();

        let letters = list_dead_letters(&pool).await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].queue, "product-upload");
        assert_eq!(letters[0].error, "boom");
    }
}
