//! Upload job persistence
//!
//! The payload columns are written once at submission; afterwards only the
//! progress columns (phase, counters, status, claim) change.

use catalog_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use crate::models::{EntityKind, UploadJob, UploadPhase, UploadProgress};

const JOB_COLUMNS: &str = "id, entity_kind, file_name, file_format, payload, phase, processed, \
     total, succeeded, failure, claimed, submitted_at, updated_at";

fn job_from_row(row: &SqliteRow) -> Result<UploadJob> {
    let id: String = row.try_get("id")?;
    let id = catalog_common::uuid_utils::parse(&id)
        .map_err(|e| Error::Internal(format!("Failed to parse job id: {}", e)))?;

    let entity_kind: String = row.try_get("entity_kind")?;
    let entity_kind: EntityKind = entity_kind
        .parse()
        .map_err(|e| Error::Internal(format!("Failed to parse entity kind: {}", e)))?;

    let phase: String = row.try_get("phase")?;
    let phase: UploadPhase = phase
        .parse()
        .map_err(|e| Error::Internal(format!("Failed to parse phase: {}", e)))?;

    let progress = UploadProgress {
        phase,
        processed: row.try_get::<i64, _>("processed")? as usize,
        total: row.try_get::<i64, _>("total")? as usize,
        succeeded: row.try_get::<i64, _>("succeeded")? as usize,
        failure: row.try_get("failure")?,
    };

    Ok(UploadJob {
        id,
        entity_kind,
        file_name: row.try_get("file_name")?,
        file_format: row.try_get("file_format")?,
        payload: row.try_get("payload")?,
        progress,
        claimed: row.try_get::<i64, _>("claimed")? != 0,
        submitted_at: row.try_get("submitted_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Persist a newly submitted job
pub async fn insert_job<'e>(executor: impl SqliteExecutor<'e>, job: &UploadJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO upload_jobs (
            id, entity_kind, file_name, file_format, payload, phase,
            processed, total, succeeded, failure, status, claimed,
            submitted_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.entity_kind.as_str())
    .bind(&job.file_name)
    .bind(&job.file_format)
    .bind(&job.payload)
    .bind(job.progress.phase.as_str())
    .bind(job.progress.processed as i64)
    .bind(job.progress.total as i64)
    .bind(job.progress.succeeded as i64)
    .bind(&job.progress.failure)
    .bind(job.status())
    .bind(job.claimed)
    .bind(job.submitted_at)
    .bind(job.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a job by id
pub async fn load_job<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> Result<Option<UploadJob>> {
    let row = sqlx::query(&format!("SELECT {} FROM upload_jobs WHERE id = ?", JOB_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Persisted status string of a job
pub async fn load_status<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> Result<Option<String>> {
    let status = sqlx::query_scalar("SELECT status FROM upload_jobs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    Ok(status)
}

/// Write the job's progress, derived status and claim flag
pub async fn save_progress<'e>(executor: impl SqliteExecutor<'e>, job: &UploadJob) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET phase = ?, processed = ?, total = ?, succeeded = ?, failure = ?,
            status = ?, claimed = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(job.progress.phase.as_str())
    .bind(job.progress.processed as i64)
    .bind(job.progress.total as i64)
    .bind(job.progress.succeeded as i64)
    .bind(&job.progress.failure)
    .bind(job.status())
    .bind(job.claimed)
    .bind(job.updated_at)
    .bind(job.id.to_string())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Upload job not found: {}", job.id)));
    }
    Ok(())
}

/// Take the processing claim on an unfinished job.
///
/// Returns `false` if the job is terminal or another worker holds it.
pub async fn try_claim<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET claimed = 1
        WHERE id = ? AND claimed = 0 AND phase NOT IN ('COMPLETED', 'FAILED')
        "#,
    )
    .bind(id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unfinished jobs (oldest first) as `(id, kind)`
pub async fn list_unfinished<'e>(executor: impl SqliteExecutor<'e>) -> Result<Vec<(Uuid, EntityKind)>> {
    let rows = sqlx::query(
        r#"
        SELECT id, entity_kind
        FROM upload_jobs
        WHERE phase NOT IN ('COMPLETED', 'FAILED')
        ORDER BY submitted_at
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            let id = catalog_common::uuid_utils::parse(&id)
                .map_err(|e| Error::Internal(format!("Failed to parse job id: {}", e)))?;
            let kind: String = row.try_get("entity_kind")?;
            let kind: EntityKind = kind
                .parse()
                .map_err(|e| Error::Internal(format!("Failed to parse entity kind: {}", e)))?;
            Ok((id, kind))
        })
        .collect()
}

/// Clear the claim on one job, leaving its persisted cursor untouched
pub async fn release_claim<'e>(executor: impl SqliteExecutor<'e>, job_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE upload_jobs SET claimed = 0 WHERE id = ?")
        .bind(job_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Drop all claims on unfinished jobs; returns how many were released.
///
/// Only valid at startup, before any worker runs: a claim left behind then
/// belongs to a process that no longer exists.
pub async fn release_stale_claims<'e>(executor: impl SqliteExecutor<'e>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE upload_jobs SET claimed = 0 WHERE claimed = 1 AND phase NOT IN ('COMPLETED', 'FAILED')",
    )
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
