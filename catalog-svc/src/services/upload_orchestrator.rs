//! Upload orchestrator
//!
//! Owns the upload job lifecycle and is the only writer of job progress.
//!
//! State progression:
//! SUBMITTED → PARSED → PROCESSING → COMPLETED, or FAILED when the file
//! cannot be decoded.
//!
//! Records are handled one at a time in file order. Each stored record and
//! the job cursor advance commit together, so a job restarted after a crash
//! resumes at the first unprocessed record.

use catalog_common::events::{CatalogEvent, EventBus};
use catalog_common::Error;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::products::ProductRecord;
use crate::db::{categories, products, upload_jobs};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    normalize_specifications, CreateCategoryModel, CreateProductModel, EntityKind, UploadJob,
    UploadStatusSummary,
};
use crate::queue::{Envelope, MessageQueue};
use crate::services::catalog_commands::resolve_category;
use crate::services::record_parser::{self, encode_payload};
use crate::services::reconciler::reconcile;
use crate::services::validator::{Validate, ValidationResult};
use crate::utils::retry_on_lock;

/// Decoded upload file
enum ParsedRecords {
    Categories(Vec<CreateCategoryModel>),
    Products(Vec<CreateProductModel>),
}

impl ParsedRecords {
    fn parse(job: &UploadJob) -> CatalogResult<Self> {
        match job.entity_kind {
            EntityKind::Category => Ok(ParsedRecords::Categories(record_parser::parse(
                &job.payload,
                &job.file_format,
            )?)),
            EntityKind::Product => Ok(ParsedRecords::Products(record_parser::parse(
                &job.payload,
                &job.file_format,
            )?)),
        }
    }

    fn len(&self) -> usize {
        match self {
            ParsedRecords::Categories(records) => records.len(),
            ParsedRecords::Products(records) => records.len(),
        }
    }

    fn validate(&self, index: usize) -> ValidationResult {
        match self {
            ParsedRecords::Categories(records) => records[index].validate(),
            ParsedRecords::Products(records) => records[index].validate(),
        }
    }
}

/// Upload orchestrator service
pub struct UploadOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    queue: MessageQueue,
    max_lock_wait_ms: u64,
}

impl UploadOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        queue: MessageQueue,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            db,
            event_bus,
            queue,
            max_lock_wait_ms,
        }
    }

    /// Accept a file: persist a new job and dispatch it for processing.
    ///
    /// Returns as soon as the job is queued; processing happens on the
    /// upload queue's consumer.
    pub async fn submit(
        &self,
        bytes: &[u8],
        kind: EntityKind,
        file_name: &str,
    ) -> CatalogResult<Uuid> {
        if bytes.is_empty() {
            return Err(CatalogError::EmptyFile);
        }

        let job = UploadJob::new(kind, file_name.to_string(), encode_payload(bytes));
        let job_id = job.id;

        let db = &self.db;
        let job_ref = &job;
        retry_on_lock("insert upload job", self.max_lock_wait_ms, || async move {
            upload_jobs::insert_job(db, job_ref).await
        })
        .await?;

        self.queue.publish(Envelope::upload(kind, job_id)).await?;

        tracing::info!(
            job_id = %job_id,
            kind = %kind,
            file_name = %job.file_name,
            file_format = %job.file_format,
            size_bytes = bytes.len(),
            "Upload submitted"
        );

        self.event_bus.emit_lossy(CatalogEvent::UploadSubmitted {
            job_id,
            entity_kind: kind.as_str().to_string(),
            timestamp: catalog_common::time::now(),
        });

        Ok(job_id)
    }

    /// Current status of a job
    pub async fn get_status(&self, job_id: Uuid) -> CatalogResult<UploadStatusSummary> {
        upload_jobs::load_job(&self.db, job_id)
            .await?
            .map(|job| job.summary())
            .ok_or_else(|| CatalogError::NotFound(format!("Upload job {} not found", job_id)))
    }

    /// Process one dispatched job.
    ///
    /// A terminal or already-claimed job is left alone. A file that cannot be
    /// decoded ends the job in FAILED and is not an error for the caller. Any
    /// other error releases the claim so a later delivery resumes at the
    /// persisted cursor.
    pub async fn process(&self, job_id: Uuid) -> CatalogResult<()> {
        let mut job = upload_jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Upload job {} not found", job_id)))?;

        if job.is_terminal() {
            tracing::info!(job_id = %job_id, phase = job.progress.phase.as_str(), "Job already finished, skipping");
            return Ok(());
        }

        if !upload_jobs::try_claim(&self.db, job_id).await? {
            tracing::info!(job_id = %job_id, "Job is claimed by another worker, skipping");
            return Ok(());
        }
        job.claimed = true;

        if let Err(err) = self.run_claimed(&mut job).await {
            tracing::warn!(
                job_id = %job_id,
                error = %err,
                "Upload processing interrupted, releasing claim"
            );
            if let Err(release_err) = upload_jobs::release_claim(&self.db, job_id).await {
                tracing::error!(
                    job_id = %job_id,
                    error = %release_err,
                    "Failed to release upload claim"
                );
            }
            return Err(err);
        }

        Ok(())
    }

    async fn run_claimed(&self, job: &mut UploadJob) -> CatalogResult<()> {
        tracing::info!(
            job_id = %job.id,
            kind = %job.entity_kind,
            resume_at = job.progress.processed,
            "Processing upload"
        );

        let records = match ParsedRecords::parse(job) {
            Ok(records) => records,
            Err(err) => return self.fail(job, err).await,
        };

        job.mark_parsed(records.len());
        self.save(job).await?;

        for index in job.progress.processed..records.len() {
            self.process_record(job, &records, index).await?;
        }

        job.complete();
        self.save(job).await?;

        tracing::info!(
            job_id = %job.id,
            succeeded = job.progress.succeeded,
            total = job.progress.total,
            "Upload completed"
        );

        self.event_bus.emit_lossy(CatalogEvent::UploadCompleted {
            job_id: job.id,
            succeeded: job.progress.succeeded,
            total: job.progress.total,
            timestamp: catalog_common::time::now(),
        });

        Ok(())
    }

    async fn process_record(
        &self,
        job: &mut UploadJob,
        records: &ParsedRecords,
        index: usize,
    ) -> CatalogResult<()> {
        let validation = records.validate(index);

        if !validation.valid {
            tracing::warn!(
                job_id = %job.id,
                row = index,
                errors = %validation.errors,
                "Skipping invalid record"
            );
            job.record_outcome(false);
            self.save(job).await?;
        } else {
            job.record_outcome(true);
            let inserted = match records {
                ParsedRecords::Categories(items) => self.store_category(job, index, &items[index]).await?,
                ParsedRecords::Products(items) => self.store_product(job, index, &items[index]).await?,
            };
            if !inserted {
                tracing::debug!(job_id = %job.id, row = index, "Record already stored");
            }
        }

        self.event_bus.emit_lossy(CatalogEvent::UploadProgress {
            job_id: job.id,
            processed: job.progress.processed,
            succeeded: job.progress.succeeded,
            total: job.progress.total,
            timestamp: catalog_common::time::now(),
        });

        Ok(())
    }

    /// Insert one category row and persist `job`'s advanced cursor together
    async fn store_category(
        &self,
        job: &UploadJob,
        index: usize,
        record: &CreateCategoryModel,
    ) -> CatalogResult<bool> {
        let specifications = normalize_specifications(&record.specifications);
        let db = &self.db;
        let name = record.name.as_str();
        let description = record.description.as_deref();
        let specs = specifications.as_slice();

        let inserted = retry_on_lock("store uploaded category", self.max_lock_wait_ms, || async move {
            let mut tx = db.begin().await?;
            let inserted = categories::insert_uploaded_category(
                &mut *tx,
                job.id,
                index,
                name,
                description,
                specs,
            )
            .await?;
            upload_jobs::save_progress(&mut *tx, job).await?;
            tx.commit().await?;
            Ok::<_, Error>(inserted)
        })
        .await?;

        Ok(inserted)
    }

    /// Resolve the category, reconcile, then insert one product row and
    /// persist `job`'s advanced cursor together
    async fn store_product(
        &self,
        job: &UploadJob,
        index: usize,
        record: &CreateProductModel,
    ) -> CatalogResult<bool> {
        let category = resolve_category(&self.db, record.category_id).await?;
        let product = ProductRecord {
            name: record.name.clone(),
            description: record.description.clone(),
            category_id: category.id,
            specification_data: reconcile(&category.specifications, &record.specification_data),
        };

        let db = &self.db;
        let product_ref = &product;
        let inserted = retry_on_lock("store uploaded product", self.max_lock_wait_ms, || async move {
            let mut tx = db.begin().await?;
            let inserted =
                products::insert_uploaded_product(&mut *tx, job.id, index, product_ref).await?;
            upload_jobs::save_progress(&mut *tx, job).await?;
            tx.commit().await?;
            Ok::<_, Error>(inserted)
        })
        .await?;

        Ok(inserted)
    }

    async fn save(&self, job: &UploadJob) -> CatalogResult<()> {
        let db = &self.db;
        retry_on_lock("save upload progress", self.max_lock_wait_ms, || async move {
            upload_jobs::save_progress(db, job).await
        })
        .await?;
        Ok(())
    }

    async fn fail(&self, job: &mut UploadJob, err: CatalogError) -> CatalogResult<()> {
        let reason = err.to_string();
        tracing::warn!(job_id = %job.id, reason = %reason, "Upload failed");

        job.fail(reason.clone());
        self.save(job).await?;

        self.event_bus.emit_lossy(CatalogEvent::UploadFailed {
            job_id: job.id,
            reason,
            timestamp: catalog_common::time::now(),
        });

        Ok(())
    }

    /// Re-dispatch every unfinished job; run once at startup.
    ///
    /// Claims left behind by a previous process are released first.
    pub async fn resume_unfinished(&self) -> CatalogResult<usize> {
        let released = upload_jobs::release_stale_claims(&self.db).await?;
        let unfinished = upload_jobs::list_unfinished(&self.db).await?;

        for (job_id, kind) in &unfinished {
            self.queue.publish(Envelope::upload(*kind, *job_id)).await?;
        }

        if !unfinished.is_empty() {
            tracing::info!(
                released_claims = released,
                jobs = unfinished.len(),
                "Re-dispatched unfinished upload jobs"
            );
        }

        Ok(unfinished.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::UploadPhase;
    use crate::queue::{MessageType, QueueReceivers};

    async fn orchestrator() -> (UploadOrchestrator, QueueReceivers) {
        let pool = connect_in_memory().await.unwrap();
        let (queue, receivers) = MessageQueue::new(16);
        (
            UploadOrchestrator::new(pool, EventBus::new(64), queue, 1000),
            receivers,
        )
    }

    #[tokio::test]
    async fn test_submit_persists_and_dispatches() {
        let (orchestrator, mut receivers) = orchestrator().await;
        let job_id = orchestrator
            .submit(b"Name\nPhones\n", EntityKind::Category, "cats.csv")
            .await
            .unwrap();

        let status = orchestrator.get_status(job_id).await.unwrap();
        assert_eq!(status.status, "Uploaded the file");
        assert_eq!(status.phase, UploadPhase::Submitted);

        let envelope = receivers.category_upload.recv().await.unwrap();
        assert_eq!(envelope.message_type, MessageType::CategoryUpload);
        assert_eq!(envelope.body["job_id"], job_id.to_string());
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let (orchestrator, _receivers) = orchestrator().await;
        assert!(matches!(
            orchestrator.submit(b"", EntityKind::Product, "p.csv").await,
            Err(CatalogError::EmptyFile)
        ));
    }

    #[tokio::test]
    async fn test_process_counts_valid_and_invalid() {
        let (orchestrator, _receivers) = orchestrator().await;
        let job_id = orchestrator
            .submit(
                b"Name,Description\nPhones,Mobile phones\nX,bad\nLaptops,\n",
                EntityKind::Category,
                "cats.csv",
            )
            .await
            .unwrap();

        orchestrator.process(job_id).await.unwrap();

        let status = orchestrator.get_status(job_id).await.unwrap();
        assert_eq!(status.phase, UploadPhase::Completed);
        assert_eq!(status.succeeded, 2);
        assert_eq!(status.invalid, 1);
        assert_eq!(
            status.status,
            "Upload completed: 2/3 categories were added successfully. The rest 1 categories were invalid."
        );
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_job() {
        let (orchestrator, _receivers) = orchestrator().await;
        let job_id = orchestrator
            .submit(b"whatever", EntityKind::Product, "items.xlsx")
            .await
            .unwrap();

        orchestrator.process(job_id).await.unwrap();

        let status = orchestrator.get_status(job_id).await.unwrap();
        assert!(status.failed);
        assert_eq!(status.status, "Upload failed: Unsupported file format: xlsx");
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let (orchestrator, _receivers) = orchestrator().await;
        assert!(matches!(
            orchestrator.process(Uuid::new_v4()).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.get_status(Uuid::new_v4()).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_continues_after_last_stored_record() {
        let (orchestrator, mut receivers) = orchestrator().await;
        let job_id = orchestrator
            .submit(b"Name\nAlpha\nBravo\nCharlie\n", EntityKind::Category, "c.csv")
            .await
            .unwrap();
        receivers.category_upload.recv().await.unwrap();

        // Simulate a crash after the first record was committed
        let mut job = upload_jobs::load_job(&orchestrator.db, job_id)
            .await
            .unwrap()
            .unwrap();
        upload_jobs::try_claim(&orchestrator.db, job_id).await.unwrap();
        job.claimed = true;
        job.mark_parsed(3);
        job.record_outcome(true);
        let mut tx = orchestrator.db.begin().await.unwrap();
        categories::insert_uploaded_category(&mut *tx, job_id, 0, "Alpha", None, &[])
            .await
            .unwrap();
        upload_jobs::save_progress(&mut *tx, &job).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(orchestrator.resume_unfinished().await.unwrap(), 1);
        let envelope = receivers.category_upload.recv().await.unwrap();
        assert_eq!(envelope.body["job_id"], job_id.to_string());

        orchestrator.process(job_id).await.unwrap();

        let status = orchestrator.get_status(job_id).await.unwrap();
        assert_eq!(status.succeeded, 3);
        let names: Vec<String> = categories::list_categories(&orchestrator.db, false)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Uncategorized", "Alpha", "Bravo", "Charlie"]);
    }
}
