//! Upload job state machine
//!
//! A job progresses through: SUBMITTED → PARSED → PROCESSING → COMPLETED,
//! or ends in FAILED when the file cannot be decoded. The human-readable
//! status string is always derived from [`UploadProgress`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CatalogError;

/// Which record type an uploaded file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Product,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Product => "product",
        }
    }

    /// Plural noun used in status text
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Category => "categories",
            EntityKind::Product => "products",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CatalogError;

    /// Accepts singular or plural, any case ("Product", "categories", ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "categories" => Ok(EntityKind::Category),
            "product" | "products" => Ok(EntityKind::Product),
            other => Err(CatalogError::InvalidOperation(format!(
                "Unknown entity kind: {}",
                other
            ))),
        }
    }
}

/// Decodable file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    /// Lowercase extension of `file_name`, stored verbatim as the job's format tag
    pub fn tag_from_file_name(file_name: &str) -> String {
        std::path::Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Resolve a stored format tag
    pub fn from_tag(tag: &str) -> Result<Self, CatalogError> {
        match tag {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            other => Err(CatalogError::UnsupportedFormat(if other.is_empty() {
                "(none)".to_string()
            } else {
                other.to_string()
            })),
        }
    }
}

/// Upload job phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadPhase {
    /// Payload persisted, processing message dispatched
    Submitted,
    /// File decoded into records
    Parsed,
    /// Records are being validated and stored
    Processing,
    /// All records examined
    Completed,
    /// File could not be decoded
    Failed,
}

impl UploadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadPhase::Submitted => "SUBMITTED",
            UploadPhase::Parsed => "PARSED",
            UploadPhase::Processing => "PROCESSING",
            UploadPhase::Completed => "COMPLETED",
            UploadPhase::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadPhase::Completed | UploadPhase::Failed)
    }
}

impl FromStr for UploadPhase {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(UploadPhase::Submitted),
            "PARSED" => Ok(UploadPhase::Parsed),
            "PROCESSING" => Ok(UploadPhase::Processing),
            "COMPLETED" => Ok(UploadPhase::Completed),
            "FAILED" => Ok(UploadPhase::Failed),
            other => Err(CatalogError::Malformed(format!(
                "Unknown upload phase: {}",
                other
            ))),
        }
    }
}

/// Structured job progress; the status string is derived from this
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    /// Records examined so far (added or skipped); resume cursor
    pub processed: usize,
    /// Records in the file, known once parsed
    pub total: usize,
    /// Records added to the store
    pub succeeded: usize,
    /// Reason for `Failed`
    pub failure: Option<String>,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self {
            phase: UploadPhase::Submitted,
            processed: 0,
            total: 0,
            succeeded: 0,
            failure: None,
        }
    }
}

impl UploadProgress {
    /// Records skipped as invalid so far
    pub fn invalid(&self) -> usize {
        self.processed.saturating_sub(self.succeeded)
    }

    /// Human-readable status for `kind`
    pub fn status_text(&self, kind: EntityKind) -> String {
        let noun = kind.plural();
        match self.phase {
            UploadPhase::Submitted => "Uploaded the file".to_string(),
            UploadPhase::Parsed => "Parsed the file successfully".to_string(),
            UploadPhase::Processing => format!(
                "Adding the {}...\n{}/{} added.",
                noun, self.succeeded, self.total
            ),
            UploadPhase::Completed => {
                let mut status = format!(
                    "Upload completed: {}/{} {} were added successfully.",
                    self.succeeded, self.total, noun
                );
                if self.succeeded < self.total {
                    status.push_str(&format!(
                        " The rest {} {} were invalid.",
                        self.total - self.succeeded,
                        noun
                    ));
                }
                status
            }
            UploadPhase::Failed => format!(
                "Upload failed: {}",
                self.failure.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Persisted record tracking one batch file submission
#[derive(Debug, Clone, PartialEq)]
pub struct UploadJob {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub file_name: String,
    /// Lowercase extension tag ("csv", "json", or whatever was uploaded)
    pub file_format: String,
    /// Raw file bytes, base64-encoded
    pub payload: String,
    pub progress: UploadProgress,
    /// Held by the worker currently processing the job
    pub claimed: bool,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadJob {
    /// Create a freshly submitted job
    pub fn new(entity_kind: EntityKind, file_name: String, payload: String) -> Self {
        let now = catalog_common::time::now();
        Self {
            id: catalog_common::uuid_utils::generate(),
            entity_kind,
            file_format: FileFormat::tag_from_file_name(&file_name),
            file_name,
            payload,
            progress: UploadProgress::default(),
            claimed: false,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> String {
        self.progress.status_text(self.entity_kind)
    }

    pub fn is_terminal(&self) -> bool {
        self.progress.phase.is_terminal()
    }

    /// File decoded into `total` records
    ///
    /// A resumed job keeps its cursor and stays in `Processing`.
    pub fn mark_parsed(&mut self, total: usize) {
        self.progress.total = total;
        if self.progress.phase == UploadPhase::Submitted {
            self.progress.phase = UploadPhase::Parsed;
        }
        self.touch();
    }

    /// One record examined; `added` tells whether it reached the store
    pub fn record_outcome(&mut self, added: bool) {
        self.progress.phase = UploadPhase::Processing;
        self.progress.processed += 1;
        if added {
            self.progress.succeeded += 1;
        }
        self.touch();
    }

    pub fn complete(&mut self) {
        self.progress.phase = UploadPhase::Completed;
        self.claimed = false;
        self.touch();
    }

    pub fn fail(&mut self, reason: String) {
        self.progress.phase = UploadPhase::Failed;
        self.progress.failure = Some(reason);
        self.claimed = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = catalog_common::time::now();
    }

    /// Read-only view returned to pollers
    pub fn summary(&self) -> UploadStatusSummary {
        UploadStatusSummary {
            id: self.id,
            entity_kind: self.entity_kind,
            file_name: self.file_name.clone(),
            file_format: self.file_format.clone(),
            phase: self.progress.phase,
            processed: self.progress.processed,
            total: self.progress.total,
            succeeded: self.progress.succeeded,
            invalid: self.progress.invalid(),
            failed: self.progress.phase == UploadPhase::Failed,
            status: self.status(),
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
        }
    }
}

/// Upload status as returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatusSummary {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub file_name: String,
    pub file_format: String,
    pub phase: UploadPhase,
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub invalid: usize,
    pub failed: bool,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(kind: EntityKind) -> UploadJob {
        UploadJob::new(kind, "Rows.CSV".to_string(), String::new())
    }

    #[test]
    fn test_new_job_is_submitted() {
        let job = job(EntityKind::Category);
        assert_eq!(job.file_format, "csv");
        assert_eq!(job.progress.phase, UploadPhase::Submitted);
        assert_eq!(job.status(), "Uploaded the file");
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_status_follows_lifecycle() {
        let mut job = job(EntityKind::Product);
        job.mark_parsed(3);
        assert_eq!(job.status(), "Parsed the file successfully");

        job.record_outcome(true);
        assert_eq!(job.status(), "Adding the products...\n1/3 added.");
        job.record_outcome(false);
        job.record_outcome(true);
        assert_eq!(job.status(), "Adding the products...\n2/3 added.");

        job.complete();
        assert_eq!(
            job.status(),
            "Upload completed: 2/3 products were added successfully. The rest 1 products were invalid."
        );
        assert_eq!(job.summary().invalid, 1);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_complete_without_invalid_has_no_suffix() {
        let mut job = job(EntityKind::Category);
        job.mark_parsed(2);
        job.record_outcome(true);
        job.record_outcome(true);
        job.complete();
        assert_eq!(
            job.status(),
            "Upload completed: 2/2 categories were added successfully."
        );
    }

    #[test]
    fn test_failed_status_and_flag() {
        let mut job = job(EntityKind::Category);
        job.fail("Unsupported file format: xlsx".to_string());
        assert_eq!(job.status(), "Upload failed: Unsupported file format: xlsx");
        assert!(job.summary().failed);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_mark_parsed_on_resume_keeps_cursor() {
        let mut job = job(EntityKind::Category);
        job.mark_parsed(4);
        job.record_outcome(true);
        job.mark_parsed(4);
        assert_eq!(job.progress.phase, UploadPhase::Processing);
        assert_eq!(job.progress.processed, 1);
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(FileFormat::tag_from_file_name("a.JSON"), "json");
        assert_eq!(FileFormat::tag_from_file_name("noext"), "");
        assert_eq!(FileFormat::from_tag("csv").unwrap(), FileFormat::Csv);
        assert!(matches!(
            FileFormat::from_tag("xlsx"),
            Err(CatalogError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("Products".parse::<EntityKind>().unwrap(), EntityKind::Product);
        assert_eq!("category".parse::<EntityKind>().unwrap(), EntityKind::Category);
        assert!("widgets".parse::<EntityKind>().is_err());
    }
}
