//! Data-import tracking records
//!
//! Rows land here from the upstream file feed; this backend inspects and
//! reprocesses them, it does not fetch them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Session,
    Evaluation,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Session => "session",
            ServiceType::Evaluation => "evaluation",
        }
    }

    pub fn parse(s: &str) -> Option<ServiceType> {
        match s {
            "session" => Some(ServiceType::Session),
            "evaluation" => Some(ServiceType::Evaluation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Processing,
    Processed,
    Error,
    Skipped,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Processing => "processing",
            ImportStatus::Processed => "processed",
            ImportStatus::Error => "error",
            ImportStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<ImportStatus> {
        match s {
            "pending" => Some(ImportStatus::Pending),
            "processing" => Some(ImportStatus::Processing),
            "processed" => Some(ImportStatus::Processed),
            "error" => Some(ImportStatus::Error),
            "skipped" => Some(ImportStatus::Skipped),
            _ => None,
        }
    }

    /// Only failed or skipped records may be queued again
    pub fn reprocessable(&self) -> bool {
        matches!(self, ImportStatus::Error | ImportStatus::Skipped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub record_id: Uuid,
    pub service_type: ServiceType,
    pub organization_id: Uuid,
    pub location_id: Uuid,
    pub file_name: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: ImportStatus,
    pub error_message: Option<String>,

    // Patient identification carried on the raw row
    pub full_name: Option<String>,
    pub mr: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,

    // Service data
    pub session_name: Option<String>,
    pub provider: Option<String>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    /// Hours
    pub duration: Option<f64>,
    pub attended: Option<bool>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub total_records: i64,
    pub pending: i64,
    pub processing: i64,
    pub processed: i64,
    pub error: i64,
    pub skipped: i64,
    pub latest_import: Option<DateTime<Utc>>,
}
