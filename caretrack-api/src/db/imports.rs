//! Import-record queries (RLS-protected)
//!
//! Rows arrive from the upstream file feed; this layer inspects them and
//! queues reprocessing. It never creates new records.

use caretrack_common::models::{ImportRecord, ImportStatus, ImportSummary, ServiceType};
use caretrack_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str = "record_id, service_type, organization_id, location_id, file_name, \
     imported_at, processed_at, status, error_message, full_name, mr, admission_date, \
     discharge_date, session_name, provider, started, ended, duration, attended, \
     created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportFilter {
    pub status: Option<ImportStatus>,
    pub service_type: Option<ServiceType>,
    pub location_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn from_row(row: &PgRow) -> Result<ImportRecord> {
    let service_type: String = row.try_get("service_type")?;
    let status: String = row.try_get("status")?;
    Ok(ImportRecord {
        record_id: row.try_get("record_id")?,
        service_type: ServiceType::parse(&service_type)
            .ok_or_else(|| Error::Internal(format!("Unknown service type: {}", service_type)))?,
        organization_id: row.try_get("organization_id")?,
        location_id: row.try_get("location_id")?,
        file_name: row.try_get("file_name")?,
        imported_at: row.try_get("imported_at")?,
        processed_at: row.try_get("processed_at")?,
        status: ImportStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown import status: {}", status)))?,
        error_message: row.try_get("error_message")?,
        full_name: row.try_get("full_name")?,
        mr: row.try_get("mr")?,
        admission_date: row.try_get("admission_date")?,
        discharge_date: row.try_get("discharge_date")?,
        session_name: row.try_get("session_name")?,
        provider: row.try_get("provider")?,
        started: row.try_get("started")?,
        ended: row.try_get("ended")?,
        duration: row.try_get("duration")?,
        attended: row.try_get("attended")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list(tx: &mut ScopedTx, filter: &ImportFilter) -> Result<Vec<ImportRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM import_records \
         WHERE ($1::text IS NULL OR status = $1) \
           AND ($2::text IS NULL OR service_type = $2) \
           AND ($3::uuid IS NULL OR location_id = $3) \
         ORDER BY imported_at DESC \
         LIMIT $4 OFFSET $5"
    ))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.service_type.map(|s| s.as_str()))
    .bind(filter.location_id)
    .bind(filter.limit.unwrap_or(100).clamp(1, 1000))
    .bind(filter.offset.unwrap_or(0).max(0))
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn get(tx: &mut ScopedTx, record_id: Uuid) -> Result<ImportRecord> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM import_records WHERE record_id = $1"
    ))
    .bind(record_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!(
            "Import record {} not found",
            record_id
        ))),
    }
}

/// Counts by status plus the latest import time
pub async fn summary(tx: &mut ScopedTx) -> Result<ImportSummary> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                COUNT(*) FILTER (WHERE status = 'processing') AS processing, \
                COUNT(*) FILTER (WHERE status = 'processed') AS processed, \
                COUNT(*) FILTER (WHERE status = 'error') AS error, \
                COUNT(*) FILTER (WHERE status = 'skipped') AS skipped, \
                MAX(imported_at) AS latest_import \
         FROM import_records",
    )
    .fetch_one(&mut **tx)
    .await?;

    Ok(ImportSummary {
        total_records: row.try_get("total")?,
        pending: row.try_get("pending")?,
        processing: row.try_get("processing")?,
        processed: row.try_get("processed")?,
        error: row.try_get("error")?,
        skipped: row.try_get("skipped")?,
        latest_import: row.try_get("latest_import")?,
    })
}

/// One imported file with its most recent import time
#[derive(Debug, Clone, Serialize)]
pub struct ImportFile {
    pub file_name: String,
    pub latest_import: DateTime<Utc>,
}

/// Distinct imported file names, most recently imported first
pub async fn list_files(tx: &mut ScopedTx) -> Result<Vec<ImportFile>> {
    let rows = sqlx::query(
        "SELECT file_name, MAX(imported_at) AS latest_import \
         FROM import_records \
         WHERE file_name IS NOT NULL \
         GROUP BY file_name \
         ORDER BY latest_import DESC \
         LIMIT 50",
    )
    .fetch_all(&mut **tx)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ImportFile {
                file_name: row.try_get("file_name")?,
                latest_import: row.try_get("latest_import")?,
            })
        })
        .collect()
}

/// One failed record with its error details and resolved names
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    pub record_id: Uuid,
    pub file_name: Option<String>,
    pub error_message: String,
    pub full_name: Option<String>,
    pub mr: Option<String>,
    pub service_type: String,
    pub imported_at: DateTime<Utc>,
    pub organization_name: Option<String>,
    pub location_name: Option<String>,
}

/// Most recent failed records, with organization and location names
pub async fn recent_errors(tx: &mut ScopedTx, limit: i64) -> Result<Vec<ImportError>> {
    let rows = sqlx::query(
        "SELECT r.record_id, r.file_name, r.error_message, r.full_name, r.mr, \
                r.service_type, r.imported_at, \
                o.name AS organization_name, l.name AS location_name \
         FROM import_records r \
         LEFT JOIN organizations o ON o.organization_id = r.organization_id \
         LEFT JOIN locations l ON l.location_id = r.location_id \
         WHERE r.status = 'error' AND r.error_message IS NOT NULL \
         ORDER BY r.imported_at DESC \
         LIMIT $1",
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(&mut **tx)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ImportError {
                record_id: row.try_get("record_id")?,
                file_name: row.try_get("file_name")?,
                error_message: row.try_get("error_message")?,
                full_name: row.try_get("full_name")?,
                mr: row.try_get("mr")?,
                service_type: row.try_get("service_type")?,
                imported_at: row.try_get("imported_at")?,
                organization_name: row.try_get("organization_name")?,
                location_name: row.try_get("location_name")?,
            })
        })
        .collect()
}

/// Queue a failed or skipped record for reprocessing
pub async fn reprocess(tx: &mut ScopedTx, record_id: Uuid) -> Result<ImportRecord> {
    let record = get(tx, record_id).await?;
    if !record.status.reprocessable() {
        return Err(Error::Validation(format!(
            "Record in status '{}' cannot be reprocessed",
            record.status.as_str()
        )));
    }

    let row = sqlx::query(&format!(
        "UPDATE import_records \
         SET status = 'pending', error_message = NULL, processed_at = NULL, updated_at = $2 \
         WHERE record_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(record_id)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}
