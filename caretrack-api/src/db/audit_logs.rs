//! Audit-log persistence and retrieval
//!
//! Outside RLS: writes must never be filtered by tenant context, and
//! reads are gated to superusers at the handler.

use caretrack_common::models::{
    ActionType, AuditLogEntry, AuditLogFilter, AuditSummary, ResourceType,
};
use caretrack_common::{Error, Result};
use chrono::{Duration, Months, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const COLUMNS: &str = "audit_id, timestamp, user_id, user_email, user_role, organization_id, \
     session_id, method, endpoint, full_url, user_agent, ip_address, status_code, \
     response_time_ms, action_type, resource_type, resource_id, phi_accessed, patient_id, \
     data_exported, request_body_hash, query_parameters";

fn from_row(row: &PgRow) -> Result<AuditLogEntry> {
    let action: String = row.try_get("action_type")?;
    let resource: String = row.try_get("resource_type")?;
    Ok(AuditLogEntry {
        audit_id: row.try_get("audit_id")?,
        timestamp: row.try_get("timestamp")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        user_role: row.try_get("user_role")?,
        organization_id: row.try_get("organization_id")?,
        session_id: row.try_get("session_id")?,
        method: row.try_get("method")?,
        endpoint: row.try_get("endpoint")?,
        full_url: row.try_get("full_url")?,
        user_agent: row.try_get("user_agent")?,
        ip_address: row.try_get("ip_address")?,
        status_code: row.try_get("status_code")?,
        response_time_ms: row.try_get("response_time_ms")?,
        action_type: ActionType::parse(&action)
            .ok_or_else(|| Error::Internal(format!("Unknown action type: {}", action)))?,
        resource_type: ResourceType::parse(&resource)
            .ok_or_else(|| Error::Internal(format!("Unknown resource type: {}", resource)))?,
        resource_id: row.try_get("resource_id")?,
        phi_accessed: row.try_get("phi_accessed")?,
        patient_id: row.try_get("patient_id")?,
        data_exported: row.try_get("data_exported")?,
        request_body_hash: row.try_get("request_body_hash")?,
        query_parameters: row.try_get("query_parameters")?,
    })
}

/// Append one entry. Callers treat failure as non-fatal.
pub async fn insert(pool: &PgPool, entry: &AuditLogEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_logs \
             (audit_id, timestamp, user_id, user_email, user_role, organization_id, session_id, \
              method, endpoint, full_url, user_agent, ip_address, status_code, response_time_ms, \
              action_type, resource_type, resource_id, phi_accessed, patient_id, data_exported, \
              request_body_hash, query_parameters) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $21, $22)",
    )
    .bind(entry.audit_id)
    .bind(entry.timestamp)
    .bind(entry.user_id)
    .bind(&entry.user_email)
    .bind(&entry.user_role)
    .bind(entry.organization_id)
    .bind(&entry.session_id)
    .bind(&entry.method)
    .bind(&entry.endpoint)
    .bind(&entry.full_url)
    .bind(&entry.user_agent)
    .bind(&entry.ip_address)
    .bind(entry.status_code)
    .bind(entry.response_time_ms)
    .bind(entry.action_type.as_str())
    .bind(entry.resource_type.as_str())
    .bind(&entry.resource_id)
    .bind(entry.phi_accessed)
    .bind(entry.patient_id)
    .bind(entry.data_exported)
    .bind(&entry.request_body_hash)
    .bind(&entry.query_parameters)
    .execute(pool)
    .await?;
    Ok(())
}

/// Query entries with a typed filter, newest first
pub async fn query(pool: &PgPool, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM audit_logs \
         WHERE ($1::uuid IS NULL OR user_id = $1) \
           AND ($2::text IS NULL OR lower(user_email) = lower($2)) \
           AND ($3::text IS NULL OR action_type = $3) \
           AND ($4::text IS NULL OR resource_type = $4) \
           AND ($5::boolean IS NULL OR phi_accessed = $5) \
           AND ($6::uuid IS NULL OR patient_id = $6) \
           AND ($7::timestamptz IS NULL OR timestamp >= $7) \
           AND ($8::timestamptz IS NULL OR timestamp <= $8) \
           AND ($9::text IS NULL OR ip_address = $9) \
         ORDER BY timestamp DESC \
         LIMIT $10 OFFSET $11"
    ))
    .bind(filter.user_id)
    .bind(&filter.user_email)
    .bind(filter.action_type.map(|a| a.as_str()))
    .bind(filter.resource_type.map(|r| r.as_str()))
    .bind(filter.phi_accessed)
    .bind(filter.patient_id)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .bind(&filter.ip_address)
    .bind(filter.limit.unwrap_or(100).clamp(1, 1000))
    .bind(filter.offset.unwrap_or(0).max(0))
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Entries that failed authentication or authorization within the
/// trailing window, newest first
pub async fn failed_access(
    pool: &PgPool,
    hours: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditLogEntry>> {
    let since = Utc::now() - Duration::hours(hours.max(1));
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM audit_logs \
         WHERE status_code IN (401, 403) AND timestamp >= $1 \
         ORDER BY timestamp DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(since)
    .bind(limit.clamp(1, 1000))
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Aggregate counts over the trailing window
pub async fn summary(pool: &PgPool, hours: i64) -> Result<AuditSummary> {
    let hours = hours.max(1);
    let since = Utc::now() - Duration::hours(hours);

    let row = sqlx::query(
        "SELECT COUNT(*) AS total_requests, \
                COUNT(*) FILTER (WHERE phi_accessed) AS phi_access_count, \
                COUNT(*) FILTER (WHERE data_exported) AS data_export_count, \
                COUNT(*) FILTER (WHERE status_code >= 400) AS failed_requests, \
                COUNT(*) FILTER (WHERE status_code IN (401, 403)) AS access_denied_count, \
                COUNT(DISTINCT user_id) AS unique_users, \
                COUNT(DISTINCT ip_address) AS unique_ips, \
                AVG(response_time_ms) AS avg_response_time_ms \
         FROM audit_logs WHERE timestamp >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(AuditSummary {
        period_hours: hours,
        total_requests: row.try_get("total_requests")?,
        phi_access_count: row.try_get("phi_access_count")?,
        data_export_count: row.try_get("data_export_count")?,
        failed_requests: row.try_get("failed_requests")?,
        access_denied_count: row.try_get("access_denied_count")?,
        unique_users: row.try_get("unique_users")?,
        unique_ips: row.try_get("unique_ips")?,
        avg_response_time_ms: row
            .try_get::<Option<f64>, _>("avg_response_time_ms")?
            .unwrap_or(0.0),
    })
}

/// Delete entries older than the retention window, returning the count
pub async fn cleanup(pool: &PgPool, retention_months: u32) -> Result<u64> {
    let cutoff = Utc::now()
        .checked_sub_months(Months::new(retention_months))
        .ok_or_else(|| Error::Internal("Retention cutoff out of range".to_string()))?;

    let result = sqlx::query("DELETE FROM audit_logs WHERE timestamp < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
