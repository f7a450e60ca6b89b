//! Weekly-metric queries and attendance aggregation (RLS-protected)

use caretrack_common::models::{ComplianceStatus, WeeklyMetric};
use caretrack_common::{Error, Result};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str = "metric_id, patient_id, week_start_date, program_id, location_id, \
     hours_attended, hours_required, hours_remaining_needed, sessions_attended, \
     sessions_missed, clinic_hours_available_total, clinic_hours_remaining, risk_score, \
     risk_tier_id, compliance_status, needs_followup, calculated_at, calculation_source, \
     created_at, updated_at";

/// Attendance sums for one patient over one week
#[derive(Debug, Clone, Copy, Default)]
pub struct Attendance {
    pub hours_attended: f64,
    pub sessions_attended: i32,
    pub sessions_missed: i32,
}

fn from_row(row: &PgRow) -> Result<WeeklyMetric> {
    let status: String = row.try_get("compliance_status")?;
    Ok(WeeklyMetric {
        metric_id: row.try_get("metric_id")?,
        patient_id: row.try_get("patient_id")?,
        week_start_date: row.try_get("week_start_date")?,
        program_id: row.try_get("program_id")?,
        location_id: row.try_get("location_id")?,
        hours_attended: row.try_get("hours_attended")?,
        hours_required: row.try_get("hours_required")?,
        hours_remaining_needed: row.try_get("hours_remaining_needed")?,
        sessions_attended: row.try_get("sessions_attended")?,
        sessions_missed: row.try_get("sessions_missed")?,
        clinic_hours_available_total: row.try_get("clinic_hours_available_total")?,
        clinic_hours_remaining: row.try_get("clinic_hours_remaining")?,
        risk_score: row.try_get("risk_score")?,
        risk_tier_id: row.try_get("risk_tier_id")?,
        compliance_status: ComplianceStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown compliance status: {}", status)))?,
        needs_followup: row.try_get("needs_followup")?,
        calculated_at: row.try_get("calculated_at")?,
        calculation_source: row.try_get("calculation_source")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Sum processed attendance rows for one patient (matched by MR within the
/// organization) over `[week_start, week_start + 7d)`
pub async fn attendance_for_week(
    tx: &mut ScopedTx,
    organization_id: Uuid,
    mr: &str,
    week_start: NaiveDate,
) -> Result<Attendance> {
    let start = Utc.from_utc_datetime(&week_start.and_time(NaiveTime::MIN));
    let end = Utc.from_utc_datetime(
        &caretrack_common::week::week_end_exclusive(week_start).and_time(NaiveTime::MIN),
    );

    let row = sqlx::query(
        "SELECT COALESCE(SUM(duration) FILTER (WHERE attended IS TRUE), 0.0) AS hours_attended, \
                COUNT(*) FILTER (WHERE attended IS TRUE) AS sessions_attended, \
                COUNT(*) FILTER (WHERE attended IS NOT TRUE) AS sessions_missed \
         FROM import_records \
         WHERE organization_id = $1 AND mr = $2 AND status = 'processed' \
           AND started >= $3 AND started < $4",
    )
    .bind(organization_id)
    .bind(mr)
    .bind(start)
    .bind(end)
    .fetch_one(&mut **tx)
    .await?;

    let sessions_attended: i64 = row.try_get("sessions_attended")?;
    let sessions_missed: i64 = row.try_get("sessions_missed")?;
    Ok(Attendance {
        hours_attended: row.try_get("hours_attended")?,
        sessions_attended: sessions_attended as i32,
        sessions_missed: sessions_missed as i32,
    })
}

/// Insert or overwrite the metric row for (patient, week)
pub async fn upsert(tx: &mut ScopedTx, organization_id: Uuid, metric: &WeeklyMetric) -> Result<()> {
    sqlx::query(
        "INSERT INTO weekly_metrics \
             (metric_id, organization_id, patient_id, week_start_date, program_id, location_id, \
              hours_attended, hours_required, hours_remaining_needed, sessions_attended, \
              sessions_missed, clinic_hours_available_total, clinic_hours_remaining, risk_score, \
              risk_tier_id, compliance_status, needs_followup, calculated_at, calculation_source, \
              created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $20) \
         ON CONFLICT (patient_id, week_start_date) DO UPDATE SET \
             program_id = EXCLUDED.program_id, \
             location_id = EXCLUDED.location_id, \
             hours_attended = EXCLUDED.hours_attended, \
             hours_required = EXCLUDED.hours_required, \
             hours_remaining_needed = EXCLUDED.hours_remaining_needed, \
             sessions_attended = EXCLUDED.sessions_attended, \
             sessions_missed = EXCLUDED.sessions_missed, \
             clinic_hours_available_total = EXCLUDED.clinic_hours_available_total, \
             clinic_hours_remaining = EXCLUDED.clinic_hours_remaining, \
             risk_score = EXCLUDED.risk_score, \
             risk_tier_id = EXCLUDED.risk_tier_id, \
             compliance_status = EXCLUDED.compliance_status, \
             needs_followup = EXCLUDED.needs_followup, \
             calculated_at = EXCLUDED.calculated_at, \
             calculation_source = EXCLUDED.calculation_source, \
             updated_at = EXCLUDED.updated_at",
    )
    .bind(metric.metric_id)
    .bind(organization_id)
    .bind(metric.patient_id)
    .bind(metric.week_start_date)
    .bind(metric.program_id)
    .bind(metric.location_id)
    .bind(metric.hours_attended)
    .bind(metric.hours_required)
    .bind(metric.hours_remaining_needed)
    .bind(metric.sessions_attended)
    .bind(metric.sessions_missed)
    .bind(metric.clinic_hours_available_total)
    .bind(metric.clinic_hours_remaining)
    .bind(metric.risk_score)
    .bind(metric.risk_tier_id)
    .bind(metric.compliance_status.as_str())
    .bind(metric.needs_followup)
    .bind(metric.calculated_at)
    .bind(&metric.calculation_source)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Stored metrics for one week, highest risk first
pub async fn list_for_week(tx: &mut ScopedTx, week_start: NaiveDate) -> Result<Vec<WeeklyMetric>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM weekly_metrics \
         WHERE week_start_date = $1 \
         ORDER BY risk_score DESC"
    ))
    .bind(week_start)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(from_row).collect()
}

/// Metric history for one patient, most recent weeks first
pub async fn list_for_patient(
    tx: &mut ScopedTx,
    patient_id: Uuid,
    limit: i64,
) -> Result<Vec<WeeklyMetric>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM weekly_metrics \
         WHERE patient_id = $1 \
         ORDER BY week_start_date DESC \
         LIMIT $2"
    ))
    .bind(patient_id)
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(from_row).collect()
}
