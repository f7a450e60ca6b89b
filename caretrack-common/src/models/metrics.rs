//! Stored weekly metrics and the batch-calculation contract

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patient::ComplianceStatus;

/// One row per (patient, week-start). Written only by the weekly
/// calculation job; recalculation overwrites, never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyMetric {
    pub metric_id: Uuid,
    pub patient_id: Uuid,
    pub week_start_date: NaiveDate,
    pub program_id: Uuid,
    pub location_id: Uuid,
    pub hours_attended: f64,
    pub hours_required: f64,
    pub hours_remaining_needed: f64,
    pub sessions_attended: i32,
    pub sessions_missed: i32,
    pub clinic_hours_available_total: f64,
    pub clinic_hours_remaining: f64,
    pub risk_score: f64,
    pub risk_tier_id: Option<Uuid>,
    pub compliance_status: ComplianceStatus,
    pub needs_followup: bool,
    pub calculated_at: DateTime<Utc>,
    pub calculation_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyCalculationRequest {
    /// Required for superusers; ignored for tenant admins
    pub organization_id: Option<Uuid>,
    /// Defaults to the Monday of the current week
    pub week_start_date: Option<NaiveDate>,
}

/// Partial-failure report from the weekly batch: every patient is
/// attempted regardless of earlier failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CalculationOutcome {
    pub calculated_count: u32,
    pub skipped_count: u32,
    pub error_count: u32,
    pub week_calculated: Option<NaiveDate>,
}
