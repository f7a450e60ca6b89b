//! Risk pipeline: live weekly snapshots and the stored weekly calculation
//!
//! Both paths run the same pure classifier over the same inputs; the only
//! difference is that the weekly calculation persists its results while
//! the snapshot is computed per request and discarded.

use std::collections::HashMap;

use caretrack_common::models::{
    AssignmentStatus, CalculationOutcome, Location, Patient, Principal, Program, RiskTier,
    WeeklyMetric,
};
use caretrack_common::risk::{classify, Classification, RiskInput};
use caretrack_common::week;
use caretrack_common::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::{self, metrics::Attendance, ScopedTx};

/// One patient's week, classified live
#[derive(Debug, Clone, Serialize)]
pub struct PatientWeekView {
    pub patient_id: Uuid,
    pub full_name: String,
    pub mr: String,
    pub assignment_status: AssignmentStatus,
    pub program_id: Option<Uuid>,
    pub program_name: Option<String>,
    pub location_id: Option<Uuid>,
    pub location_name: Option<String>,
    pub week_start_date: NaiveDate,
    pub hours_attended: f64,
    pub hours_required: f64,
    pub clinic_hours_remaining: f64,
    pub sessions_attended: i32,
    pub sessions_missed: i32,
    #[serde(flatten)]
    pub classification: Classification,
}

struct OrgContext {
    tiers: Vec<RiskTier>,
    programs: HashMap<Uuid, Program>,
    locations: HashMap<Uuid, Location>,
}

async fn load_org_context(tx: &mut ScopedTx, organization_id: Uuid) -> Result<OrgContext> {
    let tiers = db::risk_tiers::list_active_for_org(tx, organization_id).await?;
    let programs = db::programs::list_for_org(tx, organization_id)
        .await?
        .into_iter()
        .map(|p| (p.program_id, p))
        .collect();
    let locations = db::locations::list_for_org(tx, organization_id)
        .await?
        .into_iter()
        .map(|l| (l.location_id, l))
        .collect();
    Ok(OrgContext {
        tiers,
        programs,
        locations,
    })
}

/// The patient's program and location, if both are assigned and resolvable
fn resolve_assignment<'a>(
    patient: &Patient,
    ctx: &'a OrgContext,
) -> Option<(&'a Program, &'a Location)> {
    let program = ctx.programs.get(&patient.program_id?)?;
    let location = ctx.locations.get(&patient.location_id?)?;
    Some((program, location))
}

fn classify_patient(
    patient: &Patient,
    ctx: &OrgContext,
    attendance: Attendance,
    week_start: NaiveDate,
    now: DateTime<Utc>,
) -> (Classification, f64, f64, f64) {
    match resolve_assignment(patient, ctx) {
        Some((program, location)) => {
            let remaining = week::remaining_hours_in_week(&location.schedule, week_start, now);
            let total = week::total_hours_in_week(&location.schedule);
            let classification = classify(
                RiskInput {
                    assigned: true,
                    hours_attended: attendance.hours_attended,
                    hours_required: program.hours_per_week,
                    clinic_hours_remaining: remaining,
                },
                &ctx.tiers,
            );
            (classification, program.hours_per_week, remaining, total)
        }
        None => {
            let classification = classify(
                RiskInput {
                    assigned: false,
                    hours_attended: attendance.hours_attended,
                    hours_required: 0.0,
                    clinic_hours_remaining: 0.0,
                },
                &ctx.tiers,
            );
            (classification, 0.0, 0.0, 0.0)
        }
    }
}

/// Classify every active patient of one organization for one week
///
/// Unassigned patients are included with `unassigned` status so the
/// dashboard can show them; nothing is persisted.
pub async fn week_snapshot(
    tx: &mut ScopedTx,
    organization_id: Uuid,
    week_start: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<PatientWeekView>> {
    let ctx = load_org_context(tx, organization_id).await?;
    let patients = db::patients::list_active_for_org(tx, organization_id).await?;

    let mut views = Vec::with_capacity(patients.len());
    for patient in patients {
        let attendance =
            db::metrics::attendance_for_week(tx, organization_id, &patient.mr, week_start).await?;
        let (classification, required, remaining, _total) =
            classify_patient(&patient, &ctx, attendance, week_start, now);

        let program_name = patient
            .program_id
            .and_then(|id| ctx.programs.get(&id))
            .map(|p| p.name.clone());
        let location_name = patient
            .location_id
            .and_then(|id| ctx.locations.get(&id))
            .map(|l| l.name.clone());

        views.push(PatientWeekView {
            patient_id: patient.patient_id,
            full_name: patient.full_name,
            mr: patient.mr,
            assignment_status: patient.assignment_status,
            program_id: patient.program_id,
            program_name,
            location_id: patient.location_id,
            location_name,
            week_start_date: week_start,
            hours_attended: attendance.hours_attended,
            hours_required: required,
            clinic_hours_remaining: remaining,
            sessions_attended: attendance.sessions_attended,
            sessions_missed: attendance.sessions_missed,
            classification,
        });
    }

    // Highest risk first, matching the stored-week ordering
    views.sort_by(|a, b| {
        b.classification
            .risk_score
            .partial_cmp(&a.classification.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(views)
}

/// Calculate and persist weekly metrics for one organization
///
/// Every patient is attempted regardless of earlier failures; unassigned
/// patients are skipped and counted, per-patient failures are counted and
/// logged. Each patient gets its own scoped transaction so one failure
/// cannot poison the rest of the batch. Reruns for the same week
/// overwrite, never duplicate.
pub async fn run_weekly_calculation(
    pool: &PgPool,
    principal: &Principal,
    organization_id: Uuid,
    week_start: NaiveDate,
    now: DateTime<Utc>,
    source: &str,
) -> Result<CalculationOutcome> {
    let mut tx = db::begin_scoped(pool, principal).await?;
    let ctx = load_org_context(&mut tx, organization_id).await?;
    let patients = db::patients::list_active_for_org(&mut tx, organization_id).await?;
    tx.commit().await?;

    let mut outcome = CalculationOutcome {
        week_calculated: Some(week_start),
        ..Default::default()
    };

    for patient in patients {
        let (program, location) = match resolve_assignment(&patient, &ctx) {
            Some(pair) => pair,
            None => {
                outcome.skipped_count += 1;
                continue;
            }
        };

        match calculate_one(
            pool,
            principal,
            organization_id,
            &patient,
            program,
            location,
            &ctx.tiers,
            week_start,
            now,
            source,
        )
        .await
        {
            Ok(()) => outcome.calculated_count += 1,
            Err(e) => {
                warn!(
                    "Weekly calculation failed for patient {}: {}",
                    patient.patient_id, e
                );
                outcome.error_count += 1;
            }
        }
    }

    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
async fn calculate_one(
    pool: &PgPool,
    principal: &Principal,
    organization_id: Uuid,
    patient: &Patient,
    program: &Program,
    location: &Location,
    tiers: &[RiskTier],
    week_start: NaiveDate,
    now: DateTime<Utc>,
    source: &str,
) -> Result<()> {
    let mut tx = db::begin_scoped(pool, principal).await?;

    let attendance =
        db::metrics::attendance_for_week(&mut tx, organization_id, &patient.mr, week_start).await?;

    let remaining = week::remaining_hours_in_week(&location.schedule, week_start, now);
    let total = week::total_hours_in_week(&location.schedule);
    let classification = classify(
        RiskInput {
            assigned: true,
            hours_attended: attendance.hours_attended,
            hours_required: program.hours_per_week,
            clinic_hours_remaining: remaining,
        },
        tiers,
    );

    let metric = WeeklyMetric {
        metric_id: Uuid::new_v4(),
        patient_id: patient.patient_id,
        week_start_date: week_start,
        program_id: program.program_id,
        location_id: location.location_id,
        hours_attended: attendance.hours_attended,
        hours_required: program.hours_per_week,
        hours_remaining_needed: classification.hours_remaining_needed,
        sessions_attended: attendance.sessions_attended,
        sessions_missed: attendance.sessions_missed,
        clinic_hours_available_total: total,
        clinic_hours_remaining: remaining,
        risk_score: classification.risk_score,
        risk_tier_id: classification.risk_tier_id,
        compliance_status: classification.compliance_status,
        needs_followup: classification.needs_followup,
        calculated_at: now,
        calculation_source: source.to_string(),
        created_at: now,
        updated_at: now,
    };

    db::metrics::upsert(&mut tx, organization_id, &metric).await?;
    tx.commit().await?;
    Ok(())
}
