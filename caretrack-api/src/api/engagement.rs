//! Engagement dashboard endpoints
//!
//! Views over the same live classification the risk module uses; the
//! dashboard includes unassigned patients, the summary aggregates by
//! compliance status.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use caretrack_common::models::{AssignmentStatus, ComplianceStatus};
use caretrack_common::week;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::principal::{resolve_org, CurrentUser};
use crate::risk_pipeline::{self, PatientWeekView};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/summary", get(summary))
}

#[derive(Debug, Default, Deserialize)]
struct OrgQuery {
    organization_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    organization_id: Option<Uuid>,
    location_id: Option<Uuid>,
    program_id: Option<Uuid>,
    assignment_status: Option<AssignmentStatus>,
    compliance_status: Option<ComplianceStatus>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// Filter and paginate an already-sorted snapshot
fn apply_dashboard_filters(
    views: Vec<PatientWeekView>,
    params: &DashboardQuery,
) -> Vec<PatientWeekView> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(1000);

    views
        .into_iter()
        .filter(|v| params.location_id.map_or(true, |id| v.location_id == Some(id)))
        .filter(|v| params.program_id.map_or(true, |id| v.program_id == Some(id)))
        .filter(|v| {
            params
                .assignment_status
                .map_or(true, |s| v.assignment_status == s)
        })
        .filter(|v| {
            params
                .compliance_status
                .map_or(true, |s| v.classification.compliance_status == s)
        })
        .skip(offset)
        .take(limit)
        .collect()
}

#[derive(Debug, Serialize)]
struct EngagementSummary {
    week_start_date: NaiveDate,
    total_patients: usize,
    compliant: usize,
    at_risk: usize,
    non_compliant: usize,
    unassigned: usize,
    needs_followup: usize,
    average_risk_score: f64,
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<PatientWeekView>>> {
    let organization_id = resolve_org(&caller, params.organization_id)?;
    let now = Utc::now();
    let week_start = week::week_start(now.date_naive());

    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let views = risk_pipeline::week_snapshot(&mut tx, organization_id, week_start, now).await?;
    tx.commit().await?;
    Ok(Json(apply_dashboard_filters(views, &params)))
}

async fn summary(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<OrgQuery>,
) -> ApiResult<Json<EngagementSummary>> {
    let organization_id = resolve_org(&caller, params.organization_id)?;
    let now = Utc::now();
    let week_start = week::week_start(now.date_naive());

    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let views = risk_pipeline::week_snapshot(&mut tx, organization_id, week_start, now).await?;
    tx.commit().await?;

    let mut summary = EngagementSummary {
        week_start_date: week_start,
        total_patients: views.len(),
        compliant: 0,
        at_risk: 0,
        non_compliant: 0,
        unassigned: 0,
        needs_followup: 0,
        average_risk_score: 0.0,
    };

    let mut score_sum = 0.0;
    let mut scored = 0usize;
    for view in &views {
        match view.classification.compliance_status {
            ComplianceStatus::Compliant => summary.compliant += 1,
            ComplianceStatus::AtRisk => summary.at_risk += 1,
            ComplianceStatus::NonCompliant => summary.non_compliant += 1,
            ComplianceStatus::Unassigned => summary.unassigned += 1,
        }
        if view.classification.needs_followup {
            summary.needs_followup += 1;
        }
        if view.classification.compliance_status != ComplianceStatus::Unassigned {
            score_sum += view.classification.risk_score;
            scored += 1;
        }
    }
    if scored > 0 {
        summary.average_risk_score = score_sum / scored as f64;
    }

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use caretrack_common::risk::{classify, RiskInput};

    fn view(program: Option<Uuid>, location: Option<Uuid>) -> PatientWeekView {
        let assigned = program.is_some() && location.is_some();
        let classification = classify(
            RiskInput {
                assigned,
                hours_attended: 2.0,
                hours_required: 10.0,
                clinic_hours_remaining: 20.0,
            },
            &[],
        );
        PatientWeekView {
            patient_id: Uuid::new_v4(),
            full_name: "Test Patient".into(),
            mr: "MR-1".into(),
            assignment_status: AssignmentStatus::derive(program, location),
            program_id: program,
            program_name: None,
            location_id: location,
            location_name: None,
            week_start_date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
            hours_attended: 2.0,
            hours_required: 10.0,
            clinic_hours_remaining: 20.0,
            sessions_attended: 2,
            sessions_missed: 0,
            classification,
        }
    }

    #[test]
    fn test_dashboard_filters_by_program() {
        let program = Uuid::new_v4();
        let location = Uuid::new_v4();
        let views = vec![
            view(Some(program), Some(location)),
            view(Some(Uuid::new_v4()), Some(location)),
            view(None, None),
        ];

        let params = DashboardQuery {
            program_id: Some(program),
            ..Default::default()
        };
        let filtered = apply_dashboard_filters(views, &params);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].program_id, Some(program));
    }

    #[test]
    fn test_dashboard_filters_by_compliance_status() {
        let views = vec![
            view(Some(Uuid::new_v4()), Some(Uuid::new_v4())),
            view(None, None),
        ];

        let params = DashboardQuery {
            compliance_status: Some(ComplianceStatus::Unassigned),
            ..Default::default()
        };
        let filtered = apply_dashboard_filters(views, &params);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].assignment_status, AssignmentStatus::Pending);
    }

    #[test]
    fn test_dashboard_pagination() {
        let views: Vec<_> = (0..5).map(|_| view(None, None)).collect();
        let second_page = views[2].patient_id;

        let params = DashboardQuery {
            limit: Some(2),
            offset: Some(2),
            ..Default::default()
        };
        let filtered = apply_dashboard_filters(views, &params);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].patient_id, second_page);
    }
}
