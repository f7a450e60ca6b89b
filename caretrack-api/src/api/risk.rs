//! Risk endpoints: tier configuration, weekly views, export, and the
//! weekly calculation trigger

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use caretrack_common::models::{
    CalculationOutcome, ComplianceStatus, NewRiskTier, RiskTier, WeeklyCalculationRequest,
    WeeklyMetric,
};
use caretrack_common::week;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::db::risk_tiers::RiskTierUpdate;
use crate::error::ApiResult;
use crate::principal::{resolve_org, CurrentUser, RequireAdmin};
use crate::risk_pipeline::{self, PatientWeekView};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tiers", get(list_tiers).post(create_tier))
        .route("/tiers/:tier_id", get(get_tier).put(update_tier).delete(deactivate_tier))
        .route("/current-week", get(current_week))
        .route("/week/:week_start", get(stored_week))
        .route("/patients/:patient_id", get(patient_history))
        .route("/export/high-risk", get(export_high_risk))
        .route("/calculate-weekly-metrics", post(calculate_weekly_metrics))
}

#[derive(Debug, Default, Deserialize)]
struct OrgQuery {
    organization_id: Option<Uuid>,
}

// --- tier configuration ---

async fn list_tiers(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<RiskTier>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let tiers = db::risk_tiers::list_active(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(tiers))
}

async fn get_tier(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(tier_id): Path<Uuid>,
) -> ApiResult<Json<RiskTier>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let tier = db::risk_tiers::get(&mut tx, tier_id).await?;
    tx.commit().await?;
    Ok(Json(tier))
}

async fn create_tier(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(new): Json<NewRiskTier>,
) -> ApiResult<Json<RiskTier>> {
    let organization_id = resolve_org(&caller, new.organization_id)?;
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let tier = db::risk_tiers::create(&mut tx, organization_id, &new).await?;
    tx.commit().await?;
    Ok(Json(tier))
}

async fn update_tier(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(tier_id): Path<Uuid>,
    Json(upd): Json<RiskTierUpdate>,
) -> ApiResult<Json<RiskTier>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let tier = db::risk_tiers::update(&mut tx, tier_id, &upd).await?;
    tx.commit().await?;
    Ok(Json(tier))
}

async fn deactivate_tier(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(tier_id): Path<Uuid>,
) -> ApiResult<Json<RiskTier>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let tier = db::risk_tiers::deactivate(&mut tx, tier_id).await?;
    tx.commit().await?;
    Ok(Json(tier))
}

// --- weekly views ---

/// Live classification for the current week; computed on the fly, never
/// stored
async fn current_week(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<OrgQuery>,
) -> ApiResult<Json<Vec<PatientWeekView>>> {
    let organization_id = resolve_org(&caller, params.organization_id)?;
    let now = Utc::now();
    let week_start = week::week_start(now.date_naive());

    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let views = risk_pipeline::week_snapshot(&mut tx, organization_id, week_start, now).await?;
    tx.commit().await?;
    Ok(Json(views))
}

/// Stored metrics for one past week
async fn stored_week(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(week_start): Path<NaiveDate>,
) -> ApiResult<Json<Vec<WeeklyMetric>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let metrics = db::metrics::list_for_week(&mut tx, week_start).await?;
    tx.commit().await?;
    Ok(Json(metrics))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn patient_history(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<WeeklyMetric>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    // Visibility check first, so a cross-tenant id is a 404
    db::patients::get(&mut tx, patient_id).await?;
    let metrics = db::metrics::list_for_patient(
        &mut tx,
        patient_id,
        params.limit.unwrap_or(12).clamp(1, 104),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(metrics))
}

/// Export the current week's at-risk and non-compliant patients
///
/// The audit middleware records this as an EXPORT with `data_exported`
/// set on success.
async fn export_high_risk(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<OrgQuery>,
) -> ApiResult<Json<Vec<PatientWeekView>>> {
    let organization_id = resolve_org(&caller, params.organization_id)?;
    let now = Utc::now();
    let week_start = week::week_start(now.date_naive());

    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let mut views = risk_pipeline::week_snapshot(&mut tx, organization_id, week_start, now).await?;
    tx.commit().await?;

    views.retain(|v| {
        matches!(
            v.classification.compliance_status,
            ComplianceStatus::AtRisk | ComplianceStatus::NonCompliant
        )
    });

    info!(
        "High-risk export: {} patients for organization {}",
        views.len(),
        organization_id
    );
    Ok(Json(views))
}

// --- weekly calculation ---

async fn calculate_weekly_metrics(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(req): Json<WeeklyCalculationRequest>,
) -> ApiResult<Json<CalculationOutcome>> {
    let organization_id = resolve_org(&caller, req.organization_id)?;
    let now = Utc::now();
    let week_start = req
        .week_start_date
        .map(week::week_start)
        .unwrap_or_else(|| week::week_start(now.date_naive()));

    let outcome = risk_pipeline::run_weekly_calculation(
        &state.db,
        &caller,
        organization_id,
        week_start,
        now,
        "manual",
    )
    .await?;

    info!(
        "Weekly calculation for org {} week {}: {} calculated, {} skipped, {} errors",
        organization_id,
        week_start,
        outcome.calculated_count,
        outcome.skipped_count,
        outcome.error_count
    );
    Ok(Json(outcome))
}
