//! Audit-log retrieval and retention endpoints (superuser only)

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use caretrack_common::models::{AuditLogEntry, AuditLogFilter, AuditSummary};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db;
use crate::error::ApiResult;
use crate::principal::RequireSuperuser;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(query_logs))
        .route("/logs/failed-access", get(failed_access))
        .route("/stats/summary", get(stats_summary))
        .route("/cleanup", post(cleanup))
}

async fn query_logs(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Query(filter): Query<AuditLogFilter>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let entries = db::audit_logs::query(&state.db, &filter).await?;
    Ok(Json(entries))
}

fn default_hours() -> i64 {
    24
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
struct FailedAccessQuery {
    /// Look back this many hours
    #[serde(default = "default_hours")]
    hours: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

/// 401/403 entries within the trailing window, for security monitoring
async fn failed_access(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Query(params): Query<FailedAccessQuery>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let entries =
        db::audit_logs::failed_access(&state.db, params.hours, params.limit, params.offset)
            .await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    #[serde(default = "default_hours")]
    hours: i64,
}

async fn stats_summary(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Query(params): Query<SummaryQuery>,
) -> ApiResult<Json<AuditSummary>> {
    let summary = db::audit_logs::summary(&state.db, params.hours).await?;
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
struct CleanupRequest {
    /// Defaults to the configured retention window
    retention_months: Option<u32>,
}

/// Delete audit entries older than the retention window
async fn cleanup(
    State(state): State<AppState>,
    RequireSuperuser(caller): RequireSuperuser,
    Json(req): Json<CleanupRequest>,
) -> ApiResult<Json<Value>> {
    let months = req
        .retention_months
        .unwrap_or(state.audit_retention_months)
        .max(1);
    let deleted = db::audit_logs::cleanup(&state.db, months).await?;

    info!(
        "Audit cleanup by {}: {} entries older than {} months deleted",
        caller.email, deleted, months
    );
    Ok(Json(json!({
        "deleted_count": deleted,
        "retention_months": months,
    })))
}
