//! Data-import inspection endpoints (tenant-scoped through RLS)

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use caretrack_common::models::{ImportRecord, ImportSummary};
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::db::imports::{ImportError, ImportFile, ImportFilter};
use crate::error::ApiResult;
use crate::principal::{CurrentUser, RequireAdmin};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_imports))
        .route("/summary", get(import_summary))
        .route("/files", get(list_files))
        .route("/errors", get(recent_errors))
        .route("/:record_id", get(get_import))
        .route("/:record_id/reprocess", post(reprocess_import))
}

async fn list_imports(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(filter): Query<ImportFilter>,
) -> ApiResult<Json<Vec<ImportRecord>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let records = db::imports::list(&mut tx, &filter).await?;
    tx.commit().await?;
    Ok(Json(records))
}

async fn import_summary(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<ImportSummary>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let summary = db::imports::summary(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(summary))
}

async fn get_import(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<ImportRecord>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let record = db::imports::get(&mut tx, record_id).await?;
    tx.commit().await?;
    Ok(Json(record))
}

/// Distinct imported file names, most recent first
async fn list_files(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
) -> ApiResult<Json<Vec<ImportFile>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let files = db::imports::list_files(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(files))
}

fn default_error_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
struct ErrorsQuery {
    #[serde(default = "default_error_limit")]
    limit: i64,
}

async fn recent_errors(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Query(params): Query<ErrorsQuery>,
) -> ApiResult<Json<Vec<ImportError>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let errors = db::imports::recent_errors(&mut tx, params.limit).await?;
    tx.commit().await?;
    Ok(Json(errors))
}

/// Queue a failed or skipped record for another processing attempt
async fn reprocess_import(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<ImportRecord>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let record = db::imports::reprocess(&mut tx, record_id).await?;
    tx.commit().await?;
    Ok(Json(record))
}
