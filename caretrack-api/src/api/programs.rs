//! Treatment-program endpoints (tenant-scoped through RLS)

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use caretrack_common::models::{NewProgram, Program, ProgramUpdate};
use caretrack_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::principal::{resolve_org, CurrentUser, RequireAdmin};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_programs).post(create_program))
        .route(
            "/:program_id",
            get(get_program).put(update_program).delete(deactivate_program),
        )
        .route("/:program_id/patient-count", get(program_patient_count))
}

#[derive(Debug, Default, Deserialize)]
struct ProgramListQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_programs(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<ProgramListQuery>,
) -> ApiResult<Json<Vec<Program>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let programs = db::programs::list(&mut tx, params.include_inactive).await?;
    tx.commit().await?;
    Ok(Json(programs))
}

async fn get_program(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Program>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let program = db::programs::get(&mut tx, program_id).await?;
    tx.commit().await?;
    Ok(Json(program))
}

async fn create_program(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(new): Json<NewProgram>,
) -> ApiResult<Json<Program>> {
    let organization_id = resolve_org(&caller, new.organization_id)?;
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let program = db::programs::create(&mut tx, organization_id, &new).await?;
    tx.commit().await?;
    Ok(Json(program))
}

async fn update_program(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(program_id): Path<Uuid>,
    Json(upd): Json<ProgramUpdate>,
) -> ApiResult<Json<Program>> {
    if upd.is_empty() {
        return Err(Error::Validation("No fields to update".to_string()).into());
    }
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let program = db::programs::update(&mut tx, program_id, &upd).await?;
    tx.commit().await?;
    Ok(Json(program))
}

/// Non-deleted patients currently referencing the program
async fn program_patient_count(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let (program, count) = db::programs::patient_count(&mut tx, program_id).await?;
    tx.commit().await?;
    Ok(Json(json!({
        "program_id": program.program_id,
        "name": program.name,
        "patient_count": count,
    })))
}

async fn deactivate_program(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Program>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let program = db::programs::deactivate(&mut tx, program_id).await?;
    tx.commit().await?;
    Ok(Json(program))
}
