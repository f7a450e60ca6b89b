//! Patient management endpoints (tenant-scoped through RLS)

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use caretrack_common::models::{
    AssignmentRequest, BulkAssignmentRequest, NewPatient, Patient, PatientUpdate,
};
use caretrack_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::principal::{resolve_org, CurrentUser, RequireAdmin};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/unassigned", get(list_unassigned))
        .route("/assign", post(assign_patient))
        .route("/bulk-assign", post(bulk_assign))
        .route(
            "/:patient_id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

#[derive(Debug, Default, Deserialize)]
struct PatientListQuery {
    status: Option<String>,
    search: Option<String>,
}

async fn list_patients(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(params): Query<PatientListQuery>,
) -> ApiResult<Json<Vec<Patient>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patients =
        db::patients::list(&mut tx, params.status.as_deref(), params.search.as_deref()).await?;
    tx.commit().await?;
    Ok(Json(patients))
}

async fn list_unassigned(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Patient>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patients = db::patients::list_unassigned(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(patients))
}

async fn get_patient(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patient = db::patients::get(&mut tx, patient_id).await?;
    tx.commit().await?;
    Ok(Json(patient))
}

async fn create_patient(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(new): Json<NewPatient>,
) -> ApiResult<Json<Patient>> {
    let organization_id = resolve_org(&caller, new.organization_id)?;
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patient = db::patients::create(&mut tx, organization_id, &new).await?;
    tx.commit().await?;
    Ok(Json(patient))
}

async fn update_patient(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(patient_id): Path<Uuid>,
    Json(upd): Json<PatientUpdate>,
) -> ApiResult<Json<Patient>> {
    if upd.is_empty() {
        return Err(Error::Validation("No fields to update".to_string()).into());
    }
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patient = db::patients::update(&mut tx, patient_id, &upd).await?;
    tx.commit().await?;
    Ok(Json(patient))
}

async fn delete_patient(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    db::patients::soft_delete(&mut tx, patient_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "message": "Patient deleted" })))
}

async fn assign_patient(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<Json<Patient>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let patient = db::patients::assign(&mut tx, &req).await?;
    tx.commit().await?;
    Ok(Json(patient))
}

#[derive(Debug, Serialize)]
struct BulkAssignmentOutcome {
    assigned_count: u32,
    error_count: u32,
    errors: Vec<String>,
}

/// Assign many patients in one call; each assignment succeeds or fails
/// independently
async fn bulk_assign(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(req): Json<BulkAssignmentRequest>,
) -> ApiResult<Json<BulkAssignmentOutcome>> {
    let mut outcome = BulkAssignmentOutcome {
        assigned_count: 0,
        error_count: 0,
        errors: Vec::new(),
    };

    for assignment in &req.assignments {
        // One transaction per item so a failure cannot poison the rest
        let result = async {
            let mut tx = db::begin_scoped(&state.db, &caller).await?;
            db::patients::assign(&mut tx, assignment).await?;
            tx.commit().await?;
            Ok::<_, Error>(())
        }
        .await;

        match result {
            Ok(()) => outcome.assigned_count += 1,
            Err(e) => {
                outcome.error_count += 1;
                outcome
                    .errors
                    .push(format!("patient {}: {}", assignment.patient_id, e));
            }
        }
    }

    Ok(Json(outcome))
}
