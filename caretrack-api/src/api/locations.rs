//! Clinic-location endpoints (tenant-scoped through RLS)

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use caretrack_common::models::{
    Location, LocationStats, LocationTimingsUpdate, LocationUpdate, NewLocation,
};
use caretrack_common::{week, Error};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::principal::{resolve_org, CurrentUser, RequireAdmin};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route(
            "/:location_id",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route("/:location_id/timings", put(update_timings))
        .route("/:location_id/stats", get(location_stats))
}

async fn list_locations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Location>>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let locations = db::locations::list(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(locations))
}

async fn get_location(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(location_id): Path<Uuid>,
) -> ApiResult<Json<Location>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let location = db::locations::get(&mut tx, location_id).await?;
    tx.commit().await?;
    Ok(Json(location))
}

async fn create_location(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(new): Json<NewLocation>,
) -> ApiResult<Json<Location>> {
    let organization_id = resolve_org(&caller, new.organization_id)?;
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let location = db::locations::create(&mut tx, organization_id, &new).await?;
    tx.commit().await?;
    Ok(Json(location))
}

async fn update_location(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(location_id): Path<Uuid>,
    Json(upd): Json<LocationUpdate>,
) -> ApiResult<Json<Location>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let location = db::locations::update(&mut tx, location_id, &upd).await?;
    tx.commit().await?;
    Ok(Json(location))
}

/// Partial update of the weekly schedule only
async fn update_timings(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(location_id): Path<Uuid>,
    Json(upd): Json<LocationTimingsUpdate>,
) -> ApiResult<Json<Location>> {
    if upd.is_empty() {
        return Err(Error::Validation("No fields to update".to_string()).into());
    }
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let location = db::locations::update_timings(&mut tx, location_id, &upd).await?;
    tx.commit().await?;
    Ok(Json(location))
}

async fn delete_location(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(location_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    db::locations::delete(&mut tx, location_id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "message": "Location deleted" })))
}

/// Location enriched with patient counts and the hours still open this week
async fn location_stats(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(location_id): Path<Uuid>,
) -> ApiResult<Json<LocationStats>> {
    let mut tx = db::begin_scoped(&state.db, &caller).await?;
    let location = db::locations::get(&mut tx, location_id).await?;
    let (total, assigned, pending) = db::locations::patient_counts(&mut tx, location_id).await?;
    tx.commit().await?;

    let now = Utc::now();
    let week_start = week::week_start(now.date_naive());
    let remaining = week::remaining_hours_in_week(&location.schedule, week_start, now);

    Ok(Json(LocationStats {
        location,
        total_patients: total,
        assigned_patients: assigned,
        pending_patients: pending,
        weekly_hours_remaining: remaining,
    }))
}
