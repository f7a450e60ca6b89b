//! Clinic-location queries (RLS-protected)
//!
//! The weekly open/close schedule is stored as JSONB: seven `{open, close}`
//! pairs, Monday first.

use caretrack_common::models::location::DayHours;
use caretrack_common::models::{Location, LocationTimingsUpdate, LocationUpdate, NewLocation};
use caretrack_common::{Error, Result};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str =
    "location_id, organization_id, name, timezone, schedule, created_at, updated_at";

fn schedule_to_json(schedule: &[DayHours; 7]) -> Result<serde_json::Value> {
    serde_json::to_value(schedule)
        .map_err(|e| Error::Internal(format!("Schedule serialization failed: {}", e)))
}

fn from_row(row: &PgRow) -> Result<Location> {
    let schedule: serde_json::Value = row.try_get("schedule")?;
    let schedule: [DayHours; 7] = serde_json::from_value(schedule)
        .map_err(|e| Error::Internal(format!("Malformed schedule in database: {}", e)))?;

    Ok(Location {
        location_id: row.try_get("location_id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        timezone: row.try_get("timezone")?,
        schedule,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list(tx: &mut ScopedTx) -> Result<Vec<Location>> {
    let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM locations ORDER BY name"))
        .fetch_all(&mut **tx)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_org(tx: &mut ScopedTx, organization_id: Uuid) -> Result<Vec<Location>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM locations WHERE organization_id = $1"
    ))
    .bind(organization_id)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn get(tx: &mut ScopedTx, location_id: Uuid) -> Result<Location> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM locations WHERE location_id = $1"
    ))
    .bind(location_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!(
            "Location {} not found",
            location_id
        ))),
    }
}

pub async fn create(
    tx: &mut ScopedTx,
    organization_id: Uuid,
    new: &NewLocation,
) -> Result<Location> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO locations \
             (location_id, organization_id, name, timezone, schedule, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $6) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(&new.name)
    .bind(&new.timezone)
    .bind(schedule_to_json(&new.schedule)?)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

pub async fn update(tx: &mut ScopedTx, location_id: Uuid, upd: &LocationUpdate) -> Result<Location> {
    get(tx, location_id).await?;

    let row = sqlx::query(&format!(
        "UPDATE locations \
         SET name = $2, timezone = $3, schedule = $4, updated_at = $5 \
         WHERE location_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(location_id)
    .bind(&upd.name)
    .bind(&upd.timezone)
    .bind(schedule_to_json(&upd.schedule)?)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Timings-only partial update: days left as `None` keep their current hours
pub async fn update_timings(
    tx: &mut ScopedTx,
    location_id: Uuid,
    upd: &LocationTimingsUpdate,
) -> Result<Location> {
    let current = get(tx, location_id).await?;

    let mut schedule = current.schedule;
    for (day, new_hours) in schedule.iter_mut().zip(upd.schedule.iter()) {
        if let Some(hours) = new_hours {
            *day = *hours;
        }
    }

    let row = sqlx::query(&format!(
        "UPDATE locations \
         SET timezone = $2, schedule = $3, updated_at = $4 \
         WHERE location_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(location_id)
    .bind(upd.timezone.as_ref().unwrap_or(&current.timezone))
    .bind(schedule_to_json(&schedule)?)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Delete a location; refused while active patients are assigned to it
pub async fn delete(tx: &mut ScopedTx, location_id: Uuid) -> Result<()> {
    get(tx, location_id).await?;

    let assigned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM patients WHERE location_id = $1 AND status = 'active'",
    )
    .bind(location_id)
    .fetch_one(&mut **tx)
    .await?;
    if assigned > 0 {
        return Err(Error::Validation(format!(
            "Cannot delete location with {} active patients assigned",
            assigned
        )));
    }

    sqlx::query("DELETE FROM locations WHERE location_id = $1")
        .bind(location_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Patient counts for one location
pub async fn patient_counts(tx: &mut ScopedTx, location_id: Uuid) -> Result<(i64, i64, i64)> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE assignment_status = 'assigned') AS assigned, \
                COUNT(*) FILTER (WHERE assignment_status = 'pending') AS pending \
         FROM patients WHERE location_id = $1 AND status = 'active'",
    )
    .bind(location_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok((
        row.try_get("total")?,
        row.try_get("assigned")?,
        row.try_get("pending")?,
    ))
}
