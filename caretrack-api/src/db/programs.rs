//! Treatment-program queries (RLS-protected)

use caretrack_common::models::{NewProgram, Program, ProgramUpdate};
use caretrack_common::{Error, Result};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str = "program_id, organization_id, name, description, level_of_care, \
     hours_per_week, status, created_at, updated_at";

fn from_row(row: &PgRow) -> Result<Program> {
    Ok(Program {
        program_id: row.try_get("program_id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        level_of_care: row.try_get("level_of_care")?,
        hours_per_week: row.try_get("hours_per_week")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list(tx: &mut ScopedTx, include_inactive: bool) -> Result<Vec<Program>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM programs \
         WHERE ($1 OR status = 'active') \
         ORDER BY name"
    ))
    .bind(include_inactive)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn list_for_org(tx: &mut ScopedTx, organization_id: Uuid) -> Result<Vec<Program>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM programs WHERE organization_id = $1 AND status = 'active'"
    ))
    .bind(organization_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn get(tx: &mut ScopedTx, program_id: Uuid) -> Result<Program> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM programs WHERE program_id = $1"
    ))
    .bind(program_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!("Program {} not found", program_id))),
    }
}

pub async fn create(tx: &mut ScopedTx, organization_id: Uuid, new: &NewProgram) -> Result<Program> {
    if new.hours_per_week <= 0.0 {
        return Err(Error::Validation(
            "hours_per_week must be positive".to_string(),
        ));
    }

    // Name unique among the organization's active programs
    let duplicate = sqlx::query(
        "SELECT 1 FROM programs \
         WHERE organization_id = $1 AND lower(name) = lower($2) AND status = 'active'",
    )
    .bind(organization_id)
    .bind(&new.name)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Err(Error::Validation(format!(
            "An active program named '{}' already exists",
            new.name
        )));
    }

    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO programs \
             (program_id, organization_id, name, description, level_of_care, hours_per_week, \
              status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $7) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.level_of_care)
    .bind(new.hours_per_week)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

pub async fn update(tx: &mut ScopedTx, program_id: Uuid, upd: &ProgramUpdate) -> Result<Program> {
    let current = get(tx, program_id).await?;

    if let Some(hours) = upd.hours_per_week {
        if hours <= 0.0 {
            return Err(Error::Validation(
                "hours_per_week must be positive".to_string(),
            ));
        }
    }

    let row = sqlx::query(&format!(
        "UPDATE programs \
         SET name = $2, description = $3, level_of_care = $4, hours_per_week = $5, \
             status = $6, updated_at = $7 \
         WHERE program_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(program_id)
    .bind(upd.name.as_ref().unwrap_or(&current.name))
    .bind(upd.description.as_ref().or(current.description.as_ref()))
    .bind(upd.level_of_care.as_ref().or(current.level_of_care.as_ref()))
    .bind(upd.hours_per_week.unwrap_or(current.hours_per_week))
    .bind(upd.status.as_ref().unwrap_or(&current.status))
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Non-deleted patients referencing the program, with the program itself
pub async fn patient_count(tx: &mut ScopedTx, program_id: Uuid) -> Result<(Program, i64)> {
    let program = get(tx, program_id).await?;

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM patients WHERE program_id = $1 AND status <> 'deleted'",
    )
    .bind(program_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok((program, count))
}

/// Deactivate a program; refused while any non-deleted patient references
/// it. Inactive patients count too, since reactivating them would strand
/// them on a dead program.
pub async fn deactivate(tx: &mut ScopedTx, program_id: Uuid) -> Result<Program> {
    let (_, referenced) = patient_count(tx, program_id).await?;
    if referenced > 0 {
        return Err(Error::Validation(format!(
            "Cannot deactivate program with {} patients assigned",
            referenced
        )));
    }

    let row = sqlx::query(&format!(
        "UPDATE programs SET status = 'inactive', updated_at = $2 \
         WHERE program_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(program_id)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}
