//! Patient queries (RLS-protected; all access through a scoped transaction)

use caretrack_common::models::{
    AssignmentRequest, AssignmentStatus, NewPatient, Patient, PatientUpdate,
};
use caretrack_common::{Error, Result};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str = "patient_id, organization_id, mr, full_name, phone, email, \
     primary_therapist, admission_date, discharge_date, program_id, location_id, \
     assignment_status, status, created_at, updated_at";

fn from_row(row: &PgRow) -> Result<Patient> {
    let assignment: String = row.try_get("assignment_status")?;
    Ok(Patient {
        patient_id: row.try_get("patient_id")?,
        organization_id: row.try_get("organization_id")?,
        mr: row.try_get("mr")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        primary_therapist: row.try_get("primary_therapist")?,
        admission_date: row.try_get("admission_date")?,
        discharge_date: row.try_get("discharge_date")?,
        program_id: row.try_get("program_id")?,
        location_id: row.try_get("location_id")?,
        assignment_status: AssignmentStatus::parse(&assignment)
            .ok_or_else(|| Error::Internal(format!("Unknown assignment status: {}", assignment)))?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// List patients visible to the caller, optionally filtered by status and
/// a name/MR search term
pub async fn list(
    tx: &mut ScopedTx,
    status: Option<&str>,
    search: Option<&str>,
) -> Result<Vec<Patient>> {
    let search_pattern = search.map(|s| format!("%{}%", s));
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM patients \
         WHERE ($1::text IS NULL OR status = $1) \
           AND ($2::text IS NULL OR full_name ILIKE $2 OR mr ILIKE $2) \
           AND status <> 'deleted' \
         ORDER BY full_name"
    ))
    .bind(status)
    .bind(search_pattern)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Active patients still awaiting a program/location assignment
pub async fn list_unassigned(tx: &mut ScopedTx) -> Result<Vec<Patient>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM patients \
         WHERE assignment_status = 'pending' AND status = 'active' \
         ORDER BY created_at"
    ))
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Active, fully assigned patients for one organization
pub async fn list_active_for_org(tx: &mut ScopedTx, organization_id: Uuid) -> Result<Vec<Patient>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM patients \
         WHERE organization_id = $1 AND status = 'active' \
         ORDER BY full_name"
    ))
    .bind(organization_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn get(tx: &mut ScopedTx, patient_id: Uuid) -> Result<Patient> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM patients WHERE patient_id = $1 AND status <> 'deleted'"
    ))
    .bind(patient_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!("Patient {} not found", patient_id))),
    }
}

/// Validate that a program (and, if given, a location) exists within the
/// caller's visible scope. Under RLS a cross-tenant id is simply absent.
async fn validate_references(
    tx: &mut ScopedTx,
    program_id: Option<Uuid>,
    location_id: Option<Uuid>,
) -> Result<()> {
    if let Some(id) = program_id {
        let found = sqlx::query("SELECT 1 FROM programs WHERE program_id = $1 AND status = 'active'")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        if found.is_none() {
            return Err(Error::Validation(format!(
                "Program {} does not exist in this organization",
                id
            )));
        }
    }
    if let Some(id) = location_id {
        let found = sqlx::query("SELECT 1 FROM locations WHERE location_id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        if found.is_none() {
            return Err(Error::Validation(format!(
                "Location {} does not exist in this organization",
                id
            )));
        }
    }
    Ok(())
}

pub async fn create(tx: &mut ScopedTx, organization_id: Uuid, new: &NewPatient) -> Result<Patient> {
    let duplicate = sqlx::query(
        "SELECT 1 FROM patients WHERE organization_id = $1 AND mr = $2 AND status <> 'deleted'",
    )
    .bind(organization_id)
    .bind(&new.mr)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Err(Error::Validation(format!(
            "A patient with MR '{}' already exists",
            new.mr
        )));
    }

    validate_references(tx, new.program_id, new.location_id).await?;
    let assignment = AssignmentStatus::derive(new.program_id, new.location_id);

    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO patients \
             (patient_id, organization_id, mr, full_name, phone, email, primary_therapist, \
              admission_date, discharge_date, program_id, location_id, assignment_status, \
              status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(&new.mr)
    .bind(&new.full_name)
    .bind(&new.phone)
    .bind(&new.email)
    .bind(&new.primary_therapist)
    .bind(new.admission_date)
    .bind(new.discharge_date)
    .bind(new.program_id)
    .bind(new.location_id)
    .bind(assignment.as_str())
    .bind(&new.status)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Partial update; assignment status is re-derived from the merged
/// program/location pair
pub async fn update(tx: &mut ScopedTx, patient_id: Uuid, upd: &PatientUpdate) -> Result<Patient> {
    let current = get(tx, patient_id).await?;

    let program_id = upd.program_id.or(current.program_id);
    let location_id = upd.location_id.or(current.location_id);
    if upd.program_id.is_some() || upd.location_id.is_some() {
        validate_references(tx, upd.program_id, upd.location_id).await?;
    }
    let assignment = AssignmentStatus::derive(program_id, location_id);

    let row = sqlx::query(&format!(
        "UPDATE patients \
         SET mr = $2, full_name = $3, phone = $4, email = $5, primary_therapist = $6, \
             admission_date = $7, discharge_date = $8, program_id = $9, location_id = $10, \
             assignment_status = $11, status = $12, updated_at = $13 \
         WHERE patient_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(patient_id)
    .bind(upd.mr.as_ref().unwrap_or(&current.mr))
    .bind(upd.full_name.as_ref().unwrap_or(&current.full_name))
    .bind(upd.phone.as_ref().or(current.phone.as_ref()))
    .bind(upd.email.as_ref().or(current.email.as_ref()))
    .bind(upd.primary_therapist.as_ref().or(current.primary_therapist.as_ref()))
    .bind(upd.admission_date.or(current.admission_date))
    .bind(upd.discharge_date.or(current.discharge_date))
    .bind(program_id)
    .bind(location_id)
    .bind(assignment.as_str())
    .bind(upd.status.as_ref().unwrap_or(&current.status))
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Assign a patient to a program and location in one step
pub async fn assign(tx: &mut ScopedTx, req: &AssignmentRequest) -> Result<Patient> {
    // Existence check first so a bad patient id is a 404, not a 400
    get(tx, req.patient_id).await?;
    validate_references(tx, Some(req.program_id), Some(req.location_id)).await?;

    let row = sqlx::query(&format!(
        "UPDATE patients \
         SET program_id = $2, location_id = $3, assignment_status = $4, updated_at = $5 \
         WHERE patient_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(req.patient_id)
    .bind(req.program_id)
    .bind(req.location_id)
    .bind(AssignmentStatus::Assigned.as_str())
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Soft delete; the row stays for metrics history and audit trails
pub async fn soft_delete(tx: &mut ScopedTx, patient_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE patients SET status = 'deleted', updated_at = $2 \
         WHERE patient_id = $1 AND status <> 'deleted'",
    )
    .bind(patient_id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Patient {} not found", patient_id)));
    }
    Ok(())
}
