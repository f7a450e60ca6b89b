//! Organization (tenant) queries
//!
//! Not under RLS; every handler touching these is gated to superusers,
//! except the read of the caller's own organization.

use caretrack_common::models::Organization;
use caretrack_common::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const COLUMNS: &str =
    "organization_id, name, description, address, phone, email, status, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

fn from_row(row: &PgRow) -> Result<Organization> {
    Ok(Organization {
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list(pool: &PgPool) -> Result<Vec<Organization>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM organizations ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn get(pool: &PgPool, organization_id: Uuid) -> Result<Organization> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM organizations WHERE organization_id = $1"
    ))
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!(
            "Organization {} not found",
            organization_id
        ))),
    }
}

pub async fn create(pool: &PgPool, new: &NewOrganization) -> Result<Organization> {
    let exists = sqlx::query("SELECT 1 FROM organizations WHERE lower(name) = lower($1)")
        .bind(&new.name)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(Error::Validation(format!(
            "An organization named '{}' already exists",
            new.name
        )));
    }

    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO organizations \
             (organization_id, name, description, address, phone, email, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $7) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.address)
    .bind(&new.phone)
    .bind(&new.email)
    .bind(now)
    .fetch_one(pool)
    .await?;

    from_row(&row)
}

pub async fn update(
    pool: &PgPool,
    organization_id: Uuid,
    upd: &OrganizationUpdate,
) -> Result<Organization> {
    let current = get(pool, organization_id).await?;

    let row = sqlx::query(&format!(
        "UPDATE organizations \
         SET name = $2, description = $3, address = $4, phone = $5, email = $6, status = $7, \
             updated_at = $8 \
         WHERE organization_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(organization_id)
    .bind(upd.name.as_ref().unwrap_or(&current.name))
    .bind(upd.description.as_ref().or(current.description.as_ref()))
    .bind(upd.address.as_ref().or(current.address.as_ref()))
    .bind(upd.phone.as_ref().or(current.phone.as_ref()))
    .bind(upd.email.as_ref().or(current.email.as_ref()))
    .bind(upd.status.as_ref().unwrap_or(&current.status))
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    from_row(&row)
}

/// Soft delete: mark inactive, keep all rows owned by the tenant
pub async fn deactivate(pool: &PgPool, organization_id: Uuid) -> Result<Organization> {
    let row = sqlx::query(&format!(
        "UPDATE organizations SET status = 'inactive', updated_at = $2 \
         WHERE organization_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(organization_id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!(
            "Organization {} not found",
            organization_id
        ))),
    }
}
