//! User account queries
//!
//! Not under RLS: principal resolution runs before any tenant context
//! exists. Tenant scoping for admin listings is enforced in SQL here and
//! by role checks in the handlers.

use caretrack_common::models::{Principal, Role};
use caretrack_common::{Error, Result};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const PRINCIPAL_COLUMNS: &str = "user_id, username, email, role, organization_id, location_id, \
     is_active, created_at, updated_at, last_login";

/// A principal together with their stored password digest
pub struct UserCredentials {
    pub principal: Principal,
    pub password_digest: String,
}

fn principal_from_row(row: &PgRow) -> Result<Principal> {
    let role: String = row.try_get("role")?;
    Ok(Principal {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        role: Role::parse(&role)?,
        organization_id: row.try_get("organization_id")?,
        location_id: row.try_get("location_id")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_login: row.try_get("last_login")?,
    })
}

/// Look up a user by email, with their password digest
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserCredentials>> {
    let row = sqlx::query(&format!(
        "SELECT {PRINCIPAL_COLUMNS}, password_digest FROM users WHERE lower(email) = lower($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(UserCredentials {
            principal: principal_from_row(&row)?,
            password_digest: row.try_get("password_digest")?,
        })),
        None => Ok(None),
    }
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Principal>> {
    let row = sqlx::query(&format!(
        "SELECT {PRINCIPAL_COLUMNS} FROM users WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Insert a user; the caller has already validated role/org consistency
pub async fn create(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_digest: &str,
    role: Role,
    organization_id: Option<Uuid>,
    location_id: Option<Uuid>,
) -> Result<Principal> {
    if find_by_email(pool, email).await?.is_some() {
        return Err(Error::Validation(format!(
            "A user with email {} already exists",
            email
        )));
    }

    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO users \
             (user_id, username, email, password_digest, role, organization_id, location_id, \
              is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8) \
         RETURNING {PRINCIPAL_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_digest)
    .bind(role.as_str())
    .bind(organization_id)
    .bind(location_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    principal_from_row(&row)
}

/// List users: all for superusers, own-organization for everyone else
pub async fn list_for(pool: &PgPool, caller: &Principal) -> Result<Vec<Principal>> {
    let rows = match caller.role {
        Role::Superuser => {
            sqlx::query(&format!(
                "SELECT {PRINCIPAL_COLUMNS} FROM users ORDER BY username"
            ))
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query(&format!(
                "SELECT {PRINCIPAL_COLUMNS} FROM users WHERE organization_id = $1 ORDER BY username"
            ))
            .bind(caller.organization_id)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(principal_from_row).collect()
}

/// Flip a user's active flag, returning the updated principal
pub async fn toggle_active(pool: &PgPool, user_id: Uuid) -> Result<Principal> {
    let row = sqlx::query(&format!(
        "UPDATE users SET is_active = NOT is_active, updated_at = $2 \
         WHERE user_id = $1 \
         RETURNING {PRINCIPAL_COLUMNS}"
    ))
    .bind(user_id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => principal_from_row(&row),
        None => Err(Error::NotFound(format!("User {} not found", user_id))),
    }
}

pub async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}
