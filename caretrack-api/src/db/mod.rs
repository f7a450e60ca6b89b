//! Database access layer for caretrack-api
//!
//! Tenant-owned tables (patients, programs, locations, risk_tiers,
//! weekly_metrics, import_records) are protected by row-level security and
//! must only be touched through a transaction opened with [`begin_scoped`].
//! Users, organizations, and audit logs sit outside RLS: principal lookup
//! happens before any tenant context exists, and audit writes must never
//! be filtered.

use caretrack_common::models::Principal;
use caretrack_common::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

pub mod audit_logs;
pub mod imports;
pub mod locations;
pub mod metrics;
pub mod organizations;
pub mod patients;
pub mod programs;
pub mod risk_tiers;
pub mod schema;
pub mod users;

/// A transaction carrying tenant context for RLS-protected tables
pub type ScopedTx = Transaction<'static, Postgres>;

/// Connect to PostgreSQL
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Open a transaction with the caller's tenant context applied
///
/// Sets `app.current_role` and `app.current_org_id` as transaction-local
/// settings (`set_config(..., true)`), which the RLS policies read via
/// `current_setting`. Superusers carry an empty org id; the policies let
/// the superuser role through without an org match. This is the ONLY path
/// to RLS-protected tables; handlers never set the context themselves.
pub async fn begin_scoped(pool: &PgPool, principal: &Principal) -> Result<ScopedTx> {
    let mut tx = pool.begin().await?;

    let org_id = principal
        .organization_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    sqlx::query(
        "SELECT set_config('app.current_role', $1, true),
                set_config('app.current_org_id', $2, true)",
    )
    .bind(principal.role.as_str())
    .bind(org_id)
    .execute(&mut *tx)
    .await?;

    Ok(tx)
}
