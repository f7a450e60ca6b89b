//! Schema initialization and row-level security policies
//!
//! All statements are idempotent (`IF NOT EXISTS` / `DROP POLICY IF
//! EXISTS`), so startup can run them unconditionally.

use caretrack_common::Result;
use sqlx::PgPool;
use tracing::info;

/// Tables owned by a tenant; each carries an `organization_id` column and
/// gets an RLS isolation policy.
const TENANT_TABLES: &[&str] = &[
    "patients",
    "programs",
    "locations",
    "risk_tiers",
    "weekly_metrics",
    "import_records",
];

/// Create all tables and apply RLS policies
pub async fn init_database(pool: &PgPool) -> Result<()> {
    create_organizations_table(pool).await?;
    create_users_table(pool).await?;
    create_patients_table(pool).await?;
    create_programs_table(pool).await?;
    create_locations_table(pool).await?;
    create_risk_tiers_table(pool).await?;
    create_weekly_metrics_table(pool).await?;
    create_import_records_table(pool).await?;
    create_audit_logs_table(pool).await?;

    apply_rls_policies(pool).await?;

    info!("Database schema initialized");
    Ok(())
}

async fn create_organizations_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            organization_id UUID PRIMARY KEY,
            name            TEXT NOT NULL UNIQUE,
            description     TEXT,
            address         TEXT,
            phone           TEXT,
            email           TEXT,
            status          TEXT NOT NULL DEFAULT 'active',
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_users_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id         UUID PRIMARY KEY,
            username        TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password_digest TEXT NOT NULL,
            role            TEXT NOT NULL,
            organization_id UUID REFERENCES organizations(organization_id),
            location_id     UUID,
            is_active       BOOLEAN NOT NULL DEFAULT TRUE,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_login      TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_patients_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            patient_id        UUID PRIMARY KEY,
            organization_id   UUID NOT NULL REFERENCES organizations(organization_id),
            mr                TEXT NOT NULL,
            full_name         TEXT NOT NULL,
            phone             TEXT,
            email             TEXT,
            primary_therapist TEXT,
            admission_date    DATE,
            discharge_date    DATE,
            program_id        UUID,
            location_id       UUID,
            assignment_status TEXT NOT NULL DEFAULT 'pending',
            status            TEXT NOT NULL DEFAULT 'active',
            created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (organization_id, mr)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_programs_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            program_id      UUID PRIMARY KEY,
            organization_id UUID NOT NULL REFERENCES organizations(organization_id),
            name            TEXT NOT NULL,
            description     TEXT,
            level_of_care   TEXT,
            hours_per_week  DOUBLE PRECISION NOT NULL,
            status          TEXT NOT NULL DEFAULT 'active',
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_locations_table(pool: &PgPool) -> Result<()> {
    // schedule: seven {open, close} pairs, Monday first, as JSONB
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            location_id     UUID PRIMARY KEY,
            organization_id UUID NOT NULL REFERENCES organizations(organization_id),
            name            TEXT NOT NULL,
            timezone        TEXT NOT NULL,
            schedule        JSONB NOT NULL,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_risk_tiers_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS risk_tiers (
            tier_id               UUID PRIMARY KEY,
            organization_id       UUID NOT NULL REFERENCES organizations(organization_id),
            tier_label            TEXT NOT NULL,
            tier_description      TEXT NOT NULL,
            recommended_actions   TEXT NOT NULL,
            risk_level_range_low  DOUBLE PRECISION NOT NULL,
            risk_level_range_high DOUBLE PRECISION NOT NULL,
            color                 TEXT NOT NULL,
            sort_order            INTEGER NOT NULL DEFAULT 0,
            auto_flag_for_followup BOOLEAN NOT NULL DEFAULT FALSE,
            status                TEXT NOT NULL DEFAULT 'active',
            created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (organization_id, tier_label)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_weekly_metrics_table(pool: &PgPool) -> Result<()> {
    // One row per (patient, week); recalculation upserts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_metrics (
            metric_id                   UUID PRIMARY KEY,
            organization_id             UUID NOT NULL REFERENCES organizations(organization_id),
            patient_id                  UUID NOT NULL REFERENCES patients(patient_id),
            week_start_date             DATE NOT NULL,
            program_id                  UUID NOT NULL,
            location_id                 UUID NOT NULL,
            hours_attended              DOUBLE PRECISION NOT NULL,
            hours_required              DOUBLE PRECISION NOT NULL,
            hours_remaining_needed      DOUBLE PRECISION NOT NULL,
            sessions_attended           INTEGER NOT NULL,
            sessions_missed             INTEGER NOT NULL,
            clinic_hours_available_total DOUBLE PRECISION NOT NULL,
            clinic_hours_remaining      DOUBLE PRECISION NOT NULL,
            risk_score                  DOUBLE PRECISION NOT NULL,
            risk_tier_id                UUID,
            compliance_status           TEXT NOT NULL,
            needs_followup              BOOLEAN NOT NULL DEFAULT FALSE,
            calculated_at               TIMESTAMPTZ NOT NULL,
            calculation_source          TEXT NOT NULL,
            created_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (patient_id, week_start_date)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_import_records_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_records (
            record_id       UUID PRIMARY KEY,
            service_type    TEXT NOT NULL,
            organization_id UUID NOT NULL REFERENCES organizations(organization_id),
            location_id     UUID NOT NULL,
            file_name       TEXT,
            imported_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
            processed_at    TIMESTAMPTZ,
            status          TEXT NOT NULL DEFAULT 'pending',
            error_message   TEXT,
            full_name       TEXT,
            mr              TEXT,
            admission_date  DATE,
            discharge_date  DATE,
            session_name    TEXT,
            provider        TEXT,
            started         TIMESTAMPTZ,
            ended           TIMESTAMPTZ,
            duration        DOUBLE PRECISION,
            attended        BOOLEAN,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_audit_logs_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            audit_id          UUID PRIMARY KEY,
            timestamp         TIMESTAMPTZ NOT NULL,
            user_id           UUID,
            user_email        TEXT,
            user_role         TEXT,
            organization_id   UUID,
            session_id        TEXT NOT NULL,
            method            TEXT NOT NULL,
            endpoint          TEXT NOT NULL,
            full_url          TEXT NOT NULL,
            user_agent        TEXT,
            ip_address        TEXT NOT NULL,
            status_code       INTEGER NOT NULL,
            response_time_ms  DOUBLE PRECISION NOT NULL,
            action_type       TEXT NOT NULL,
            resource_type     TEXT NOT NULL,
            resource_id       TEXT,
            phi_accessed      BOOLEAN NOT NULL,
            patient_id        UUID,
            data_exported     BOOLEAN NOT NULL,
            request_body_hash TEXT,
            query_parameters  JSONB
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs (timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_patient ON audit_logs (patient_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Apply tenant-isolation policies to every tenant-owned table
///
/// The policy admits a row when the transaction-local role is `superuser`
/// or the row's organization matches the transaction-local org id. FORCE
/// keeps the policy active even for the table owner, which is how the
/// service connects.
async fn apply_rls_policies(pool: &PgPool) -> Result<()> {
    for table in TENANT_TABLES {
        sqlx::query(&format!(
            "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY"
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "ALTER TABLE {table} FORCE ROW LEVEL SECURITY"
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "DROP POLICY IF EXISTS {table}_tenant_isolation ON {table}"
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            r#"
            CREATE POLICY {table}_tenant_isolation ON {table}
                USING (
                    current_setting('app.current_role', true) = 'superuser'
                    OR organization_id::text = current_setting('app.current_org_id', true)
                )
                WITH CHECK (
                    current_setting('app.current_role', true) = 'superuser'
                    OR organization_id::text = current_setting('app.current_org_id', true)
                )
            "#
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}
