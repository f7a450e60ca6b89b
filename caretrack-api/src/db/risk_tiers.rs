//! Risk-tier queries (RLS-protected)

use caretrack_common::models::{NewRiskTier, RiskTier};
use caretrack_common::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::ScopedTx;

const COLUMNS: &str = "tier_id, organization_id, tier_label, tier_description, \
     recommended_actions, risk_level_range_low, risk_level_range_high, color, sort_order, \
     auto_flag_for_followup, status, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskTierUpdate {
    pub tier_label: Option<String>,
    pub tier_description: Option<String>,
    pub recommended_actions: Option<String>,
    pub risk_level_range_low: Option<f64>,
    pub risk_level_range_high: Option<f64>,
    pub color: Option<String>,
    pub sort_order: Option<i32>,
    pub auto_flag_for_followup: Option<bool>,
    pub status: Option<String>,
}

fn from_row(row: &PgRow) -> Result<RiskTier> {
    Ok(RiskTier {
        tier_id: row.try_get("tier_id")?,
        organization_id: row.try_get("organization_id")?,
        tier_label: row.try_get("tier_label")?,
        tier_description: row.try_get("tier_description")?,
        recommended_actions: row.try_get("recommended_actions")?,
        risk_level_range_low: row.try_get("risk_level_range_low")?,
        risk_level_range_high: row.try_get("risk_level_range_high")?,
        color: row.try_get("color")?,
        sort_order: row.try_get("sort_order")?,
        auto_flag_for_followup: row.try_get("auto_flag_for_followup")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn validate_range(low: f64, high: f64) -> Result<()> {
    if low < 0.0 || high <= low {
        return Err(Error::Validation(
            "Risk range must satisfy 0 <= low < high".to_string(),
        ));
    }
    Ok(())
}

/// Active tiers ordered by sort_order, the order tier matching resolves
/// overlaps in
pub async fn list_active(tx: &mut ScopedTx) -> Result<Vec<RiskTier>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM risk_tiers WHERE status = 'active' ORDER BY sort_order, tier_label"
    ))
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_active_for_org(tx: &mut ScopedTx, organization_id: Uuid) -> Result<Vec<RiskTier>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM risk_tiers \
         WHERE organization_id = $1 AND status = 'active' \
         ORDER BY sort_order, tier_label"
    ))
    .bind(organization_id)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn get(tx: &mut ScopedTx, tier_id: Uuid) -> Result<RiskTier> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM risk_tiers WHERE tier_id = $1"
    ))
    .bind(tier_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => from_row(&row),
        None => Err(Error::NotFound(format!("Risk tier {} not found", tier_id))),
    }
}

pub async fn create(
    tx: &mut ScopedTx,
    organization_id: Uuid,
    new: &NewRiskTier,
) -> Result<RiskTier> {
    validate_range(new.risk_level_range_low, new.risk_level_range_high)?;

    let duplicate = sqlx::query(
        "SELECT 1 FROM risk_tiers \
         WHERE organization_id = $1 AND lower(tier_label) = lower($2) AND status = 'active'",
    )
    .bind(organization_id)
    .bind(&new.tier_label)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Err(Error::Validation(format!(
            "A tier labeled '{}' already exists",
            new.tier_label
        )));
    }

    let now = Utc::now();
    let row = sqlx::query(&format!(
        "INSERT INTO risk_tiers \
             (tier_id, organization_id, tier_label, tier_description, recommended_actions, \
              risk_level_range_low, risk_level_range_high, color, sort_order, \
              auto_flag_for_followup, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'active', $11, $11) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(&new.tier_label)
    .bind(&new.tier_description)
    .bind(&new.recommended_actions)
    .bind(new.risk_level_range_low)
    .bind(new.risk_level_range_high)
    .bind(&new.color)
    .bind(new.sort_order)
    .bind(new.auto_flag_for_followup)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

pub async fn update(tx: &mut ScopedTx, tier_id: Uuid, upd: &RiskTierUpdate) -> Result<RiskTier> {
    let current = get(tx, tier_id).await?;

    let low = upd.risk_level_range_low.unwrap_or(current.risk_level_range_low);
    let high = upd
        .risk_level_range_high
        .unwrap_or(current.risk_level_range_high);
    validate_range(low, high)?;

    let row = sqlx::query(&format!(
        "UPDATE risk_tiers \
         SET tier_label = $2, tier_description = $3, recommended_actions = $4, \
             risk_level_range_low = $5, risk_level_range_high = $6, color = $7, \
             sort_order = $8, auto_flag_for_followup = $9, status = $10, updated_at = $11 \
         WHERE tier_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(tier_id)
    .bind(upd.tier_label.as_ref().unwrap_or(&current.tier_label))
    .bind(upd.tier_description.as_ref().unwrap_or(&current.tier_description))
    .bind(upd.recommended_actions.as_ref().unwrap_or(&current.recommended_actions))
    .bind(low)
    .bind(high)
    .bind(upd.color.as_ref().unwrap_or(&current.color))
    .bind(upd.sort_order.unwrap_or(current.sort_order))
    .bind(upd.auto_flag_for_followup.unwrap_or(current.auto_flag_for_followup))
    .bind(upd.status.as_ref().unwrap_or(&current.status))
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}

/// Soft delete: historical metrics keep their tier reference
pub async fn deactivate(tx: &mut ScopedTx, tier_id: Uuid) -> Result<RiskTier> {
    get(tx, tier_id).await?;

    let row = sqlx::query(&format!(
        "UPDATE risk_tiers SET status = 'inactive', updated_at = $2 \
         WHERE tier_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(tier_id)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    from_row(&row)
}
