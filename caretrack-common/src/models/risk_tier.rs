//! Tenant-configurable risk tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskTier {
    pub tier_id: Uuid,
    pub organization_id: Uuid,
    /// Unique within the organization
    pub tier_label: String,
    pub tier_description: String,
    pub recommended_actions: String,
    /// Half-open range [low, high) matched against a computed risk score.
    /// Ranges are not structurally guaranteed non-overlapping; overlaps
    /// resolve by ascending sort_order.
    pub risk_level_range_low: f64,
    pub risk_level_range_high: f64,
    pub color: String,
    pub sort_order: i32,
    pub auto_flag_for_followup: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskTier {
    /// Half-open containment check
    pub fn contains(&self, score: f64) -> bool {
        score >= self.risk_level_range_low && score < self.risk_level_range_high
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRiskTier {
    /// Required for superusers; overwritten for tenant admins
    pub organization_id: Option<Uuid>,
    pub tier_label: String,
    pub tier_description: String,
    pub recommended_actions: String,
    pub risk_level_range_low: f64,
    pub risk_level_range_high: f64,
    pub color: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub auto_flag_for_followup: bool,
}
