//! Risk/engagement classification
//!
//! Pure computation turning weekly attendance facts into a risk score, a
//! compliance status, and a matched tenant-configured risk tier. Invoked
//! synchronously for the live current-week view and in batch by the weekly
//! calculation job; neither path adds its own rules.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{ComplianceStatus, RiskTier};

/// Score assigned when a patient still needs hours but the clinic has no
/// remaining capacity this week. Large enough to land above any sane tier
/// range while staying finite for storage and sorting.
pub const MAX_RISK_SCORE: f64 = 999.0;

/// Weekly attendance facts for one patient
#[derive(Debug, Clone, Copy)]
pub struct RiskInput {
    /// Patient has both a program and a location
    pub assigned: bool,
    pub hours_attended: f64,
    pub hours_required: f64,
    pub clinic_hours_remaining: f64,
}

/// Classification result; tier fields echo the matched tier so callers
/// don't need to re-look it up
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub risk_score: f64,
    pub hours_remaining_needed: f64,
    pub compliance_status: ComplianceStatus,
    pub risk_tier_id: Option<Uuid>,
    pub risk_level: Option<String>,
    pub tier_description: Option<String>,
    pub recommended_actions: Option<String>,
    pub color: Option<String>,
    pub needs_followup: bool,
}

/// Classify one patient's week against the tenant's tiers
///
/// The risk score expresses how much of the clinic's *remaining* weekly
/// capacity the patient still needs to consume: a score above 1.0 means
/// compliance is mathematically out of reach this week.
pub fn classify(input: RiskInput, tiers: &[RiskTier]) -> Classification {
    let hours_remaining_needed = (input.hours_required - input.hours_attended).max(0.0);

    let (risk_score, compliance_status) = if !input.assigned {
        (0.0, ComplianceStatus::Unassigned)
    } else if hours_remaining_needed == 0.0 {
        (0.0, ComplianceStatus::Compliant)
    } else if input.clinic_hours_remaining <= 0.0 {
        // No capacity left to catch up
        (MAX_RISK_SCORE, ComplianceStatus::NonCompliant)
    } else {
        let score = hours_remaining_needed / input.clinic_hours_remaining;
        let status = if score <= 1.0 {
            ComplianceStatus::AtRisk
        } else {
            ComplianceStatus::NonCompliant
        };
        (score, status)
    };

    let matched = match_tier(risk_score, tiers);

    Classification {
        risk_score,
        hours_remaining_needed,
        compliance_status,
        risk_tier_id: matched.map(|t| t.tier_id),
        risk_level: matched.map(|t| t.tier_label.clone()),
        tier_description: matched.map(|t| t.tier_description.clone()),
        recommended_actions: matched.map(|t| t.recommended_actions.clone()),
        color: matched.map(|t| t.color.clone()),
        needs_followup: matched.map(|t| t.auto_flag_for_followup).unwrap_or(false),
    }
}

/// Select the tier whose [low, high) range contains the score
///
/// Overlapping ranges resolve by ascending sort_order; ties on sort_order
/// keep the caller's ordering, so repeated calls are deterministic. No
/// match is a valid outcome: compliance status stands on its own.
pub fn match_tier(score: f64, tiers: &[RiskTier]) -> Option<&RiskTier> {
    tiers
        .iter()
        .filter(|t| t.contains(score))
        .min_by_key(|t| t.sort_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tier(label: &str, low: f64, high: f64, sort_order: i32, auto_flag: bool) -> RiskTier {
        RiskTier {
            tier_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            tier_label: label.to_string(),
            tier_description: format!("{} tier", label),
            recommended_actions: "call the patient".to_string(),
            risk_level_range_low: low,
            risk_level_range_high: high,
            color: "#808080".to_string(),
            sort_order,
            auto_flag_for_followup: auto_flag,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assigned(attended: f64, required: f64, remaining: f64) -> RiskInput {
        RiskInput {
            assigned: true,
            hours_attended: attended,
            hours_required: required,
            clinic_hours_remaining: remaining,
        }
    }

    #[test]
    fn test_fully_attended_is_compliant_regardless_of_capacity() {
        for remaining in [0.0, 5.0, 100.0] {
            let c = classify(assigned(10.0, 10.0, remaining), &[]);
            assert_eq!(c.compliance_status, ComplianceStatus::Compliant);
            assert_eq!(c.risk_score, 0.0);
            assert_eq!(c.hours_remaining_needed, 0.0);
        }
    }

    #[test]
    fn test_zero_capacity_with_unmet_hours_is_max_risk() {
        let c = classify(assigned(0.0, 10.0, 0.0), &[]);
        assert_eq!(c.compliance_status, ComplianceStatus::NonCompliant);
        assert_eq!(c.risk_score, MAX_RISK_SCORE);
    }

    #[test]
    fn test_midweek_ratio() {
        let c = classify(assigned(5.0, 10.0, 10.0), &[]);
        assert_eq!(c.hours_remaining_needed, 5.0);
        assert!((c.risk_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(c.compliance_status, ComplianceStatus::AtRisk);
    }

    #[test]
    fn test_score_above_one_is_non_compliant() {
        // Needs 8 hours with only 4 remaining
        let c = classify(assigned(2.0, 10.0, 4.0), &[]);
        assert!(c.risk_score > 1.0);
        assert_eq!(c.compliance_status, ComplianceStatus::NonCompliant);
    }

    #[test]
    fn test_boundary_score_of_exactly_one_is_at_risk() {
        let c = classify(assigned(5.0, 10.0, 5.0), &[]);
        assert!((c.risk_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.compliance_status, ComplianceStatus::AtRisk);
    }

    #[test]
    fn test_unassigned_patient() {
        let input = RiskInput {
            assigned: false,
            hours_attended: 0.0,
            hours_required: 0.0,
            clinic_hours_remaining: 0.0,
        };
        let c = classify(input, &[]);
        assert_eq!(c.compliance_status, ComplianceStatus::Unassigned);
        assert_eq!(c.risk_score, 0.0);
    }

    #[test]
    fn test_over_attended_clamps_to_zero_needed() {
        let c = classify(assigned(12.0, 10.0, 5.0), &[]);
        assert_eq!(c.hours_remaining_needed, 0.0);
        assert_eq!(c.compliance_status, ComplianceStatus::Compliant);
    }

    #[test]
    fn test_tier_half_open_range() {
        let tiers = vec![tier("low", 0.0, 0.5, 0, false), tier("high", 0.5, 2.0, 1, true)];

        let at_boundary = match_tier(0.5, &tiers).unwrap();
        assert_eq!(at_boundary.tier_label, "high");

        let below = match_tier(0.49, &tiers).unwrap();
        assert_eq!(below.tier_label, "low");
    }

    #[test]
    fn test_overlapping_tiers_resolve_by_sort_order() {
        let tiers = vec![
            tier("broad", 0.0, 2.0, 5, false),
            tier("narrow", 0.4, 0.6, 1, true),
        ];

        // Both contain 0.5; lower sort_order wins, deterministically
        for _ in 0..10 {
            let matched = match_tier(0.5, &tiers).unwrap();
            assert_eq!(matched.tier_label, "narrow");
        }
    }

    #[test]
    fn test_no_matching_tier_leaves_status_standing() {
        let tiers = vec![tier("low", 0.0, 0.1, 0, true)];
        let c = classify(assigned(5.0, 10.0, 10.0), &tiers);
        assert_eq!(c.compliance_status, ComplianceStatus::AtRisk);
        assert!(c.risk_tier_id.is_none());
        assert!(!c.needs_followup);
    }

    #[test]
    fn test_followup_flag_comes_from_matched_tier() {
        let tiers = vec![tier("watch", 0.0, 1.0, 0, true)];
        let c = classify(assigned(5.0, 10.0, 10.0), &tiers);
        assert!(c.needs_followup);
    }
}
