//! Patients, assignment status, and compliance classification

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived purely from (program_id, location_id): assigned iff both set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Assigned,
}

impl AssignmentStatus {
    /// The one place assignment status is derived; callers must re-derive
    /// on every mutation touching program_id or location_id.
    pub fn derive(program_id: Option<Uuid>, location_id: Option<Uuid>) -> AssignmentStatus {
        if program_id.is_some() && location_id.is_some() {
            AssignmentStatus::Assigned
        } else {
            AssignmentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<AssignmentStatus> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "assigned" => Some(AssignmentStatus::Assigned),
            _ => None,
        }
    }
}

/// Weekly attendance versus requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    AtRisk,
    NonCompliant,
    Unassigned,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::AtRisk => "at_risk",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::Unassigned => "unassigned",
        }
    }

    pub fn parse(s: &str) -> Option<ComplianceStatus> {
        match s {
            "compliant" => Some(ComplianceStatus::Compliant),
            "at_risk" => Some(ComplianceStatus::AtRisk),
            "non_compliant" => Some(ComplianceStatus::NonCompliant),
            "unassigned" => Some(ComplianceStatus::Unassigned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: Uuid,
    pub organization_id: Uuid,
    /// Medical-record identifier, unique within the organization
    pub mr: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub primary_therapist: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub program_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub assignment_status: AssignmentStatus,
    /// active / inactive / deleted (soft delete)
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    /// Required for superusers; ignored (overwritten) for tenant admins
    pub organization_id: Option<Uuid>,
    pub mr: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub primary_therapist: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub program_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub status: String,
}

fn default_active() -> String {
    "active".to_string()
}

/// Typed partial update: every updatable field enumerated, `None` = leave as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub mr: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub primary_therapist: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub program_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.mr.is_none()
            && self.full_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.primary_therapist.is_none()
            && self.admission_date.is_none()
            && self.discharge_date.is_none()
            && self.program_id.is_none()
            && self.location_id.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRequest {
    pub patient_id: Uuid,
    pub program_id: Uuid,
    pub location_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAssignmentRequest {
    pub assignments: Vec<AssignmentRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_status_derivation() {
        let program = Some(Uuid::new_v4());
        let location = Some(Uuid::new_v4());

        assert_eq!(
            AssignmentStatus::derive(program, location),
            AssignmentStatus::Assigned
        );
        assert_eq!(
            AssignmentStatus::derive(program, None),
            AssignmentStatus::Pending
        );
        assert_eq!(
            AssignmentStatus::derive(None, location),
            AssignmentStatus::Pending
        );
        assert_eq!(
            AssignmentStatus::derive(None, None),
            AssignmentStatus::Pending
        );
    }
}
