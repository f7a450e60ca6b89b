//! Domain models shared between the service crate and its tests

pub mod audit_log;
pub mod import;
pub mod location;
pub mod metrics;
pub mod patient;
pub mod principal;
pub mod program;
pub mod risk_tier;

pub use audit_log::{ActionType, AuditLogEntry, AuditLogFilter, AuditSummary, ResourceType};
pub use import::{ImportRecord, ImportStatus, ImportSummary, ServiceType};
pub use location::{Location, LocationStats, LocationTimingsUpdate, LocationUpdate, NewLocation};
pub use metrics::{CalculationOutcome, WeeklyCalculationRequest, WeeklyMetric};
pub use patient::{
    AssignmentRequest, AssignmentStatus, BulkAssignmentRequest, ComplianceStatus, NewPatient,
    Patient, PatientUpdate,
};
pub use principal::{LoginRequest, NewUser, Organization, Principal, Role, TokenResponse};
pub use program::{NewProgram, Program, ProgramUpdate};
pub use risk_tier::{NewRiskTier, RiskTier};
