//! Append-only audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Read,
    Update,
    Delete,
    Login,
    Logout,
    AccessDenied,
    Export,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "CREATE",
            ActionType::Read => "READ",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
            ActionType::Login => "LOGIN",
            ActionType::Logout => "LOGOUT",
            ActionType::AccessDenied => "ACCESS_DENIED",
            ActionType::Export => "EXPORT",
        }
    }

    pub fn parse(s: &str) -> Option<ActionType> {
        match s {
            "CREATE" => Some(ActionType::Create),
            "READ" => Some(ActionType::Read),
            "UPDATE" => Some(ActionType::Update),
            "DELETE" => Some(ActionType::Delete),
            "LOGIN" => Some(ActionType::Login),
            "LOGOUT" => Some(ActionType::Logout),
            "ACCESS_DENIED" => Some(ActionType::AccessDenied),
            "EXPORT" => Some(ActionType::Export),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Auth,
    Patient,
    User,
    Organization,
    Location,
    Program,
    Engagement,
    WeeklyMetrics,
    System,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Auth => "AUTH",
            ResourceType::Patient => "PATIENT",
            ResourceType::User => "USER",
            ResourceType::Organization => "ORGANIZATION",
            ResourceType::Location => "LOCATION",
            ResourceType::Program => "PROGRAM",
            ResourceType::Engagement => "ENGAGEMENT",
            ResourceType::WeeklyMetrics => "WEEKLY_METRICS",
            ResourceType::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Option<ResourceType> {
        match s {
            "AUTH" => Some(ResourceType::Auth),
            "PATIENT" => Some(ResourceType::Patient),
            "USER" => Some(ResourceType::User),
            "ORGANIZATION" => Some(ResourceType::Organization),
            "LOCATION" => Some(ResourceType::Location),
            "PROGRAM" => Some(ResourceType::Program),
            "ENGAGEMENT" => Some(ResourceType::Engagement),
            "WEEKLY_METRICS" => Some(ResourceType::WeeklyMetrics),
            "SYSTEM" => Some(ResourceType::System),
            _ => None,
        }
    }
}

/// One audited HTTP request. Created exactly once, never mutated, deleted
/// only by the retention cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub audit_id: Uuid,
    pub timestamp: DateTime<Utc>,

    // Principal attribution; all None for anonymous / failed auth
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub user_role: Option<String>,
    pub organization_id: Option<Uuid>,
    pub session_id: String,

    pub method: String,
    pub endpoint: String,
    pub full_url: String,
    pub user_agent: Option<String>,
    pub ip_address: String,

    pub status_code: i32,
    pub response_time_ms: f64,

    pub action_type: ActionType,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,

    pub phi_accessed: bool,
    pub patient_id: Option<Uuid>,
    pub data_exported: bool,

    pub request_body_hash: Option<String>,
    pub query_parameters: Option<serde_json::Value>,
}

/// Aggregate counts over a trailing window, for the monitoring dashboard
#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub period_hours: i64,
    pub total_requests: i64,
    pub phi_access_count: i64,
    pub data_export_count: i64,
    pub failed_requests: i64,
    pub access_denied_count: i64,
    pub unique_users: i64,
    pub unique_ips: i64,
    pub avg_response_time_ms: f64,
}

/// Typed filter for audit-log retrieval
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action_type: Option<ActionType>,
    pub resource_type: Option<ResourceType>,
    pub phi_accessed: Option<bool>,
    pub patient_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
