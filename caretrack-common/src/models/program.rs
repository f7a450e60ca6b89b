//! Treatment programs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub program_id: Uuid,
    pub organization_id: Uuid,
    /// Unique within the organization among active programs
    pub name: String,
    pub description: Option<String>,
    pub level_of_care: Option<String>,
    pub hours_per_week: f64,
    /// active / inactive
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgram {
    /// Required for superusers; overwritten with the caller's own org for
    /// tenant admins
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub level_of_care: Option<String>,
    pub hours_per_week: f64,
}

/// Typed partial update; `None` = leave as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub level_of_care: Option<String>,
    pub hours_per_week: Option<f64>,
    pub status: Option<String>,
}

impl ProgramUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.level_of_care.is_none()
            && self.hours_per_week.is_none()
            && self.status.is_none()
    }
}
