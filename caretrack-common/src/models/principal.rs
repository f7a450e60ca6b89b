//! Principals (users), roles, and organizations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Closed set of roles
///
/// A superuser has no organization affiliation and sees across tenants;
/// every other role belongs to exactly one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superuser,
    TenantAdmin,
    Standard,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superuser => "superuser",
            Role::TenantAdmin => "tenant_admin",
            Role::Standard => "standard",
        }
    }

    pub fn parse(s: &str) -> Result<Role> {
        match s {
            "superuser" => Ok(Role::Superuser),
            "tenant_admin" => Ok(Role::TenantAdmin),
            "standard" => Ok(Role::Standard),
            other => Err(Error::Internal(format!("Unknown role: {}", other))),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superuser | Role::TenantAdmin)
    }
}

/// An authenticated actor: identity, role, and tenant affiliation
///
/// `organization_id` is `None` only for superusers. Principals are never
/// physically deleted; `is_active = false` deactivates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Tenant: the isolation boundary owning users, patients, programs, locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: Principal,
}

impl TokenResponse {
    pub fn bearer(access_token: String, user: Principal) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}
