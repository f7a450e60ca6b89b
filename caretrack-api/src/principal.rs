//! Principal resolution and role-gate extractors
//!
//! Handlers declare their access requirement through their signature:
//! [`CurrentUser`] for any authenticated caller, [`RequireAdmin`] for
//! superusers and tenant admins, [`RequireSuperuser`] for superusers only.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use caretrack_common::models::{Principal, Role};
use caretrack_common::{auth, Error, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| Error::Unauthenticated("Missing bearer token".to_string()))
}

/// Resolve the bearer token in `headers` to an active principal
///
/// Used by the extractors and, best-effort, by the audit middleware for
/// request attribution.
pub async fn resolve_bearer(
    pool: &PgPool,
    token_secret: &str,
    headers: &HeaderMap,
) -> Result<Principal> {
    let token = bearer_token(headers)?;

    let email = auth::verify_token(token, token_secret, Utc::now().timestamp_millis())
        .map_err(|e| Error::Unauthenticated(e.to_string()))?;

    let credentials = db::users::find_by_email(pool, &email)
        .await?
        .ok_or_else(|| Error::Unauthenticated("Unknown user".to_string()))?;

    // Same message as an unknown user; deactivation is only called out at
    // the login boundary
    if !credentials.principal.is_active {
        return Err(Error::Unauthenticated("Unknown user".to_string()));
    }

    Ok(credentials.principal)
}

/// Any authenticated, active principal
pub struct CurrentUser(pub Principal);

/// Superuser or tenant admin
pub struct RequireAdmin(pub Principal);

/// Superuser only
pub struct RequireSuperuser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let principal = resolve_bearer(&state.db, &state.token_secret, &parts.headers).await?;
        Ok(CurrentUser(principal))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let principal = resolve_bearer(&state.db, &state.token_secret, &parts.headers).await?;
        if !principal.role.is_admin() {
            return Err(Error::Forbidden("Administrator role required".to_string()).into());
        }
        Ok(RequireAdmin(principal))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequireSuperuser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let principal = resolve_bearer(&state.db, &state.token_secret, &parts.headers).await?;
        if principal.role != Role::Superuser {
            return Err(Error::Forbidden("Superuser role required".to_string()).into());
        }
        Ok(RequireSuperuser(principal))
    }
}

/// Resolve the organization a request operates on
///
/// Non-superusers always act on their own organization; an explicit id is
/// accepted only if it matches. Superusers have no organization of their
/// own and must name one.
pub fn resolve_org(principal: &Principal, explicit: Option<Uuid>) -> Result<Uuid> {
    match principal.organization_id {
        Some(own) => match explicit {
            Some(requested) if requested != own => Err(Error::Forbidden(
                "Cannot operate on another organization".to_string(),
            )),
            _ => Ok(own),
        },
        None => explicit.ok_or_else(|| {
            Error::Validation("organization_id is required for superusers".to_string())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn principal(role: Role, org: Option<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "test".into(),
            email: "test@clinic.example".into(),
            role,
            organization_id: org,
            location_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_tenant_user_resolves_own_org() {
        let org = Uuid::new_v4();
        let p = principal(Role::TenantAdmin, Some(org));
        assert_eq!(resolve_org(&p, None).unwrap(), org);
        assert_eq!(resolve_org(&p, Some(org)).unwrap(), org);
    }

    #[test]
    fn test_tenant_user_cannot_name_other_org() {
        let p = principal(Role::Standard, Some(Uuid::new_v4()));
        assert!(resolve_org(&p, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_superuser_must_name_an_org() {
        let p = principal(Role::Superuser, None);
        assert!(resolve_org(&p, None).is_err());
        let org = Uuid::new_v4();
        assert_eq!(resolve_org(&p, Some(org)).unwrap(), org);
    }
}
