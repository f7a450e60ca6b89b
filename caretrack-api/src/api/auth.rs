//! Authentication and user-management endpoints

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use caretrack_common::models::{LoginRequest, NewUser, Principal, Role, TokenResponse};
use caretrack_common::{auth, Error, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::principal::{CurrentUser, RequireAdmin, RequireSuperuser};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id/toggle-status", put(toggle_user_status))
}

/// Verify credentials and issue a bearer token
///
/// Unknown email and wrong password both yield the same 401; a correct
/// password on a deactivated account is a distinct 403 so the operator
/// can tell the cases apart.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let credentials = db::users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| Error::Unauthenticated("Invalid email or password".to_string()))?;

    let valid = auth::verify_password(&req.password, &credentials.password_digest)
        .map_err(|e| Error::Internal(e.to_string()))?;
    if !valid {
        return Err(Error::Unauthenticated("Invalid email or password".to_string()).into());
    }

    if !credentials.principal.is_active {
        return Err(Error::Forbidden("Account is deactivated".to_string()).into());
    }

    db::users::touch_last_login(&state.db, credentials.principal.user_id).await?;

    let expires_at = Utc::now() + Duration::minutes(state.token_ttl_minutes);
    let token = auth::issue_token(
        &credentials.principal.email,
        expires_at.timestamp_millis(),
        &state.token_secret,
    );

    info!("User {} logged in", credentials.principal.email);
    Ok(Json(TokenResponse::bearer(token, credentials.principal)))
}

/// Logout exists so the audit trail records it; tokens are not revocable
async fn logout(CurrentUser(user): CurrentUser) -> ApiResult<Json<Value>> {
    info!("User {} logged out", user.email);
    Ok(Json(json!({ "message": "Logged out" })))
}

async fn me(CurrentUser(user): CurrentUser) -> ApiResult<Json<Principal>> {
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    #[allow(dead_code)]
    email: String,
}

/// Always answers the same way, so the endpoint cannot be used to probe
/// which emails exist
async fn forgot_password(
    Json(_req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "message": "If that email is registered, password reset instructions have been sent"
    })))
}

/// Create a user, enforcing role/organization consistency
///
/// Superusers may create any role. Tenant admins may only create
/// tenant_admin and standard users inside their own organization.
/// Superuser accounts never carry an organization; every other role must.
async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(new): Json<NewUser>,
) -> ApiResult<Json<Principal>> {
    let organization_id = match caller.role {
        Role::Superuser => match new.role {
            Role::Superuser => {
                if new.organization_id.is_some() {
                    return Err(Error::Validation(
                        "Superusers cannot belong to an organization".to_string(),
                    )
                    .into());
                }
                None
            }
            _ => Some(new.organization_id.ok_or_else(|| {
                Error::Validation("organization_id is required for this role".to_string())
            })?),
        },
        _ => {
            if new.role == Role::Superuser {
                return Err(
                    Error::Forbidden("Only superusers can create superusers".to_string()).into(),
                );
            }
            // Tenant admins always create within their own organization
            caller.organization_id
        }
    };

    if new.password.len() < 8 {
        return Err(
            Error::Validation("Password must be at least 8 characters".to_string()).into(),
        );
    }

    let digest = auth::hash_password(&new.password);
    let created = db::users::create(
        &state.db,
        &new.username,
        &new.email,
        &digest,
        new.role,
        organization_id,
        new.location_id,
    )
    .await?;

    info!("User {} created by {}", created.email, caller.email);
    Ok(Json(created))
}

async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
) -> ApiResult<Json<Vec<Principal>>> {
    let users = db::users::list_for(&state.db, &caller).await?;
    Ok(Json(users))
}

/// Nobody toggles themselves, and an active superuser account can never
/// be deactivated
fn ensure_can_toggle(caller: &Principal, target: &Principal) -> Result<()> {
    if target.user_id == caller.user_id {
        return Err(Error::Validation(
            "Cannot change your own active status".to_string(),
        ));
    }
    if target.role == Role::Superuser && target.is_active {
        return Err(Error::Validation(
            "Cannot deactivate a superuser".to_string(),
        ));
    }
    Ok(())
}

/// Activate/deactivate a user (superuser only)
async fn toggle_user_status(
    State(state): State<AppState>,
    RequireSuperuser(caller): RequireSuperuser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Principal>> {
    let target = db::users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))?;

    ensure_can_toggle(&caller, &target)?;

    let updated = db::users::toggle_active(&state.db, user_id).await?;
    info!(
        "User {} {} by {}",
        updated.email,
        if updated.is_active { "activated" } else { "deactivated" },
        caller.email
    );
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn principal(role: Role, is_active: bool) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "test".into(),
            email: "test@clinic.example".into(),
            role,
            organization_id: None,
            location_id: None,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_cannot_toggle_self() {
        let caller = principal(Role::Superuser, true);
        assert!(ensure_can_toggle(&caller, &caller).is_err());
    }

    #[test]
    fn test_cannot_deactivate_active_superuser() {
        let caller = principal(Role::Superuser, true);
        let target = principal(Role::Superuser, true);
        assert!(matches!(
            ensure_can_toggle(&caller, &target),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_inactive_superuser_can_be_reactivated() {
        let caller = principal(Role::Superuser, true);
        let target = principal(Role::Superuser, false);
        assert!(ensure_can_toggle(&caller, &target).is_ok());
    }

    #[test]
    fn test_tenant_users_can_be_toggled() {
        let caller = principal(Role::Superuser, true);
        for role in [Role::TenantAdmin, Role::Standard] {
            let target = principal(role, true);
            assert!(ensure_can_toggle(&caller, &target).is_ok());
        }
    }
}
