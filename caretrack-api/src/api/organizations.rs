//! Organization (tenant) management endpoints
//!
//! Creation, update, and deactivation are superuser-only. Tenant users
//! can read their own organization.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use caretrack_common::models::{Organization, Role};
use caretrack_common::Error;
use uuid::Uuid;

use crate::db;
use crate::db::organizations::{NewOrganization, OrganizationUpdate};
use crate::error::ApiResult;
use crate::principal::{CurrentUser, RequireSuperuser};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route(
            "/:organization_id",
            get(get_organization)
                .put(update_organization)
                .delete(deactivate_organization),
        )
}

/// Superusers see every organization; tenant users see only their own
async fn list_organizations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Organization>>> {
    let orgs = match caller.role {
        Role::Superuser => db::organizations::list(&state.db).await?,
        _ => {
            let own = caller.organization_id.ok_or_else(|| {
                Error::Internal("Tenant user without organization".to_string())
            })?;
            vec![db::organizations::get(&state.db, own).await?]
        }
    };
    Ok(Json(orgs))
}

async fn get_organization(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<Organization>> {
    if caller.role != Role::Superuser && caller.organization_id != Some(organization_id) {
        // 404, not 403: don't confirm the organization exists
        return Err(Error::NotFound(format!(
            "Organization {} not found",
            organization_id
        ))
        .into());
    }
    let org = db::organizations::get(&state.db, organization_id).await?;
    Ok(Json(org))
}

async fn create_organization(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Json(new): Json<NewOrganization>,
) -> ApiResult<Json<Organization>> {
    let org = db::organizations::create(&state.db, &new).await?;
    Ok(Json(org))
}

async fn update_organization(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Path(organization_id): Path<Uuid>,
    Json(upd): Json<OrganizationUpdate>,
) -> ApiResult<Json<Organization>> {
    let org = db::organizations::update(&state.db, organization_id, &upd).await?;
    Ok(Json(org))
}

async fn deactivate_organization(
    State(state): State<AppState>,
    RequireSuperuser(_caller): RequireSuperuser,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<Organization>> {
    let org = db::organizations::deactivate(&state.db, organization_id).await?;
    Ok(Json(org))
}
