//! caretrack-api library - CareTrack administration backend
//!
//! Multi-tenant HTTP service: authentication, tenancy propagation into
//! PostgreSQL row-level security, patient/program/location management,
//! risk classification, and audit logging.

use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod principal;
pub mod risk_pipeline;

use config::Config;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Secret used to sign and verify access tokens
    pub token_secret: String,
    /// Access-token lifetime in minutes
    pub token_ttl_minutes: i64,
    /// Retention window for audit cleanup
    pub audit_retention_months: u32,
    /// Audit middleware on/off switch
    pub audit_enabled: bool,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            token_secret: config.token_secret.clone(),
            token_ttl_minutes: config.token_ttl_minutes,
            audit_retention_months: config.audit_retention_months,
            audit_enabled: config.enable_audit,
        }
    }
}

/// Build application router
///
/// The audit middleware wraps every route; exclusions (health and the
/// like) are path-based inside the middleware itself.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::routes())
        .nest("/auth", api::auth::routes())
        .nest("/organizations", api::organizations::routes())
        .nest("/patients", api::patients::routes())
        .nest("/programs", api::programs::routes())
        .nest("/locations", api::locations::routes())
        .nest("/risk", api::risk::routes())
        .nest("/engagement", api::engagement::routes())
        .nest("/imports", api::imports::routes())
        .nest("/audit", api::audit::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::audit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
