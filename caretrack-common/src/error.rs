//! Common error types for CareTrack

use thiserror::Error;

/// Common result type for CareTrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the CareTrack backend
///
/// Domain operations raise these; the HTTP boundary maps them to status
/// codes. `NotFound` deliberately covers both "row absent" and "row filtered
/// out by tenancy" so callers cannot probe for existence across tenants.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing, invalid, or expired credential; deactivated account (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but insufficient role, or cross-tenant attempt (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource absent or not visible to the caller's tenant (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Schema or business-rule violation (400)
    #[error("Validation failure: {0}")]
    Validation(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
