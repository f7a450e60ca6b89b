//! HTTP middleware for caretrack-api

pub mod audit;

pub use audit::audit_middleware;
