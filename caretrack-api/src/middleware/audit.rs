//! Audit logging middleware
//!
//! Records one [`AuditLogEntry`] per audited request. The middleware must
//! never change the outcome of a request: principal resolution is
//! best-effort (failures attribute the entry to an anonymous caller) and
//! a failed database write is logged and swallowed.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use caretrack_common::audit::{
    classify_action, classify_resource, extract_patient_id, is_export_path, is_phi_path,
    should_audit,
};
use caretrack_common::models::{AuditLogEntry, Principal};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::principal::resolve_bearer;
use crate::AppState;

pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.audit_enabled || !should_audit(&path) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let query = request.uri().query().map(str::to_string);
    let full_url = request.uri().to_string();
    let headers = request.headers().clone();

    // Best-effort attribution; anonymous on any failure
    let principal = resolve_bearer(&state.db, &state.token_secret, &headers)
        .await
        .ok();
    let session_id = session_id_from(&headers);

    let (request, body_hash) = hash_mutating_body(request, &method).await;

    let response = next.run(request).await;
    let status_code = response.status().as_u16();

    let entry = build_entry(
        principal,
        session_id,
        &method,
        &path,
        query.as_deref(),
        &full_url,
        &headers,
        status_code,
        start.elapsed().as_secs_f64() * 1000.0,
        body_hash,
    );

    // Synchronous write, but failure never fails the request
    if let Err(e) = db::audit_logs::insert(&state.db, &entry).await {
        warn!("Audit log write failed: {}", e);
    }

    response
}

/// Buffer and hash the body of mutating requests, passing the bytes on
/// unchanged to the handler
async fn hash_mutating_body(request: Request, method: &Method) -> (Request, Option<String>) {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Audit body buffering failed: {}", e);
            Bytes::new()
        }
    };

    let hash = if bytes.is_empty() {
        None
    } else {
        Some(format!("{:x}", Sha256::digest(&bytes)))
    };

    (Request::from_parts(parts, Body::from(bytes)), hash)
}

/// Stable per-token identifier; never stores the token itself
fn session_id_from(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| format!("{:x}", Sha256::digest(token.as_bytes()))[..16].to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn client_ip(headers: &HeaderMap) -> String {
    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    "unknown".to_string()
}

fn query_params_json(query: Option<&str>) -> Option<serde_json::Value> {
    let query = query?;
    let mut map = serde_json::Map::new();
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
    }
    if map.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(map))
    }
}

#[allow(clippy::too_many_arguments)]
fn build_entry(
    principal: Option<Principal>,
    session_id: String,
    method: &Method,
    path: &str,
    query: Option<&str>,
    full_url: &str,
    headers: &HeaderMap,
    status_code: u16,
    response_time_ms: f64,
    request_body_hash: Option<String>,
) -> AuditLogEntry {
    let action_type = classify_action(method.as_str(), path, status_code);
    let (resource_type, resource_id) = classify_resource(path);
    let patient_id =
        extract_patient_id(path, query).and_then(|id| Uuid::parse_str(&id).ok());

    AuditLogEntry {
        audit_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        user_id: principal.as_ref().map(|p| p.user_id),
        user_email: principal.as_ref().map(|p| p.email.clone()),
        user_role: principal.as_ref().map(|p| p.role.as_str().to_string()),
        organization_id: principal.as_ref().and_then(|p| p.organization_id),
        session_id,
        method: method.to_string(),
        endpoint: path.to_string(),
        full_url: full_url.to_string(),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: client_ip(headers),
        status_code: i32::from(status_code),
        response_time_ms,
        action_type,
        resource_type,
        resource_id,
        phi_accessed: is_phi_path(path),
        patient_id,
        data_exported: is_export_path(path) && status_code == 200,
        request_body_hash,
        query_parameters: query_params_json(query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_json() {
        let json = query_params_json(Some("status=active&search=jo")).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["search"], "jo");
        assert!(query_params_json(Some("")).is_none());
        assert!(query_params_json(None).is_none());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.2.3, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.1.2.3");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_session_id_is_not_the_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer some-token-value".parse().unwrap(),
        );
        let id = session_id_from(&headers);
        assert_eq!(id.len(), 16);
        assert!(!id.contains("some-token-value"));

        assert_eq!(session_id_from(&HeaderMap::new()), "anonymous");
    }

    #[test]
    fn test_entry_flags_denied_export() {
        let entry = build_entry(
            None,
            "anonymous".into(),
            &Method::GET,
            "/risk/export/high-risk",
            None,
            "/risk/export/high-risk",
            &HeaderMap::new(),
            403,
            1.0,
            None,
        );
        assert_eq!(
            entry.action_type,
            caretrack_common::models::ActionType::AccessDenied
        );
        assert!(!entry.data_exported);
        assert!(entry.phi_accessed);
    }
}
