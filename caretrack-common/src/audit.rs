//! Audit request-classification rules
//!
//! Pure functions deciding whether a request is audited and how it is
//! classified. The middleware in the service crate applies these and
//! persists the result; nothing here touches HTTP or the database.

use crate::models::{ActionType, ResourceType};

/// Paths never audited: health checks, docs, static assets
const EXCLUDED_PREFIXES: &[&str] = &[
    "/health",
    "/docs",
    "/redoc",
    "/openapi.json",
    "/favicon.ico",
    "/static",
];

/// Path markers that access Protected Health Information
const PHI_MARKERS: &[&str] = &["/patients", "/engagement", "/risk"];

/// Path markers that allow data download
const EXPORT_MARKERS: &[&str] = &["/export", "/download"];

/// Whether the path is subject to audit logging at all
pub fn should_audit(path: &str) -> bool {
    !EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Whether the path touches PHI
pub fn is_phi_path(path: &str) -> bool {
    PHI_MARKERS.iter().any(|m| path.contains(m))
}

/// Whether the path is an export/download surface
pub fn is_export_path(path: &str) -> bool {
    EXPORT_MARKERS.iter().any(|m| path.contains(m))
}

/// Classify the action performed by a request
///
/// Auth paths and 403 responses take precedence over the method-based
/// rules; 403 is checked before export markers so a denied export is
/// recorded as ACCESS_DENIED.
pub fn classify_action(method: &str, path: &str, status_code: u16) -> ActionType {
    if path.starts_with("/auth/login") {
        return ActionType::Login;
    }
    if path.starts_with("/auth/logout") {
        return ActionType::Logout;
    }
    if status_code == 403 {
        return ActionType::AccessDenied;
    }
    if is_export_path(path) {
        return ActionType::Export;
    }
    match method {
        "POST" => ActionType::Create,
        "GET" | "HEAD" => ActionType::Read,
        "PUT" | "PATCH" => ActionType::Update,
        "DELETE" => ActionType::Delete,
        _ => ActionType::Read,
    }
}

/// Classify the resource a request addresses, extracting the id where the
/// path segment after the collection name is syntactically a UUID
pub fn classify_resource(path: &str) -> (ResourceType, Option<String>) {
    if path.contains("/auth") {
        (ResourceType::Auth, None)
    } else if path.contains("/patients") {
        (ResourceType::Patient, extract_resource_id(path, "patients"))
    } else if path.contains("/users") {
        (ResourceType::User, extract_resource_id(path, "users"))
    } else if path.contains("/organizations") {
        (
            ResourceType::Organization,
            extract_resource_id(path, "organizations"),
        )
    } else if path.contains("/locations") {
        (
            ResourceType::Location,
            extract_resource_id(path, "locations"),
        )
    } else if path.contains("/programs") {
        (ResourceType::Program, extract_resource_id(path, "programs"))
    } else if path.contains("/engagement") {
        (ResourceType::Engagement, None)
    } else if path.contains("/risk") {
        (ResourceType::WeeklyMetrics, None)
    } else {
        (ResourceType::System, None)
    }
}

/// Extract the path segment following `collection`, accepted only when it
/// is syntactically a UUID (36 characters, exactly 4 hyphens)
///
/// Literal sub-route names like `/patients/unassigned` must not be
/// misidentified as ids.
pub fn extract_resource_id(path: &str, collection: &str) -> Option<String> {
    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == collection {
            if let Some(candidate) = segments.next() {
                if looks_like_uuid(candidate) {
                    return Some(candidate.to_string());
                }
            }
            return None;
        }
    }
    None
}

fn looks_like_uuid(s: &str) -> bool {
    s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
}

/// Patient attribution: a `/patients/{id}` segment first, then a
/// `patient_id` query parameter
pub fn extract_patient_id(path: &str, query: Option<&str>) -> Option<String> {
    if path.contains("/patients/") {
        if let Some(id) = extract_resource_id(path, "patients") {
            return Some(id);
        }
    }

    let query = query?;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == "patient_id" && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    #[test]
    fn test_excluded_paths_not_audited() {
        assert!(!should_audit("/health"));
        assert!(!should_audit("/docs"));
        assert!(!should_audit("/static/app.js"));
        assert!(should_audit("/patients"));
        assert!(should_audit("/auth/login"));
    }

    #[test]
    fn test_login_logout_classified_by_path() {
        assert_eq!(classify_action("POST", "/auth/login", 200), ActionType::Login);
        assert_eq!(classify_action("POST", "/auth/logout", 200), ActionType::Logout);
    }

    #[test]
    fn test_forbidden_checked_before_method_rules() {
        assert_eq!(
            classify_action("DELETE", "/patients/abc", 403),
            ActionType::AccessDenied
        );
        // ...and before export markers
        assert_eq!(
            classify_action("GET", "/patients/export/high-risk", 403),
            ActionType::AccessDenied
        );
    }

    #[test]
    fn test_export_marker_classified_as_export() {
        assert_eq!(
            classify_action("GET", "/patients/export/high-risk", 200),
            ActionType::Export
        );
        assert_eq!(
            classify_action("GET", "/reports/download", 200),
            ActionType::Export
        );
    }

    #[test]
    fn test_method_fallback_classification() {
        assert_eq!(classify_action("POST", "/patients", 201), ActionType::Create);
        assert_eq!(classify_action("GET", "/patients", 200), ActionType::Read);
        assert_eq!(classify_action("HEAD", "/patients", 200), ActionType::Read);
        assert_eq!(classify_action("PUT", "/patients/x", 200), ActionType::Update);
        assert_eq!(classify_action("PATCH", "/patients/x", 200), ActionType::Update);
        assert_eq!(classify_action("DELETE", "/patients/x", 200), ActionType::Delete);
        assert_eq!(classify_action("OPTIONS", "/patients", 200), ActionType::Read);
    }

    #[test]
    fn test_resource_type_by_first_matching_segment() {
        assert_eq!(classify_resource("/auth/login").0, ResourceType::Auth);
        assert_eq!(classify_resource("/patients").0, ResourceType::Patient);
        assert_eq!(classify_resource("/locations/x").0, ResourceType::Location);
        assert_eq!(classify_resource("/engagement/dashboard").0, ResourceType::Engagement);
        assert_eq!(classify_resource("/risk/current-week").0, ResourceType::WeeklyMetrics);
        assert_eq!(classify_resource("/somewhere-else").0, ResourceType::System);
    }

    #[test]
    fn test_resource_id_must_be_uuid_shaped() {
        // Not a UUID: plain number
        assert_eq!(extract_resource_id("/patients/123", "patients"), None);
        // Not a UUID: literal sub-route
        assert_eq!(extract_resource_id("/patients/unassigned", "patients"), None);
        // Exact UUID extracted
        assert_eq!(
            extract_resource_id(&format!("/patients/{}", UUID), "patients"),
            Some(UUID.to_string())
        );
    }

    #[test]
    fn test_phi_paths() {
        assert!(is_phi_path("/patients/abc"));
        assert!(is_phi_path("/engagement/dashboard"));
        assert!(is_phi_path("/patients/risk/current-week"));
        assert!(!is_phi_path("/locations"));
    }

    #[test]
    fn test_patient_id_from_path_then_query() {
        assert_eq!(
            extract_patient_id(&format!("/patients/{}", UUID), None),
            Some(UUID.to_string())
        );
        assert_eq!(
            extract_patient_id("/engagement/dashboard", Some(&format!("patient_id={}", UUID))),
            Some(UUID.to_string())
        );
        assert_eq!(extract_patient_id("/engagement/dashboard", Some("limit=10")), None);
        assert_eq!(extract_patient_id("/locations", None), None);
    }

    #[test]
    fn test_export_flag_paths() {
        assert!(is_export_path("/patients/export/high-risk"));
        assert!(!is_export_path("/patients"));
    }
}
