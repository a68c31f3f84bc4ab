pub mod middleware;
pub mod secret;
pub mod validator;

use serde::Serialize;

/// Immutable per-request authentication context. Built once by the
/// middleware (or validator) and attached to request extensions; handlers
/// only read it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub token_id: Option<String>,
    pub name: Option<String>,
    pub permissions: Vec<String>,
}

impl AuthContext {
    /// Context for requests that carried no token on a route where
    /// authentication is optional. Grants nothing.
    pub fn anonymous() -> Self {
        AuthContext {
            token_id: None,
            name: None,
            permissions: Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_id.is_some()
    }

    /// Capability check with wildcard support, see [`check_permission`].
    pub fn has_permission(&self, required: &str) -> bool {
        check_permission(&self.permissions, required)
    }
}

/// Capability check over permission tags.
/// Format: "resource:action" (e.g. "expenses:read").
///
/// A grant matches if it is the exact required tag, the global wildcard
/// `"*"`, or the resource wildcard `"resource:*"`. An empty grant set
/// denies everything.
pub fn check_permission(granted: &[String], required: &str) -> bool {
    // Global wildcard grants all access
    if granted.iter().any(|p| p == "*") {
        return true;
    }

    // Direct match
    if granted.iter().any(|p| p == required) {
        return true;
    }

    // Resource wildcard (e.g. "expenses:*" matches "expenses:write")
    let parts: Vec<&str> = required.split(':').collect();
    if parts.len() == 2 {
        let resource_wildcard = format!("{}:*", parts[0]);
        if granted.iter().any(|p| p == &resource_wildcard) {
            return true;
        }
    }

    false
}

// ── Tests ───────────────────────────────────────────────────────
