//! Request-level authentication gate.
//!
//! A route is wrapped with an [`AuthPolicy`] via
//! `axum::middleware::from_fn_with_state((state, policy), auth_guard)`.
//! The guard extracts a candidate token from the configured sources,
//! validates it, enforces the required permission, and attaches an
//! immutable [`AuthContext`] to request extensions before the handler runs.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::AppState;

use super::{validator, AuthContext};

/// Header for callers that cannot set `Authorization`.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter and JSON body field carrying a token.
pub const TOKEN_FIELD: &str = "token";

/// Largest body the guard will buffer while looking for a token field.
const MAX_BODY_PEEK: usize = 64 * 1024;

/// Which request locations are searched for a token. Extraction priority is
/// fixed: bearer header, then API-key header, then query, then JSON body;
/// the first token found wins.
#[derive(Debug, Clone)]
pub struct TokenSources {
    pub bearer: bool,
    pub api_key_header: bool,
    pub query: bool,
    pub body: bool,
}

impl Default for TokenSources {
    fn default() -> Self {
        TokenSources {
            bearer: true,
            api_key_header: true,
            query: true,
            body: true,
        }
    }
}

impl TokenSources {
    /// Headers only. For routes where query strings end up in access logs.
    pub fn headers_only() -> Self {
        TokenSources {
            bearer: true,
            api_key_header: true,
            query: false,
            body: false,
        }
    }
}

/// Per-route authentication policy.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub require_auth: bool,
    pub required_permission: Option<String>,
    pub sources: TokenSources,
}

impl AuthPolicy {
    /// Reject requests that do not present a valid token.
    pub fn required() -> Self {
        AuthPolicy {
            require_auth: true,
            required_permission: None,
            sources: TokenSources::default(),
        }
    }

    /// Let unauthenticated requests through with an anonymous context.
    pub fn optional() -> Self {
        AuthPolicy {
            require_auth: false,
            required_permission: None,
            sources: TokenSources::default(),
        }
    }

    /// Additionally require a permission tag (exact or wildcard match).
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    pub fn with_sources(mut self, sources: TokenSources) -> Self {
        self.sources = sources;
        self
    }
}

/// Authentication middleware. Invokes the wrapped handler exactly once, and
/// only after the policy is satisfied.
pub async fn auth_guard(
    State((state, policy)): State<(Arc<AppState>, AuthPolicy)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut req, token) = extract_token(req, &policy.sources).await;

    let ctx = match token {
        // A presented token must be valid even on optional-auth routes:
        // callers are never silently downgraded to anonymous.
        Some(presented) => validator::validate_token(&state.tokens, &presented).await?,
        None if policy.require_auth => return Err(AppError::MissingToken),
        None => AuthContext::anonymous(),
    };

    if let Some(required) = &policy.required_permission {
        if !ctx.has_permission(required) {
            tracing::warn!(
                token_id = ctx.token_id.as_deref().unwrap_or("-"),
                permission = %required,
                "request denied: missing permission"
            );
            return Err(AppError::Forbidden {
                permission: required.clone(),
            });
        }
    }

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Pull a candidate token out of the request, first source wins. The body
/// is buffered and restored only when the body source is enabled, nothing
/// earlier matched, and the content type is JSON.
pub async fn extract_token(req: Request, sources: &TokenSources) -> (Request, Option<String>) {
    if sources.bearer {
        if let Some(token) = bearer_token(&req) {
            return (req, Some(token));
        }
    }

    if sources.api_key_header {
        let token = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            let token = token.to_string();
            return (req, Some(token));
        }
    }

    if sources.query {
        if let Some(token) = query_token(&req) {
            return (req, Some(token));
        }
    }

    if sources.body && is_json(&req) {
        return body_token(req).await;
    }

    (req, None)
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn query_token(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    for part in query.split('&') {
        let mut kv = part.splitn(2, '=');
        if kv.next() == Some(TOKEN_FIELD) {
            return kv
                .next()
                .map(|v| urlencoding::decode(v).unwrap_or_default().into_owned())
                .filter(|t| !t.is_empty());
        }
    }
    None
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

/// Buffer the body, look for a `"token"` field, and rebuild the request so
/// the downstream handler still sees the full body. Bodies that declare a
/// length beyond the peek limit are left untouched.
async fn body_token(req: Request) -> (Request, Option<String>) {
    let declared_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.map(|len| len > MAX_BODY_PEEK).unwrap_or(false) {
        return (req, None);
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_PEEK).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("token extraction: could not buffer body: {}", e);
            return (Request::from_parts(parts, Body::empty()), None);
        }
    };

    let token = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| {
            v.get(TOKEN_FIELD)
                .and_then(|t| t.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
        });

    (Request::from_parts(parts, Body::from(bytes)), token)
}

// ── Tests ───────────────────────────────────────────────────────
