use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{auth_guard, AuthPolicy};
use crate::AppState;

pub mod handlers;

/// Build the token API router.
/// All routes are relative — the caller mounts this under `/api/v1`.
///
/// Management routes sit behind the admin key; `validate` and `whoami` are
/// open because they serve the external callers the tokens belong to.
pub fn api_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let management = Router::new()
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route(
            "/tokens/:id",
            patch(handlers::update_token).delete(handlers::delete_token),
        )
        .route("/storage", get(handlers::storage_info))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    let open = Router::new()
        .route("/tokens/validate", post(handlers::validate_token))
        .route(
            "/whoami",
            get(handlers::whoami).layer(middleware::from_fn_with_state(
                (state.clone(), AuthPolicy::optional()),
                auth_guard,
            )),
        );

    management
        .merge(open)
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates `X-Admin-Key` header (or bearer) against the
/// configured admin key. Returns 401 if missing/invalid.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    match provided_key {
        Some(k) if k == state.config.admin_key => Ok(next.run(req).await),
        Some(k) => {
            // SECURITY: never log the expected key or the full provided key
            let masked = crate::auth::secret::mask_token(k);
            tracing::warn!("management API: invalid admin key (provided: '{}')", masked);
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("management API: missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
