use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::middleware::{extract_token, TokenSources};
use crate::auth::{validator, AuthContext};
use crate::errors::AppError;
use crate::models::token::{TokenChanges, TokenStatus, TokenView};
use crate::store::StorageInfo;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub expires_in_days: Option<u32>,
}

/// The only response that ever carries the plaintext secret.
#[derive(Serialize)]
pub struct CreateTokenResponse {
    pub id: String,
    pub token: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct DeleteTokenResponse {
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthContext>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/tokens — all live records, hashes omitted
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TokenView>>, AppError> {
    let tokens = state.tokens.list().await.map_err(|e| {
        tracing::error!("list_tokens failed: {}", e);
        e
    })?;
    Ok(Json(tokens))
}

/// POST /api/v1/tokens — mint a new token; the plaintext is shown here and
/// never again
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<CreateTokenResponse>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    for tag in &payload.permissions {
        if tag.trim().is_empty() || tag.chars().any(char::is_whitespace) {
            return Err(AppError::InvalidRequest(format!(
                "malformed permission tag: '{}'",
                tag
            )));
        }
    }

    let (record, plaintext) = state
        .tokens
        .create(name, payload.permissions, payload.expires_in_days)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTokenResponse {
            id: record.id,
            token: plaintext,
            name: record.name,
            permissions: record.permissions,
            status: record.status,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }),
    ))
}

/// PATCH /api/v1/tokens/:id — update name/permissions/status; unknown id is
/// a 404
pub async fn update_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<TokenChanges>,
) -> Result<Json<TokenView>, AppError> {
    if changes.is_empty() {
        return Err(AppError::InvalidRequest(
            "no updatable fields provided".into(),
        ));
    }
    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name must not be empty".into()));
        }
    }

    let view = state.tokens.update(&id, changes).await?;
    Ok(Json(view))
}

/// DELETE /api/v1/tokens/:id — permanent; deleting an unknown id is not an
/// error
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteTokenResponse>, AppError> {
    let deleted = state.tokens.delete(&id).await?;
    Ok(Json(DeleteTokenResponse { deleted }))
}

/// POST /api/v1/tokens/validate — answer whether a presented token is valid.
/// Always 200: this endpoint answers the question instead of gating.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<ValidateResponse>, AppError> {
    let (_req, token) = extract_token(req, &TokenSources::default()).await;

    let Some(token) = token else {
        return Ok(Json(ValidateResponse {
            valid: false,
            token: None,
        }));
    };

    match validator::validate_token(&state.tokens, &token).await {
        Ok(ctx) => Ok(Json(ValidateResponse {
            valid: true,
            token: Some(ctx),
        })),
        // Storage trouble is a server problem, not a verdict on the token.
        Err(AppError::Storage(e)) => Err(AppError::Storage(e)),
        Err(_) => Ok(Json(ValidateResponse {
            valid: false,
            token: None,
        })),
    }
}

/// GET /api/v1/whoami — echo the authentication context the middleware
/// resolved for this request
pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> Json<serde_json::Value> {
    Json(json!({
        "authenticated": ctx.is_authenticated(),
        "token_id": ctx.token_id,
        "name": ctx.name,
        "permissions": ctx.permissions,
    }))
}

/// GET /api/v1/storage — active backend and health, diagnostics only
pub async fn storage_info(State(state): State<Arc<AppState>>) -> Json<StorageInfo> {
    Json(state.tokens.storage_info().await)
}
