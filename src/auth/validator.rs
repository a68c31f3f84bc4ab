//! Token validation: plaintext in, permission set out.
//!
//! Every failure surfaces as the same `AppError::InvalidToken`; only the
//! server-side log records whether the token was unknown, inactive, or
//! expired. Storage failures are the one exception and propagate as such.

use chrono::Utc;

use crate::errors::AppError;
use crate::store::TokenStore;

use super::{secret, AuthContext};

/// Validate a presented plaintext token against the store.
pub async fn validate_token(
    store: &TokenStore,
    presented: &str,
) -> Result<AuthContext, AppError> {
    let presented = presented.trim();
    if presented.is_empty() {
        return Err(AppError::InvalidToken);
    }

    let hash = secret::hash_token(presented);
    let records = store.records().await?;

    let mut matches = records
        .iter()
        .filter(|r| secret::hashes_match(&r.token_hash, &hash));

    let Some(record) = matches.next() else {
        tracing::debug!(
            token = %secret::mask_token(presented),
            "validation failed: no matching record"
        );
        return Err(AppError::InvalidToken);
    };

    if matches.next().is_some() {
        // Unique-hash invariant violated. Picking either record would let
        // one secret impersonate another, so reject outright.
        tracing::error!(id = %record.id, "duplicate token hash in store; rejecting");
        return Err(AppError::InvalidToken);
    }

    if record.status != crate::models::token::TokenStatus::Active {
        tracing::debug!(id = %record.id, "validation failed: token inactive");
        return Err(AppError::InvalidToken);
    }

    if record.is_expired(Utc::now()) {
        tracing::debug!(id = %record.id, "validation failed: token expired");
        return Err(AppError::InvalidToken);
    }

    Ok(AuthContext {
        token_id: Some(record.id.clone()),
        name: Some(record.name.clone()),
        permissions: record.permissions.clone(),
    })
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::{TokenChanges, TokenStatus};

    #[tokio::test]
    async fn test_round_trip_create_then_validate() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store
            .create("n8n", vec!["expenses:read".into()], None)
            .await
            .unwrap();

        let ctx = validate_token(&store, &plaintext).await.unwrap();
        assert_eq!(ctx.token_id.as_deref(), Some(record.id.as_str()));
        assert_eq!(ctx.permissions, vec!["expenses:read".to_string()]);
        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_empty_plaintext_is_invalid() {
        let store = TokenStore::in_memory();
        assert!(matches!(
            validate_token(&store, "").await,
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            validate_token(&store, "   ").await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let store = TokenStore::in_memory();
        store.create("a", vec![], None).await.unwrap();
        let result = validate_token(&store, &secret::generate_token()).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_inactive_token_fails_even_with_future_expiry() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store.create("a", vec![], Some(30)).await.unwrap();

        store
            .update(
                &record.id,
                TokenChanges {
                    status: Some(TokenStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            validate_token(&store, &plaintext).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_fails_even_when_active() {
        let store = TokenStore::in_memory();
        // expires_in_days: 0 expires at creation time
        let (_, plaintext) = store.create("a", vec![], Some(0)).await.unwrap();

        assert!(matches!(
            validate_token(&store, &plaintext).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_deleted_token_no_longer_validates() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store.create("a", vec![], None).await.unwrap();

        assert!(store.delete(&record.id).await.unwrap());
        assert!(matches!(
            validate_token(&store, &plaintext).await,
            Err(AppError::InvalidToken)
        ));
    }
}
