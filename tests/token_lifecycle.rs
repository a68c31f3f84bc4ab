//! Integration tests for the token store: lifecycle, expiry sweep,
//! concurrency, durability, and backend degradation.

use std::sync::Arc;

use keygate::auth::validator::validate_token;
use keygate::errors::AppError;
use keygate::models::token::{TokenChanges, TokenStatus};
use keygate::store::{BackendKind, StoreConfig, TokenStore};

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_create_then_validate_round_trip() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store
            .create("n8n-caller", vec!["expenses:read".into()], Some(30))
            .await
            .unwrap();

        assert!(plaintext.starts_with("kg_"));
        assert_eq!(record.status, TokenStatus::Active);

        let ctx = validate_token(&store, &plaintext).await.unwrap();
        assert_eq!(ctx.token_id.as_deref(), Some(record.id.as_str()));
        assert_eq!(ctx.name.as_deref(), Some("n8n-caller"));
        assert_eq!(ctx.permissions, vec!["expenses:read".to_string()]);
    }

    #[tokio::test]
    async fn test_plaintext_is_never_persisted() {
        let store = TokenStore::in_memory();
        let (_, plaintext) = store.create("a", vec![], None).await.unwrap();

        for record in store.records().await.unwrap() {
            assert_ne!(record.token_hash, plaintext);
            assert!(!record.token_hash.contains(&plaintext));
        }
    }

    #[tokio::test]
    async fn test_update_then_validate_sees_new_permissions() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store
            .create("a", vec!["expenses:read".into()], None)
            .await
            .unwrap();

        store
            .update(
                &record.id,
                TokenChanges {
                    permissions: Some(vec!["expenses:*".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let ctx = validate_token(&store, &plaintext).await.unwrap();
        assert_eq!(ctx.permissions, vec!["expenses:*".to_string()]);
        assert!(ctx.has_permission("expenses:write"));
    }

    #[tokio::test]
    async fn test_update_missing_id_is_reported_not_found() {
        let store = TokenStore::in_memory();
        let result = store
            .update(
                "no-such-id",
                TokenChanges {
                    name: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::TokenNotFound)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store.create("a", vec![], None).await.unwrap();

        assert!(store.delete(&record.id).await.unwrap());
        // second delete of the same id, and a never-existing id
        assert!(!store.delete(&record.id).await.unwrap());
        assert!(!store.delete("no-such-id").await.unwrap());

        assert!(matches!(
            validate_token(&store, &plaintext).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_list_omits_hashes() {
        let store = TokenStore::in_memory();
        store.create("a", vec![], None).await.unwrap();

        let listed = store.list().await.unwrap();
        let json = serde_json::to_value(&listed).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert!(json[0].get("token_hash").is_none());
    }
}

mod expiry {
    use super::*;

    #[tokio::test]
    async fn test_immediate_expiry_fails_validation() {
        let store = TokenStore::in_memory();
        let (_, plaintext) = store
            .create("short-lived", vec!["expenses:read".into()], Some(0))
            .await
            .unwrap();

        assert!(matches!(
            validate_token(&store, &plaintext).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_records_are_swept_on_list() {
        let store = TokenStore::in_memory();
        store.create("expired", vec![], Some(0)).await.unwrap();
        store.create("live", vec![], None).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "live");
    }

    #[tokio::test]
    async fn test_expired_records_are_swept_on_create() {
        let store = TokenStore::in_memory();
        store.create("expired", vec![], Some(0)).await.unwrap();
        store.create("fresh", vec![], None).await.unwrap();

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "fresh");
    }

    #[tokio::test]
    async fn test_inactive_token_fails_regardless_of_expiry() {
        let store = TokenStore::in_memory();
        let (record, plaintext) = store.create("a", vec![], Some(365)).await.unwrap();

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

        // flipping back to active restores validity
        store
            .update(
                &record.id,
                TokenChanges {
                    status: Some(TokenStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(validate_token(&store, &plaintext).await.is_ok());
    }
}

mod concurrency {
    use super::*;

    /// The key regression test for the replace-all write race: N concurrent
    /// creates must leave exactly N persisted records.
    #[tokio::test]
    async fn test_concurrent_creates_lose_no_writes_in_memory() {
        let store = Arc::new(TokenStore::in_memory());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&format!("caller-{i}"), vec![], None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.records().await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_concurrent_creates_lose_no_writes_on_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("tokens.json").display().to_string();
        let store = Arc::new(TokenStore::open(&StoreConfig { url }).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&format!("caller-{i}"), vec![], None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.records().await.unwrap().len(), 16);
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_concurrent_deletes_and_creates_stay_consistent() {
        let store = Arc::new(TokenStore::in_memory());

        let mut ids = Vec::new();
        for i in 0..8 {
            let (record, _) = store.create(&format!("old-{i}"), vec![], None).await.unwrap();
            ids.push(record.id);
        }

        let mut handles = Vec::new();
        for id in ids {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.delete(&id).await.map(|_| ()) }));
        }
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&format!("new-{i}"), vec![], None).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.name.starts_with("new-")));
    }
}

mod durability {
    use super::*;

    #[tokio::test]
    async fn test_records_survive_store_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("tokens.json").display().to_string();

        let plaintext = {
            let store = TokenStore::open(&StoreConfig { url: url.clone() })
                .await
                .unwrap();
            let (_, plaintext) = store
                .create("persistent", vec!["expenses:read".into()], None)
                .await
                .unwrap();
            plaintext
        };

        let reopened = TokenStore::open(&StoreConfig { url }).await.unwrap();
        let ctx = validate_token(&reopened, &plaintext).await.unwrap();
        assert_eq!(ctx.name.as_deref(), Some("persistent"));
    }

    #[tokio::test]
    async fn test_file_layout_is_a_json_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::open(&StoreConfig {
            url: path.display().to_string(),
        })
        .await
        .unwrap();
        store.create("a", vec![], None).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert!(array[0]["token_hash"].is_string());
        assert!(array[0].get("token").is_none());
    }
}

mod degradation {
    use super::*;

    #[tokio::test]
    async fn test_unreadable_backend_degrades_to_memory() {
        // Point the file backend at a directory: loads fail, the store must
        // fall back to in-memory and keep serving.
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(&StoreConfig {
            url: dir.path().display().to_string(),
        })
        .await
        .unwrap();

        assert!(store.is_degraded());
        let info = store.storage_info().await;
        assert_eq!(info.backend, BackendKind::Memory);
        assert!(info.degraded);

        // the degraded store still works end to end
        let (_, plaintext) = store.create("fallback", vec![], None).await.unwrap();
        assert!(validate_token(&store, &plaintext).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_a_configuration_error() {
        let result = TokenStore::open(&StoreConfig {
            url: "redis://localhost:6379".into(),
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_healthy_store_reports_its_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::open(&StoreConfig {
            url: path.display().to_string(),
        })
        .await
        .unwrap();
        store.create("a", vec![], None).await.unwrap();

        let info = store.storage_info().await;
        assert_eq!(info.backend, BackendKind::File);
        assert!(!info.degraded);
        assert_eq!(info.records, 1);
    }
}
