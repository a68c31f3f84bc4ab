//! Token persistence.
//!
//! `TokenStore` is the only type the rest of the crate talks to. It owns a
//! `TokenBackend` (filesystem JSON, in-memory, or remote blob, chosen by an
//! explicit factory from configuration) and serializes every mutation
//! through a single-writer mutex so concurrent creates cannot clobber each
//! other's writes. When a durable backend fails, the store degrades to the
//! in-memory backend for the rest of the process and keeps serving.

pub mod blob;
pub mod file;
pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::auth::secret;
use crate::errors::AppError;
use crate::models::token::{TokenChanges, TokenRecord, TokenStatus, TokenView};

use blob::BlobBackend;
use file::FileBackend;
use memory::MemoryBackend;

/// Which backend family a store is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    Memory,
    Blob,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Blob => write!(f, "blob"),
        }
    }
}

/// Abstraction over token collection persistence.
///
/// Backends store the whole collection as one JSON array and preserve
/// record order. They do not interpret records; expiry and status are the
/// store's concern.
#[async_trait]
pub trait TokenBackend: Send + Sync {
    /// Read the full collection. An absent file/object is an empty
    /// collection, not an error.
    async fn load(&self) -> anyhow::Result<Vec<TokenRecord>>;

    /// Replace the full collection.
    async fn persist(&self, records: &[TokenRecord]) -> anyhow::Result<()>;

    fn kind(&self) -> BackendKind;

    /// Human-readable location (path or URL) for diagnostics.
    fn location(&self) -> String;
}

/// Diagnostics snapshot returned by `TokenStore::storage_info`.
/// Not part of the correctness contract.
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub backend: BackendKind,
    pub location: String,
    pub degraded: bool,
    pub records: usize,
}

/// Storage configuration, built once at startup and injected into
/// [`TokenStore::open`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `memory:`, `file://<path>` (or a bare path), or `s3://bucket?...`.
    pub url: String,
}

/// Select a backend from the configured URL. Unknown schemes are a
/// configuration error and fail fast; reachability is probed later.
pub fn open_backend(cfg: &StoreConfig) -> anyhow::Result<Box<dyn TokenBackend>> {
    let url = cfg.url.trim();

    if url.is_empty() || url == "memory:" {
        return Ok(Box::new(MemoryBackend::new()));
    }

    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Box::new(FileBackend::new(path)));
    }

    if url.starts_with("s3://") {
        return Ok(Box::new(BlobBackend::open(url)?));
    }

    if url.contains("://") {
        anyhow::bail!("unsupported token store URL scheme: {}", url);
    }

    // A bare path is the filesystem backend.
    Ok(Box::new(FileBackend::new(url)))
}

/// The consumer-facing token store.
pub struct TokenStore {
    backend: RwLock<Box<dyn TokenBackend>>,
    /// Single-writer critical section: every mutation re-loads, changes and
    /// re-persists the collection under this lock.
    write_lock: Mutex<()>,
    degraded: AtomicBool,
}

impl TokenStore {
    /// Open the configured backend and probe it once. An unreachable
    /// backend degrades to in-memory here instead of on the first request;
    /// only a misconfigured URL is an error.
    pub async fn open(cfg: &StoreConfig) -> anyhow::Result<Self> {
        let backend = open_backend(cfg)?;
        tracing::info!(backend = %backend.kind(), location = %backend.location(), "token store opened");

        let store = TokenStore {
            backend: RwLock::new(backend),
            write_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
        };

        let probe = { store.backend.read().await.load().await };
        if let Err(e) = probe {
            store.degrade(Vec::new(), &e).await;
        }
        Ok(store)
    }

    /// A store on the in-memory backend. Used by tests and as the
    /// degradation target.
    pub fn in_memory() -> Self {
        TokenStore {
            backend: RwLock::new(Box::new(MemoryBackend::new())),
            write_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Swap the failed backend for an in-memory one seeded with `seed`.
    /// One-way for the lifetime of the process.
    async fn degrade(&self, seed: Vec<TokenRecord>, cause: &anyhow::Error) {
        if self.degraded.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut backend = self.backend.write().await;
        tracing::warn!(
            backend = %backend.kind(),
            location = %backend.location(),
            error = %format!("{:#}", cause),
            "storage backend failed; degrading to in-memory for the rest of the process"
        );
        *backend = Box::new(MemoryBackend::with_records(seed));
    }

    /// All current records, hashes included. Read-only; used by the
    /// validator. No expiry sweep here, validation checks expiry itself.
    pub async fn records(&self) -> Result<Vec<TokenRecord>, AppError> {
        let loaded = { self.backend.read().await.load().await };
        match loaded {
            Ok(records) => Ok(records),
            Err(e) => {
                let err = AppError::Storage(anyhow::anyhow!("{:#}", e));
                self.degrade(Vec::new(), &e).await;
                Err(err)
            }
        }
    }

    /// Run one mutation under the single-writer lock: load, apply, persist.
    /// A persist failure degrades to in-memory seeded with the new state,
    /// so a mutation that was accepted is never silently lost in-process.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<TokenRecord>) -> Result<(T, bool), AppError>,
    ) -> Result<T, AppError> {
        let _guard = self.write_lock.lock().await;

        let loaded = { self.backend.read().await.load().await };
        let mut records = match loaded {
            Ok(records) => records,
            Err(e) => {
                let err = AppError::Storage(anyhow::anyhow!("{:#}", e));
                self.degrade(Vec::new(), &e).await;
                return Err(err);
            }
        };

        let (out, changed) = f(&mut records)?;

        if changed {
            let persisted = { self.backend.read().await.persist(&records).await };
            if let Err(e) = persisted {
                self.degrade(records, &e).await;
            }
        }
        Ok(out)
    }

    /// Create a token: generate the secret and its hash, sweep expired
    /// records, append, persist. Returns the stored record and the
    /// plaintext; the plaintext is shown to the caller exactly once.
    pub async fn create(
        &self,
        name: &str,
        permissions: Vec<String>,
        expires_in_days: Option<u32>,
    ) -> Result<(TokenRecord, String), AppError> {
        let plaintext = secret::generate_token();
        let token_hash = secret::hash_token(&plaintext);
        let now = Utc::now();

        let record = TokenRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            token_hash,
            permissions,
            status: TokenStatus::Active,
            created_at: now,
            expires_at: expires_in_days.map(|days| now + chrono::Duration::days(days as i64)),
        };
        let stored = record.clone();

        self.mutate(move |records| {
            records.retain(|r| !r.is_expired(now));
            if records
                .iter()
                .any(|r| secret::hashes_match(&r.token_hash, &record.token_hash))
            {
                // Unique-hash invariant: a collision would allow
                // impersonation, so refuse the write.
                return Err(AppError::Storage(anyhow::anyhow!(
                    "token hash collision on create"
                )));
            }
            records.push(record);
            Ok(((), true))
        })
        .await?;

        tracing::info!(id = %stored.id, name = %stored.name, "token created");
        Ok((stored, plaintext))
    }

    /// All live records as hash-free views, sweeping expired records on the
    /// way.
    pub async fn list(&self) -> Result<Vec<TokenView>, AppError> {
        let now = Utc::now();
        self.mutate(move |records| {
            let before = records.len();
            records.retain(|r| !r.is_expired(now));
            let swept = records.len() != before;
            if swept {
                tracing::debug!(removed = before - records.len(), "swept expired tokens");
            }
            Ok((records.iter().map(TokenView::from).collect(), swept))
        })
        .await
    }

    /// Merge `changes` into an existing record. A missing id is a reported
    /// not-found, never a silent no-op.
    pub async fn update(&self, id: &str, changes: TokenChanges) -> Result<TokenView, AppError> {
        let id = id.to_string();
        self.mutate(move |records| {
            let Some(rec) = records.iter_mut().find(|r| r.id == id) else {
                return Err(AppError::TokenNotFound);
            };
            if let Some(name) = changes.name {
                rec.name = name;
            }
            if let Some(permissions) = changes.permissions {
                rec.permissions = permissions;
            }
            if let Some(status) = changes.status {
                rec.status = status;
            }
            Ok((TokenView::from(&*rec), true))
        })
        .await
    }

    /// Remove a record permanently. Idempotent: deleting an unknown id
    /// returns `Ok(false)`.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let target = id.to_string();
        let removed = self
            .mutate(move |records| {
                let before = records.len();
                records.retain(|r| r.id != target);
                let removed = records.len() != before;
                Ok((removed, removed))
            })
            .await?;
        if removed {
            tracing::info!(id = %id, "token deleted");
        }
        Ok(removed)
    }

    /// Active backend and basic health. Diagnostics only.
    pub async fn storage_info(&self) -> StorageInfo {
        let backend = self.backend.read().await;
        let records = backend.load().await.map(|r| r.len()).unwrap_or(0);
        StorageInfo {
            backend: backend.kind(),
            location: backend.location(),
            degraded: self.degraded.load(Ordering::SeqCst),
            records,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}
