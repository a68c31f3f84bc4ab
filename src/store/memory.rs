use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::token::TokenRecord;

use super::{BackendKind, TokenBackend};

/// Process-local backend. Used directly in tests and serverless sandboxes,
/// and as the degradation target when a durable backend fails at runtime.
pub struct MemoryBackend {
    records: RwLock<Vec<TokenRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Seed the backend, e.g. with the last collection a failed durable
    /// backend managed to load or was asked to persist.
    pub fn with_records(records: Vec<TokenRecord>) -> Self {
        MemoryBackend {
            records: RwLock::new(records),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenBackend for MemoryBackend {
    async fn load(&self) -> anyhow::Result<Vec<TokenRecord>> {
        Ok(self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?
            .clone())
    }

    async fn persist(&self, records: &[TokenRecord]) -> anyhow::Result<()> {
        *self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))? = records.to_vec();
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
