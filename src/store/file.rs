use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

use crate::models::token::TokenRecord;

use super::{BackendKind, TokenBackend};

/// Filesystem backend: the whole collection as one JSON array at a
/// well-known path. Writes go to a sibling temp file and are renamed into
/// place, so a crashed write never leaves a torn collection behind.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend { path: path.into() }
    }
}

#[async_trait]
impl TokenBackend for FileBackend {
    async fn load(&self) -> anyhow::Result<Vec<TokenRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).context(format!("read token file {}", self.path.display()))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes)
            .context(format!("parse token file {}", self.path.display()))
    }

    async fn persist(&self, records: &[TokenRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context(format!("create token dir {}", parent.display()))?;
            }
        }

        let json = serde_json::to_vec_pretty(records).context("serialize token collection")?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .context(format!("write token file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(format!("replace token file {}", self.path.display()))?;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
