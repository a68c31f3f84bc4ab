//! Remote-blob backend: the token collection as a single JSON object in an
//! S3-compatible bucket (AWS, MinIO).
//!
//! Configured with a URL of the form:
//!
//! ```text
//! # S3
//! s3://my-bucket?region=us-east-1
//!
//! # MinIO (self-hosted S3-compatible)
//! s3://my-bucket?endpoint=http://minio:9000&region=us-east-1
//! ```
//!
//! Credentials come from the environment (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`) or the instance IAM role.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use object_store::{path::Path, ObjectStore};

use crate::models::token::TokenRecord;

use super::{BackendKind, TokenBackend};

/// Object key for the token collection inside the bucket.
const TOKEN_OBJECT_KEY: &str = "keygate/tokens.json";

pub struct BlobBackend {
    store: Arc<dyn ObjectStore>,
    path: Path,
    location: String,
}

impl BlobBackend {
    /// Build a blob backend from an `s3://` URL. Only parses configuration;
    /// reachability is checked by the store's open-time probe.
    pub fn open(url: &str) -> Result<Self> {
        // Parse the bucket name from s3://bucket-name?...
        let without_scheme = url.trim_start_matches("s3://");
        let bucket = without_scheme.split('?').next().unwrap_or(without_scheme);
        if bucket.is_empty() {
            anyhow::bail!("token store URL is missing a bucket name: {}", url);
        }

        // Check for custom endpoint (MinIO)
        let endpoint = parse_query_param(url, "endpoint");
        let region = parse_query_param(url, "region").unwrap_or_else(|| "us-east-1".to_string());

        let mut builder = object_store::aws::AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&region);

        if let Some(ep) = endpoint {
            builder = builder.with_endpoint(&ep).with_allow_http(true);
        }

        if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
            if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                builder = builder
                    .with_access_key_id(key)
                    .with_secret_access_key(secret);
            }
        }

        let store = builder.build().context("build S3 object store")?;

        Ok(BlobBackend {
            store: Arc::new(store),
            path: Path::from(TOKEN_OBJECT_KEY),
            location: format!("{}/{}", url.split('?').next().unwrap_or(url), TOKEN_OBJECT_KEY),
        })
    }
}

#[async_trait]
impl TokenBackend for BlobBackend {
    async fn load(&self) -> Result<Vec<TokenRecord>> {
        let result = match self.store.get(&self.path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e).context("get token object"),
        };

        let bytes = result.bytes().await.context("read token object bytes")?;
        serde_json::from_slice(&bytes).context("parse token object")
    }

    async fn persist(&self, records: &[TokenRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).context("serialize token collection")?;
        self.store
            .put(&self.path, json.into())
            .await
            .context("put token object")?;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Blob
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

fn parse_query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    for part in query.split('&') {
        let mut kv = part.splitn(2, '=');
        if kv.next() == Some(key) {
            return kv
                .next()
                .map(|v| urlencoding::decode(v).unwrap_or_default().into_owned());
        }
    }
    None
}
