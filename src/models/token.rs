use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a token. Inactive tokens fail validation regardless
/// of expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Inactive,
}

/// A persisted token record. Only the SHA-256 digest of the secret is
/// stored; the plaintext is returned to the caller once at creation and is
/// unrecoverable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub name: String,
    pub token_hash: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// A record with no `expires_at` never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Public view of a record with the hash stripped. This is what the
/// management API returns.
#[derive(Debug, Clone, Serialize)]
pub struct TokenView {
    pub id: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&TokenRecord> for TokenView {
    fn from(rec: &TokenRecord) -> Self {
        TokenView {
            id: rec.id.clone(),
            name: rec.name.clone(),
            permissions: rec.permissions.clone(),
            status: rec.status,
            created_at: rec.created_at,
            expires_at: rec.expires_at,
        }
    }
}

/// Fields that `TokenStore::update` may change. `id`, `token_hash` and
/// `created_at` are immutable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenChanges {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub status: Option<TokenStatus>,
}

impl TokenChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.permissions.is_none() && self.status.is_none()
    }
}

// ── Tests ───────────────────────────────────────────────────────
