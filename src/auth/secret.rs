//! Bearer secret generation and hash-at-rest.
//!
//! Secrets are 256 bits from the OS CSPRNG behind a fixed prefix, so a
//! leaked keygate token is recognizable to scanners. Only the SHA-256
//! digest of a secret is ever persisted.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix on every generated secret.
pub const TOKEN_PREFIX: &str = "kg_";

const TOKEN_BYTES: usize = 32;

/// Generate a fresh bearer secret: prefix + 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

/// SHA-256 of the plaintext, lowercase hex. The only form ever stored.
pub fn hash_token(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time equality over hex digests.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Mask a secret for logs. Never log the full plaintext.
pub fn mask_token(token: &str) -> String {
    if token.len() > 12 {
        format!("{}...{}", &token[..7], &token[token.len() - 4..])
    } else {
        "****".to_string()
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_have_prefix_and_length() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        // prefix + 64 hex chars
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_BYTES * 2);
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
    }

    #[test]
    fn test_distinct_plaintexts_hash_differently() {
        assert_ne!(hash_token("kg_aaaa"), hash_token("kg_aaab"));
    }

    #[test]
    fn test_hash_is_not_the_plaintext() {
        let token = generate_token();
        let hash = hash_token(&token);
        assert_ne!(hash, token);
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_hashes_match() {
        let h = hash_token("kg_test");
        assert!(hashes_match(&h, &hash_token("kg_test")));
        assert!(!hashes_match(&h, &hash_token("kg_other")));
    }

    #[test]
    fn test_mask_hides_the_middle() {
        let token = generate_token();
        let masked = mask_token(&token);
        assert!(masked.len() < token.len());
        assert!(!masked.contains(&token[8..40]));
        assert_eq!(mask_token("short"), "****");
    }
}
