//! Display helpers for listings.
//!
//! Access keys never appear in full in command output or logs; they are
//! shown as a short prefix plus a SHA-256 fingerprint so two keys can be
//! told apart without revealing either.

use sha2::{Digest, Sha256};

/// Hex SHA-256 fingerprint of an access key, truncated to 8 chars.
#[must_use]
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Masked display form of an access key: short prefix plus fingerprint.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…[{}]", key_fingerprint(key))
}
