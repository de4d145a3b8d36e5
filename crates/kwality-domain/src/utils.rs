//! Common utilities shared by all layers.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of content, used for workspace fingerprints.
pub fn compute_content_hash(content: &str) -> String {
    compute_bytes_hash(content.as_bytes())
}

/// SHA-256 hex digest of raw bytes.
pub fn compute_bytes_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Mask sensitive ID for logging
///
/// Shows first 8 chars + "..." to allow correlation while protecting full ID.
/// Example: "3f2a9c1e-..." stays correlatable without leaking the full id.
pub fn mask_id(id: &str) -> String {
    if id.len() <= 8 {
        id.to_owned()
    } else {
        format!("{}...", &id[..8])
    }
}
