//! File and content helpers.

use sha2::{Digest, Sha256};

/// Calculate a SHA-256 checksum of document content, hex-encoded.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}
