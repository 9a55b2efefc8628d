use sha2::{Digest, Sha256};

use crate::summary::RunSummary;

/// Hex SHA-256 over the summary's JSON encoding, a colon, and the session id.
///
/// Clients attach this to a submission so the server can detect a summary
/// altered in transit after the client finalised it.
pub fn run_hash(summary: &RunSummary, session_id: &str) -> String {
    let encoded = serde_json::to_string(summary).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    hasher.update(b":");
    hasher.update(session_id.as_bytes());
    hex::encode(hasher.finalize())
}
