//! Canonical hashing helpers
//!
//! All hashes in the ledger are lower-case hex SHA-256 digests. Structured
//! values are hashed over their canonical JSON form: the serde_json encoding
//! of the value, with struct fields in declaration order. Decoding a stored
//! record and encoding it again reproduces the same bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::AuditResult;

/// SHA-256 of raw bytes as lower-case hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonical JSON encoding of a value
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> AuditResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// SHA-256 over the canonical JSON of a value
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> AuditResult<String> {
    Ok(sha256_hex(&canonical_json(value)?))
}

/// Hash of two hex digests concatenated as text
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
