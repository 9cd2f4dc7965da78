//! Audit Entries and Integrity
//!
//! Entry records, hashing primitives, Merkle trees and chain verification.

pub mod entry;
pub mod hash;
pub mod merkle;
pub mod verify;

pub use entry::AuditEntry;
pub use merkle::{generate_merkle_proof, merkle_root, verify_merkle_proof, MerkleProof};
pub use verify::{verify_chain, IntegrityCheckResult, IntegrityIssue, VerifyOptions};
