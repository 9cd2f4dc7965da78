//! Sealing Engine
//!
//! Turns an open block into an immutable record: Merkle root, block hash,
//! bounded proof-of-work nonce and, when the category requires it, payload
//! encryption. Persistence and chain updates are left to the caller.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::chain::block::{BlockEntries, BlockHeader, OpenBlock, SealPolicy, SealedBlock};
use crate::config::AuditConfig;
use crate::crypto::EntryCipher;
use crate::error::{AuditError, AuditResult};

/// Bounded nonce search
///
/// A deliberately weak tamper delay, not a consensus proof.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    pub max_attempts: u64,
    pub target_prefix: String,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            max_attempts: 10_000,
            target_prefix: "00".to_string(),
        }
    }
}

/// Outcome of a nonce search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSearch {
    pub nonce: u64,
    pub attempts: u64,
    pub found: bool,
}

impl ProofOfWork {
    /// Search nonces from zero; after `max_attempts` the last nonce tried is accepted
    pub(crate) fn search(&self, header: &BlockHeader<'_>) -> AuditResult<NonceSearch> {
        let mut last = 0;
        for nonce in 0..self.max_attempts {
            last = nonce;
            if header.hash_with_nonce(nonce)?.starts_with(&self.target_prefix) {
                return Ok(NonceSearch {
                    nonce,
                    attempts: nonce + 1,
                    found: true,
                });
            }
        }

        Ok(NonceSearch {
            nonce: last,
            attempts: self.max_attempts,
            found: false,
        })
    }
}

pub struct SealingEngine {
    pub policy: SealPolicy,
    pub pow: ProofOfWork,
    cipher: Option<Arc<EntryCipher>>,
}

impl SealingEngine {
    pub fn new(policy: SealPolicy, pow: ProofOfWork, cipher: Option<Arc<EntryCipher>>) -> Self {
        Self { policy, pow, cipher }
    }

    pub fn from_config(config: &AuditConfig, cipher: Option<Arc<EntryCipher>>) -> Self {
        let max_age_secs = i64::try_from(config.block_max_age_secs).unwrap_or(i64::MAX);
        Self::new(
            SealPolicy {
                max_entries: config.block_max_entries,
                max_age: chrono::Duration::seconds(max_age_secs),
            },
            ProofOfWork {
                max_attempts: config.pow_max_attempts,
                target_prefix: config.pow_target_prefix.clone(),
            },
            cipher,
        )
    }

    pub fn cipher(&self) -> Option<&EntryCipher> {
        self.cipher.as_deref()
    }

    /// Seal an open block
    pub fn seal(&self, block: OpenBlock, encrypt: bool) -> AuditResult<SealedBlock> {
        let merkle_root = block.merkle_root()?;
        let header = block.header(merkle_root.as_deref());
        let hash = header.hash()?;
        let search = self.pow.search(&header)?;

        debug!(
            "Block {} hash {} nonce {} ({} attempts, target met: {})",
            block.block_number, hash, search.nonce, search.attempts, search.found
        );

        let entry_count = block.entry_count();
        let entries = if encrypt {
            let cipher = self.cipher.as_ref().ok_or_else(|| {
                AuditError::CryptoError("Encryption required but no cipher configured".to_string())
            })?;
            let plaintext = serde_json::to_vec(&block.entries)?;
            BlockEntries::Encrypted(cipher.encrypt(&plaintext)?)
        } else {
            BlockEntries::Plain(block.entries)
        };

        Ok(SealedBlock {
            id: block.id,
            chain_id: block.chain_id,
            block_number: block.block_number,
            previous_hash: block.previous_hash,
            created: block.created,
            entries,
            entry_count,
            merkle_root,
            hash,
            nonce: search.nonce,
            encrypted: encrypt,
            sealed: true,
            sealed_at: Utc::now(),
        })
    }
}
