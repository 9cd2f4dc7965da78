//! Audit Blocks
//!
//! A block collects entries while open and becomes an immutable record once
//! sealed. The block hash binds the header fields only (id, chain id, block
//! number, previous hash, Merkle root, creation time); entry content is bound
//! through the Merkle root.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::entry::AuditEntry;
use crate::audit::hash::hash_value;
use crate::audit::merkle::merkle_root;
use crate::crypto::{EncryptedPayload, EntryCipher};
use crate::error::AuditResult;

/// Fields covered by the block hash
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockHeader<'a> {
    pub id: &'a Uuid,
    pub chain_id: &'a Uuid,
    pub block_number: u64,
    pub previous_hash: Option<&'a str>,
    pub merkle_root: Option<&'a str>,
    pub created: &'a DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

impl BlockHeader<'_> {
    /// Hash of the header without a nonce
    pub fn hash(&self) -> AuditResult<String> {
        hash_value(&BlockHeader { nonce: None, ..*self })
    }

    /// Hash of the header with a candidate nonce
    pub fn hash_with_nonce(&self, nonce: u64) -> AuditResult<String> {
        hash_value(&BlockHeader {
            nonce: Some(nonce),
            ..*self
        })
    }
}

/// When an open block must be sealed
#[derive(Debug, Clone)]
pub struct SealPolicy {
    pub max_entries: usize,
    pub max_age: Duration,
}

impl Default for SealPolicy {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_age: Duration::seconds(60),
        }
    }
}

/// Block still accepting entries
#[derive(Debug, Clone)]
pub struct OpenBlock {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub block_number: u64,
    pub previous_hash: Option<String>,
    pub created: DateTime<Utc>,
    pub entries: Vec<AuditEntry>,
}

impl OpenBlock {
    pub fn new(chain_id: Uuid, block_number: u64, previous_hash: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id,
            block_number,
            previous_hash,
            created: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<AuditEntry> {
        self.entries.pop()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created
    }

    /// Size or age threshold reached
    pub fn should_seal(&self, now: DateTime<Utc>, policy: &SealPolicy) -> bool {
        self.entry_count() >= policy.max_entries || self.age(now) >= policy.max_age
    }

    pub(crate) fn header<'a>(&'a self, merkle_root: Option<&'a str>) -> BlockHeader<'a> {
        BlockHeader {
            id: &self.id,
            chain_id: &self.chain_id,
            block_number: self.block_number,
            previous_hash: self.previous_hash.as_deref(),
            merkle_root,
            created: &self.created,
            nonce: None,
        }
    }

    pub fn merkle_root(&self) -> AuditResult<Option<String>> {
        merkle_root(&self.entries)
    }
}

/// Entries of a sealed block, in the clear or encrypted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockEntries {
    Plain(Vec<AuditEntry>),
    Encrypted(EncryptedPayload),
}

/// Immutable, persisted block record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBlock {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub block_number: u64,
    pub previous_hash: Option<String>,
    pub created: DateTime<Utc>,
    pub entries: BlockEntries,
    pub entry_count: usize,
    pub merkle_root: Option<String>,
    pub hash: String,
    pub nonce: u64,
    #[serde(default)]
    pub encrypted: bool,
    pub sealed: bool,
    pub sealed_at: DateTime<Utc>,
}

impl SealedBlock {
    pub(crate) fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            id: &self.id,
            chain_id: &self.chain_id,
            block_number: self.block_number,
            previous_hash: self.previous_hash.as_deref(),
            merkle_root: self.merkle_root.as_deref(),
            created: &self.created,
            nonce: None,
        }
    }

    /// Recompute the block hash from the stored header fields
    pub fn compute_hash(&self) -> AuditResult<String> {
        self.header().hash()
    }

    /// Stored hash matches the header fields
    pub fn verify_hash(&self) -> AuditResult<bool> {
        Ok(self.compute_hash()? == self.hash)
    }

    /// Plaintext entries, if the block is not encrypted
    pub fn plain_entries(&self) -> Option<&[AuditEntry]> {
        match &self.entries {
            BlockEntries::Plain(entries) => Some(entries),
            BlockEntries::Encrypted(_) => None,
        }
    }

    /// Entries, decrypting when needed
    pub fn decrypt_entries(&self, cipher: &EntryCipher) -> AuditResult<Vec<AuditEntry>> {
        match &self.entries {
            BlockEntries::Plain(entries) => Ok(entries.clone()),
            BlockEntries::Encrypted(payload) => {
                let plaintext = cipher.decrypt(payload)?;
                Ok(serde_json::from_slice(&plaintext)?)
            }
        }
    }

    /// Recompute the Merkle root from stored plaintext entries
    pub fn recompute_merkle_root(&self) -> AuditResult<Option<Option<String>>> {
        self.plain_entries().map(merkle_root).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(user: &str) -> AuditEntry {
        let payload = serde_json::json!({"userId": user, "action": "read"});
        AuditEntry::new("data_access", payload.as_object().cloned().unwrap(), "h")
    }

    #[test]
    fn test_seal_threshold_by_count() {
        let policy = SealPolicy {
            max_entries: 2,
            max_age: Duration::seconds(60),
        };
        let mut block = OpenBlock::new(Uuid::new_v4(), 1, None);
        block.push(test_entry("a"));
        assert!(!block.should_seal(Utc::now(), &policy));
        block.push(test_entry("b"));
        assert!(block.should_seal(Utc::now(), &policy));
    }

    #[test]
    fn test_seal_threshold_by_age() {
        let policy = SealPolicy::default();
        let mut block = OpenBlock::new(Uuid::new_v4(), 1, None);
        block.push(test_entry("a"));

        assert!(!block.should_seal(block.created + Duration::seconds(59), &policy));
        assert!(block.should_seal(block.created + Duration::seconds(60), &policy));
    }

    #[test]
    fn test_header_hash_ignores_entries() {
        let mut block = OpenBlock::new(Uuid::new_v4(), 3, Some("ab".repeat(32)));
        let before = block.header(Some("root")).hash().unwrap();
        block.push(test_entry("a"));
        let after = block.header(Some("root")).hash().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_nonce_changes_work_hash() {
        let block = OpenBlock::new(Uuid::new_v4(), 1, None);
        let header = block.header(None);
        assert_ne!(
            header.hash_with_nonce(0).unwrap(),
            header.hash_with_nonce(1).unwrap()
        );
        assert_ne!(header.hash().unwrap(), header.hash_with_nonce(0).unwrap());
    }
}
