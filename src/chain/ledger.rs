//! Chain Manager
//!
//! One hash chain per audit category. The chain keeps an append-only list of
//! sealed block summaries and the hash of the most recently sealed block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::block::{OpenBlock, SealedBlock};
use crate::error::{AuditError, AuditResult};

pub const CHAIN_VERSION: &str = "1.0";

/// Summary of one sealed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub block_number: u64,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub entry_count: usize,
}

/// Head of a chain, persisted apart from the block files after every seal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHead {
    pub chain_id: Uuid,
    pub block_count: u64,
    pub last_block_hash: Option<String>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub encryption: bool,
}

/// Hash chain for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: Uuid,
    pub category: String,
    pub created: DateTime<Utc>,
    pub version: String,
    pub blocks: Vec<BlockSummary>,
    pub last_block_hash: Option<String>,
    pub metadata: ChainMetadata,
}

impl Chain {
    /// Create an empty chain
    pub fn new(category: &str, encryption: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.to_string(),
            created: Utc::now(),
            version: CHAIN_VERSION.to_string(),
            blocks: Vec::new(),
            last_block_hash: None,
            metadata: ChainMetadata { encryption },
        }
    }

    pub fn next_block_number(&self) -> u64 {
        self.blocks.len() as u64 + 1
    }

    /// Open the next block, linked to the current chain head
    pub fn open_block(&self) -> OpenBlock {
        OpenBlock::new(self.id, self.next_block_number(), self.last_block_hash.clone())
    }

    /// Append a sealed block's summary and advance the chain head
    pub fn record_sealed(&mut self, block: &SealedBlock) -> AuditResult<()> {
        if block.chain_id != self.id {
            return Err(AuditError::StorageError(format!(
                "Block {} belongs to chain {}, not {}",
                block.block_number, block.chain_id, self.id
            )));
        }

        if block.block_number != self.next_block_number() {
            return Err(AuditError::StorageError(format!(
                "Out-of-order block for {}: expected {}, got {}",
                self.category,
                self.next_block_number(),
                block.block_number
            )));
        }

        if block.previous_hash != self.last_block_hash {
            return Err(AuditError::StorageError(format!(
                "Block {} of {} does not link to the chain head",
                block.block_number, self.category
            )));
        }

        self.push_summary(block);
        Ok(())
    }

    /// Append a summary rebuilt from storage
    ///
    /// Links are not checked here; divergences are reported by verification.
    /// An empty hash marks a block whose hash could not be recovered.
    pub(crate) fn restore_summary(&mut self, summary: BlockSummary) {
        self.last_block_hash = Some(summary.hash.clone()).filter(|h| !h.is_empty());
        self.blocks.push(summary);
    }

    fn push_summary(&mut self, block: &SealedBlock) {
        self.blocks.push(BlockSummary {
            block_number: block.block_number,
            hash: block.hash.clone(),
            timestamp: block.sealed_at,
            entry_count: block.entry_count,
        });
        self.last_block_hash = Some(block.hash.clone());
    }

    /// Current head, for persisting after a seal
    pub fn head(&self) -> ChainHead {
        ChainHead {
            chain_id: self.id,
            block_count: self.blocks.len() as u64,
            last_block_hash: self.last_block_hash.clone(),
            updated: Utc::now(),
        }
    }

    pub fn summary(&self, block_number: u64) -> Option<&BlockSummary> {
        let index = usize::try_from(block_number.checked_sub(1)?).ok()?;
        self.blocks.get(index)
    }

    pub fn total_entries(&self) -> usize {
        self.blocks.iter().map(|b| b.entry_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Genesis record: the chain as it was when created
    pub fn genesis(&self) -> Self {
        Self {
            blocks: Vec::new(),
            last_block_hash: None,
            ..self.clone()
        }
    }
}
