//! Block Store
//!
//! Durable storage for chain genesis records, sealed blocks and chain heads.
//! Genesis records and blocks are written once and never updated or deleted
//! through this interface. The head record is replaced after every seal.

pub mod direct;
pub mod file;

use crate::chain::{Chain, ChainHead, SealedBlock};
use crate::error::AuditResult;

pub use direct::DirectLogWriter;
pub use file::FileBlockStore;

/// Storage backend for sealed blocks
///
/// Implementations must be thread-safe. A failed write must not leave a
/// readable partial record behind.
pub trait BlockStore: Send + Sync {
    /// Persist the genesis record of a new chain, returning bytes written
    fn write_genesis(&self, chain: &Chain) -> AuditResult<u64>;

    /// Read a chain's genesis record, if the chain exists
    fn read_genesis(&self, category: &str) -> AuditResult<Option<Chain>>;

    /// Persist a sealed block, returning bytes written
    fn write_block(&self, category: &str, block: &SealedBlock) -> AuditResult<u64>;

    /// Read a sealed block exactly as written
    fn read_block(&self, category: &str, block_number: u64) -> AuditResult<SealedBlock>;

    /// Block numbers present for a category, ascending
    fn list_blocks(&self, category: &str) -> AuditResult<Vec<u64>>;

    /// Replace a chain's head record
    fn write_head(&self, category: &str, head: &ChainHead) -> AuditResult<()>;

    /// Read a chain's head record, if one was written
    fn read_head(&self, category: &str) -> AuditResult<Option<ChainHead>>;

    /// Categories with a persisted genesis record
    fn list_chains(&self) -> AuditResult<Vec<String>>;
}
