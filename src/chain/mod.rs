//! Hash chains of sealed audit blocks
//!
//! The "blockchain" here is a local, single-writer hash chain per category:
//! an arena of block summaries linked by hash pointers.

pub mod block;
pub mod ledger;
pub mod seal;

pub use block::{BlockEntries, OpenBlock, SealPolicy, SealedBlock};
pub use ledger::{BlockSummary, Chain, ChainHead, ChainMetadata};
pub use seal::{NonceSearch, ProofOfWork, SealingEngine};
