//! Chain Verification
//!
//! Replays a category's sealed blocks from storage and reports every
//! divergence from the chain summaries in one pass. Verification never
//! fails fast and never corrects anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::chain::BlockSummary;
use crate::storage::BlockStore;

/// Verification options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// Also recompute Merkle roots of plaintext blocks
    pub deep: bool,
}

impl VerifyOptions {
    pub fn deep() -> Self {
        Self { deep: true }
    }
}

/// A single integrity discrepancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum IntegrityIssue {
    #[serde(rename_all = "camelCase")]
    HashMismatch {
        block_number: u64,
        expected: String,
        actual: String,
    },
    #[serde(rename_all = "camelCase")]
    ChainDiscontinuity {
        block_number: u64,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MerkleMismatch {
        block_number: u64,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ReadFailure { block_number: u64, details: String },
}

impl IntegrityIssue {
    pub fn block_number(&self) -> u64 {
        match self {
            Self::HashMismatch { block_number, .. }
            | Self::ChainDiscontinuity { block_number, .. }
            | Self::MerkleMismatch { block_number, .. }
            | Self::ReadFailure { block_number, .. } => *block_number,
        }
    }

    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }

    pub fn is_chain_discontinuity(&self) -> bool {
        matches!(self, Self::ChainDiscontinuity { .. })
    }

    pub fn is_merkle_mismatch(&self) -> bool {
        matches!(self, Self::MerkleMismatch { .. })
    }

    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::ReadFailure { .. })
    }
}

fn or_null(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("null")
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch {
                block_number,
                expected,
                actual,
            } => write!(
                f,
                "Block {}: hash mismatch (expected {}, got {})",
                block_number, expected, actual
            ),
            Self::ChainDiscontinuity {
                block_number,
                expected,
                actual,
            } => write!(
                f,
                "Block {}: chain discontinuity (expected previous hash {}, got {})",
                block_number,
                or_null(expected),
                or_null(actual)
            ),
            Self::MerkleMismatch {
                block_number,
                expected,
                actual,
            } => write!(
                f,
                "Block {}: Merkle root mismatch (stored {}, computed {})",
                block_number,
                or_null(expected),
                or_null(actual)
            ),
            Self::ReadFailure {
                block_number,
                details,
            } => write!(f, "Block {}: read failure: {}", block_number, details),
        }
    }
}

/// Outcome of one chain verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityCheckResult {
    pub category: String,
    pub started: DateTime<Utc>,
    pub completed: DateTime<Utc>,
    pub duration_ms: u64,
    pub blocks_checked: usize,
    pub errors: Vec<IntegrityIssue>,
    pub valid: bool,
}

impl IntegrityCheckResult {
    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.valid {
            format!(
                "✅ {} chain is valid ({} blocks, {} ms)",
                self.category, self.blocks_checked, self.duration_ms
            )
        } else {
            format!(
                "❌ {} chain is invalid ({} blocks, {} errors)",
                self.category,
                self.blocks_checked,
                self.errors.len()
            )
        }
    }

    /// Get detailed status, one line per error
    pub fn detailed_status(&self) -> String {
        let mut lines = vec![self.summary()];
        lines.extend(self.errors.iter().map(|e| format!("  - {}", e)));
        lines.join("\n")
    }
}

/// Verify a category's stored blocks against its chain summaries
///
/// `summaries` must be in ascending block-number order, as kept by the chain.
pub fn verify_chain(
    store: &dyn BlockStore,
    category: &str,
    summaries: &[BlockSummary],
    options: VerifyOptions,
) -> IntegrityCheckResult {
    let started = Utc::now();
    let mut errors = Vec::new();
    let mut blocks_checked = 0;

    info!(
        "Verifying {} chain ({} blocks, deep: {})",
        category,
        summaries.len(),
        options.deep
    );

    for (index, summary) in summaries.iter().enumerate() {
        let block_number = summary.block_number;
        let block = match store.read_block(category, block_number) {
            Ok(block) => block,
            Err(e) => {
                warn!("Failed to read block {} of {}: {}", block_number, category, e);
                errors.push(IntegrityIssue::ReadFailure {
                    block_number,
                    details: e.to_string(),
                });
                continue;
            }
        };
        blocks_checked += 1;

        match block.compute_hash() {
            Ok(actual) if actual == summary.hash => {}
            Ok(actual) => errors.push(IntegrityIssue::HashMismatch {
                block_number,
                expected: summary.hash.clone(),
                actual,
            }),
            Err(e) => errors.push(IntegrityIssue::ReadFailure {
                block_number,
                details: e.to_string(),
            }),
        }

        if index > 0 {
            let expected = Some(summaries[index - 1].hash.clone());
            if block.previous_hash != expected {
                errors.push(IntegrityIssue::ChainDiscontinuity {
                    block_number,
                    expected,
                    actual: block.previous_hash.clone(),
                });
            }
        }

        if options.deep {
            match block.recompute_merkle_root() {
                Ok(Some(computed)) if computed != block.merkle_root => {
                    errors.push(IntegrityIssue::MerkleMismatch {
                        block_number,
                        expected: block.merkle_root.clone(),
                        actual: computed,
                    });
                }
                Ok(None) => debug!("Block {} of {} is encrypted, skipping Merkle check", block_number, category),
                Ok(Some(_)) => {}
                Err(e) => errors.push(IntegrityIssue::ReadFailure {
                    block_number,
                    details: e.to_string(),
                }),
            }
        }
    }

    let completed = Utc::now();
    let duration_ms = u64::try_from((completed - started).num_milliseconds()).unwrap_or(0);
    let valid = errors.is_empty();

    if valid {
        info!("{} chain verified: {} blocks", category, blocks_checked);
    } else {
        warn!(
            "{} chain verification found {} errors in {} blocks",
            category,
            errors.len(),
            blocks_checked
        );
    }

    IntegrityCheckResult {
        category: category.to_string(),
        started,
        completed,
        duration_ms,
        blocks_checked,
        errors,
        valid,
    }
}
