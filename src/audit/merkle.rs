//! Merkle Tree for Audit Blocks
//!
//! Summarizes an ordered list of entries into a single root hash. Leaves are
//! SHA-256 digests of each entry's canonical JSON. Each level pairs adjacent
//! hashes left to right and hashes the concatenated hex text; when a level has
//! an odd count, its last hash is paired with itself. An empty list has no root.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::hash::{hash_pair, hash_value};
use crate::error::{AuditError, AuditResult};

/// Leaf hashes for an ordered list of items
pub fn leaf_hashes<T: Serialize>(items: &[T]) -> AuditResult<Vec<String>> {
    items.iter().map(hash_value).collect()
}

/// Reduce one level of the tree
fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Merkle root over precomputed leaf hashes
pub fn merkle_root_from_leaves(leaves: &[String]) -> Option<String> {
    let mut level = leaves.to_vec();
    if level.is_empty() {
        return None;
    }

    while level.len() > 1 {
        level = next_level(&level);
    }

    level.pop()
}

/// Merkle root over an ordered list of items
pub fn merkle_root<T: Serialize>(items: &[T]) -> AuditResult<Option<String>> {
    let leaves = leaf_hashes(items)?;
    let root = merkle_root_from_leaves(&leaves);
    debug!("Merkle root over {} leaves: {:?}", leaves.len(), root);
    Ok(root)
}

/// Verify Merkle root against items
pub fn verify_merkle_root<T: Serialize>(items: &[T], claimed_root: Option<&str>) -> AuditResult<bool> {
    Ok(merkle_root(items)?.as_deref() == claimed_root)
}

/// Which side of the running hash a sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub side: Side,
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: String,
    pub steps: Vec<ProofStep>,
    pub root_hash: String,
}

impl MerkleProof {
    /// Verify this proof
    pub fn verify(&self) -> bool {
        verify_merkle_proof(self, &self.leaf_hash, &self.root_hash)
    }

    /// Get proof size
    pub fn size(&self) -> usize {
        self.steps.len()
    }
}

/// Generate an inclusion proof for the leaf at `index`
pub fn generate_merkle_proof(leaves: &[String], index: usize) -> AuditResult<MerkleProof> {
    if index >= leaves.len() {
        return Err(AuditError::invalid_field(
            "leafIndex",
            format!("index {} out of range for {} leaves", index, leaves.len()),
        ));
    }

    let mut steps = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;

    while level.len() > 1 {
        let sibling_index = position ^ 1;
        let sibling = level.get(sibling_index).unwrap_or(&level[position]).clone();
        let side = if position % 2 == 0 { Side::Right } else { Side::Left };
        steps.push(ProofStep { hash: sibling, side });

        level = next_level(&level);
        position /= 2;
    }

    Ok(MerkleProof {
        leaf_index: index,
        leaf_hash: leaves[index].clone(),
        steps,
        root_hash: level[0].clone(),
    })
}

/// Verify Merkle proof
pub fn verify_merkle_proof(proof: &MerkleProof, leaf_hash: &str, root_hash: &str) -> bool {
    let computed = proof
        .steps
        .iter()
        .fold(leaf_hash.to_string(), |current, step| match step.side {
            Side::Right => hash_pair(&current, &step.hash),
            Side::Left => hash_pair(&step.hash, &current),
        });

    computed == root_hash
}
