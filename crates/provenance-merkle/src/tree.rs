//! Binary Merkle trees over 32-byte leaf hashes.
//!
//! Interior nodes are `SHA3-256(left || right)` over the raw 32-byte
//! children. A level with an odd number of nodes pairs its last node with
//! itself. Leaves keep the order they were given in; the tree does not sort
//! them.

use serde::{Deserialize, Serialize};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
    merkle::{MerkleNode, Position, ProofStep},
};
use provenance_core::canonical;

/// A built tree. `levels[0]` holds the leaves; the last level holds the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    /// Lowercase hex of the root, or `""` for a tree with no leaves.
    pub root_hash: String,
    pub levels: Vec<Vec<Hash256>>,
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    canonical::hash_concat(&[&left.as_bytes()[..], &right.as_bytes()[..]])
}

/// Build a tree over `leaves` in the given order.
pub fn build_tree(leaves: &[Hash256]) -> MerkleTree {
    if leaves.is_empty() {
        return MerkleTree {
            root_hash: String::new(),
            levels: Vec::new(),
        };
    }

    let mut levels = vec![leaves.to_vec()];
    while let Some(current) = levels.last().filter(|level| level.len() > 1) {
        let next = current
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
        levels.push(next);
    }

    let root_hash = levels
        .last()
        .and_then(|top| top.first())
        .map(Hash256::to_hex)
        .unwrap_or_default();
    MerkleTree { root_hash, levels }
}

impl MerkleTree {
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn leaves(&self) -> &[Hash256] {
        self.levels.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// Proof for the first occurrence of `leaf`.
    pub fn generate_proof(&self, leaf: &Hash256) -> ProvenanceResult<Vec<ProofStep>> {
        let position = self
            .leaves()
            .iter()
            .position(|candidate| candidate == leaf)
            .ok_or_else(|| ProvenanceError::LeafNotFound { leaf: leaf.to_hex() })?;
        self.proof_at(position)
    }

    /// Proof for the leaf at `position`, ordered leaf to root.
    pub fn proof_at(&self, position: usize) -> ProvenanceResult<Vec<ProofStep>> {
        if position >= self.leaf_count() {
            return Err(ProvenanceError::LeafNotFound {
                leaf: format!("position {position} of {}", self.leaf_count()),
            });
        }

        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut index = position;
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if index % 2 == 1 {
                ProofStep {
                    sibling_hash: level[index - 1],
                    position: Position::Left,
                }
            } else {
                // The last node of an odd level is its own sibling.
                ProofStep {
                    sibling_hash: *level.get(index + 1).unwrap_or(&level[index]),
                    position: Position::Right,
                }
            };
            proof.push(step);
            index /= 2;
        }
        Ok(proof)
    }

    /// Every node of the tree, leaves first, tagged with `batch_id`.
    ///
    /// `leaf_record_ids[i]` is attached to leaf `i` when present.
    pub fn nodes(&self, batch_id: &str, leaf_record_ids: &[String]) -> Vec<MerkleNode> {
        let mut nodes = Vec::new();
        for (level_no, level) in self.levels.iter().enumerate() {
            for (i, node_hash) in level.iter().enumerate() {
                let (left_child_hash, right_child_hash, leaf_record_ids) = if level_no == 0 {
                    (None, None, leaf_record_ids.get(i).cloned().into_iter().collect())
                } else {
                    let below = &self.levels[level_no - 1];
                    let left = below[2 * i];
                    let right = *below.get(2 * i + 1).unwrap_or(&left);
                    (Some(left), Some(right), Vec::new())
                };
                nodes.push(MerkleNode {
                    node_hash: *node_hash,
                    left_child_hash,
                    right_child_hash,
                    level: level_no as u32,
                    batch_id: batch_id.to_string(),
                    leaf_record_ids,
                });
            }
        }
        nodes
    }
}

/// Proof for `leaf` in `tree`.
pub fn generate_proof(leaf: &Hash256, tree: &MerkleTree) -> ProvenanceResult<Vec<ProofStep>> {
    tree.generate_proof(leaf)
}

/// Fold `proof` over `leaf` and compare with `root_hash` (hex, any case).
pub fn verify_proof(leaf: &Hash256, proof: &[ProofStep], root_hash: &str) -> bool {
    let Ok(root) = Hash256::from_hex(root_hash) else {
        return false;
    };
    let computed = proof.iter().fold(*leaf, |current, step| match step.position {
        Position::Left => hash_pair(&step.sibling_hash, &current),
        Position::Right => hash_pair(&current, &step.sibling_hash),
    });
    computed == root
}
