//! Merkle proof and node types.

use serde::{Deserialize, Serialize};

use crate::hash::Hash256;

/// Which side of the current hash a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Sibling is the left operand: `H(sibling || current)`.
    Left,
    /// Sibling is the right operand: `H(current || sibling)`.
    Right,
}

/// One step of a membership proof, ordered leaf to root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling_hash: Hash256,
    pub position: Position,
}

/// A persisted tree node.
///
/// `left_child_hash`/`right_child_hash` are `None` at level 0, and
/// `leaf_record_ids` is only populated there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleNode {
    pub node_hash: Hash256,
    pub left_child_hash: Option<Hash256>,
    pub right_child_hash: Option<Hash256>,
    pub level: u32,
    pub batch_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leaf_record_ids: Vec<String>,
}
