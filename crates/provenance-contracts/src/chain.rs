//! Chain verification findings.

use serde::{Deserialize, Serialize};

use crate::hash::Hash256;

/// What kind of inconsistency a broken link represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The stored `entry_hash` does not match the hash recomputed from the
    /// stored content: the content (or the hash) was modified.
    ContentHash,
    /// `previous_hash` does not equal the predecessor's `entry_hash`.
    Linkage,
    /// The genesis entry carries a `previous_hash`.
    Genesis,
    /// The stored index does not match the entry's position.
    Index,
}

/// A single inconsistency found by `verify_chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    /// Position of the offending entry.
    pub index: u64,
    pub kind: BreakKind,
    /// The value the chain requires at this point.
    pub expected: Option<String>,
    /// The value actually stored.
    pub actual: Option<String>,
}

impl BrokenLink {
    pub fn hashes(index: u64, kind: BreakKind, expected: Option<Hash256>, actual: Option<Hash256>) -> Self {
        Self {
            index,
            kind,
            expected: expected.map(|h| h.to_hex()),
            actual: actual.map(|h| h.to_hex()),
        }
    }
}

/// The complete result of verifying a range of a log.
///
/// Every break in the range is listed, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerificationResult {
    pub log_id: String,
    pub start: u64,
    pub end: u64,
    pub valid: bool,
    pub broken_links: Vec<BrokenLink>,
}

impl ChainVerificationResult {
    pub fn from_findings(log_id: impl Into<String>, start: u64, end: u64, broken_links: Vec<BrokenLink>) -> Self {
        Self {
            log_id: log_id.into(),
            start,
            end,
            valid: broken_links.is_empty(),
            broken_links,
        }
    }
}
