//! Chain integrity checks over a contiguous slice of entries.
//!
//! For entry `i` the chain requires:
//!
//!   1. `entry_hash[i] == hash(content[i])`
//!   2. `index[i] == i`
//!   3. `previous_hash[0]` is empty
//!   4. `previous_hash[i] == entry_hash[i-1]` for `i > 0`
//!
//! Rule 4 is only checked between entries inside the verified range; the
//! first entry of a range that does not start at zero is not linked to
//! anything.

use provenance_contracts::{
    chain::{BreakKind, BrokenLink, ChainVerificationResult},
    record::Record,
};
use provenance_core::canonical;

/// Check `entries`, which must be the log's entries `start..=end` in order.
///
/// Every violation is collected; checking does not stop at the first one.
pub fn verify_entries(log_id: &str, start: u64, end: u64, entries: &[Record]) -> ChainVerificationResult {
    let mut broken = Vec::new();

    for (offset, entry) in entries.iter().enumerate() {
        let position = start + offset as u64;
        let stored = entry.entry_hash();

        match canonical::hash(&entry.content) {
            Ok(recomputed) if recomputed == stored => {}
            Ok(recomputed) => broken.push(BrokenLink::hashes(
                position,
                BreakKind::ContentHash,
                Some(recomputed),
                Some(stored),
            )),
            // Content that no longer encodes has certainly changed.
            Err(_) => broken.push(BrokenLink::hashes(position, BreakKind::ContentHash, None, Some(stored))),
        }

        if entry.index != position {
            broken.push(BrokenLink {
                index: position,
                kind: BreakKind::Index,
                expected: Some(position.to_string()),
                actual: Some(entry.index.to_string()),
            });
        }

        if position == 0 {
            if entry.envelope.previous_hash.is_some() {
                broken.push(BrokenLink::hashes(
                    position,
                    BreakKind::Genesis,
                    None,
                    entry.envelope.previous_hash,
                ));
            }
        } else if offset > 0 {
            let expected = entries[offset - 1].entry_hash();
            if entry.envelope.previous_hash != Some(expected) {
                broken.push(BrokenLink::hashes(
                    position,
                    BreakKind::Linkage,
                    Some(expected),
                    entry.envelope.previous_hash,
                ));
            }
        }
    }

    ChainVerificationResult::from_findings(log_id, start, end, broken)
}
