//! # provenance-chain
//!
//! Append-only, SHA3-256 hash-chained logs.
//!
//! ## Overview
//!
//! Each entry's `entry_hash` is the canonical hash of its content, and its
//! `previous_hash` is the `entry_hash` of the entry before it. Changing any
//! stored content, hash, or link is reported by `verify_chain` as a
//! `BrokenLink` naming the entry and what no longer matches.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provenance_chain::{HashChainLog, InMemoryLogStore};
//!
//! let log = HashChainLog::new(Arc::new(InMemoryLogStore::new()));
//! log.append("audit_log", &json!({"event": "login"}))?;
//! log.append("audit_log", &json!({"event": "logout"}))?;
//!
//! assert!(log.verify_chain("audit_log", 0, 1)?.valid);
//! ```

pub mod log;
pub mod memory;
pub mod verify;

pub use log::HashChainLog;
pub use memory::InMemoryLogStore;
pub use verify::verify_entries;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use provenance_contracts::{
        chain::BreakKind,
        error::ProvenanceError,
        hash::Hash256,
        record::{IntegrityEnvelope, Record},
    };
    use provenance_core::{canonical, traits::LogStore};

    use super::{HashChainLog, InMemoryLogStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A log over a store the test can also reach into.
    fn log_with_store() -> (HashChainLog, Arc<InMemoryLogStore>) {
        let store = Arc::new(InMemoryLogStore::new());
        (HashChainLog::new(store.clone()), store)
    }

    /// Append entries `{"n": 0}` through `{"n": count - 1}`.
    fn fill(log: &HashChainLog, log_id: &str, count: u64) {
        for n in 0..count {
            log.append(log_id, &json!({ "n": n })).unwrap();
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Five appends to `L1` link up and verify end to end.
    #[test]
    fn test_five_entry_chain_links() {
        let (log, _) = log_with_store();
        fill(&log, "L1", 5);

        let entries = log.entries("L1", 0, 4).unwrap();
        assert_eq!(entries[0].envelope.previous_hash, None, "genesis has no predecessor");
        for i in 1..5 {
            assert_eq!(
                entries[i].envelope.previous_hash,
                Some(entries[i - 1].entry_hash()),
                "entry {i} must link to entry {}",
                i - 1
            );
        }

        let result = log.verify_chain("L1", 0, 4).unwrap();
        assert!(result.valid);
        assert!(result.broken_links.is_empty());
    }

    /// The entry hash is the canonical hash of the content.
    #[test]
    fn test_entry_hash_is_content_hash() {
        let (log, _) = log_with_store();
        let record = log.append("L1", &json!({ "b": 2, "a": 1 })).unwrap();
        assert_eq!(record.entry_hash(), canonical::hash(&json!({ "a": 1, "b": 2 })).unwrap());
        assert_eq!(record.record_id(), "L1:0");
    }

    /// Corrupting the content of entry 2 yields exactly one break, at 2.
    #[test]
    fn test_content_tamper_is_localized() {
        let (log, store) = log_with_store();
        fill(&log, "L1", 5);

        {
            let mut logs = store.state.write().unwrap();
            logs.get_mut("L1").unwrap()[2].content = json!({ "n": "TAMPERED" });
        }

        let result = log.verify_chain("L1", 0, 4).unwrap();
        assert!(!result.valid);
        assert_eq!(result.broken_links.len(), 1, "{:?}", result.broken_links);
        assert_eq!(result.broken_links[0].index, 2);
        assert_eq!(result.broken_links[0].kind, BreakKind::ContentHash);
    }

    /// Appending the strings "a" through "e" hashes each as its JSON text,
    /// and corrupting "c" is reported at index 2 only.
    #[test]
    fn test_string_entries_and_single_corruption() {
        let (log, store) = log_with_store();
        for item in ["a", "b", "c", "d", "e"] {
            log.append("L1", item).unwrap();
        }

        let entries = log.entries("L1", 0, 4).unwrap();
        assert_eq!(entries[0].entry_hash(), canonical::hash_bytes(b"\"a\""));
        assert_eq!(entries[4].entry_hash(), canonical::hash_bytes(b"\"e\""));
        assert_eq!(entries[1].envelope.previous_hash, Some(entries[0].entry_hash()));
        assert!(log.verify_chain("L1", 0, 4).unwrap().valid);

        {
            let mut logs = store.state.write().unwrap();
            logs.get_mut("L1").unwrap()[2].content = json!("x");
        }

        let result = log.verify_chain("L1", 0, 4).unwrap();
        let indexes: Vec<u64> = result.broken_links.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![2]);
    }

    /// Rewriting a stored hash breaks the rewritten entry and the link after it.
    #[test]
    fn test_hash_rewrite_breaks_next_link() {
        let (log, store) = log_with_store();
        fill(&log, "L1", 5);

        {
            let mut logs = store.state.write().unwrap();
            logs.get_mut("L1").unwrap()[1].envelope.entry_hash = Hash256::from_bytes([0xEE; 32]);
        }

        let result = log.verify_chain("L1", 0, 4).unwrap();
        let found: Vec<_> = result.broken_links.iter().map(|b| (b.index, b.kind)).collect();
        assert_eq!(found, vec![(1, BreakKind::ContentHash), (2, BreakKind::Linkage)]);
    }

    /// Every break is reported, not only the first.
    #[test]
    fn test_all_breaks_reported() {
        let (log, store) = log_with_store();
        fill(&log, "L1", 6);

        {
            let mut logs = store.state.write().unwrap();
            let entries = logs.get_mut("L1").unwrap();
            entries[0].envelope.previous_hash = Some(Hash256::from_bytes([1; 32]));
            entries[3].content = json!("x");
            entries[5].index = 9;
        }

        let result = log.verify_chain("L1", 0, 5).unwrap();
        let found: Vec<_> = result.broken_links.iter().map(|b| (b.index, b.kind)).collect();
        assert_eq!(
            found,
            vec![(0, BreakKind::Genesis), (3, BreakKind::ContentHash), (5, BreakKind::Index)]
        );
    }

    /// A sub-range does not check the link into its first entry.
    #[test]
    fn test_sub_range_ignores_outside_linkage() {
        let (log, store) = log_with_store();
        fill(&log, "L1", 5);

        {
            let mut logs = store.state.write().unwrap();
            logs.get_mut("L1").unwrap()[2].envelope.previous_hash = None;
        }

        assert!(log.verify_chain("L1", 2, 4).unwrap().valid);
        assert!(!log.verify_chain("L1", 1, 4).unwrap().valid);
    }

    /// Ranges past the end or reversed are rejected.
    #[test]
    fn test_invalid_ranges() {
        let (log, _) = log_with_store();
        fill(&log, "L1", 3);

        for (start, end) in [(0, 3), (2, 1), (5, 9)] {
            assert!(
                matches!(log.verify_chain("L1", start, end), Err(ProvenanceError::InvalidRange { .. })),
                "range {start}..={end} must be rejected"
            );
        }
        assert!(matches!(
            log.verify_chain("unknown", 0, 0),
            Err(ProvenanceError::InvalidRange { len: 0, .. })
        ));
    }

    /// Concurrent appends to one log never fork the chain.
    #[test]
    fn test_concurrent_appends_do_not_fork() {
        let (log, _) = log_with_store();
        let log = Arc::new(log);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                thread::spawn(move || {
                    for n in 0..25 {
                        log.append("shared", &json!({ "thread": t, "n": n })).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len("shared").unwrap(), 200);
        let indices: HashSet<u64> = log
            .entries("shared", 0, 199)
            .unwrap()
            .iter()
            .map(|r| r.index)
            .collect();
        assert_eq!(indices.len(), 200);
        assert!(log.verify_chain("shared", 0, 199).unwrap().valid);
    }

    /// Logs are independent of one another.
    #[test]
    fn test_logs_are_independent() {
        let (log, store) = log_with_store();
        fill(&log, "a", 2);
        fill(&log, "b", 3);

        assert_eq!(log.len("a").unwrap(), 2);
        assert_eq!(log.len("b").unwrap(), 3);
        assert_eq!(log.get("b", 0).unwrap().unwrap().envelope.previous_hash, None);
        assert_eq!(store.log_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(log.verify_log("a").unwrap().valid);
        assert!(log.verify_log("empty").unwrap().valid);
    }

    /// The store refuses a push that does not extend the log.
    #[test]
    fn test_store_rejects_out_of_order_push() {
        let store = InMemoryLogStore::new();
        let content = json!(1);
        let record = Record {
            log_id: "L1".into(),
            index: 1,
            envelope: IntegrityEnvelope::new(canonical::hash(&content).unwrap(), None),
            content,
        };
        assert!(matches!(store.push(record), Err(ProvenanceError::Storage { .. })));
        assert_eq!(store.len("L1").unwrap(), 0);
    }

    /// Content that has no canonical form never reaches the log.
    #[test]
    fn test_unencodable_content_rejected() {
        let (log, _) = log_with_store();
        assert!(matches!(
            log.append("L1", &vec![f64::NAN]),
            Err(ProvenanceError::Encoding { .. })
        ));
        assert!(matches!(
            log.append("", &json!(1)),
            Err(ProvenanceError::MalformedInput { .. })
        ));
        assert_eq!(log.len("L1").unwrap(), 0);
    }
}
