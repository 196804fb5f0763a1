//! # provenance-merkle
//!
//! Merkle batching for hash-chain logs.
//!
//! ## Overview
//!
//! - `build_tree` / `verify_proof` are the pure tree primitives.
//! - `BatchVerifier` roots ranges of a `HashChainLog` under deterministic
//!   batch ids and answers membership queries for single records.
//! - `BatchScheduler` cuts batches in the background on count and time
//!   thresholds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let batches = BatchVerifier::new(log.clone());
//! let batch = batches.build_batch("audit_log", 0, 99)?;
//! let proof = batches.prove_record("audit_log", 42)?;
//! assert!(verify_proof(&proof.leaf_hash, &proof.proof, &batch.root_hash));
//! ```

pub mod batch;
pub mod scheduler;
pub mod tree;

pub use batch::{batch_id, BatchVerifier, MerkleBatch, RecordProof};
pub use scheduler::{BatchConfig, BatchScheduler};
pub use tree::{build_tree, generate_proof, verify_proof, MerkleTree};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use provenance_chain::{HashChainLog, InMemoryLogStore};
    use provenance_contracts::{
        error::ProvenanceError,
        hash::Hash256,
        merkle::Position,
    };
    use provenance_core::canonical;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn leaf(n: u8) -> Hash256 {
        canonical::hash_bytes(&[n])
    }

    fn leaves(count: u8) -> Vec<Hash256> {
        (0..count).map(leaf).collect()
    }

    fn pair(left: &Hash256, right: &Hash256) -> Hash256 {
        canonical::hash_concat(&[&left.as_bytes()[..], &right.as_bytes()[..]])
    }

    fn log_with(log_id: &str, count: u64) -> Arc<HashChainLog> {
        let log = Arc::new(HashChainLog::new(Arc::new(InMemoryLogStore::new())));
        append(&log, log_id, 0..count);
        log
    }

    fn append(log: &HashChainLog, log_id: &str, range: std::ops::Range<u64>) {
        for n in range {
            log.append(log_id, &json!({ "n": n })).unwrap();
        }
    }

    /// Poll until `check` holds or two seconds pass.
    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check()
    }

    // ── Tree ──────────────────────────────────────────────────────────────────

    /// An empty tree has an empty root and no levels.
    #[test]
    fn test_empty_tree() {
        let tree = build_tree(&[]);
        assert_eq!(tree.root_hash, "");
        assert!(tree.levels.is_empty());
        assert!(tree.is_empty());
    }

    /// A single leaf is its own root with an empty proof.
    #[test]
    fn test_single_leaf_is_root() {
        let only = leaf(1);
        let tree = build_tree(&[only]);
        assert_eq!(tree.root_hash, only.to_hex());
        let proof = generate_proof(&only, &tree).unwrap();
        assert!(proof.is_empty());
        assert!(verify_proof(&only, &proof, &tree.root_hash));
    }

    /// An odd level pairs its last node with itself.
    #[test]
    fn test_odd_level_duplicates_last() {
        let [a, b, c] = [leaf(0), leaf(1), leaf(2)];
        let tree = build_tree(&[a, b, c]);
        let expected = pair(&pair(&a, &b), &pair(&c, &c));
        assert_eq!(tree.root_hash, expected.to_hex());
        assert_eq!(tree.levels.len(), 3);
    }

    /// Every leaf of trees of many sizes proves membership.
    #[test]
    fn test_every_leaf_proves_membership() {
        for count in 1..=17 {
            let all = leaves(count);
            let tree = build_tree(&all);
            for item in &all {
                let proof = tree.generate_proof(item).unwrap();
                assert!(
                    verify_proof(item, &proof, &tree.root_hash),
                    "leaf {item} of {count} must verify"
                );
            }
        }
    }

    /// Proof steps use Left for a left sibling and Right for a right one.
    #[test]
    fn test_proof_positions() {
        let all = leaves(4);
        let tree = build_tree(&all);
        let proof = tree.generate_proof(&all[1]).unwrap();
        assert_eq!(proof[0].sibling_hash, all[0]);
        assert_eq!(proof[0].position, Position::Left);
        assert_eq!(proof[1].position, Position::Right);
    }

    /// Absent leaves have no proof and borrowed proofs do not verify.
    #[test]
    fn test_non_membership() {
        let all = leaves(5);
        let tree = build_tree(&all);
        let outsider = leaf(99);
        assert!(matches!(
            tree.generate_proof(&outsider),
            Err(ProvenanceError::LeafNotFound { .. })
        ));

        let borrowed = tree.generate_proof(&all[2]).unwrap();
        assert!(!verify_proof(&outsider, &borrowed, &tree.root_hash));
    }

    /// A tampered proof or a malformed root never verifies.
    #[test]
    fn test_tampered_proof_fails() {
        let all = leaves(6);
        let tree = build_tree(&all);
        let mut proof = tree.generate_proof(&all[3]).unwrap();
        proof[1].sibling_hash = leaf(200);
        assert!(!verify_proof(&all[3], &proof, &tree.root_hash));
        assert!(!verify_proof(&all[3], &[], "not-a-hash"));
    }

    /// Nodes carry children above level 0 and record ids at level 0.
    #[test]
    fn test_nodes_structure() {
        let all = leaves(3);
        let tree = build_tree(&all);
        let ids: Vec<String> = (0..3).map(|i| format!("L1:{i}")).collect();
        let nodes = tree.nodes("L1:0-2", &ids);

        // 3 leaves + 2 interior + 1 root.
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[0].leaf_record_ids, vec!["L1:0".to_string()]);
        assert!(nodes[0].left_child_hash.is_none());
        let root = nodes.last().unwrap();
        assert_eq!(root.level, 2);
        assert_eq!(root.node_hash.to_hex(), tree.root_hash);
        assert!(root.leaf_record_ids.is_empty());
        assert!(nodes.iter().all(|n| n.batch_id == "L1:0-2"));
    }

    // ── Batches ───────────────────────────────────────────────────────────────

    /// A batch roots the entry hashes of its range under a fixed id.
    #[test]
    fn test_build_batch() {
        let log = log_with("L1", 5);
        let batches = BatchVerifier::new(log.clone());
        let batch = batches.build_batch("L1", 0, 4).unwrap();

        assert_eq!(batch.batch_id, "L1:0-4");
        let hashes: Vec<Hash256> = log
            .entries("L1", 0, 4)
            .unwrap()
            .iter()
            .map(|r| r.entry_hash())
            .collect();
        assert_eq!(batch.root_hash, build_tree(&hashes).root_hash);

        // Rebuilding the same range is a lookup.
        let again = batches.build_batch("L1", 0, 4).unwrap();
        assert!(Arc::ptr_eq(&batch, &again));
        assert!(batches.batch("L1:0-4").unwrap().is_some());
    }

    /// Records prove membership in the batch that covers them.
    #[test]
    fn test_prove_record() {
        let log = log_with("L1", 5);
        let batches = BatchVerifier::new(log.clone());
        let batch = batches.build_batch("L1", 0, 4).unwrap();

        for index in 0..5 {
            let proof = batches.prove_record("L1", index).unwrap();
            assert_eq!(proof.batch_id, batch.batch_id);
            assert!(proof.verify());
            let record = log.get("L1", index).unwrap().unwrap();
            assert!(batches.verify_record(&record).unwrap());
        }

        let mut record = log.get("L1", 3).unwrap().unwrap();
        record.content = json!({ "n": "forged" });
        assert!(!batches.verify_record(&record).unwrap());

        assert!(batches.annotate(&mut record).unwrap());
        assert_eq!(record.envelope.merkle_root.as_deref(), Some(batch.root_hash.as_str()));
    }

    /// Lookups for unknown batches and unbatched records fail cleanly.
    #[test]
    fn test_missing_batch_and_unbatched_record() {
        let log = log_with("L1", 3);
        let batches = BatchVerifier::new(log);
        assert!(matches!(
            batches.prove(&leaf(0), "L1:0-9"),
            Err(ProvenanceError::BatchNotFound { .. })
        ));
        assert!(matches!(
            batches.prove_record("L1", 1),
            Err(ProvenanceError::LeafNotFound { .. })
        ));
        assert!(matches!(
            batches.build_batch("L1", 0, 3),
            Err(ProvenanceError::InvalidRange { .. })
        ));
    }

    /// Pending batching covers each entry once, in order.
    #[test]
    fn test_batch_pending_advances() {
        let log = log_with("L1", 5);
        let batches = BatchVerifier::new(log.clone());

        assert_eq!(batches.batch_pending("L1").unwrap().unwrap().batch_id, "L1:0-4");
        assert!(batches.batch_pending("L1").unwrap().is_none());

        append(&log, "L1", 5..8);
        assert_eq!(batches.pending_count("L1").unwrap(), 3);
        assert_eq!(batches.batch_pending("L1").unwrap().unwrap().batch_id, "L1:5-7");
        assert_eq!(batches.batches().unwrap().len(), 2);
    }

    /// A batch away from the covered prefix does not skip entries.
    #[test]
    fn test_detached_batch_keeps_cursor() {
        let log = log_with("L1", 6);
        let batches = BatchVerifier::new(log);
        batches.build_batch("L1", 3, 4).unwrap();
        assert_eq!(batches.batch_pending("L1").unwrap().unwrap().batch_id, "L1:0-5");
    }

    // ── Scheduler ─────────────────────────────────────────────────────────────

    /// The count threshold cuts a batch; shutdown flushes the remainder.
    #[tokio::test]
    async fn test_scheduler_count_threshold_and_flush() {
        let log = log_with("L1", 7);
        let batches = Arc::new(BatchVerifier::new(log.clone()));
        let scheduler = BatchScheduler::spawn(
            batches.clone(),
            vec!["L1".to_string()],
            BatchConfig {
                count_threshold: 3,
                interval: Duration::from_secs(3600),
                poll_interval: Duration::from_millis(10),
            },
        );

        assert!(eventually(|| batches.batch("L1:0-6").unwrap().is_some()).await);

        append(&log, "L1", 7..9);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(batches.pending_count("L1").unwrap(), 2, "below threshold, not yet due");

        scheduler.shutdown().await;
        assert!(batches.batch("L1:7-8").unwrap().is_some());
        assert_eq!(batches.pending_count("L1").unwrap(), 0);
    }

    /// The time threshold cuts a batch even below the count threshold.
    #[tokio::test]
    async fn test_scheduler_interval_threshold() {
        let log = log_with("L1", 2);
        let batches = Arc::new(BatchVerifier::new(log));
        let scheduler = BatchScheduler::spawn(
            batches.clone(),
            vec!["L1".to_string()],
            BatchConfig {
                count_threshold: 1000,
                interval: Duration::from_millis(40),
                poll_interval: Duration::from_millis(10),
            },
        );

        assert!(eventually(|| batches.batch("L1:0-1").unwrap().is_some()).await);
        scheduler.shutdown().await;
    }
}
