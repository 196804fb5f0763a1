//! Merkle batches over ranges of a hash-chain log.
//!
//! A batch roots the `entry_hash` values of one contiguous log range. Its
//! id is derived from the range (`"{log_id}:{start}-{end}"`), so rebuilding
//! the same range is idempotent and never depends on a shared counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use provenance_chain::HashChainLog;
use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
    merkle::{MerkleNode, ProofStep},
    record::{record_id, Record},
};
use provenance_core::canonical;

use crate::tree::{build_tree, verify_proof, MerkleTree};

/// The deterministic id of the batch covering `start..=end` of `log_id`.
pub fn batch_id(log_id: &str, start: u64, end: u64) -> String {
    format!("{log_id}:{start}-{end}")
}

/// One rooted range of a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleBatch {
    pub batch_id: String,
    pub log_id: String,
    pub start: u64,
    pub end: u64,
    pub root_hash: String,
    /// `"{log_id}:{index}"` for each leaf, in leaf order.
    pub leaf_record_ids: Vec<String>,
    pub tree: MerkleTree,
    pub created_at: DateTime<Utc>,
}

impl MerkleBatch {
    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    /// All tree nodes, ready for persistence.
    pub fn nodes(&self) -> Vec<MerkleNode> {
        self.tree.nodes(&self.batch_id, &self.leaf_record_ids)
    }
}

/// Everything needed to check one record's membership offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProof {
    pub record_id: String,
    pub batch_id: String,
    /// The leaf as it was when the batch was built.
    pub leaf_hash: Hash256,
    pub root_hash: String,
    pub proof: Vec<ProofStep>,
}

impl RecordProof {
    pub fn verify(&self) -> bool {
        verify_proof(&self.leaf_hash, &self.proof, &self.root_hash)
    }
}

#[derive(Debug, Default)]
struct Registry {
    batches: HashMap<String, Arc<MerkleBatch>>,
    /// record id → the first batch that rooted it.
    by_record: HashMap<String, String>,
    /// log id → first index not yet covered by a pending-batch run.
    cursors: HashMap<String, u64>,
}

/// Builds batches from a `HashChainLog` and answers proof queries.
pub struct BatchVerifier {
    log: Arc<HashChainLog>,
    registry: RwLock<Registry>,
    pending: Mutex<()>,
}

impl BatchVerifier {
    pub fn new(log: Arc<HashChainLog>) -> Self {
        Self {
            log,
            registry: RwLock::new(Registry::default()),
            pending: Mutex::new(()),
        }
    }

    pub fn log(&self) -> &Arc<HashChainLog> {
        &self.log
    }

    /// Root entries `start..=end` of `log_id`.
    ///
    /// Rebuilding a range that is already registered returns the existing
    /// batch unchanged.
    pub fn build_batch(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<Arc<MerkleBatch>> {
        let id = batch_id(log_id, start, end);
        if let Some(existing) = self.batch(&id)? {
            debug!(batch_id = %id, "batch already built");
            return Ok(existing);
        }

        let entries = self.log.entries(log_id, start, end)?;
        let leaves: Vec<Hash256> = entries.iter().map(Record::entry_hash).collect();
        let leaf_record_ids: Vec<String> = entries.iter().map(Record::record_id).collect();
        let tree = build_tree(&leaves);

        let batch = Arc::new(MerkleBatch {
            batch_id: id.clone(),
            log_id: log_id.to_string(),
            start,
            end,
            root_hash: tree.root_hash.clone(),
            leaf_record_ids,
            tree,
            created_at: Utc::now(),
        });

        let mut registry = self
            .registry
            .write()
            .map_err(|_| ProvenanceError::poisoned("batch registry"))?;
        // Lost a race with an identical build; keep the first.
        if let Some(existing) = registry.batches.get(&id) {
            return Ok(existing.clone());
        }
        for record in &batch.leaf_record_ids {
            registry
                .by_record
                .entry(record.clone())
                .or_insert_with(|| id.clone());
        }
        // Only a batch that touches the covered prefix extends it.
        let cursor = registry.cursors.entry(log_id.to_string()).or_insert(0);
        if start <= *cursor {
            *cursor = (*cursor).max(end + 1);
        }
        registry.batches.insert(id.clone(), batch.clone());

        info!(batch_id = %id, leaves = batch.leaf_count(), root = %batch.root_hash, "built merkle batch");
        Ok(batch)
    }

    /// Root every entry of `log_id` not yet covered by an earlier batch.
    ///
    /// `Ok(None)` when there is nothing new. Runs for the same verifier are
    /// serialized so that two callers never produce overlapping ranges.
    pub fn batch_pending(&self, log_id: &str) -> ProvenanceResult<Option<Arc<MerkleBatch>>> {
        let _run = self
            .pending
            .lock()
            .map_err(|_| ProvenanceError::poisoned("pending batch lock"))?;
        let len = self.log.len(log_id)?;
        let start = self.cursor(log_id)?;
        if start >= len {
            return Ok(None);
        }
        self.build_batch(log_id, start, len - 1).map(Some)
    }

    /// Entries of `log_id` not yet covered by a batch.
    pub fn pending_count(&self, log_id: &str) -> ProvenanceResult<u64> {
        let len = self.log.len(log_id)?;
        Ok(len.saturating_sub(self.cursor(log_id)?))
    }

    fn cursor(&self, log_id: &str) -> ProvenanceResult<u64> {
        let registry = self
            .registry
            .read()
            .map_err(|_| ProvenanceError::poisoned("batch registry"))?;
        Ok(registry.cursors.get(log_id).copied().unwrap_or(0))
    }

    pub fn batch(&self, batch_id: &str) -> ProvenanceResult<Option<Arc<MerkleBatch>>> {
        let registry = self
            .registry
            .read()
            .map_err(|_| ProvenanceError::poisoned("batch registry"))?;
        Ok(registry.batches.get(batch_id).cloned())
    }

    fn require_batch(&self, batch_id: &str) -> ProvenanceResult<Arc<MerkleBatch>> {
        self.batch(batch_id)?
            .ok_or_else(|| ProvenanceError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })
    }

    /// Every registered batch, ordered by log then start index.
    pub fn batches(&self) -> ProvenanceResult<Vec<Arc<MerkleBatch>>> {
        let registry = self
            .registry
            .read()
            .map_err(|_| ProvenanceError::poisoned("batch registry"))?;
        let mut all: Vec<_> = registry.batches.values().cloned().collect();
        all.sort_by(|a, b| (&a.log_id, a.start).cmp(&(&b.log_id, b.start)));
        Ok(all)
    }

    /// Membership proof for `leaf` in `batch_id`.
    pub fn prove(&self, leaf: &Hash256, batch_id: &str) -> ProvenanceResult<Vec<ProofStep>> {
        self.require_batch(batch_id)?.tree.generate_proof(leaf)
    }

    /// Membership proof for the entry at `index` of `log_id`.
    ///
    /// `LeafNotFound` when no batch covers the entry yet.
    pub fn prove_record(&self, log_id: &str, index: u64) -> ProvenanceResult<RecordProof> {
        let rid = record_id(log_id, index);
        let id = {
            let registry = self
                .registry
                .read()
                .map_err(|_| ProvenanceError::poisoned("batch registry"))?;
            registry
                .by_record
                .get(&rid)
                .cloned()
                .ok_or_else(|| ProvenanceError::LeafNotFound { leaf: rid.clone() })?
        };
        let batch = self.require_batch(&id)?;
        let position = (index - batch.start) as usize;
        let proof = batch.tree.proof_at(position)?;
        Ok(RecordProof {
            record_id: rid,
            batch_id: batch.batch_id.clone(),
            leaf_hash: batch.tree.leaves()[position],
            root_hash: batch.root_hash.clone(),
            proof,
        })
    }

    /// Check that `record`'s current content is what its batch rooted.
    pub fn verify_record(&self, record: &Record) -> ProvenanceResult<bool> {
        let proof = self.prove_record(&record.log_id, record.index)?;
        let current = canonical::hash(&record.content)?;
        let valid = verify_proof(&current, &proof.proof, &proof.root_hash);
        if !valid {
            warn!(record_id = %proof.record_id, batch_id = %proof.batch_id, "record no longer matches its batch root");
        }
        Ok(valid)
    }

    /// Fill `record.envelope.merkle_root` from the batch covering it.
    /// Returns `false` when the record is not batched yet.
    pub fn annotate(&self, record: &mut Record) -> ProvenanceResult<bool> {
        match self.prove_record(&record.log_id, record.index) {
            Ok(proof) => {
                record.envelope.merkle_root = Some(proof.root_hash);
                Ok(true)
            }
            Err(ProvenanceError::LeafNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for BatchVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchVerifier").finish_non_exhaustive()
    }
}
