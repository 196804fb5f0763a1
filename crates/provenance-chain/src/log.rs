//! The hash-chain log: serialized appends and range verification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use provenance_contracts::{
    chain::ChainVerificationResult,
    error::{ProvenanceError, ProvenanceResult},
    record::{IntegrityEnvelope, Record},
};
use provenance_core::{canonical, traits::LogStore};

use crate::verify::verify_entries;

/// Append-only, hash-linked logs over a pluggable `LogStore`.
///
/// Appends to the same log are serialized by a per-log sequencer so that
/// two concurrent appends can never both link to the same predecessor.
/// Different logs append independently.
pub struct HashChainLog {
    store: Arc<dyn LogStore>,
    sequencers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HashChainLog {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            sequencers: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    fn sequencer(&self, log_id: &str) -> ProvenanceResult<Arc<Mutex<()>>> {
        let mut sequencers = self
            .sequencers
            .lock()
            .map_err(|_| ProvenanceError::poisoned("log sequencer table"))?;
        Ok(sequencers.entry(log_id.to_string()).or_default().clone())
    }

    /// Append `content` to `log_id`, creating the log on first use.
    ///
    /// The content is canonicalized before it is stored, so the stored
    /// value rehashes to `entry_hash` no matter how the caller's type
    /// orders its fields.
    pub fn append<T: Serialize + ?Sized>(&self, log_id: &str, content: &T) -> ProvenanceResult<Record> {
        if log_id.is_empty() {
            return Err(ProvenanceError::MalformedInput {
                reason: "log id must not be empty".to_string(),
            });
        }
        let content = canonical::canonicalize(content)?;
        let entry_hash = canonical::hash(&content)?;

        let sequencer = self.sequencer(log_id)?;
        let _turn = sequencer
            .lock()
            .map_err(|_| ProvenanceError::poisoned("log sequencer"))?;

        let index = self.store.len(log_id)?;
        let previous_hash = match index {
            0 => None,
            _ => Some(
                self.store
                    .last(log_id)?
                    .ok_or_else(|| ProvenanceError::Storage {
                        reason: format!("log '{log_id}' reports {index} entries but has no last entry"),
                    })?
                    .entry_hash(),
            ),
        };

        let record = Record {
            log_id: log_id.to_string(),
            index,
            content,
            envelope: IntegrityEnvelope::new(entry_hash, previous_hash),
        };
        self.store.push(record.clone())?;

        info!(log_id, index, entry_hash = %entry_hash, "appended entry");
        Ok(record)
    }

    /// Number of entries in `log_id`.
    pub fn len(&self, log_id: &str) -> ProvenanceResult<u64> {
        self.store.len(log_id)
    }

    pub fn is_empty(&self, log_id: &str) -> ProvenanceResult<bool> {
        Ok(self.len(log_id)? == 0)
    }

    pub fn get(&self, log_id: &str, index: u64) -> ProvenanceResult<Option<Record>> {
        self.store.get(log_id, index)
    }

    /// Entries `start..=end`, with the same range rules as `verify_chain`.
    pub fn entries(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<Vec<Record>> {
        let len = self.store.len(log_id)?;
        check_range(log_id, start, end, len)?;
        self.store.range(log_id, start, end)
    }

    /// Verify entries `start..=end` of `log_id`.
    ///
    /// The log length is read once up front; entries appended while the
    /// check runs are outside its scope. A range that reaches past that
    /// length, or has `start > end`, is `InvalidRange`.
    pub fn verify_chain(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<ChainVerificationResult> {
        let len = self.store.len(log_id)?;
        check_range(log_id, start, end, len)?;

        let entries = self.store.range(log_id, start, end)?;
        if entries.len() as u64 != end - start + 1 {
            return Err(ProvenanceError::Storage {
                reason: format!(
                    "log '{log_id}' returned {} entries for range {start}..={end}",
                    entries.len()
                ),
            });
        }

        let result = verify_entries(log_id, start, end, &entries);
        if result.valid {
            debug!(log_id, start, end, "chain verified");
        } else {
            warn!(
                log_id,
                start,
                end,
                breaks = result.broken_links.len(),
                first = result.broken_links[0].index,
                "chain verification found breaks"
            );
        }
        Ok(result)
    }

    /// Verify the whole of `log_id` as it stands now.
    pub fn verify_log(&self, log_id: &str) -> ProvenanceResult<ChainVerificationResult> {
        match self.store.len(log_id)? {
            0 => Ok(ChainVerificationResult::from_findings(log_id, 0, 0, Vec::new())),
            len => self.verify_chain(log_id, 0, len - 1),
        }
    }
}

fn check_range(log_id: &str, start: u64, end: u64, len: u64) -> ProvenanceResult<()> {
    if start > end || end >= len {
        return Err(ProvenanceError::InvalidRange {
            log_id: log_id.to_string(),
            start,
            end,
            len,
        });
    }
    Ok(())
}

impl std::fmt::Debug for HashChainLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChainLog").finish_non_exhaustive()
    }
}
