//! In-memory `LogStore`.
//!
//! Each log is a `Vec<Record>` indexed by position. There is no way to edit
//! or remove an entry through the public API; tests reach into `state`
//! directly to simulate tampering with the underlying storage.

use std::collections::HashMap;
use std::sync::RwLock;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    record::Record,
};
use provenance_core::traits::LogStore;

/// Append-only logs held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    pub(crate) state: RwLock<HashMap<String, Vec<Record>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for InMemoryLogStore {
    fn len(&self, log_id: &str) -> ProvenanceResult<u64> {
        let logs = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        Ok(logs.get(log_id).map_or(0, |entries| entries.len() as u64))
    }

    fn last(&self, log_id: &str) -> ProvenanceResult<Option<Record>> {
        let logs = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        Ok(logs.get(log_id).and_then(|entries| entries.last().cloned()))
    }

    fn push(&self, record: Record) -> ProvenanceResult<()> {
        let mut logs = self
            .state
            .write()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        let entries = logs.entry(record.log_id.clone()).or_default();
        let expected = entries.len() as u64;
        if record.index != expected {
            return Err(ProvenanceError::Storage {
                reason: format!(
                    "log '{}' expects index {expected}, refused entry at index {}",
                    record.log_id, record.index
                ),
            });
        }
        entries.push(record);
        Ok(())
    }

    fn get(&self, log_id: &str, index: u64) -> ProvenanceResult<Option<Record>> {
        let logs = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        Ok(logs
            .get(log_id)
            .and_then(|entries| usize::try_from(index).ok().and_then(|i| entries.get(i)))
            .cloned())
    }

    fn range(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<Vec<Record>> {
        let logs = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        let Some(entries) = logs.get(log_id) else {
            return Ok(Vec::new());
        };
        let len = entries.len();
        let start = (start as usize).min(len);
        let end = (end as usize).saturating_add(1).min(len);
        Ok(entries[start..end.max(start)].to_vec())
    }

    fn log_ids(&self) -> ProvenanceResult<Vec<String>> {
        let logs = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("log store"))?;
        let mut ids: Vec<String> = logs
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
