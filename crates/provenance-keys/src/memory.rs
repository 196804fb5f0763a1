//! In-memory `KeyRepository`.

use std::collections::HashMap;
use std::sync::RwLock;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::{CryptoKey, KeyPurpose},
};
use provenance_core::traits::{KeyCommit, KeyRepository};

#[derive(Debug, Default)]
pub(crate) struct KeyState {
    /// Creation order.
    pub(crate) keys: Vec<CryptoKey>,
    pub(crate) by_id: HashMap<String, usize>,
    pub(crate) current: HashMap<KeyPurpose, String>,
}

/// A `KeyRepository` backed by a `RwLock`.
///
/// Suitable for tests and single-process hosts. Everything is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    pub(crate) state: RwLock<KeyState>,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyRepository for InMemoryKeyRepository {
    fn get(&self, key_id: &str) -> ProvenanceResult<Option<CryptoKey>> {
        let state = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("key repository"))?;
        Ok(state.by_id.get(key_id).map(|&i| state.keys[i].clone()))
    }

    fn list(&self) -> ProvenanceResult<Vec<CryptoKey>> {
        let state = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("key repository"))?;
        Ok(state.keys.clone())
    }

    fn current(&self, purpose: KeyPurpose) -> ProvenanceResult<Option<CryptoKey>> {
        let state = self
            .state
            .read()
            .map_err(|_| ProvenanceError::poisoned("key repository"))?;
        Ok(state
            .current
            .get(&purpose)
            .and_then(|id| state.by_id.get(id))
            .map(|&i| state.keys[i].clone()))
    }

    fn commit(&self, commit: KeyCommit) -> ProvenanceResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ProvenanceError::poisoned("key repository"))?;

        // Reject a pointer to an unknown key before touching anything.
        for (purpose, target) in &commit.current {
            if let Some(id) = target {
                let known = state.by_id.contains_key(id)
                    || commit.upserts.iter().any(|k| &k.key_id == id);
                if !known {
                    return Err(ProvenanceError::Storage {
                        reason: format!("current {purpose} key points at unknown key {id}"),
                    });
                }
            }
        }

        for key in commit.upserts {
            match state.by_id.get(&key.key_id).copied() {
                Some(i) => state.keys[i] = key,
                None => {
                    let i = state.keys.len();
                    state.by_id.insert(key.key_id.clone(), i);
                    state.keys.push(key);
                }
            }
        }
        for (purpose, target) in commit.current {
            match target {
                Some(id) => {
                    state.current.insert(purpose, id);
                }
                None => {
                    state.current.remove(&purpose);
                }
            }
        }
        Ok(())
    }
}
