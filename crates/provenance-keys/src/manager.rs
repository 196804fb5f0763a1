//! Key lifecycle: generation, rotation, revocation, lookup.
//!
//! Lifecycle writes for one purpose are serialized by a per-purpose mutex
//! and land in the repository as a single `KeyCommit`. Readers therefore see
//! exactly one current key per purpose, never zero mid-rotation and never
//! two.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::{CryptoKey, KeyPurpose, KeySpec, KeyType, PrivateKeyRef},
};
use provenance_core::{
    canonical,
    traits::{KeyCommit, KeyRepository},
};

use crate::material::{self, KeyMaterial, CURVE_BITS, MAX_RSA_BITS};
use crate::sealing::KeySealer;

/// Length of a key id in hex characters.
pub const KEY_ID_LEN: usize = 32;

/// Strength floor, defaults, and lifetime applied to new keys.
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    pub min_rsa_bits: u32,
    pub min_ecdsa_bits: u32,
    /// Used by `rotate_key` when a purpose has no current key yet.
    pub default_spec: KeySpec,
    /// `None` means keys never expire.
    pub lifetime: Option<Duration>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            min_rsa_bits: 2048,
            min_ecdsa_bits: 256,
            default_spec: KeySpec {
                key_type: KeyType::Ed25519,
                key_size: CURVE_BITS,
            },
            lifetime: Some(Duration::days(365)),
        }
    }
}

/// `key_id` for a public key: the first 32 hex characters of its SHA3-256.
pub fn derive_key_id(public_key_pem: &str) -> String {
    let mut id = canonical::hash_bytes(public_key_pem.as_bytes()).to_hex();
    id.truncate(KEY_ID_LEN);
    id
}

/// Owns the key repository and the key-encryption key.
pub struct KeyManager {
    repo: Arc<dyn KeyRepository>,
    sealer: KeySealer,
    policy: KeyPolicy,
    signing_writer: Mutex<()>,
    timestamping_writer: Mutex<()>,
}

impl KeyManager {
    pub fn new(repo: Arc<dyn KeyRepository>, sealer: KeySealer, policy: KeyPolicy) -> Self {
        Self {
            repo,
            sealer,
            policy,
            signing_writer: Mutex::new(()),
            timestamping_writer: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn lock_writer(&self, purpose: KeyPurpose) -> ProvenanceResult<MutexGuard<'_, ()>> {
        let writer = match purpose {
            KeyPurpose::Signing => &self.signing_writer,
            KeyPurpose::Timestamping => &self.timestamping_writer,
        };
        writer
            .lock()
            .map_err(|_| ProvenanceError::poisoned("key lifecycle lock"))
    }

    /// Reject unsupported or too-weak key specs.
    pub fn validate_spec(&self, key_type: KeyType, key_size: u32) -> ProvenanceResult<()> {
        let weak = |minimum: u32| ProvenanceError::WeakKey {
            key_type: key_type.to_string(),
            key_size,
            minimum,
        };
        match key_type {
            KeyType::Rsa if key_size < self.policy.min_rsa_bits => Err(weak(self.policy.min_rsa_bits)),
            // Larger moduli could sign but never be read back to verify.
            KeyType::Rsa if key_size > MAX_RSA_BITS => Err(ProvenanceError::UnsupportedKeyType {
                key_type: format!("{key_type}-{key_size}"),
            }),
            KeyType::Rsa => Ok(()),
            KeyType::Ecdsa if key_size < self.policy.min_ecdsa_bits => {
                Err(weak(self.policy.min_ecdsa_bits))
            }
            // Only P-256 is implemented.
            KeyType::Ecdsa | KeyType::Ed25519 if key_size != CURVE_BITS => {
                Err(ProvenanceError::UnsupportedKeyType {
                    key_type: format!("{key_type}-{key_size}"),
                })
            }
            KeyType::Ecdsa | KeyType::Ed25519 => Ok(()),
        }
    }

    /// Build a sealed `CryptoKey` from fresh material. Not yet persisted.
    fn seal_new(
        &self,
        material: &KeyMaterial,
        key_size: u32,
        purpose: KeyPurpose,
    ) -> ProvenanceResult<CryptoKey> {
        let public_key = material.public_key_pem()?;
        let key_id = derive_key_id(&public_key);
        let der = material.to_pkcs8_der()?;
        let private_key_ref = self.sealer.seal(&key_id, &der)?;
        let created_at = Utc::now();
        Ok(CryptoKey {
            key_id,
            key_type: material.key_type(),
            key_size,
            public_key,
            private_key_ref,
            purpose,
            is_active: true,
            created_at,
            expires_at: self.policy.lifetime.map(|life| created_at + life),
            revoked_at: None,
            revocation_reason: None,
            parent_key_id: None,
            rotation_reason: None,
        })
    }

    /// Persist `key` as the new current key for its purpose, deactivating
    /// whichever key held that role. Caller holds the purpose's writer lock.
    fn install(&self, key: CryptoKey) -> ProvenanceResult<CryptoKey> {
        let mut commit = KeyCommit::default();
        if let Some(mut previous) = self.repo.current(key.purpose)? {
            previous.is_active = false;
            commit.upserts.push(previous);
        }
        commit.current.push((key.purpose, Some(key.key_id.clone())));
        commit.upserts.push(key.clone());
        self.repo.commit(commit)?;
        Ok(key)
    }

    /// Generate a new key pair and make it the current key for `purpose`.
    pub fn generate_key(
        &self,
        key_type: KeyType,
        key_size: u32,
        purpose: KeyPurpose,
    ) -> ProvenanceResult<CryptoKey> {
        self.validate_spec(key_type, key_size)?;
        let material = KeyMaterial::generate(key_type, key_size)?;
        let key = self.seal_new(&material, key_size, purpose)?;

        let _writer = self.lock_writer(purpose)?;
        let key = self.install(key)?;
        info!(key_id = %key.key_id, %key_type, key_size, %purpose, "generated key");
        Ok(key)
    }

    /// Replace the current key for `purpose` with a fresh key of the same
    /// type and size, linking the two through `parent_key_id`.
    ///
    /// With no current key this generates one from the policy's default
    /// spec and records no parent.
    pub fn rotate_key(&self, purpose: KeyPurpose, reason: &str) -> ProvenanceResult<CryptoKey> {
        let _writer = self.lock_writer(purpose)?;
        let previous = self.repo.current(purpose)?;
        let spec = previous
            .as_ref()
            .map(CryptoKey::spec)
            .unwrap_or(self.policy.default_spec);
        self.validate_spec(spec.key_type, spec.key_size)?;

        let material = KeyMaterial::generate(spec.key_type, spec.key_size)?;
        let mut key = self.seal_new(&material, spec.key_size, purpose)?;
        key.parent_key_id = previous.as_ref().map(|p| p.key_id.clone());
        key.rotation_reason = Some(reason.to_string());

        let key = self.install(key)?;
        info!(
            key_id = %key.key_id,
            parent = key.parent_key_id.as_deref().unwrap_or("-"),
            %purpose,
            reason,
            "rotated key"
        );
        Ok(key)
    }

    /// Revoke a key. Revoking twice keeps the first `revoked_at` and reason.
    ///
    /// If the key was current for its purpose, that purpose is left with no
    /// current key until the next generate or rotate.
    pub fn revoke_key(&self, key_id: &str, reason: &str) -> ProvenanceResult<CryptoKey> {
        let purpose = self.get_key(key_id)?.purpose;
        let _writer = self.lock_writer(purpose)?;

        // Re-read under the lock; a concurrent revoke may have won.
        let mut key = self.get_key(key_id)?;
        if key.is_revoked() {
            debug!(key_id, "key already revoked");
            return Ok(key);
        }
        key.revoked_at = Some(Utc::now());
        key.revocation_reason = Some(reason.to_string());
        key.is_active = false;

        let mut commit = KeyCommit::default();
        let was_current = self
            .repo
            .current(purpose)?
            .is_some_and(|current| current.key_id == key_id);
        if was_current {
            commit.current.push((purpose, None));
        }
        commit.upserts.push(key.clone());
        self.repo.commit(commit)?;

        warn!(key_id, %purpose, reason, was_current, "revoked key");
        Ok(key)
    }

    /// Any key ever stored, including rotated and revoked ones.
    pub fn get_key(&self, key_id: &str) -> ProvenanceResult<CryptoKey> {
        self.repo
            .get(key_id)?
            .ok_or_else(|| ProvenanceError::KeyNotFound {
                key_id: key_id.to_string(),
            })
    }

    /// The key new signatures for `purpose` should use.
    pub fn current_key(&self, purpose: KeyPurpose) -> ProvenanceResult<CryptoKey> {
        let no_active = || ProvenanceError::NoActiveKey {
            purpose: purpose.to_string(),
        };
        let key = self.repo.current(purpose)?.ok_or_else(no_active)?;
        if key.is_revoked() || key.is_expired_at(Utc::now()) {
            return Err(no_active());
        }
        Ok(key)
    }

    /// All keys, optionally filtered by purpose, in creation order.
    pub fn list_keys(&self, purpose: Option<KeyPurpose>) -> ProvenanceResult<Vec<CryptoKey>> {
        let keys = self.repo.list()?;
        Ok(match purpose {
            Some(p) => keys.into_iter().filter(|k| k.purpose == p).collect(),
            None => keys,
        })
    }

    /// `key_id` followed by each ancestor reached through `parent_key_id`.
    pub fn rotation_chain(&self, key_id: &str) -> ProvenanceResult<Vec<CryptoKey>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(key_id.to_string());
        while let Some(id) = next {
            if !seen.insert(id.clone()) {
                return Err(ProvenanceError::Storage {
                    reason: format!("rotation chain of {key_id} loops at {id}"),
                });
            }
            let key = self.get_key(&id)?;
            next = key.parent_key_id.clone();
            chain.push(key);
        }
        Ok(chain)
    }

    /// Register a key whose private half lives in a hardware module and make
    /// it current for `purpose`.
    pub fn register_hardware_key(
        &self,
        spec: KeySpec,
        public_key_pem: &str,
        purpose: KeyPurpose,
        provider: &str,
        handle: &str,
    ) -> ProvenanceResult<CryptoKey> {
        self.validate_spec(spec.key_type, spec.key_size)?;
        material::validate_public_key(spec.key_type, public_key_pem)?;
        let key_id = derive_key_id(public_key_pem);
        if self.repo.get(&key_id)?.is_some() {
            return Err(ProvenanceError::MalformedInput {
                reason: format!("key {key_id} is already registered"),
            });
        }

        let created_at = Utc::now();
        let key = CryptoKey {
            key_id,
            key_type: spec.key_type,
            key_size: spec.key_size,
            public_key: public_key_pem.to_string(),
            private_key_ref: PrivateKeyRef::Hardware {
                provider: provider.to_string(),
                handle: handle.to_string(),
            },
            purpose,
            is_active: true,
            created_at,
            expires_at: self.policy.lifetime.map(|life| created_at + life),
            revoked_at: None,
            revocation_reason: None,
            parent_key_id: None,
            rotation_reason: None,
        };

        let _writer = self.lock_writer(purpose)?;
        let key = self.install(key)?;
        info!(key_id = %key.key_id, provider, %purpose, "registered hardware key");
        Ok(key)
    }

    /// Open the sealed private key of `key`. `Ok(None)` for hardware keys.
    pub(crate) fn unseal(&self, key: &CryptoKey) -> ProvenanceResult<Option<KeyMaterial>> {
        match &key.private_key_ref {
            PrivateKeyRef::Sealed { nonce, ciphertext } => {
                let der = self.sealer.unseal(&key.key_id, nonce, ciphertext)?;
                KeyMaterial::from_pkcs8_der(key.key_type, &der).map(Some)
            }
            PrivateKeyRef::Hardware { .. } => Ok(None),
        }
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
