//! Signing and verification on top of the key manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::{CryptoKey, KeyPurpose, PrivateKeyRef, Signature},
    record::Record,
};
use provenance_core::{canonical, traits::HardwareSigner};

use crate::manager::KeyManager;
use crate::material;

/// Produces and checks signatures with keys held by a `KeyManager`.
///
/// Cheap to clone; clones share the manager and hardware driver.
#[derive(Clone)]
pub struct SignatureService {
    keys: Arc<KeyManager>,
    hardware: Option<Arc<dyn HardwareSigner>>,
}

impl SignatureService {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys, hardware: None }
    }

    /// Route keys with a `PrivateKeyRef::Hardware` reference to `driver`.
    pub fn with_hardware(mut self, driver: Arc<dyn HardwareSigner>) -> Self {
        self.hardware = Some(driver);
        self
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Sign `data` with `key_id`.
    ///
    /// Revoked and expired keys refuse to sign; they still verify.
    pub fn sign(&self, data: &[u8], key_id: &str) -> ProvenanceResult<Signature> {
        let key = self.keys.get_key(key_id)?;
        self.sign_with_key(data, &key)
    }

    /// Sign `data` with the current key for `purpose`.
    pub fn sign_current(&self, data: &[u8], purpose: KeyPurpose) -> ProvenanceResult<Signature> {
        let key = self.keys.current_key(purpose)?;
        self.sign_with_key(data, &key)
    }

    fn sign_with_key(&self, data: &[u8], key: &CryptoKey) -> ProvenanceResult<Signature> {
        if key.is_revoked() {
            return Err(ProvenanceError::KeyRevoked {
                key_id: key.key_id.clone(),
            });
        }
        let now = Utc::now();
        if key.is_expired_at(now) {
            return Err(ProvenanceError::KeyExpired {
                key_id: key.key_id.clone(),
            });
        }

        let algorithm = key.signature_algorithm();
        let bytes = match self.keys.unseal(key)? {
            Some(material) => material.sign(data),
            None => {
                let PrivateKeyRef::Hardware { provider, handle } = &key.private_key_ref else {
                    return Err(ProvenanceError::Crypto {
                        reason: format!("key {} has no usable private key", key.key_id),
                    });
                };
                let driver = self.hardware.as_ref().ok_or_else(|| ProvenanceError::Crypto {
                    reason: format!("key {} lives in {provider} but no hardware signer is configured", key.key_id),
                })?;
                driver.sign(provider, handle, algorithm, data)?
            }
        };

        debug!(key_id = %key.key_id, %algorithm, len = data.len(), "signed");
        Ok(Signature {
            algorithm,
            key_id: key.key_id.clone(),
            bytes,
            signed_at: now,
        })
    }

    /// `sign` on the blocking pool, so RSA keys and hardware drivers never
    /// stall a runtime worker.
    pub async fn sign_blocking(&self, data: Vec<u8>, key_id: &str) -> ProvenanceResult<Signature> {
        let service = self.clone();
        let id = key_id.to_string();
        tokio::task::spawn_blocking(move || service.sign(&data, &id))
            .await
            .map_err(|join| ProvenanceError::Crypto {
                reason: format!("signing task failed: {join}"),
            })?
    }

    /// `sign_blocking`, abandoned after `timeout`.
    ///
    /// Signing has no side effects, so an abandoned attempt leaves nothing
    /// behind; the late result is simply dropped.
    pub async fn sign_with_timeout(
        &self,
        data: Vec<u8>,
        key_id: &str,
        timeout: Duration,
    ) -> ProvenanceResult<Signature> {
        match tokio::time::timeout(timeout, self.sign_blocking(data, key_id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key_id, timeout_ms = timeout.as_millis() as u64, "signing timed out");
                Err(ProvenanceError::Timeout {
                    operation: format!("sign with {key_id}"),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Check `signature` over `data` against `key_id`.
    ///
    /// Works for every stored key, revoked or rotated ones included. An
    /// algorithm that does not match the key's type is malformed input;
    /// signature bytes that fail to parse are simply invalid.
    pub fn verify(&self, data: &[u8], signature: &Signature, key_id: &str) -> ProvenanceResult<bool> {
        let key = self.keys.get_key(key_id)?;
        let expected = key.signature_algorithm();
        if signature.algorithm != expected {
            return Err(ProvenanceError::MalformedInput {
                reason: format!(
                    "signature algorithm {} does not match {} key {key_id} ({expected})",
                    signature.algorithm, key.key_type
                ),
            });
        }
        material::verify_with_public_key(key.key_type, &key.public_key, data, &signature.bytes)
    }

    /// Sign `record.envelope.entry_hash` and write every signature field of
    /// the envelope in one step.
    pub fn seal_record(&self, record: &mut Record, key_id: &str) -> ProvenanceResult<()> {
        let signature = self.sign(record.entry_hash().as_bytes(), key_id)?;
        record.envelope.apply_signature(signature);
        Ok(())
    }

    /// Recheck a sealed record and store the outcome in
    /// `signature_verified`.
    ///
    /// The content is rehashed first, so a record whose content changed
    /// after signing fails even though the signature over the stale hash is
    /// intact. Unsigned records return `false` and keep `None`.
    pub fn verify_record(&self, record: &mut Record) -> ProvenanceResult<bool> {
        let Some(signature) = record.envelope.signature() else {
            record.envelope.signature_verified = None;
            return Ok(false);
        };
        let valid = canonical::hash(&record.content)? == record.entry_hash()
            && self.verify(record.entry_hash().as_bytes(), &signature, &signature.key_id)?;
        record.envelope.signature_verified = Some(valid);
        Ok(valid)
    }
}

impl std::fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureService")
            .field("keys", &self.keys)
            .field("hardware", &self.hardware.is_some())
            .finish()
    }
}
