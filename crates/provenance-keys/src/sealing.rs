//! Encryption of private key material at rest.
//!
//! Private keys are sealed as PKCS#8 DER under a 256-bit key-encryption key
//! (KEK) with ChaCha20-Poly1305. The key id is bound in as associated data,
//! so a sealed blob copied onto another key's record fails to open.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::PrivateKeyRef,
};

const NONCE_LEN: usize = 12;

/// Seals and opens private keys under one KEK.
pub struct KeySealer {
    cipher: ChaCha20Poly1305,
}

impl KeySealer {
    pub fn new(kek: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(kek)),
        }
    }

    /// Build from a 64-character hex KEK, as found in configuration.
    pub fn from_hex(kek_hex: &str) -> ProvenanceResult<Self> {
        let bytes = Zeroizing::new(hex::decode(kek_hex.trim()).map_err(|e| ProvenanceError::Config {
            reason: format!("sealing key is not valid hex: {e}"),
        })?);
        let kek: Zeroizing<[u8; 32]> =
            Zeroizing::new(bytes.as_slice().try_into().map_err(|_| ProvenanceError::Config {
                reason: format!("sealing key must be 32 bytes, got {}", bytes.len()),
            })?);
        Ok(Self::new(&kek))
    }

    /// A KEK that lives only as long as this process. Keys sealed under it
    /// cannot be opened after a restart.
    pub fn ephemeral() -> Self {
        let mut kek = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(kek.as_mut());
        Self::new(&kek)
    }

    pub(crate) fn seal(&self, key_id: &str, plaintext: &[u8]) -> ProvenanceResult<PrivateKeyRef> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: key_id.as_bytes(),
                },
            )
            .map_err(|_| ProvenanceError::Crypto {
                reason: format!("failed to seal private key {key_id}"),
            })?;
        Ok(PrivateKeyRef::Sealed {
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    pub(crate) fn unseal(
        &self,
        key_id: &str,
        nonce_hex: &str,
        ciphertext_hex: &str,
    ) -> ProvenanceResult<Zeroizing<Vec<u8>>> {
        let corrupt = |what: &str| ProvenanceError::Crypto {
            reason: format!("sealed key {key_id} has an invalid {what}"),
        };
        let nonce = hex::decode(nonce_hex).map_err(|_| corrupt("nonce"))?;
        if nonce.len() != NONCE_LEN {
            return Err(corrupt("nonce"));
        }
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| corrupt("ciphertext"))?;
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: key_id.as_bytes(),
                },
            )
            .map_err(|_| ProvenanceError::Crypto {
                reason: format!("failed to unseal private key {key_id}"),
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Debug for KeySealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeySealer(..)")
    }
}
