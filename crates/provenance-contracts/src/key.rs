//! Signing key metadata.
//!
//! A `CryptoKey` is the persisted description of one asymmetric key pair.
//! Only the public half is ever stored in the clear; the private half is
//! referenced through `PrivateKeyRef`, which is either a sealed blob that
//! only the key manager can open or a handle into a hardware module.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;

/// Supported asymmetric key families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "ECDSA")]
    Ecdsa,
    #[serde(rename = "Ed25519")]
    Ed25519,
}

impl KeyType {
    /// The signature scheme a key of this type produces.
    pub fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            KeyType::Rsa => SignatureAlgorithm::RsaPssSha256,
            KeyType::Ecdsa => SignatureAlgorithm::EcdsaP256Sha256,
            KeyType::Ed25519 => SignatureAlgorithm::Ed25519,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::Rsa => "RSA",
            KeyType::Ecdsa => "ECDSA",
            KeyType::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyType {
    type Err = ProvenanceError;

    /// Case-insensitive. Anything else is `UnsupportedKeyType`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(KeyType::Rsa),
            "ecdsa" | "ec" | "p256" | "p-256" => Ok(KeyType::Ecdsa),
            "ed25519" => Ok(KeyType::Ed25519),
            _ => Err(ProvenanceError::UnsupportedKeyType {
                key_type: s.to_string(),
            }),
        }
    }
}

/// What a key is allowed to be the "current" key for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPurpose {
    Signing,
    Timestamping,
}

impl KeyPurpose {
    pub const ALL: [KeyPurpose; 2] = [KeyPurpose::Signing, KeyPurpose::Timestamping];
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPurpose::Signing => f.write_str("signing"),
            KeyPurpose::Timestamping => f.write_str("timestamping"),
        }
    }
}

impl FromStr for KeyPurpose {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "signing" => Ok(KeyPurpose::Signing),
            "timestamping" => Ok(KeyPurpose::Timestamping),
            other => Err(ProvenanceError::MalformedInput {
                reason: format!("unknown key purpose '{other}'"),
            }),
        }
    }
}

/// Signature schemes, one per `KeyType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "RSA-PSS-SHA256")]
    RsaPssSha256,
    #[serde(rename = "ECDSA-P256-SHA256")]
    EcdsaP256Sha256,
    #[serde(rename = "Ed25519")]
    Ed25519,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureAlgorithm::RsaPssSha256 => "RSA-PSS-SHA256",
            SignatureAlgorithm::EcdsaP256Sha256 => "ECDSA-P256-SHA256",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

/// A key type plus size, as requested by callers and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub key_type: KeyType,
    pub key_size: u32,
}

/// Where the private half of a key lives.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrivateKeyRef {
    /// PKCS#8 DER encrypted with the key manager's key-encryption key.
    /// Both fields are lowercase hex.
    Sealed { nonce: String, ciphertext: String },

    /// A key held by a hardware security module, addressed by handle.
    Hardware { provider: String, handle: String },
}

impl fmt::Debug for PrivateKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKeyRef::Sealed { ciphertext, .. } => f
                .debug_struct("Sealed")
                .field("ciphertext_len", &(ciphertext.len() / 2))
                .finish_non_exhaustive(),
            PrivateKeyRef::Hardware { provider, handle } => f
                .debug_struct("Hardware")
                .field("provider", provider)
                .field("handle", handle)
                .finish(),
        }
    }
}

/// Persisted metadata for one key pair.
///
/// Keys are never deleted. A rotated key stays retrievable through
/// `parent_key_id` links and `get_key` so that signatures it produced can
/// still be verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoKey {
    /// First 32 hex characters of SHA3-256 over `public_key`.
    pub key_id: String,
    pub key_type: KeyType,
    /// Modulus bits for RSA, curve bits for ECDSA / Ed25519.
    pub key_size: u32,
    /// SubjectPublicKeyInfo, PEM encoded.
    pub public_key: String,
    pub private_key_ref: PrivateKeyRef,
    pub purpose: KeyPurpose,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    /// The key this one replaced in a rotation, if any.
    pub parent_key_id: Option<String>,
    pub rotation_reason: Option<String>,
}

impl CryptoKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.key_type.signature_algorithm()
    }

    pub fn spec(&self) -> KeySpec {
        KeySpec {
            key_type: self.key_type,
            key_size: self.key_size,
        }
    }
}

/// A detached signature together with what is needed to check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm: SignatureAlgorithm,
    pub key_id: String,
    /// Raw signature bytes, hex encoded on the wire.
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    pub signed_at: DateTime<Utc>,
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
