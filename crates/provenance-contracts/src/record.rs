//! Records and their integrity envelopes.
//!
//! The engine never interprets `content`; it only computes and checks the
//! envelope around it. `entry_hash` depends on `content` alone, so signing,
//! batching, or timestamping a record never changes its hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    hash::Hash256,
    key::{opt_hex_bytes, Signature, SignatureAlgorithm},
};

/// Integrity metadata attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEnvelope {
    /// SHA3-256 of the canonicalized content.
    pub entry_hash: Hash256,

    /// `entry_hash` of the predecessor in the same log; `None` for genesis.
    pub previous_hash: Option<Hash256>,

    #[serde(with = "opt_hex_bytes", default)]
    pub digital_signature: Option<Vec<u8>>,

    #[serde(default)]
    pub signature_algorithm: Option<SignatureAlgorithm>,

    #[serde(default)]
    pub signed_by_key_id: Option<String>,

    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,

    /// Result of the last in-process verification. Never persisted: a
    /// stored "verified" flag proves nothing, so it always deserializes as
    /// `None` and must be recomputed.
    #[serde(skip)]
    pub signature_verified: Option<bool>,

    /// Root of the Merkle batch this record was rooted in.
    #[serde(default)]
    pub merkle_root: Option<String>,

    /// `token_hash` of the timestamp token covering this record.
    #[serde(default)]
    pub timestamp_token_ref: Option<Hash256>,
}

impl IntegrityEnvelope {
    /// An unsigned, unbatched envelope.
    pub fn new(entry_hash: Hash256, previous_hash: Option<Hash256>) -> Self {
        Self {
            entry_hash,
            previous_hash,
            digital_signature: None,
            signature_algorithm: None,
            signed_by_key_id: None,
            signed_at: None,
            signature_verified: None,
            merkle_root: None,
            timestamp_token_ref: None,
        }
    }

    /// Reassemble the detached signature, if the envelope carries one.
    pub fn signature(&self) -> Option<Signature> {
        Some(Signature {
            algorithm: self.signature_algorithm?,
            key_id: self.signed_by_key_id.clone()?,
            bytes: self.digital_signature.clone()?,
            signed_at: self.signed_at?,
        })
    }

    /// Write every signature field at once.
    pub fn apply_signature(&mut self, signature: Signature) {
        self.digital_signature = Some(signature.bytes);
        self.signature_algorithm = Some(signature.algorithm);
        self.signed_by_key_id = Some(signature.key_id);
        self.signed_at = Some(signature.signed_at);
        self.signature_verified = None;
    }
}

/// One entry of an append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The logical log this entry belongs to (e.g. `"audit_log"`).
    pub log_id: String,

    /// Zero-based position in the log.
    pub index: u64,

    /// Canonicalized caller content.
    pub content: serde_json::Value,

    pub envelope: IntegrityEnvelope,
}

impl Record {
    /// Stable identifier used as a Merkle leaf id: `"{log_id}:{index}"`.
    pub fn record_id(&self) -> String {
        record_id(&self.log_id, self.index)
    }

    pub fn entry_hash(&self) -> Hash256 {
        self.envelope.entry_hash
    }
}

pub fn record_id(log_id: &str, index: u64) -> String {
    format!("{log_id}:{index}")
}
