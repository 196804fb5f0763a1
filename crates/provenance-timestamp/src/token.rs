//! Wire format of the tokens issued by `LocalTimestampAuthority`.
//!
//! A token is the canonical JSON of a `SignedTstInfo`: the time-stamp info
//! plus a signature over the canonical bytes of that info. Canonical
//! encoding makes the signed bytes reproducible on the verifying side
//! without keeping a second copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
    key::{Signature, SignatureAlgorithm},
    timestamp::{HashAlgorithm, TimestampToken},
};
use provenance_core::canonical;

pub const TST_VERSION: u32 = 1;

/// What the authority attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TstInfo {
    pub version: u32,
    /// Policy identifier the token was issued under.
    pub policy: String,
    pub message_imprint: Hash256,
    pub hash_algorithm: HashAlgorithm,
    pub serial_number: String,
    pub gen_time: DateTime<Utc>,
    /// Identifier of the issuing authority.
    pub tsa: String,
}

impl TstInfo {
    /// The bytes the authority signs.
    pub fn signed_bytes(&self) -> ProvenanceResult<Vec<u8>> {
        canonical::canonical_bytes(self)
    }
}

/// A `TstInfo` and the authority's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTstInfo {
    pub tst_info: TstInfo,
    pub signature: Signature,
}

impl SignedTstInfo {
    pub fn encode(&self) -> ProvenanceResult<Vec<u8>> {
        canonical::canonical_bytes(self)
    }

    pub fn decode(bytes: &[u8]) -> ProvenanceResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProvenanceError::MalformedInput {
            reason: format!("undecodable timestamp token: {e}"),
        })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.signature.algorithm
    }
}

/// Build the stored token from the raw bytes an authority returned.
pub fn token_from_bytes(bytes: Vec<u8>) -> ProvenanceResult<TimestampToken> {
    let signed = SignedTstInfo::decode(&bytes)?;
    let info = signed.tst_info;
    Ok(TimestampToken {
        token_hash: canonical::hash_bytes(&bytes),
        timestamp_token: bytes,
        tsa_identifier: info.tsa,
        timestamp_value: info.gen_time,
        hash_algorithm: info.hash_algorithm,
        message_imprint: info.message_imprint,
        serial_number: info.serial_number,
    })
}
