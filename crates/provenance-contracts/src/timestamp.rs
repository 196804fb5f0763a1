//! Trusted timestamp tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{hash::Hash256, key::hex_bytes};

/// Hash algorithm identifiers carried inside timestamp tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA3-256")]
    Sha3_256,
    #[serde(rename = "SHA-256")]
    Sha256,
}

/// A token binding `message_imprint` to `timestamp_value`, issued by a TSA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampToken {
    /// SHA3-256 of `timestamp_token`.
    pub token_hash: Hash256,

    /// The raw token exactly as issued by the authority.
    #[serde(with = "hex_bytes")]
    pub timestamp_token: Vec<u8>,

    pub tsa_identifier: String,
    pub timestamp_value: DateTime<Utc>,
    pub hash_algorithm: HashAlgorithm,

    /// The hash that was timestamped.
    pub message_imprint: Hash256,

    /// Authority-assigned serial number.
    pub serial_number: String,
}
