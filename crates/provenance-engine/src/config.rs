//! Engine configuration loaded from TOML.
//!
//! Every section and field is optional; omitted values take the defaults
//! below.
//!
//! ```toml
//! sign_timeout_ms = 5000
//!
//! [keys]
//! min_rsa_bits = 3072
//! default_key_type = "ECDSA"
//! lifetime_days = 90
//! sealing_key_hex = "00112233..."   # 64 hex chars; omit for an ephemeral key
//!
//! [batching]
//! count_threshold = 500
//! interval_ms = 2000
//!
//! [timestamp]
//! max_attempts = 5
//! request_timeout_ms = 3000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::{KeySpec, KeyType},
};
use provenance_keys::{KeyPolicy, KeySealer};
use provenance_merkle::BatchConfig;
use provenance_timestamp::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub min_rsa_bits: u32,
    pub min_ecdsa_bits: u32,
    /// Type used when rotating a purpose that has no key yet.
    pub default_key_type: KeyType,
    pub default_key_size: u32,
    /// Days a new key stays valid. `0` means keys never expire.
    pub lifetime_days: u32,
    /// Key-encryption key for private keys at rest. A fresh random key is
    /// used when absent, which makes sealed keys unreadable after restart.
    pub sealing_key_hex: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            min_rsa_bits: 2048,
            min_ecdsa_bits: 256,
            default_key_type: KeyType::Ed25519,
            default_key_size: 256,
            lifetime_days: 365,
            sealing_key_hex: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub count_threshold: u64,
    pub interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            count_threshold: 100,
            interval_ms: 1000,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Name the built-in authority puts in its tokens.
    pub tsa_identifier: String,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            tsa_identifier: "provenance-local-tsa".to_string(),
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for `sign_with_timeout`.
    pub sign_timeout_ms: u64,
    pub keys: KeyConfig,
    pub batching: BatchingConfig,
    pub timestamp: TimestampConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sign_timeout_ms: 5000,
            keys: KeyConfig::default(),
            batching: BatchingConfig::default(),
            timestamp: TimestampConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `ProvenanceError::Config` if the document is malformed or a
    /// field has the wrong type.
    pub fn from_toml_str(s: &str) -> ProvenanceResult<Self> {
        toml::from_str(s).map_err(|e| ProvenanceError::Config {
            reason: format!("failed to parse engine TOML: {e}"),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> ProvenanceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ProvenanceError::Config {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn key_policy(&self) -> KeyPolicy {
        KeyPolicy {
            min_rsa_bits: self.keys.min_rsa_bits,
            min_ecdsa_bits: self.keys.min_ecdsa_bits,
            default_spec: KeySpec {
                key_type: self.keys.default_key_type,
                key_size: self.keys.default_key_size,
            },
            lifetime: (self.keys.lifetime_days > 0).then(|| chrono::Duration::days(i64::from(self.keys.lifetime_days))),
        }
    }

    pub fn sealer(&self) -> ProvenanceResult<KeySealer> {
        match &self.keys.sealing_key_hex {
            Some(hex) => KeySealer::from_hex(hex),
            None => Ok(KeySealer::ephemeral()),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            count_threshold: self.batching.count_threshold,
            interval: Duration::from_millis(self.batching.interval_ms),
            poll_interval: Duration::from_millis(self.batching.poll_interval_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.timestamp.max_attempts,
            initial_backoff: Duration::from_millis(self.timestamp.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.timestamp.max_backoff_ms),
            request_timeout: Duration::from_millis(self.timestamp.request_timeout_ms),
        }
    }

    pub fn sign_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_timeout_ms)
    }
}
