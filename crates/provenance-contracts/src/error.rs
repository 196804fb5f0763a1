//! Error taxonomy for the provenance engine.
//!
//! All fallible operations return `ProvenanceResult<T>`. Cryptographic
//! mismatches (a signature that does not verify, a broken chain link, a
//! drifted manifest entry) are NOT errors: they are reported as data by the
//! verification functions. Variants here describe structural problems the
//! caller has to act on.

use thiserror::Error;

/// The unified error type for the provenance engine.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// Content could not be canonicalized (non-finite float, unsupported map
    /// key, unbounded nesting). Fatal: the caller must fix the input.
    #[error("content cannot be canonically encoded: {reason}")]
    Encoding { reason: String },

    /// No key with this id exists in the key repository.
    #[error("key '{key_id}' not found")]
    KeyNotFound { key_id: String },

    /// The key was revoked and may no longer produce signatures.
    #[error("key '{key_id}' is revoked and cannot be used for signing")]
    KeyRevoked { key_id: String },

    /// The key is past its `expires_at` and may no longer produce signatures.
    #[error("key '{key_id}' expired and cannot be used for signing")]
    KeyExpired { key_id: String },

    /// The requested key size is below the configured minimum.
    #[error("{key_type} key size {key_size} is below the minimum of {minimum} bits")]
    WeakKey {
        key_type: String,
        key_size: u32,
        minimum: u32,
    },

    /// The key type (or type/size combination) is not supported.
    #[error("unsupported key type: {key_type}")]
    UnsupportedKeyType { key_type: String },

    /// No active key exists for the requested purpose.
    #[error("no active key for purpose '{purpose}'")]
    NoActiveKey { purpose: String },

    /// A Merkle proof was requested for a leaf that is not in the tree.
    #[error("leaf {leaf} is not present in the tree")]
    LeafNotFound { leaf: String },

    /// No Merkle batch was recorded under this id.
    #[error("batch '{batch_id}' not found")]
    BatchNotFound { batch_id: String },

    /// The timestamp authority could not be reached. Transient.
    #[error("timestamp authority unavailable after {attempts} attempt(s): {reason}")]
    TimestampUnavailable { reason: String, attempts: u32 },

    /// A log range that does not fit the log.
    #[error("invalid range {start}..={end} for log '{log_id}' with {len} entries")]
    InvalidRange {
        log_id: String,
        start: u64,
        end: u64,
        len: u64,
    },

    /// Input that is structurally wrong (bad PEM, undecodable token, unknown
    /// manifest version, algorithm/key mismatch).
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// An operation exceeded its deadline and was abandoned without writing.
    #[error("operation '{operation}' timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A cryptographic primitive failed for a reason other than a mismatch
    /// (key generation, sealing, unsealing).
    #[error("cryptographic failure: {reason}")]
    Crypto { reason: String },

    /// The backing repository failed or its state is unusable.
    #[error("storage failure: {reason}")]
    Storage { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Filesystem access failed.
    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl ProvenanceError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProvenanceError::TimestampUnavailable { .. } | ProvenanceError::Timeout { .. }
        )
    }

    /// Shorthand used by lock-guarded stores when a mutex is poisoned.
    pub fn poisoned(what: &str) -> Self {
        ProvenanceError::Storage {
            reason: format!("{what} lock poisoned"),
        }
    }
}

/// Convenience alias used throughout the provenance crates.
pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
