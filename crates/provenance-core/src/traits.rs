//! Collaborator traits for the provenance engine.
//!
//! These traits mark the boundary between the engine and the systems it
//! relies on but does not own:
//!
//! - `KeyRepository`: persistence for key metadata and the per-purpose
//!   "current key" pointer
//! - `LogStore`: persistence for append-only log entries
//! - `TimestampAuthority`: an external RFC 3161-style time-stamping service
//! - `HardwareSigner`: a driver for keys that live in an HSM
//!
//! In-memory implementations of the two repositories ship with the crates
//! that use them; production hosts plug in their own.

use async_trait::async_trait;

use provenance_contracts::{
    error::ProvenanceResult,
    hash::Hash256,
    key::{CryptoKey, KeyPurpose, SignatureAlgorithm},
    record::Record,
    timestamp::HashAlgorithm,
};

/// A set of key writes applied atomically.
///
/// The key manager builds one `KeyCommit` per lifecycle operation (generate,
/// rotate, revoke). Repositories must apply it all-or-nothing so that a
/// reader never observes a new key without the pointer update that goes
/// with it, or the reverse.
#[derive(Debug, Clone, Default)]
pub struct KeyCommit {
    /// Keys to insert or replace, matched by `key_id`.
    pub upserts: Vec<CryptoKey>,

    /// Pointer updates: `(purpose, Some(key_id))` makes `key_id` current,
    /// `(purpose, None)` clears the pointer.
    pub current: Vec<(KeyPurpose, Option<String>)>,
}

/// Persistence for `CryptoKey` metadata.
///
/// Implementations must never delete keys. Reads may run concurrently with
/// each other and must observe either the state before a commit or the
/// state after it.
pub trait KeyRepository: Send + Sync {
    /// Look up one key. `Ok(None)` when it does not exist.
    fn get(&self, key_id: &str) -> ProvenanceResult<Option<CryptoKey>>;

    /// Every key ever stored, in creation order.
    fn list(&self) -> ProvenanceResult<Vec<CryptoKey>>;

    /// The key the current-key pointer holds for `purpose`, if any, read
    /// together with the pointer in one snapshot.
    fn current(&self, purpose: KeyPurpose) -> ProvenanceResult<Option<CryptoKey>>;

    /// Apply `commit` atomically.
    fn commit(&self, commit: KeyCommit) -> ProvenanceResult<()>;
}

/// Persistence for append-only logs.
///
/// A store must never offer in-place edits or deletion. `push` must reject
/// a record whose `index` is not the log's current length, which turns a
/// forked append into an error rather than a silent sibling entry.
pub trait LogStore: Send + Sync {
    /// Number of entries in `log_id`; zero for a log never written.
    fn len(&self, log_id: &str) -> ProvenanceResult<u64>;

    /// The last entry of `log_id`, if any.
    fn last(&self, log_id: &str) -> ProvenanceResult<Option<Record>>;

    /// Append `record` to `record.log_id`.
    fn push(&self, record: Record) -> ProvenanceResult<()>;

    /// One entry by position.
    fn get(&self, log_id: &str, index: u64) -> ProvenanceResult<Option<Record>>;

    /// Entries `start..=end`. Callers validate the range first.
    fn range(&self, log_id: &str, start: u64, end: u64) -> ProvenanceResult<Vec<Record>>;

    /// Every log that has at least one entry.
    fn log_ids(&self) -> ProvenanceResult<Vec<String>>;
}

/// An external time-stamping authority.
///
/// The authority receives only a digest, never the data itself. It returns
/// an opaque signed token; decoding and checking the token is the timestamp
/// client's job.
#[async_trait]
pub trait TimestampAuthority: Send + Sync {
    /// Identifier recorded in issued tokens (URL, DN, or name).
    fn identifier(&self) -> String;

    /// Ask the authority to time-stamp `imprint`.
    ///
    /// Returns `ProvenanceError::TimestampUnavailable` when the service
    /// cannot be reached; the client treats that as retryable.
    async fn issue(&self, imprint: Hash256, algorithm: HashAlgorithm) -> ProvenanceResult<Vec<u8>>;
}

/// Driver for keys whose private half never leaves a hardware module.
pub trait HardwareSigner: Send + Sync {
    /// Sign `data` with the key at `handle` inside `provider`.
    fn sign(
        &self,
        provider: &str,
        handle: &str,
        algorithm: SignatureAlgorithm,
        data: &[u8],
    ) -> ProvenanceResult<Vec<u8>>;
}
