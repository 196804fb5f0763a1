//! # provenance-timestamp
//!
//! Trusted timestamps for hashes.
//!
//! `TimestampClient` asks a `TimestampAuthority` to stamp a digest, retrying
//! transient failures with exponential backoff, and verifies returned tokens
//! against a trust root. `LocalTimestampAuthority` is an authority backed by
//! a key from the engine's own key manager.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let tsa = Arc::new(LocalTimestampAuthority::new("local-tsa", signer, key_id));
//! let client = TimestampClient::new(tsa.clone(), tsa.trust_root()?, RetryPolicy::default());
//!
//! let token = client.timestamp(record.entry_hash()).await?;
//! assert!(client.verify_timestamp(&record.entry_hash(), &token)?);
//! ```

pub mod authority;
pub mod client;
pub mod retry;
pub mod token;

pub use authority::{LocalTimestampAuthority, TrustRoot};
pub use client::TimestampClient;
pub use retry::RetryPolicy;
pub use token::{SignedTstInfo, TstInfo};

// ── Tests ─────────────────────────────────────────────────────────────────────
