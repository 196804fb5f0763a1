//! # provenance-engine
//!
//! The configured entry point of the provenance workspace.
//!
//! `EngineConfig` is read from TOML; `ProvenanceEngine` wires the key
//! manager, signature service, hash-chain log, Merkle batch verifier,
//! timestamp client and manifest tooling together behind one API.

pub mod config;
pub mod engine;

pub use config::{BatchingConfig, EngineConfig, KeyConfig, TimestampConfig};
pub use engine::ProvenanceEngine;

// ── Tests ─────────────────────────────────────────────────────────────────────
