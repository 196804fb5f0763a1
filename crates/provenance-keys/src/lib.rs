//! # provenance-keys
//!
//! Key lifecycle management and digital signatures.
//!
//! - `KeyManager` generates, rotates, revokes, and looks up keys. Private
//!   keys are sealed with a key-encryption key before they reach the
//!   `KeyRepository`, or stay in a hardware module behind a handle.
//! - `SignatureService` signs with RSA-PSS (SHA-256), ECDSA P-256
//!   (SHA-256), or Ed25519 and verifies against any stored key, revoked and
//!   rotated keys included.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let keys = Arc::new(KeyManager::new(
//!     Arc::new(InMemoryKeyRepository::new()),
//!     KeySealer::ephemeral(),
//!     KeyPolicy::default(),
//! ));
//! let key = keys.generate_key(KeyType::Rsa, 2048, KeyPurpose::Signing)?;
//! let signer = SignatureService::new(keys);
//! let sig = signer.sign(b"hello", &key.key_id)?;
//! assert!(signer.verify(b"hello", &sig, &key.key_id)?);
//! ```

pub mod manager;
pub mod material;
pub mod memory;
pub mod sealing;
pub mod signer;

pub use manager::{derive_key_id, KeyManager, KeyPolicy};
pub use material::verify_with_public_key;
pub use memory::InMemoryKeyRepository;
pub use sealing::KeySealer;
pub use signer::SignatureService;

// ── Tests ─────────────────────────────────────────────────────────────────────
