//! # provenance-contracts
//!
//! Shared types, integrity envelopes, and the error taxonomy for the
//! provenance engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod chain;
pub mod error;
pub mod hash;
pub mod key;
pub mod manifest;
pub mod merkle;
pub mod record;
pub mod timestamp;

pub use error::{ProvenanceError, ProvenanceResult};
pub use hash::Hash256;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;

    use super::*;
    use chain::{BreakKind, BrokenLink, ChainVerificationResult};
    use key::{CryptoKey, KeyPurpose, KeyType, PrivateKeyRef, Signature, SignatureAlgorithm};
    use manifest::{DatasetManifest, Framework, MANIFEST_VERSION};
    use record::{IntegrityEnvelope, Record};

    // ── Hash256 ──────────────────────────────────────────────────────────────

    #[test]
    fn hash_hex_is_lowercase_and_round_trips() {
        let hash = Hash256::from_bytes([0xAB; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(Hash256::from_hex(&hex.to_uppercase()).unwrap(), hash);
    }

    #[test]
    fn hash_rejects_wrong_length() {
        let err = Hash256::from_hex("abcd").unwrap_err();
        assert!(matches!(err, ProvenanceError::MalformedInput { .. }));
    }

    #[test]
    fn hash_serializes_as_hex_string() {
        let hash = Hash256::from_bytes([1; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    #[test]
    fn key_type_parsing_is_case_insensitive() {
        assert_eq!(KeyType::from_str("rsa").unwrap(), KeyType::Rsa);
        assert_eq!(KeyType::from_str("ECDSA").unwrap(), KeyType::Ecdsa);
        assert_eq!(KeyType::from_str("Ed25519").unwrap(), KeyType::Ed25519);
    }

    #[test]
    fn unknown_key_type_is_unsupported() {
        match KeyType::from_str("dsa") {
            Err(ProvenanceError::UnsupportedKeyType { key_type }) => assert_eq!(key_type, "dsa"),
            other => panic!("expected UnsupportedKeyType, got {other:?}"),
        }
    }

    #[test]
    fn private_key_ref_debug_hides_ciphertext() {
        let sealed = PrivateKeyRef::Sealed {
            nonce: "00".repeat(12),
            ciphertext: "deadbeef".to_string(),
        };
        let rendered = format!("{sealed:?}");
        assert!(!rendered.contains("deadbeef"), "ciphertext leaked: {rendered}");
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let now = Utc::now();
        let key = CryptoKey {
            key_id: "k".into(),
            key_type: KeyType::Ed25519,
            key_size: 256,
            public_key: String::new(),
            private_key_ref: PrivateKeyRef::Hardware {
                provider: "hsm".into(),
                handle: "slot-1".into(),
            },
            purpose: KeyPurpose::Signing,
            is_active: true,
            created_at: now,
            expires_at: Some(now),
            revoked_at: None,
            revocation_reason: None,
            parent_key_id: None,
            rotation_reason: None,
        };
        assert!(key.is_expired_at(now));
        assert!(!key.is_revoked());
    }

    // ── Records ──────────────────────────────────────────────────────────────

    #[test]
    fn signature_verified_is_never_persisted() {
        let mut envelope = IntegrityEnvelope::new(Hash256::from_bytes([2; 32]), None);
        envelope.signature_verified = Some(true);
        let record = Record {
            log_id: "L1".into(),
            index: 0,
            content: serde_json::json!("a"),
            envelope,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("signature_verified"));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.envelope.signature_verified, None);
        assert_eq!(back.record_id(), "L1:0");
    }

    #[test]
    fn envelope_signature_requires_every_field() {
        let mut envelope = IntegrityEnvelope::new(Hash256::from_bytes([3; 32]), None);
        assert!(envelope.signature().is_none());

        let signature = Signature {
            algorithm: SignatureAlgorithm::Ed25519,
            key_id: "abc".into(),
            bytes: vec![1, 2, 3],
            signed_at: Utc::now(),
        };
        envelope.apply_signature(signature.clone());
        assert_eq!(envelope.signature(), Some(signature));
    }

    // ── Chain results ────────────────────────────────────────────────────────

    #[test]
    fn chain_result_valid_only_without_breaks() {
        let ok = ChainVerificationResult::from_findings("L1", 0, 4, vec![]);
        assert!(ok.valid);

        let broken = ChainVerificationResult::from_findings(
            "L1",
            0,
            4,
            vec![BrokenLink::hashes(2, BreakKind::ContentHash, None, None)],
        );
        assert!(!broken.valid);
    }

    // ── Manifests ────────────────────────────────────────────────────────────

    #[test]
    fn manifest_framework_breakdown_serializes_with_string_keys() {
        let mut breakdown = std::collections::BTreeMap::new();
        breakdown.insert(Framework::Rego, 2);
        breakdown.insert(Framework::Json, 1);
        let manifest = DatasetManifest {
            manifest_version: MANIFEST_VERSION.to_string(),
            dataset_name: "policies".into(),
            dataset_version: "1".into(),
            created_at: Utc::now(),
            files: vec![],
            framework_breakdown: breakdown,
            dataset_hash: String::new(),
            metadata: Default::default(),
        };

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["framework_breakdown"]["rego"], 2);
        let back: DatasetManifest = serde_json::from_value(value).unwrap();
        assert_eq!(back, manifest);
    }

    // ── Errors ───────────────────────────────────────────────────────────────

    #[test]
    fn only_timestamp_and_timeout_are_transient() {
        assert!(ProvenanceError::TimestampUnavailable {
            reason: "down".into(),
            attempts: 3
        }
        .is_transient());
        assert!(!ProvenanceError::KeyRevoked { key_id: "k".into() }.is_transient());
    }
}
