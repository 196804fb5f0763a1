//! # provenance-core
//!
//! The leaf layer of the provenance engine.
//!
//! This crate provides:
//! - The canonical hasher (`canonical::hash`), a pure SHA3-256 over a
//!   deterministic encoding of any serializable value
//! - The collaborator traits (`KeyRepository`, `LogStore`,
//!   `TimestampAuthority`, `HardwareSigner`) the other crates are written
//!   against
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provenance_core::canonical;
//!
//! let a = canonical::hash(&serde_json::json!({"rule": "allow", "id": 7}))?;
//! let b = canonical::hash(&serde_json::json!({"id": 7, "rule": "allow"}))?;
//! assert_eq!(a, b);
//! ```

pub mod canonical;
pub mod traits;

pub use canonical::{canonical_bytes, hash, hash_bytes};
pub use traits::{HardwareSigner, KeyCommit, KeyRepository, LogStore, TimestampAuthority};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;
    use serde_json::json;

    use provenance_contracts::error::ProvenanceError;

    use super::canonical::{self, MAX_DEPTH};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn canonical_string<T: Serialize + ?Sized>(value: &T) -> String {
        String::from_utf8(canonical::canonical_bytes(value).unwrap()).unwrap()
    }

    /// A recursive structure used to simulate unbounded nesting.
    #[derive(Serialize)]
    struct Nest {
        child: Option<Box<Nest>>,
    }

    fn nest(depth: usize) -> Nest {
        let mut node = Nest { child: None };
        for _ in 0..depth {
            node = Nest {
                child: Some(Box::new(node)),
            };
        }
        node
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Field order must not influence the hash.
    #[test]
    fn test_hash_ignores_field_order() {
        let a = json!({ "rule": "allow", "subject": { "user": "u1", "role": "admin" }, "id": 7 });
        let b = json!({ "id": 7, "subject": { "role": "admin", "user": "u1" }, "rule": "allow" });
        assert_eq!(canonical::hash(&a).unwrap(), canonical::hash(&b).unwrap());
    }

    /// Repeated calls on the same content yield the same hash.
    #[test]
    fn test_hash_is_deterministic() {
        let content = json!({ "k": [1, 2.5, "x", null, true] });
        let first = canonical::hash(&content).unwrap();
        for _ in 0..10 {
            assert_eq!(canonical::hash(&content).unwrap(), first);
        }
    }

    /// A struct and a hash map with the same fields hash identically.
    #[test]
    fn test_struct_and_map_agree() {
        #[derive(Serialize)]
        struct Rule {
            name: &'static str,
            effect: &'static str,
        }

        let mut map = HashMap::new();
        map.insert("effect", "deny");
        map.insert("name", "no-export");

        let from_struct = canonical::hash(&Rule { name: "no-export", effect: "deny" }).unwrap();
        assert_eq!(from_struct, canonical::hash(&map).unwrap());
    }

    /// The encoding is compact with sorted keys.
    #[test]
    fn test_canonical_form() {
        let value = json!({ "b": [1, 2], "a": { "d": "x", "c": null } });
        assert_eq!(canonical_string(&value), r#"{"a":{"c":null,"d":"x"},"b":[1,2]}"#);
    }

    /// A bare string canonicalizes to its JSON string form.
    #[test]
    fn test_string_scalar_hash() {
        let expected = canonical::hash_bytes(br#""a""#);
        assert_eq!(canonical::hash(&json!("a")).unwrap(), expected);
        assert_eq!(canonical::hash("a").unwrap(), expected);
    }

    /// SHA3-256 of the empty input (FIPS 202 test vector).
    #[test]
    fn test_sha3_known_vector() {
        assert_eq!(
            canonical::hash_bytes(b"").to_hex(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    /// NaN and infinities are rejected rather than coerced to null.
    #[test]
    fn test_non_finite_float_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match canonical::hash(&vec![bad]) {
                Err(ProvenanceError::Encoding { reason }) => {
                    assert!(reason.contains("non-finite"), "unexpected reason: {reason}")
                }
                other => panic!("expected Encoding error, got {other:?}"),
            }
        }
    }

    /// Unbounded nesting is reported as an encoding error instead of
    /// recursing forever.
    #[test]
    fn test_excessive_nesting_rejected() {
        assert!(canonical::hash(&nest(MAX_DEPTH / 2)).is_ok());
        assert!(matches!(
            canonical::hash(&nest(MAX_DEPTH + 1)),
            Err(ProvenanceError::Encoding { .. })
        ));
    }

    /// Non-string map keys with no canonical string form are rejected.
    #[test]
    fn test_composite_map_key_rejected() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1, 2), "tuple key");
        assert!(matches!(canonical::hash(&map), Err(ProvenanceError::Encoding { .. })));
    }

    /// Integer keys stringify, so `{1: x}` and `{"1": x}` are the same content.
    #[test]
    fn test_integer_keys_stringify() {
        let mut numeric = std::collections::BTreeMap::new();
        numeric.insert(1u32, "x");
        assert_eq!(canonical_string(&numeric), r#"{"1":"x"}"#);
    }

    /// Floats and integers keep distinct canonical forms.
    #[test]
    fn test_number_formatting_is_fixed() {
        assert_eq!(canonical_string(&json!([1, 1.0, 0.5, -3])), "[1,1.0,0.5,-3]");
    }

    /// Enum variants encode as externally tagged objects.
    #[test]
    fn test_enum_variants() {
        #[derive(Serialize)]
        enum Effect {
            Allow,
            Limit { max: u32 },
        }

        assert_eq!(canonical_string(&Effect::Allow), r#""Allow""#);
        assert_eq!(canonical_string(&Effect::Limit { max: 3 }), r#"{"Limit":{"max":3}}"#);
    }
}
