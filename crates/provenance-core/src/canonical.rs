//! Canonical encoding and SHA3-256 content hashing.
//!
//! Any `Serialize` value is first lowered into a canonical JSON value by a
//! dedicated serializer, then written out in a fixed form:
//!
//! - object keys sorted bytewise, no whitespace anywhere
//! - integers in plain decimal, floats in shortest round-trip form
//! - strings escaped exactly as `serde_json` escapes them
//!
//! so semantically identical content hashes identically regardless of field
//! order. Input that has no canonical form is rejected, never coerced:
//! non-finite floats, map keys that are not strings or integers, duplicate
//! keys after stringification, and nesting deeper than `MAX_DEPTH` (which is
//! how a cyclic or self-referential structure shows up during
//! serialization).

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};
use sha3::{Digest, Sha3_256};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    hash::Hash256,
};

/// Deepest nesting accepted before the input is treated as cyclic.
pub const MAX_DEPTH: usize = 128;

/// SHA3-256 over the canonical encoding of `content`.
pub fn hash<T: Serialize + ?Sized>(content: &T) -> ProvenanceResult<Hash256> {
    Ok(hash_bytes(&canonical_bytes(content)?))
}

/// SHA3-256 over raw bytes.
pub fn hash_bytes(data: &[u8]) -> Hash256 {
    Hash256::from_bytes(Sha3_256::digest(data).into())
}

/// SHA3-256 over the concatenation of `parts`.
pub fn hash_concat(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash256::from_bytes(hasher.finalize().into())
}

/// Lower `content` into its canonical value tree.
pub fn canonicalize<T: Serialize + ?Sized>(content: &T) -> ProvenanceResult<Value> {
    content
        .serialize(CanonicalSerializer { depth: 0 })
        .map_err(|e| ProvenanceError::Encoding { reason: e.0 })
}

/// The exact bytes that `hash` digests.
pub fn canonical_bytes<T: Serialize + ?Sized>(content: &T) -> ProvenanceResult<Vec<u8>> {
    let value = canonicalize(content)?;
    let mut out = String::new();
    write_value(&value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(value: &Value, out: &mut String) -> ProvenanceResult<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_str(s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sorted here rather than trusting the map's iteration order,
            // which depends on serde_json's `preserve_order` feature.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(key, out)?;
                out.push(':');
                write_value(&map[key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_str(s: &str, out: &mut String) -> ProvenanceResult<()> {
    let escaped = serde_json::to_string(s).map_err(|e| ProvenanceError::Encoding {
        reason: format!("string escaping failed: {e}"),
    })?;
    out.push_str(&escaped);
    Ok(())
}

// ── Serializer ────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct EncodeError(String);

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EncodeError {}

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError(msg.to_string())
    }
}

#[derive(Clone, Copy)]
struct CanonicalSerializer {
    depth: usize,
}

impl CanonicalSerializer {
    /// Depth for the children of a container opened at this level.
    fn nested(self) -> Result<usize, EncodeError> {
        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(EncodeError(format!(
                "nesting exceeds {MAX_DEPTH} levels; cyclic or self-referential content is rejected"
            )));
        }
        Ok(depth)
    }

    fn float(value: f64) -> Result<Value, EncodeError> {
        if !value.is_finite() {
            return Err(EncodeError(format!("non-finite number {value} has no canonical form")));
        }
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| EncodeError(format!("number {value} has no canonical form")))
    }
}

/// Turn a serialized map key into its string form.
fn key_string(key: Value) -> Result<String, EncodeError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(EncodeError(format!(
            "map keys must be strings or integers, got {other}"
        ))),
    }
}

fn single_entry(name: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(name.to_string(), value);
    Value::Object(map)
}

impl ser::Serializer for CanonicalSerializer {
    type Ok = Value;
    type Error = EncodeError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, EncodeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EncodeError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EncodeError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EncodeError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EncodeError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, EncodeError> {
        i64::try_from(v)
            .map(|v| Value::Number(v.into()))
            .or_else(|_| u64::try_from(v).map(|v| Value::Number(v.into())))
            .map_err(|_| EncodeError(format!("integer {v} exceeds 64 bits")))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EncodeError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EncodeError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EncodeError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EncodeError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, EncodeError> {
        u64::try_from(v)
            .map(|v| Value::Number(v.into()))
            .map_err(|_| EncodeError(format!("integer {v} exceeds 64 bits")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, EncodeError> {
        Self::float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EncodeError> {
        Self::float(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, EncodeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EncodeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, EncodeError> {
        Ok(Value::Array(v.iter().map(|b| Value::Number((*b).into())).collect()))
    }

    fn serialize_none(self) -> Result<Value, EncodeError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, EncodeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EncodeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, EncodeError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError> {
        let depth = self.nested()?;
        let inner = value.serialize(CanonicalSerializer { depth })?;
        Ok(single_entry(variant, inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, EncodeError> {
        Ok(SeqBuilder {
            depth: self.nested()?,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, EncodeError> {
        Ok(VariantSeqBuilder {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, EncodeError> {
        Ok(MapBuilder {
            depth: self.nested()?,
            entries: BTreeMap::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, EncodeError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantMapBuilder, EncodeError> {
        Ok(VariantMapBuilder {
            variant,
            inner: self.serialize_map(Some(len))?,
        })
    }
}

struct SeqBuilder {
    depth: usize,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.items.push(value.serialize(CanonicalSerializer { depth: self.depth })?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Array(self.items))
    }
}

struct VariantSeqBuilder {
    variant: &'static str,
    inner: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.inner.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(single_entry(self.variant, Value::Array(self.inner.items)))
    }
}

struct MapBuilder {
    depth: usize,
    entries: BTreeMap<String, Value>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn insert(&mut self, key: String, value: Value) -> Result<(), EncodeError> {
        if self.entries.contains_key(&key) {
            return Err(EncodeError(format!("duplicate map key '{key}'")));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    fn into_value(self) -> Value {
        Value::Object(self.entries.into_iter().collect())
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), EncodeError> {
        let key = key.serialize(CanonicalSerializer { depth: self.depth })?;
        self.pending_key = Some(key_string(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodeError("map value serialized before its key".to_string()))?;
        let value = value.serialize(CanonicalSerializer { depth: self.depth })?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.into_value())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        let value = value.serialize(CanonicalSerializer { depth: self.depth })?;
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.into_value())
    }
}

struct VariantMapBuilder {
    variant: &'static str,
    inner: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        let value = value.serialize(CanonicalSerializer { depth: self.inner.depth })?;
        self.inner.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(single_entry(self.variant, self.inner.into_value()))
    }
}
