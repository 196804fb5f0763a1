//! JSON persistence for manifests.
//!
//! Documents are checked against an embedded JSON Schema before they are
//! deserialized, so a loaded manifest is structurally sound even when it
//! was edited by hand.

use std::path::Path;

use serde_json::{json, Value};
use tracing::warn;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    manifest::{DatasetManifest, MANIFEST_VERSION},
};

/// The JSON Schema every manifest document must satisfy.
pub fn manifest_schema() -> Value {
    let sha256 = json!({ "type": "string", "pattern": "^[0-9a-f]{64}$" });
    let framework = json!({ "enum": ["rego", "json", "yaml", "datalog", "unknown"] });
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "DatasetManifest",
        "type": "object",
        "required": [
            "manifest_version", "dataset_name", "dataset_version",
            "created_at", "files", "framework_breakdown", "dataset_hash"
        ],
        "properties": {
            "manifest_version": { "type": "string" },
            "dataset_name": { "type": "string", "minLength": 1 },
            "dataset_version": { "type": "string", "minLength": 1 },
            "created_at": { "type": "string", "format": "date-time" },
            "files": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["path", "sha256", "size", "record_count", "framework"],
                    "properties": {
                        "path": { "type": "string", "minLength": 1 },
                        "sha256": sha256,
                        "size": { "type": "integer", "minimum": 0 },
                        "record_count": { "type": "integer", "minimum": 0 },
                        "framework": framework,
                        "last_modified": { "type": ["string", "null"] }
                    }
                }
            },
            "framework_breakdown": {
                "type": "object",
                "propertyNames": framework,
                "additionalProperties": { "type": "integer", "minimum": 0 }
            },
            "dataset_hash": sha256,
            "metadata": { "type": "object" }
        }
    })
}

fn malformed(reason: impl Into<String>) -> ProvenanceError {
    ProvenanceError::MalformedInput { reason: reason.into() }
}

/// Pretty-printed JSON for `manifest`.
pub fn to_json(manifest: &DatasetManifest) -> ProvenanceResult<String> {
    serde_json::to_string_pretty(manifest).map_err(|e| ProvenanceError::Encoding {
        reason: e.to_string(),
    })
}

/// Parse and check a manifest document.
pub fn from_json(document: &str) -> ProvenanceResult<DatasetManifest> {
    let value: Value = serde_json::from_str(document).map_err(|e| malformed(format!("manifest is not JSON: {e}")))?;

    if let Some(version) = value.get("manifest_version").and_then(Value::as_str) {
        if version != MANIFEST_VERSION {
            return Err(malformed(format!(
                "unsupported manifest version '{version}' (expected '{MANIFEST_VERSION}')"
            )));
        }
    }

    let schema = manifest_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| ProvenanceError::Config {
        reason: format!("embedded manifest schema is invalid: {e}"),
    })?;
    let violations: Vec<String> = validator
        .iter_errors(&value)
        .map(|error| format!("at {}: {}", error.instance_path, error))
        .collect();
    if !violations.is_empty() {
        warn!(violations = violations.len(), "manifest failed schema validation");
        return Err(malformed(format!("manifest schema violation {}", violations.join("; "))));
    }

    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// Write `manifest` to `path` as JSON.
pub fn write_manifest(manifest: &DatasetManifest, path: impl AsRef<Path>) -> ProvenanceResult<()> {
    let path = path.as_ref();
    std::fs::write(path, to_json(manifest)?).map_err(|e| ProvenanceError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read and check the manifest stored at `path`.
pub fn read_manifest(path: impl AsRef<Path>) -> ProvenanceResult<DatasetManifest> {
    let path = path.as_ref();
    let document = std::fs::read_to_string(path).map_err(|e| ProvenanceError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    from_json(&document)
}
