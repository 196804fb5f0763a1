//! Dataset manifests and their validation results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current manifest document version. Readers reject anything else.
pub const MANIFEST_VERSION: &str = "1.0";

/// Policy framework detected for a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Rego,
    Json,
    Yaml,
    Datalog,
    Unknown,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Rego => "rego",
            Framework::Json => "json",
            Framework::Yaml => "yaml",
            Framework::Datalog => "datalog",
            Framework::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One file entry in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the dataset root, `/`-separated.
    pub path: String,
    /// Lowercase hex SHA-256 of the raw file bytes.
    pub sha256: String,
    pub size: u64,
    pub record_count: u64,
    pub framework: Framework,
    pub last_modified: Option<DateTime<Utc>>,
}

/// An immutable snapshot of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub manifest_version: String,
    pub dataset_name: String,
    pub dataset_version: String,
    pub created_at: DateTime<Utc>,
    /// Sorted by `path`.
    pub files: Vec<ManifestFile>,
    pub framework_breakdown: BTreeMap<Framework, u64>,
    /// SHA-256 over the sorted concatenation of every file hash.
    pub dataset_hash: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DatasetManifest {
    pub fn total_records(&self) -> u64 {
        self.files.iter().map(|f| f.record_count).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingFile,
    HashMismatch,
    SizeMismatch,
    UntrackedFile,
    DatasetHashMismatch,
    Unreadable,
}

/// A single validation error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// The affected path, or empty for dataset-level findings.
    pub path: String,
    pub kind: FindingKind,
    pub message: String,
}

/// Outcome of validating a manifest against a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
}

impl ValidationResult {
    pub fn from_findings(errors: Vec<ValidationFinding>, warnings: Vec<ValidationFinding>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
