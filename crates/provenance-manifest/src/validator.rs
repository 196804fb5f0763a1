//! Manifest validation against a directory on disk. Never writes.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    manifest::{DatasetManifest, FindingKind, ValidationFinding, ValidationResult, MANIFEST_VERSION},
};

use crate::generator::{dataset_hash, sha256_hex, walk, SkipReason};

fn finding(path: &str, kind: FindingKind, message: String) -> ValidationFinding {
    ValidationFinding {
        path: path.to_string(),
        kind,
        message,
    }
}

/// Compare `manifest` with the current contents of `dataset_path`.
///
/// Missing files, hash mismatches, unreadable files and a dataset hash
/// that no longer matches the listed file hashes are errors. Size
/// mismatches and files the manifest does not list are warnings. A file
/// whose name is not UTF-8 cannot be listed, so it is untracked; an entry
/// the walk cannot read is unreadable.
pub fn validate(manifest: &DatasetManifest, dataset_path: impl AsRef<Path>) -> ProvenanceResult<ValidationResult> {
    if manifest.manifest_version != MANIFEST_VERSION {
        return Err(ProvenanceError::MalformedInput {
            reason: format!("unsupported manifest version '{}'", manifest.manifest_version),
        });
    }

    let root = dataset_path.as_ref();
    let walk = walk(root)?;
    let mut on_disk: HashMap<String, _> = walk
        .entries
        .into_iter()
        .map(|entry| (entry.relative.clone(), entry))
        .collect();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut unlistable = Vec::new();
    for skipped in walk.skipped {
        match skipped.reason {
            SkipReason::NotUtf8 => unlistable.push(skipped.relative),
            SkipReason::Unreadable(reason) => {
                errors.push(finding(&skipped.relative, FindingKind::Unreadable, format!("cannot read entry: {reason}")))
            }
        }
    }

    for expected in &manifest.files {
        let Some(entry) = on_disk.remove(&expected.path) else {
            errors.push(finding(&expected.path, FindingKind::MissingFile, "file listed in manifest is missing".into()));
            continue;
        };
        let bytes = match std::fs::read(&entry.absolute) {
            Ok(bytes) => bytes,
            Err(e) => {
                errors.push(finding(&expected.path, FindingKind::Unreadable, format!("cannot read file: {e}")));
                continue;
            }
        };

        let actual = sha256_hex(&bytes);
        if actual != expected.sha256 {
            errors.push(finding(
                &expected.path,
                FindingKind::HashMismatch,
                format!("expected sha256 {}, found {actual}", expected.sha256),
            ));
        }
        let size = bytes.len() as u64;
        if size != expected.size {
            warnings.push(finding(
                &expected.path,
                FindingKind::SizeMismatch,
                format!("expected {} bytes, found {size}", expected.size),
            ));
        }
    }

    let mut untracked: Vec<String> = on_disk.into_keys().collect();
    untracked.sort();
    for path in untracked {
        warnings.push(finding(&path, FindingKind::UntrackedFile, "file is not listed in the manifest".into()));
    }
    for path in unlistable {
        warnings.push(finding(
            &path,
            FindingKind::UntrackedFile,
            "file name is not valid UTF-8 and cannot be listed in a manifest".into(),
        ));
    }

    let recomputed = dataset_hash(manifest.files.iter().map(|f| f.sha256.as_str()));
    if recomputed != manifest.dataset_hash {
        errors.push(finding(
            "",
            FindingKind::DatasetHashMismatch,
            format!("manifest dataset hash {} does not match its file list ({recomputed})", manifest.dataset_hash),
        ));
    }

    let result = ValidationResult::from_findings(errors, warnings);
    if result.is_valid {
        info!(dataset = %manifest.dataset_name, warnings = result.warnings.len(), "manifest validated");
    } else {
        warn!(
            dataset = %manifest.dataset_name,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "manifest validation failed"
        );
    }
    Ok(result)
}
