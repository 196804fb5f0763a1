//! Manifest generation: walk a dataset directory and describe every file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    manifest::{DatasetManifest, ManifestFile, MANIFEST_VERSION},
};

use crate::framework;

/// A regular file found under a dataset root.
#[derive(Debug, Clone)]
pub(crate) struct DatasetEntry {
    /// `/`-separated path relative to the root.
    pub relative: String,
    pub absolute: PathBuf,
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> ProvenanceError {
    ProvenanceError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Why a path under the root was left out of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// The name cannot be recorded in a manifest.
    NotUtf8,
    /// The walker could not read the entry.
    Unreadable(String),
}

/// A path the walk could not turn into a `DatasetEntry`.
#[derive(Debug, Clone)]
pub(crate) struct SkippedEntry {
    /// Lossy `/`-separated path relative to the root.
    pub relative: String,
    pub reason: SkipReason,
}

/// Everything found under a dataset root.
#[derive(Debug, Default)]
pub(crate) struct DatasetWalk {
    /// Sorted by relative path.
    pub entries: Vec<DatasetEntry>,
    pub skipped: Vec<SkippedEntry>,
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn lossy_relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List the regular files under `root`.
///
/// Hidden files and directories are skipped. Symlinks are not followed.
/// Entries the walker cannot read, and names that are not UTF-8, are
/// reported in `skipped` instead of failing the walk. Only a root that is
/// not a directory is an error.
pub(crate) fn walk(root: &Path) -> ProvenanceResult<DatasetWalk> {
    if !root.is_dir() {
        return Err(io_error(root, "not a directory"));
    }

    let mut walk = DatasetWalk::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root);
                walk.skipped.push(SkippedEntry {
                    relative: lossy_relative_path(root, path),
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match relative_path(root, entry.path()) {
            Some(relative) => walk.entries.push(DatasetEntry {
                relative,
                absolute: entry.into_path(),
            }),
            None => walk.skipped.push(SkippedEntry {
                relative: lossy_relative_path(root, entry.path()),
                reason: SkipReason::NotUtf8,
            }),
        }
    }

    walk.entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    walk.skipped.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(walk)
}

/// Lowercase hex SHA-256 of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `SHA-256` over the concatenation of the sorted file hashes.
///
/// The hashes are concatenated as their lowercase hex text.
pub fn dataset_hash<'a>(file_hashes: impl IntoIterator<Item = &'a str>) -> String {
    let mut sorted: Vec<&str> = file_hashes.into_iter().collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for hash in sorted {
        hasher.update(hash.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Describe one file.
pub(crate) fn describe(entry: &DatasetEntry) -> ProvenanceResult<ManifestFile> {
    let bytes = std::fs::read(&entry.absolute).map_err(|e| io_error(&entry.absolute, e))?;
    let metadata = std::fs::metadata(&entry.absolute).map_err(|e| io_error(&entry.absolute, e))?;
    let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    let size = bytes.len() as u64;
    let text = std::str::from_utf8(&bytes).ok();
    let path = Path::new(&entry.relative);
    let framework = framework::detect(path, text);
    let record_count = framework::count_records(framework, path, text, size);

    debug!(path = %entry.relative, %framework, record_count, "described dataset file");
    Ok(ManifestFile {
        path: entry.relative.clone(),
        sha256: sha256_hex(&bytes),
        size,
        record_count,
        framework,
        last_modified,
    })
}

/// Snapshot the dataset under `dataset_path`.
pub fn generate(
    dataset_path: impl AsRef<Path>,
    dataset_name: &str,
    dataset_version: &str,
) -> ProvenanceResult<DatasetManifest> {
    let root = dataset_path.as_ref();
    let walk = walk(root)?;
    for skipped in &walk.skipped {
        match &skipped.reason {
            SkipReason::NotUtf8 => warn!(path = %skipped.relative, "skipping file with non-UTF-8 name"),
            SkipReason::Unreadable(reason) => warn!(path = %skipped.relative, reason = %reason, "skipping unreadable entry"),
        }
    }
    let files = walk
        .entries
        .iter()
        .map(describe)
        .collect::<ProvenanceResult<Vec<_>>>()?;

    let mut framework_breakdown = BTreeMap::new();
    for file in &files {
        *framework_breakdown.entry(file.framework).or_insert(0) += 1;
    }

    let manifest = DatasetManifest {
        manifest_version: MANIFEST_VERSION.to_string(),
        dataset_name: dataset_name.to_string(),
        dataset_version: dataset_version.to_string(),
        created_at: Utc::now(),
        dataset_hash: dataset_hash(files.iter().map(|f| f.sha256.as_str())),
        files,
        framework_breakdown,
        metadata: BTreeMap::new(),
    };

    info!(
        dataset = %manifest.dataset_name,
        version = %manifest.dataset_version,
        files = manifest.files.len(),
        records = manifest.total_records(),
        "generated dataset manifest"
    );
    Ok(manifest)
}
