//! # provenance-manifest
//!
//! Snapshots of policy datasets.
//!
//! A `DatasetManifest` lists every file under a dataset root with its
//! SHA-256, size, detected policy framework and record count, plus a
//! dataset-level hash over all file hashes. `validate` later compares the
//! manifest with what is on disk; it only reads.
//!
//! ```rust,ignore
//! let manifest = provenance_manifest::generate("policies/", "authz", "2024.1")?;
//! provenance_manifest::write_manifest(&manifest, "authz.manifest.json")?;
//!
//! let loaded = provenance_manifest::read_manifest("authz.manifest.json")?;
//! let result = provenance_manifest::validate(&loaded, "policies/")?;
//! assert!(result.is_valid);
//! ```

pub mod framework;
pub mod generator;
pub mod schema;
pub mod validator;

pub use generator::{dataset_hash, generate};
pub use schema::{from_json, manifest_schema, read_manifest, to_json, write_manifest};
pub use validator::validate;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use provenance_contracts::{
        error::ProvenanceError,
        manifest::{Framework, FindingKind},
    };
    use tempfile::TempDir;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const REGO: &str = "package authz\n\ndefault allow := false\n\nallow if {\n    input.user.role == \"admin\"\n}\n\ndeny[msg] {\n    input.user.banned\n    msg := \"banned\"\n}\n";
    const JSONL: &str = "{\"user\":\"ana\"}\n{\"user\":\"bo\"}\n\n{\"user\":\"cy\"}\n";
    const YAML: &str = "---\nrole: admin\n---\nrole: viewer\n";
    const DATALOG: &str = "% reachability\nedge(a, b).\nedge(b, c).\npath(X, Y) :- edge(X, Y).\n";

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// A small mixed dataset with a hidden directory that must be ignored.
    fn dataset() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "policies/authz.rego", REGO.as_bytes());
        write(root, "data/users.jsonl", JSONL.as_bytes());
        write(root, "data/settings.json", b"{\"strict\": true}");
        write(root, "roles.yaml", YAML.as_bytes());
        write(root, "rules/reach.dl", DATALOG.as_bytes());
        write(root, "README", b"hello world");
        write(root, ".git/HEAD", b"ref: refs/heads/main\n");
        dir
    }

    fn file<'a>(manifest: &'a provenance_contracts::manifest::DatasetManifest, path: &str) -> &'a provenance_contracts::manifest::ManifestFile {
        manifest.files.iter().find(|f| f.path == path).unwrap()
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Every visible file is listed in path order with its framework and
    /// record count.
    #[test]
    fn test_generate_describes_dataset() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "2024.1").unwrap();

        let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "README",
                "data/settings.json",
                "data/users.jsonl",
                "policies/authz.rego",
                "roles.yaml",
                "rules/reach.dl",
            ]
        );

        let expected = [
            ("README", Framework::Unknown, 1),
            ("data/settings.json", Framework::Json, 1),
            ("data/users.jsonl", Framework::Json, 3),
            ("policies/authz.rego", Framework::Rego, 3),
            ("roles.yaml", Framework::Yaml, 2),
            ("rules/reach.dl", Framework::Datalog, 3),
        ];
        for (path, framework, records) in expected {
            let entry = file(&manifest, path);
            assert_eq!(entry.framework, framework, "{path}");
            assert_eq!(entry.record_count, records, "{path}");
            assert!(entry.last_modified.is_some());
        }

        assert_eq!(file(&manifest, "README").sha256, generator::sha256_hex(b"hello world"));
        assert_eq!(file(&manifest, "README").size, 11);
        assert_eq!(manifest.framework_breakdown[&Framework::Json], 2);
        assert_eq!(manifest.framework_breakdown[&Framework::Rego], 1);
        assert_eq!(manifest.total_records(), 13);
        assert_eq!(manifest.manifest_version, "1.0");
    }

    /// The same bytes always produce the same file and dataset hashes.
    #[test]
    fn test_generate_is_deterministic() {
        let dir = dataset();
        let first = generate(dir.path(), "authz", "1").unwrap();
        let second = generate(dir.path(), "authz", "1").unwrap();
        assert_eq!(first.files, second.files);
        assert_eq!(first.dataset_hash, second.dataset_hash);
        assert_eq!(
            first.dataset_hash,
            dataset_hash(first.files.iter().map(|f| f.sha256.as_str()))
        );
    }

    /// The dataset hash does not depend on the order hashes are supplied in.
    #[test]
    fn test_dataset_hash_sorts_inputs() {
        assert_eq!(dataset_hash(["bb", "aa"]), dataset_hash(["aa", "bb"]));
        assert_eq!(dataset_hash(["aa", "bb"]), generator::sha256_hex(b"aabb"));
    }

    /// An empty directory is a valid, empty dataset.
    #[test]
    fn test_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let manifest = generate(dir.path(), "empty", "0").unwrap();
        assert!(manifest.files.is_empty());
        assert_eq!(
            manifest.dataset_hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(validate(&manifest, dir.path()).unwrap().is_valid);
    }

    /// Content heuristics classify files without a telling extension.
    #[test]
    fn test_content_detection() {
        let cases: [(&str, &[u8], Framework, u64); 6] = [
            ("policy", b"package authz\nallow { true }\n", Framework::Rego, 2),
            ("facts", b"edge(a, b).\npath(X, Y) :- edge(X, Y).\n", Framework::Datalog, 2),
            ("doc", b"[1, 2, 3]", Framework::Json, 1),
            ("events", b"{\"a\": 1}\n{\"a\": 2}\n", Framework::Json, 2),
            ("conf", b"name: demo\nitems:\n  - a\n  - b\n", Framework::Yaml, 1),
            ("blob", &[0xff, 0xfe, 0x00, 0x01], Framework::Unknown, 1),
        ];
        for (name, bytes, framework, records) in cases {
            let text = std::str::from_utf8(bytes).ok();
            let path = Path::new(name);
            let detected = framework::detect(path, text);
            assert_eq!(detected, framework, "{name}");
            assert_eq!(framework::count_records(detected, path, text, bytes.len() as u64), records, "{name}");
        }
    }

    /// Extensions win over content.
    #[test]
    fn test_extension_takes_precedence() {
        let text = Some("package authz\n");
        assert_eq!(framework::detect(Path::new("a.yaml"), text), Framework::Yaml);
        assert_eq!(framework::detect(Path::new("a.REGO"), None), Framework::Rego);
    }

    /// Empty and minimal files still count sensibly.
    #[test]
    fn test_record_count_minimums() {
        let path = Path::new("x.yaml");
        assert_eq!(framework::count_records(Framework::Yaml, path, Some(""), 0), 1);
        assert_eq!(framework::count_records(Framework::Rego, Path::new("x.rego"), Some("# nothing\n"), 10), 1);
        assert_eq!(framework::count_records(Framework::Unknown, Path::new("x"), Some(""), 0), 0);
    }

    /// An untouched dataset validates without findings.
    #[test]
    fn test_validate_untouched() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        let result = validate(&manifest, dir.path()).unwrap();
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    /// Changing one file's bytes yields exactly one hash mismatch for it.
    #[test]
    fn test_validate_single_file_drift() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        write(dir.path(), "README", b"HELLO WORLD");

        let result = validate(&manifest, dir.path()).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "README");
        assert_eq!(result.errors[0].kind, FindingKind::HashMismatch);
        assert!(result.warnings.is_empty());

        let regenerated = generate(dir.path(), "authz", "1").unwrap();
        assert_ne!(regenerated.dataset_hash, manifest.dataset_hash);
        let changed: Vec<&str> = regenerated
            .files
            .iter()
            .zip(&manifest.files)
            .filter(|(new, old)| new.sha256 != old.sha256)
            .map(|(new, _)| new.path.as_str())
            .collect();
        assert_eq!(changed, vec!["README"]);
    }

    /// A change in length is reported as a hash error and a size warning.
    #[test]
    fn test_validate_resized_file() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        write(dir.path(), "roles.yaml", b"---\nrole: admin\n");

        let result = validate(&manifest, dir.path()).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, FindingKind::HashMismatch);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, FindingKind::SizeMismatch);
    }

    /// Deleted files are errors; new visible files are warnings; new hidden
    /// files are ignored.
    #[test]
    fn test_validate_missing_and_untracked() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        fs::remove_file(dir.path().join("rules/reach.dl")).unwrap();
        write(dir.path(), "policies/extra.rego", b"package extra\n");
        write(dir.path(), "policies/.swap", b"scratch");

        let result = validate(&manifest, dir.path()).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, FindingKind::MissingFile);
        assert_eq!(result.errors[0].path, "rules/reach.dl");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, FindingKind::UntrackedFile);
        assert_eq!(result.warnings[0].path, "policies/extra.rego");
    }

    /// Untracked files alone do not invalidate a manifest.
    #[test]
    fn test_untracked_file_is_only_a_warning() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        write(dir.path(), "new.json", b"{}");
        let result = validate(&manifest, dir.path()).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    /// A file name that is not UTF-8 is left out of a new manifest and only
    /// warned about during validation; other findings are still reported.
    #[cfg(unix)]
    #[test]
    fn test_non_utf8_file_name_does_not_abort() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"stray\xff.txt")), b"stray").unwrap();
        write(dir.path(), "README", b"hello again");

        let result = validate(&manifest, dir.path()).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, FindingKind::HashMismatch);
        assert_eq!(result.errors[0].path, "README");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, FindingKind::UntrackedFile);
        assert_eq!(result.warnings[0].path, "stray\u{FFFD}.txt");

        let regenerated = generate(dir.path(), "authz", "2").unwrap();
        assert_eq!(regenerated.files.len(), manifest.files.len());
        assert!(regenerated.files.iter().all(|f| !f.path.starts_with("stray")));
        assert!(validate(&regenerated, dir.path()).unwrap().is_valid);
    }

    /// A manifest whose recorded sizes or dataset hash were edited is caught.
    #[test]
    fn test_validate_edited_manifest() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();

        let mut resized = manifest.clone();
        resized.files[0].size += 1;
        let result = validate(&resized, dir.path()).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.warnings[0].kind, FindingKind::SizeMismatch);

        let mut rehashed = manifest.clone();
        rehashed.dataset_hash = "0".repeat(64);
        let result = validate(&rehashed, dir.path()).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, FindingKind::DatasetHashMismatch);
        assert_eq!(result.errors[0].path, "");
    }

    /// Validation needs a directory.
    #[test]
    fn test_validate_missing_root_is_io_error() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        let gone = dir.path().join("nope");
        assert!(matches!(validate(&manifest, &gone), Err(ProvenanceError::Io { .. })));
        assert!(matches!(generate(&gone, "x", "1"), Err(ProvenanceError::Io { .. })));
    }

    /// Manifests survive a trip through JSON on disk.
    #[test]
    fn test_persistence_round_trip() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        let out = TempDir::new().unwrap();
        let path = out.path().join("manifest.json");

        write_manifest(&manifest, &path).unwrap();
        let loaded = read_manifest(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(validate(&loaded, dir.path()).unwrap().is_valid);
    }

    /// Unknown versions are rejected before anything else is looked at.
    #[test]
    fn test_unsupported_version_is_rejected() {
        let dir = dataset();
        let mut manifest = generate(dir.path(), "authz", "1").unwrap();
        manifest.manifest_version = "2.0".into();
        let json = to_json(&manifest).unwrap();

        let err = from_json(&json).unwrap_err();
        assert!(matches!(err, ProvenanceError::MalformedInput { ref reason } if reason.contains("2.0")));
        assert!(matches!(validate(&manifest, dir.path()), Err(ProvenanceError::MalformedInput { .. })));
    }

    /// Documents that break the schema are malformed input.
    #[test]
    fn test_schema_violations_are_rejected() {
        let dir = dataset();
        let manifest = generate(dir.path(), "authz", "1").unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&to_json(&manifest).unwrap()).unwrap();

        value["files"][0]["sha256"] = "NOT-HEX".into();
        assert!(matches!(
            from_json(&value.to_string()),
            Err(ProvenanceError::MalformedInput { .. })
        ));

        let mut missing = serde_json::from_str::<serde_json::Value>(&to_json(&manifest).unwrap()).unwrap();
        missing.as_object_mut().unwrap().remove("dataset_hash");
        assert!(matches!(
            from_json(&missing.to_string()),
            Err(ProvenanceError::MalformedInput { .. })
        ));

        assert!(matches!(from_json("not json"), Err(ProvenanceError::MalformedInput { .. })));
    }
}
