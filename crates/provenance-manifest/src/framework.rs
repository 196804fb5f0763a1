//! Framework detection and record counting for dataset files.
//!
//! Detection runs an ordered list of pure detectors and takes the first
//! answer. The file extension is consulted first; content heuristics only
//! run for files whose extension says nothing.

use std::path::Path;

use provenance_contracts::manifest::Framework;

/// A detector sees the path and, for UTF-8 files, the text.
type Detector = fn(&Path, Option<&str>) -> Option<Framework>;

const DETECTORS: &[Detector] = &[by_extension, looks_like_rego, looks_like_json, looks_like_datalog, looks_like_yaml];

/// Classify a file.
pub fn detect(path: &Path, text: Option<&str>) -> Framework {
    DETECTORS
        .iter()
        .find_map(|detector| detector(path, text))
        .unwrap_or(Framework::Unknown)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_json_lines(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("jsonl" | "ndjson"))
}

fn by_extension(path: &Path, _: Option<&str>) -> Option<Framework> {
    match extension(path)?.as_str() {
        "rego" => Some(Framework::Rego),
        "json" | "jsonl" | "ndjson" => Some(Framework::Json),
        "yaml" | "yml" => Some(Framework::Yaml),
        "dl" | "datalog" => Some(Framework::Datalog),
        _ => None,
    }
}

fn code_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('%'))
}

fn looks_like_rego(_: &Path, text: Option<&str>) -> Option<Framework> {
    let mut lines = code_lines(text?);
    let first = lines.next()?;
    first.starts_with("package ").then_some(Framework::Rego)
}

fn looks_like_json(_: &Path, text: Option<&str>) -> Option<Framework> {
    let trimmed = text?.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    let parses = serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        || code_lines(trimmed).all(|line| serde_json::from_str::<serde_json::Value>(line).is_ok());
    parses.then_some(Framework::Json)
}

fn looks_like_datalog(_: &Path, text: Option<&str>) -> Option<Framework> {
    let text = text?;
    let has_rule = text.contains(":-");
    let clauses_terminated = code_lines(text).all(|line| line.ends_with('.') || line.ends_with(','));
    (has_rule && clauses_terminated).then_some(Framework::Datalog)
}

fn looks_like_yaml(_: &Path, text: Option<&str>) -> Option<Framework> {
    let mut lines = code_lines(text?).peekable();
    lines.peek()?;
    let yamlish = lines.all(|line| {
        line == "---" || line.starts_with("- ") || line.split_once(": ").is_some() || line.ends_with(':')
    });
    yamlish.then_some(Framework::Yaml)
}

/// Number of logical records in a file of the given framework.
pub fn count_records(framework: Framework, path: &Path, text: Option<&str>, size: u64) -> u64 {
    let Some(text) = text else {
        return u64::from(size > 0);
    };
    match framework {
        Framework::Json if is_json_lines(path) || serde_json::from_str::<serde_json::Value>(text).is_err() => {
            text.lines().filter(|line| !line.trim().is_empty()).count() as u64
        }
        Framework::Json => 1,
        Framework::Yaml => {
            let mut documents = 0u64;
            let mut current_has_content = false;
            for line in text.lines() {
                if line.trim_end() == "---" {
                    documents += u64::from(current_has_content);
                    current_has_content = false;
                } else if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                    current_has_content = true;
                }
            }
            (documents + u64::from(current_has_content)).max(1)
        }
        Framework::Rego => {
            let rules = code_lines(text)
                .filter(|line| {
                    ["package", "allow", "deny"].iter().any(|keyword| {
                        line.strip_prefix(keyword)
                            .is_some_and(|rest| rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
                    })
                })
                .count() as u64;
            rules.max(1)
        }
        Framework::Datalog => (code_lines(text).filter(|line| line.ends_with('.')).count() as u64).max(1),
        Framework::Unknown => u64::from(size > 0),
    }
}
