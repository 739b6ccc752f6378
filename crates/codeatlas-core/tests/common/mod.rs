//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use codeatlas_core::config::ScanConfig;
use codeatlas_core::output::ScanResult;
use codeatlas_core::pipeline;
use tempfile::TempDir;
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

/// Copy a fixture into a scratch directory tests may modify.
pub fn copy_fixture(name: &str) -> TempDir {
    let src = fixture_path(name);
    let dir = tempfile::tempdir().expect("create temp dir");
    for entry in WalkDir::new(&src) {
        let entry = entry.expect("walk fixture");
        let rel = entry.path().strip_prefix(&src).expect("fixture-relative path");
        let dest = dir.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).expect("create fixture dir");
        } else {
            fs::copy(entry.path(), &dest).expect("copy fixture file");
        }
    }
    dir
}

// ---------------------------------------------------------------------------
// Scan runners
// ---------------------------------------------------------------------------

/// Scan a fixture in place, without a cache.
pub fn scan_fixture(name: &str) -> ScanResult {
    scan_dir(&fixture_path(name), None)
}

pub fn scan_dir(root: &Path, cache: Option<&Path>) -> ScanResult {
    pipeline::scan(&ScanConfig::for_root(root), cache, None, None).expect("scan succeeds")
}

/// Callees recorded for one symbol id.
pub fn callees<'a>(result: &'a ScanResult, id: &str) -> Vec<&'a str> {
    result
        .call_graph
        .functions
        .get(id)
        .map(|v| v.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

/// `(from, to)` pairs of resolved import edges.
pub fn import_pairs(result: &ScanResult) -> Vec<(&str, &str)> {
    result
        .imports
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect()
}

/// Qualified names of the functions in one file.
pub fn function_names<'a>(result: &'a ScanResult, path: &str) -> Vec<&'a str> {
    result
        .file(path)
        .map(|f| f.functions.iter().map(|s| s.name.as_str()).collect())
        .unwrap_or_default()
}
