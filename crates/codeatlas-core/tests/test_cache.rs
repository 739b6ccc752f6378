//! Incremental cache integration tests.

mod common;

use codeatlas_core::cache::{
    content_hash, legacy_content_hash, CacheStore, HashKind, CACHE_SCHEMA_VERSION, DEFAULT_CACHE_FILE,
};
use codeatlas_core::error::WarningKind;
use codeatlas_core::languages::python;
use common::*;
use serde_json::json;

// ===========================================================================
// Hits and misses
// ===========================================================================

#[test]
fn second_scan_is_served_from_cache() {
    let tree = copy_fixture("python_app");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");

    let first = scan_dir(tree.path(), Some(&cache));
    assert_eq!(first.stats.cache_hits, 0);
    assert_eq!(first.stats.cache_misses, first.stats.files);
    assert!(cache.exists(), "Cache store should be written");

    let second = scan_dir(tree.path(), Some(&cache));
    assert_eq!(second.stats.cache_hits, second.stats.files);
    assert_eq!(second.stats.cache_misses, 0);
    assert_eq!(second.files, first.files);
    assert_eq!(second.call_graph, first.call_graph);
}

#[test]
fn same_size_edit_is_a_miss() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    scan_dir(tree.path(), Some(&cache));

    let a = tree.path().join("a.py");
    let before = std::fs::read_to_string(&a).unwrap();
    let after = before.replace("helper", "helpex");
    assert_eq!(before.len(), after.len());
    std::fs::write(&a, after).unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert_eq!(result.stats.cache_misses, 1);
    assert_eq!(result.stats.cache_hits, 1);
    assert_eq!(function_names(&result, "a.py"), vec!["helpex"]);
    assert!(callees(&result, "b.py::main").is_empty());
}

#[test]
fn vanished_files_are_pruned_from_store() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    scan_dir(tree.path(), Some(&cache));

    std::fs::remove_file(tree.path().join("a.py")).unwrap();
    scan_dir(tree.path(), Some(&cache));

    let (loaded, warnings) = CacheStore::load(&cache).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(loaded.len(), 1);
    assert!(loaded.get("a.py").is_none());
    assert!(loaded.get("b.py").is_some());
}

#[test]
fn default_store_inside_root_is_not_scanned() {
    let tree = copy_fixture("python_pair");
    let cache = tree.path().join(DEFAULT_CACHE_FILE);
    scan_dir(tree.path(), Some(&cache));
    let result = scan_dir(tree.path(), Some(&cache));
    assert_eq!(result.stats.files, 2);
    assert_eq!(result.stats.cache_hits, 2);
}

// ===========================================================================
// Legacy and broken stores
// ===========================================================================

/// A pre-2 store: entries sit beside `_`-prefixed marker keys and carry a
/// 16-digit sha256 prefix of the decoded text.
fn flat_v1_store(entries: serde_json::Value) -> serde_json::Value {
    let mut root = json!({
        "_schema_version": "1.0",
        "_created_at": "2024-01-01T00:00:00+00:00",
    });
    for (path, entry) in entries.as_object().unwrap() {
        root[path] = entry.clone();
    }
    root
}

#[test]
fn legacy_store_is_upgraded_and_reused() {
    let tree = copy_fixture("python_pair");
    let bytes = std::fs::read(tree.path().join("a.py")).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    let legacy = flat_v1_store(json!({
        "a.py": {
            "mtime": 1700000000.0,
            "size": bytes.len(),
            "contentHash": legacy_content_hash(&text),
            "parsedAt": "2024-01-01T00:00:00Z",
            "funcs": [{ "name": "helper", "line": 1, "scope": "module" }],
            "meta": { "lang": "Python" }
        }
    }));
    std::fs::write(&cache, legacy.to_string()).unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert!(
        result.warnings.iter().any(|w| w.kind == WarningKind::CacheUpgraded),
        "Expected an upgrade warning: {:?}",
        result.warnings
    );
    assert_eq!(result.stats.cache_hits, 1);
    assert_eq!(result.stats.cache_misses, 1);
    assert_eq!(callees(&result, "b.py::main"), vec!["a.py::helper"]);

    let (reloaded, warnings) = CacheStore::load(&cache).unwrap();
    assert!(warnings.is_empty(), "Saved store should be current: {warnings:?}");
    assert_eq!(reloaded.schema_version(), CACHE_SCHEMA_VERSION);
    let entry = reloaded.get("a.py").expect("legacy entry kept");
    assert_eq!(entry.hash_kind, HashKind::Blake3, "Legacy hit is rewritten");
    assert_eq!(entry.content_hash, content_hash(&bytes));
    assert_eq!(entry.pattern_version, Some(python::PATTERN_VERSION));

    let third = scan_dir(tree.path(), Some(&cache));
    assert_eq!(third.stats.cache_hits, 2);
}

#[test]
fn legacy_entry_for_edited_file_is_a_miss() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    let legacy = flat_v1_store(json!({
        "a.py": {
            "contentHash": legacy_content_hash("def old():\n    pass\n"),
            "funcs": [{ "name": "old", "line": 1 }],
            "meta": { "lang": "Python" }
        }
    }));
    std::fs::write(&cache, legacy.to_string()).unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert_eq!(result.stats.cache_hits, 0);
    assert_eq!(function_names(&result, "a.py"), vec!["helper"]);
}

#[test]
fn entries_from_other_pattern_revisions_are_reparsed() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    scan_dir(tree.path(), Some(&cache));

    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cache).unwrap()).unwrap();
    raw["entries"]["a.py"]["patternVersion"] = json!(python::PATTERN_VERSION + 1);
    std::fs::write(&cache, raw.to_string()).unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert_eq!(result.stats.cache_misses, 1);
    assert_eq!(result.stats.cache_hits, 1);
    let (reloaded, _) = CacheStore::load(&cache).unwrap();
    assert_eq!(
        reloaded.get("a.py").unwrap().pattern_version,
        Some(python::PATTERN_VERSION)
    );
}

#[test]
fn malformed_store_degrades_to_warning() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    let cache = store.path().join("cache.json");
    std::fs::write(&cache, "{ not json").unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::CacheUnavailable));
    assert_eq!(result.stats.cache_misses, 2);
    assert_eq!(import_pairs(&result), vec![("b.py", "a.py")]);
}

#[test]
fn unwritable_store_location_still_scans() {
    let tree = copy_fixture("python_pair");
    let store = tempfile::tempdir().unwrap();
    // A directory where the store file should be.
    let cache = store.path().join("taken");
    std::fs::create_dir(&cache).unwrap();

    let result = scan_dir(tree.path(), Some(&cache));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::CacheUnavailable));
    assert_eq!(result.stats.files, 2);
}
