//! Import resolution integration tests.

mod common;

use codeatlas_core::phases::imports::UnresolvedKind;
use common::*;

// ===========================================================================
// Python packages
// ===========================================================================

#[test]
fn relative_imports_resolve_within_package() {
    let result = scan_fixture("python_app");
    let pairs = import_pairs(&result);
    for expected in [
        ("app/main.py", "app/models.py"),
        ("app/main.py", "app/service.py"),
        ("app/models.py", "app/service.py"),
        ("app/service.py", "app/models.py"),
    ] {
        assert!(pairs.contains(&expected), "Missing edge {expected:?} in {pairs:?}");
    }
}

#[test]
fn absolute_dotted_import_resolves_from_root() {
    let result = scan_fixture("python_app");
    let edge = result
        .imports
        .iter()
        .find(|e| e.from == "tests/test_models.py")
        .expect("test module import edge");
    assert_eq!(edge.to, "app/models.py");
    assert_eq!(edge.import_path, "app.models");
}

#[test]
fn stdlib_import_stays_unresolved() {
    let result = scan_fixture("python_app");
    let sys = result
        .unresolved_imports
        .iter()
        .find(|u| u.import_path == "sys")
        .expect("sys recorded as unresolved");
    assert_eq!(sys.from, "app/main.py");
    assert_eq!(sys.kind, UnresolvedKind::External);
}

#[test]
fn edges_are_unique_and_never_self_loops() {
    let result = scan_fixture("python_app");
    let pairs = import_pairs(&result);
    let mut unique = pairs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), pairs.len(), "Duplicate import edges: {pairs:?}");
    assert!(pairs.iter().all(|(from, to)| from != to));
    assert_eq!(result.stats.import_edges, pairs.len());
}

// ===========================================================================
// JavaScript and TypeScript
// ===========================================================================

#[test]
fn js_relative_imports_probe_extensions_and_index_files() {
    let result = scan_fixture("js_web");
    let pairs = import_pairs(&result);
    for expected in [
        ("src/index.js", "src/util.js"),
        ("src/index.js", "src/components/index.ts"),
        ("src/components/index.ts", "src/util.js"),
    ] {
        assert!(pairs.contains(&expected), "Missing edge {expected:?} in {pairs:?}");
    }
    assert!(result.circular_imports.is_empty());
}

#[test]
fn js_package_import_is_external() {
    let result = scan_fixture("js_web");
    let react = result
        .unresolved_imports
        .iter()
        .find(|u| u.import_path == "react")
        .expect("react recorded as unresolved");
    assert_eq!(react.kind, UnresolvedKind::External);
    let index = result.file("src/index.js").expect("index.js record");
    assert_eq!(index.imports.external, vec!["react".to_string()]);
}

#[test]
fn dangling_relative_import_is_unresolved() {
    let dir = copy_fixture("js_web");
    std::fs::write(
        dir.path().join("src/broken.js"),
        "import { gone } from './missing';\n",
    )
    .unwrap();
    let result = scan_dir(dir.path(), None);
    let broken = result
        .unresolved_imports
        .iter()
        .find(|u| u.from == "src/broken.js")
        .expect("dangling import recorded");
    assert_eq!(broken.import_path, "./missing");
    assert_eq!(broken.kind, UnresolvedKind::Unresolved);
}
