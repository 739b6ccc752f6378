//! Tree enumeration integration tests.

mod common;

use std::fs;

use codeatlas_core::config::ScanConfig;
use codeatlas_core::phases::structure::run_structure_phase;
use common::*;

fn listed(config: &ScanConfig) -> Vec<String> {
    run_structure_phase(config)
        .expect("listing succeeds")
        .files
        .into_iter()
        .map(|f| f.path)
        .collect()
}

#[test]
fn paths_are_relative_and_sorted() {
    let paths = listed(&ScanConfig::for_root(fixture_path("python_app")));
    assert_eq!(
        paths,
        vec![
            "app/__init__.py",
            "app/main.py",
            "app/models.py",
            "app/service.py",
            "tests/test_models.py",
        ]
    );
}

#[test]
fn default_excludes_and_hidden_dirs_are_skipped() {
    let dir = copy_fixture("python_pair");
    for sub in ["node_modules/pkg", ".git", "__pycache__", ".hidden"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    fs::write(dir.path().join("node_modules/pkg/index.js"), "export function x() {}\n").unwrap();
    fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    fs::write(dir.path().join("__pycache__/a.pyc"), "junk").unwrap();
    fs::write(dir.path().join(".hidden/secret.py"), "def s(): pass\n").unwrap();
    fs::write(dir.path().join(".env.py"), "def e(): pass\n").unwrap();

    let paths = listed(&ScanConfig::for_root(dir.path()));
    assert_eq!(paths, vec![".env.py", "a.py", "b.py"]);
}

#[test]
fn configured_excludes_apply() {
    let dir = copy_fixture("python_app");
    let mut config = ScanConfig::for_root(dir.path());
    config.exclude_names.push("tests".to_string());
    let paths = listed(&config);
    assert!(paths.iter().all(|p| !p.starts_with("tests/")), "Got: {paths:?}");
    assert_eq!(paths.len(), 4);
}

#[test]
fn unhandled_files_are_listed_but_not_recorded() {
    let dir = copy_fixture("python_pair");
    fs::write(dir.path().join("notes.txt"), "plain text\n").unwrap();
    let paths = listed(&ScanConfig::for_root(dir.path()));
    assert!(paths.contains(&"notes.txt".to_string()));

    let result = scan_dir(dir.path(), None);
    assert!(result.file("notes.txt").is_none());
    assert_eq!(result.stats.files, 2);
}

#[test]
fn file_as_root_is_fatal() {
    let path = fixture_path("python_pair").join("a.py");
    assert!(run_structure_phase(&ScanConfig::for_root(path)).is_err());
}
