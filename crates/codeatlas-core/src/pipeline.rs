//! Sequential phase orchestrator with timing.
//!
//! Only extraction runs in parallel. Every cross-file phase starts after the
//! extraction join, on the single owner that also merges the cache.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Instant;

use crate::cache::CacheStore;
use crate::config::{ScanConfig, WorkspaceTable};
use crate::error::{ScanError, ScanWarning, WarningKind};
use crate::graph::cycles::find_cycles;
use crate::languages::ParserRegistry;
use crate::output::{CallGraphReport, FileRecord, ScanResult, ScanStats};
use crate::phases;

/// Phase labels for progress reporting.
pub const PHASE_LABELS: &[(&str, &str)] = &[
    ("structure", "Mapping file tree"),
    ("extraction", "Extracting symbols"),
    ("imports", "Resolving imports"),
    ("calls", "Building call graph"),
    ("analysis", "Finding cycles and dead code"),
    ("complexity", "Scoring complexity"),
    ("workspaces", "Mapping workspaces"),
];

/// Progress callback type: (phase_name, label).
pub type ProgressCallback = Box<dyn FnMut(&str, &str)>;

/// Collaborators a scan reads from. The cache is updated in place.
pub struct ScanInputs<'a> {
    pub registry: &'a ParserRegistry,
    pub cache: &'a mut CacheStore,
    pub workspaces: Option<&'a WorkspaceTable>,
}

struct PhaseClock {
    progress: Option<ProgressCallback>,
    timings: BTreeMap<String, f64>,
}

impl PhaseClock {
    fn run<T>(&mut self, name: &str, phase: impl FnOnce() -> T) -> T {
        if let Some(ref mut cb) = self.progress {
            let label = PHASE_LABELS
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, l)| *l)
                .unwrap_or(name);
            cb(name, label);
        }
        let start = Instant::now();
        let out = phase();
        self.timings
            .insert(name.to_string(), start.elapsed().as_secs_f64());
        out
    }
}

/// Execute every phase and return the whole-tree result.
///
/// Fails only when the tree cannot be enumerated or the worker pool
/// cannot start.
pub fn run_pipeline(
    config: &ScanConfig,
    inputs: ScanInputs<'_>,
    progress: Option<ProgressCallback>,
) -> Result<ScanResult, ScanError> {
    let ScanInputs {
        registry,
        cache,
        workspaces,
    } = inputs;
    let mut clock = PhaseClock {
        progress,
        timings: BTreeMap::new(),
    };
    let total_start = Instant::now();
    let mut result = ScanResult::new(&config.root);

    let listing = clock.run("structure", || phases::structure::run_structure_phase(config))?;
    result.warnings.extend(listing.warnings.iter().cloned());

    let snapshot: &CacheStore = &*cache;
    let extraction = clock.run("extraction", || {
        phases::extraction::run_extraction_phase(config, &listing.files, registry, snapshot)
    })?;

    // Single owner: merge into the cache, then prune vanished paths.
    // Upgraded entries that hit are rewritten under the current digest.
    let refreshed: Vec<_> = extraction
        .files
        .iter()
        .filter(|f| !f.from_cache || cache.is_legacy(&f.source.path))
        .collect();
    for file in refreshed {
        cache.store(
            &file.source.path,
            &file.source.content_hash,
            file.pattern_version,
            file.extraction.clone(),
        );
    }
    let live: HashSet<String> = listing.files.iter().map(|f| f.path.clone()).collect();
    let pruned = cache.retain_paths(&live);
    if pruned > 0 {
        log::debug!("pruned {pruned} cache entries for vanished files");
    }
    result.warnings.extend(extraction.warnings.iter().cloned());

    let files = &extraction.files;
    let imports = clock.run("imports", || {
        phases::imports::run_imports_phase(files, &live, registry)
    });
    let calls = clock.run("calls", || phases::calls::run_calls_phase(files, registry));

    let entry_points: Vec<_> = files
        .iter()
        .flat_map(|f| f.extraction.meta.entry_points.iter().cloned())
        .collect();

    let call_graph = clock.run("analysis", || {
        let dead = phases::analysis::find_dead_symbols(
            files,
            &calls,
            &entry_points,
            &config.test_marker,
        );
        let circular = find_cycles(&calls.graph);
        CallGraphReport::new(calls.callees.clone(), circular, dead)
    });
    let complexity = clock.run("complexity", || {
        phases::complexity::run_complexity_phase(files, registry)
    });
    if let Some(table) = workspaces {
        result.workspaces = clock.run("workspaces", || {
            phases::workspaces::analyze_workspaces(table)
        });
    }

    result.stats = ScanStats {
        files: files.len(),
        functions: calls.table.len(),
        import_edges: imports.resolved.len(),
        call_edges: call_graph.stats.total_edges,
        cache_hits: extraction.cache_hits,
        cache_misses: extraction.cache_misses,
        skipped: extraction.skipped,
    };
    result.files = files.iter().map(FileRecord::from_extracted).collect();
    result.imports = imports.resolved;
    result.unresolved_imports = imports.unresolved;
    result.circular_imports = imports.circular;
    result.call_graph = call_graph;
    result.complexity = complexity;
    result.entry_points = entry_points;
    result.phase_timings = clock.timings;

    log::info!(
        "scanned {} files ({} functions, {} import edges, {} call edges) in {:.2}s",
        result.stats.files,
        result.stats.functions,
        result.stats.import_edges,
        result.stats.call_edges,
        total_start.elapsed().as_secs_f64()
    );
    Ok(result)
}

/// Scan with the built-in parsers, loading and saving a cache file.
///
/// An unreadable or unwritable cache degrades to a warning.
pub fn scan(
    config: &ScanConfig,
    cache_path: Option<&Path>,
    workspaces: Option<&WorkspaceTable>,
    progress: Option<ProgressCallback>,
) -> Result<ScanResult, ScanError> {
    let registry = ParserRegistry::with_builtins();
    let mut warnings = Vec::new();

    let mut cache = match cache_path {
        Some(path) => match CacheStore::load(path) {
            Ok((store, load_warnings)) => {
                warnings.extend(load_warnings);
                store
            }
            Err(e) => {
                warnings.push(ScanWarning::new(WarningKind::CacheUnavailable, None, e.to_string()));
                CacheStore::new()
            }
        },
        None => CacheStore::new(),
    };

    let mut result = run_pipeline(
        config,
        ScanInputs {
            registry: &registry,
            cache: &mut cache,
            workspaces,
        },
        progress,
    )?;

    if let Some(path) = cache_path {
        if let Err(e) = cache.save(path) {
            warnings.push(ScanWarning::new(WarningKind::CacheUnavailable, None, e.to_string()));
        }
    }
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn progress_reports_every_phase_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.py"), "def f():\n    pass\n").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let cb: ProgressCallback = Box::new(move |name: &str, _label: &str| sink.borrow_mut().push(name.to_string()));

        let table = WorkspaceTable::default();
        let result = scan(&ScanConfig::for_root(dir.path()), None, Some(&table), Some(cb)).unwrap();
        let names: Vec<&str> = PHASE_LABELS.iter().map(|(n, _)| *n).collect();
        assert_eq!(*seen.borrow(), names);
        assert_eq!(result.phase_timings.len(), names.len());
        assert!(result.workspaces.is_none());
    }

    #[test]
    fn cache_is_merged_and_pruned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.py"), "def k():\n    pass\n").unwrap();
        let mut cache = CacheStore::new();
        cache.store("gone.py", "deadbeef", 1, Default::default());
        let registry = ParserRegistry::with_builtins();

        let result = run_pipeline(
            &ScanConfig::for_root(dir.path()),
            ScanInputs {
                registry: &registry,
                cache: &mut cache,
                workspaces: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(result.stats.cache_misses, 1);
        assert!(cache.get("keep.py").is_some());
        assert!(cache.get("gone.py").is_none());
    }

    #[test]
    fn unreadable_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(scan(&ScanConfig::for_root(&missing), None, None, None).is_err());
    }
}
