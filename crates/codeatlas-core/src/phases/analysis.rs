//! Phase 5: Dead-symbol detection over the call graph.

use std::collections::HashSet;

use super::calls::CallGraphBuild;
use super::extraction::ExtractedFile;
use crate::config::{EntryPoint, ScopeKind};

/// Why a symbol that is never called is still not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    EntryPoint,
    ModuleScope,
    TestMarker,
    Dunder,
    Exported,
}

/// Symbol ids never called and not exempt, sorted.
pub fn find_dead_symbols(
    files: &[ExtractedFile],
    calls: &CallGraphBuild,
    entry_points: &[EntryPoint],
    test_marker: &str,
) -> Vec<String> {
    let called = calls.called();
    let entry_names: HashSet<&str> = entry_points.iter().map(|e| e.name.as_str()).collect();
    let marker = test_marker.to_ascii_lowercase();

    let mut dead = Vec::new();
    for file in files {
        let path = file.source.path.as_str();
        for (symbol, defn) in file
            .extraction
            .functions
            .iter()
            .zip(calls.table.symbols_in_file(path))
        {
            if called.contains(defn.symbol_id.as_str()) {
                continue;
            }
            let exemption = exemption_for(
                &defn.name,
                &defn.simple_name,
                defn.scope,
                symbol.exported,
                path,
                &entry_names,
                &marker,
            );
            if exemption.is_none() {
                dead.push(defn.symbol_id.clone());
            }
        }
    }
    dead.sort();
    log::debug!("analysis: {} dead symbols", dead.len());
    dead
}

/// First exemption that applies, in a fixed order.
///
/// Entry points match by name, either the qualified or the simple one.
pub fn exemption_for(
    name: &str,
    simple_name: &str,
    scope: ScopeKind,
    exported: bool,
    path: &str,
    entry_names: &HashSet<&str>,
    test_marker: &str,
) -> Option<Exemption> {
    if entry_names.contains(name) || entry_names.contains(simple_name) {
        return Some(Exemption::EntryPoint);
    }
    if scope == ScopeKind::Module {
        return Some(Exemption::ModuleScope);
    }
    if !test_marker.is_empty()
        && (simple_name.to_ascii_lowercase().contains(test_marker)
            || path.to_ascii_lowercase().contains(test_marker))
    {
        return Some(Exemption::TestMarker);
    }
    if is_dunder(simple_name) {
        return Some(Exemption::Dunder);
    }
    if exported {
        return Some(Exemption::Exported);
    }
    None
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryPointKind;

    fn names<'a>(eps: &'a [EntryPoint]) -> HashSet<&'a str> {
        eps.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn exemptions_apply_in_order() {
        let eps = vec![EntryPoint::new(EntryPointKind::HttpRoute, "index", "app.py", 3)];
        let entry = names(&eps);
        let check = |name: &str, scope, exported, path: &str| {
            let simple = name.rsplit('.').next().unwrap_or(name);
            exemption_for(name, simple, scope, exported, path, &entry, "test")
        };
        assert_eq!(check("Views.index", ScopeKind::Class, false, "app.py"), Some(Exemption::EntryPoint));
        assert_eq!(check("helper", ScopeKind::Module, false, "app.py"), Some(Exemption::ModuleScope));
        assert_eq!(check("T.test_it", ScopeKind::Class, false, "app.py"), Some(Exemption::TestMarker));
        assert_eq!(check("T.run", ScopeKind::Class, false, "tests/app.py"), Some(Exemption::TestMarker));
        assert_eq!(check("T.TestCase", ScopeKind::Class, false, "app.py"), Some(Exemption::TestMarker));
        assert_eq!(check("T.__init__", ScopeKind::Class, false, "app.py"), Some(Exemption::Dunder));
        assert_eq!(check("T.api", ScopeKind::Class, true, "app.py"), Some(Exemption::Exported));
        assert_eq!(check("T.orphan", ScopeKind::Class, false, "app.py"), None);
        assert_eq!(check("inner", ScopeKind::Nested, false, "app.py"), None);
    }

    #[test]
    fn dunder_needs_a_body() {
        assert!(is_dunder("__str__"));
        assert!(!is_dunder("____"));
        assert!(!is_dunder("__private"));
    }
}
