//! Phase 4: Build the call graph.
//!
//! Each file is re-scanned on masked text. A line belongs to the innermost
//! symbol whose span contains it, and every call-like token on that line is
//! resolved to a symbol id:
//!
//! 1. same file, same enclosing type as the caller
//! 2. same file, module level
//! 3. same file, any scope
//! 4. first global definition of the simple name (sorted path, then source order)
//!
//! Step 4 is ambiguous when several files define the same simple name.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::extraction::ExtractedFile;
use crate::graph::dependency_graph::DependencyGraph;
use crate::graph::symbol_table::{SymbolDefinition, SymbolTable};
use crate::languages::mask::mask_source;
use crate::languages::scope::function_span;
use crate::languages::ParserRegistry;

static CALL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\(").unwrap());

/// Symbol table, resolved edges and the graph built from them.
#[derive(Debug, Default)]
pub struct CallGraphBuild {
    pub table: SymbolTable,
    /// Every known symbol id mapped to its callees in first-seen order.
    pub callees: BTreeMap<String, Vec<String>>,
    pub graph: DependencyGraph,
}

impl CallGraphBuild {
    pub fn edge_count(&self) -> usize {
        self.callees.values().map(Vec::len).sum()
    }

    /// Ids that appear as a callee anywhere.
    pub fn called(&self) -> HashSet<&str> {
        self.callees
            .values()
            .flat_map(|v| v.iter().map(String::as_str))
            .collect()
    }
}

/// Run the calls phase. `files` must be sorted by path.
pub fn run_calls_phase(files: &[ExtractedFile], registry: &ParserRegistry) -> CallGraphBuild {
    let mut build = CallGraphBuild::default();

    for file in files {
        build
            .table
            .add_file(&file.source.path, &file.extraction.functions);
    }
    for file in files {
        for defn in build.table.symbols_in_file(&file.source.path) {
            build.graph.add_node(&defn.symbol_id);
            build.callees.insert(defn.symbol_id.clone(), Vec::new());
        }
    }

    for file in files {
        let path = file.source.path.as_str();
        let Some(parser) = registry.parser_for_path(path) else {
            continue;
        };
        let defns = build.table.symbols_in_file(path);
        if defns.is_empty() {
            continue;
        }

        let view = parser.source_view(path, &file.source.content);
        let masked = mask_source(&view, parser.comment_syntax());
        let lines: Vec<&str> = masked.split('\n').collect();
        let owners = line_owners(defns, &lines, |start| {
            function_span(parser.span_style(), &lines, start)
        });
        let stoplist = parser.call_stoplist();

        for (i, line) in lines.iter().enumerate() {
            let Some(caller) = owners.get(i).copied().flatten() else {
                continue;
            };
            let caller = &defns[caller];
            for cap in CALL_TOKEN.captures_iter(line) {
                let Some(token) = cap.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if stoplist.contains(token) {
                    continue;
                }
                if i + 1 == caller.line && token == caller.simple_name {
                    continue;
                }
                let Some(callee) = resolve_call(&build.table, path, caller, token) else {
                    continue;
                };
                if callee == caller.symbol_id {
                    continue;
                }
                let list = build.callees.entry(caller.symbol_id.clone()).or_default();
                if !list.iter().any(|c| c == callee) {
                    list.push(callee.to_string());
                    build.graph.add_edge(&caller.symbol_id, callee);
                }
            }
        }
    }

    log::debug!(
        "calls: {} symbols, {} edges",
        build.table.len(),
        build.edge_count()
    );
    build
}

/// Index of the innermost definition owning each line.
///
/// A span that cannot be walked covers only the declaration line.
fn line_owners<F>(defns: &[SymbolDefinition], lines: &[&str], span_of: F) -> Vec<Option<usize>>
where
    F: Fn(usize) -> Option<(usize, usize)>,
{
    let mut spans: Vec<(usize, usize, usize)> = defns
        .iter()
        .enumerate()
        .filter(|(_, d)| d.line >= 1 && d.line <= lines.len())
        .map(|(idx, d)| {
            let start = d.line - 1;
            let (s, e) = span_of(start).unwrap_or((start, start));
            (s, e.min(lines.len().saturating_sub(1)), idx)
        })
        .collect();
    // Outer spans first so inner ones overwrite them
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut owners = vec![None; lines.len()];
    for (start, end, idx) in spans {
        for owner in owners.iter_mut().take(end + 1).skip(start) {
            *owner = Some(idx);
        }
    }
    owners
}

/// Resolve a call token made from `caller` in `file`.
pub fn resolve_call<'t>(
    table: &'t SymbolTable,
    file: &str,
    caller: &SymbolDefinition,
    token: &str,
) -> Option<&'t str> {
    let local = table.lookup_in_file(file, token);
    let pick = local
        .iter()
        .find(|d| d.enclosing_type == caller.enclosing_type)
        .or_else(|| local.iter().find(|d| d.enclosing_type.is_none()))
        .or_else(|| local.first())
        .copied()
        .or_else(|| table.lookup_global(token).first());
    pick.map(|d| d.symbol_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileExtraction, SourceFile};
    use crate::languages::LanguageParser;
    use pretty_assertions::assert_eq;

    fn extracted(path: &str, content: &str) -> ExtractedFile {
        let registry = ParserRegistry::with_builtins();
        let parser = registry.parser_for_path(path).unwrap();
        let functions = parser.extract_symbols(content, path);
        ExtractedFile {
            source: SourceFile {
                path: path.to_string(),
                language: Some(parser.name().to_string()),
                content: content.to_string(),
                content_hash: String::new(),
                was_truncated: false,
            },
            extraction: FileExtraction {
                functions,
                ..Default::default()
            },
            pattern_version: 1,
            from_cache: false,
        }
    }

    fn calls(build: &CallGraphBuild, id: &str) -> Vec<String> {
        build.callees.get(id).cloned().unwrap_or_default()
    }

    #[test]
    fn cross_file_call_resolves_globally() {
        let files = vec![
            extracted("a.py", "def helper():\n    pass\n"),
            extracted("b.py", "from a import helper\n\ndef main():\n    helper()\n"),
        ];
        let build = run_calls_phase(&files, &ParserRegistry::with_builtins());
        assert_eq!(calls(&build, "b.py::main"), vec!["a.py::helper"]);
        assert!(build.graph.has_edge("b.py::main", "a.py::helper"));
        assert_eq!(calls(&build, "a.py::helper"), Vec::<String>::new());
    }

    #[test]
    fn member_call_prefers_own_type() {
        let src = "\
def save():
    pass

class Store:
    def save(self):
        pass

    def flush(self):
        self.save()
        save()
";
        let files = vec![extracted("store.py", src)];
        let build = run_calls_phase(&files, &ParserRegistry::with_builtins());
        assert_eq!(calls(&build, "store.py::Store.flush"), vec!["store.py::Store.save"]);
    }

    #[test]
    fn nested_lines_belong_to_inner_function() {
        let src = "\
def outer():
    def inner():
        work()
    inner()

def work():
    pass
";
        let files = vec![extracted("n.py", src)];
        let build = run_calls_phase(&files, &ParserRegistry::with_builtins());
        assert_eq!(calls(&build, "n.py::outer"), vec!["n.py::inner"]);
        assert_eq!(calls(&build, "n.py::inner"), vec!["n.py::work"]);
    }

    #[test]
    fn recursion_strings_and_stoplist_are_ignored() {
        let src = "\
function walk(node) {
  if (node) { walk(node.next); }
  console.log(\"helper()\");
  // helper()
  return helper(node);
}
function helper(n) { return n; }
";
        let files = vec![extracted("w.js", src)];
        let build = run_calls_phase(&files, &ParserRegistry::with_builtins());
        assert_eq!(calls(&build, "w.js::walk"), vec!["w.js::helper"]);
        assert_eq!(build.edge_count(), 1);
    }

    #[test]
    fn duplicate_calls_collapse() {
        let files = vec![extracted(
            "d.py",
            "def a():\n    b()\n    b()\n\ndef b():\n    pass\n",
        )];
        let build = run_calls_phase(&files, &ParserRegistry::with_builtins());
        assert_eq!(calls(&build, "d.py::a"), vec!["d.py::b"]);
    }
}
