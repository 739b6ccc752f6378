//! Phase 3: Import resolution.
//!
//! Every raw import token of every file is resolved against the set of
//! files in the tree. Tokens that do not resolve are kept as unresolved
//! records, never dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::extraction::ExtractedFile;
use crate::graph::cycles::find_cycles;
use crate::graph::dependency_graph::DependencyGraph;
use crate::languages::{ImportSyntax, LanguageParser, ParserRegistry};

/// Directory names treated as conventional source roots.
const SOURCE_ROOTS: &[&str] = &["src", "lib", "app", "pkg"];

/// A resolved file-to-file import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub from: String,
    pub to: String,
    pub import_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedKind {
    /// A package outside the tree.
    External,
    /// Relative syntax that names no file in the tree.
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedImport {
    pub from: String,
    pub import_path: String,
    pub kind: UnresolvedKind,
}

/// Everything the import phase produces.
#[derive(Debug, Default)]
pub struct ImportResolution {
    /// Resolved edges, unique by `(from, to)`, without self-edges.
    pub resolved: Vec<ImportRecord>,
    pub unresolved: Vec<UnresolvedImport>,
    pub circular: Vec<Vec<String>>,
    pub graph: DependencyGraph,
}

/// Run the imports phase over extracted files in path order.
///
/// `file_set` holds every relative path in the tree, including files no
/// parser handles, so imports of assets and documents still resolve.
pub fn run_imports_phase(
    files: &[ExtractedFile],
    file_set: &HashSet<String>,
    registry: &ParserRegistry,
) -> ImportResolution {
    let mut out = ImportResolution::default();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

    for file in files {
        let from = file.source.path.as_str();
        let Some(parser) = registry.parser_for_path(from) else {
            continue;
        };
        out.graph.add_node(from);

        let imports = &file.extraction.meta.imports;
        for token in imports.internal.iter().chain(&imports.external) {
            match resolve_import(token, from, file_set, parser) {
                Some(target) => {
                    if target != from && seen_pairs.insert((from.to_string(), target.clone())) {
                        out.graph.add_edge(from, &target);
                        out.resolved.push(ImportRecord {
                            from: from.to_string(),
                            to: target,
                            import_path: token.clone(),
                        });
                    }
                }
                None => out.unresolved.push(UnresolvedImport {
                    from: from.to_string(),
                    import_path: token.clone(),
                    kind: if parser.is_relative_import(token) {
                        UnresolvedKind::Unresolved
                    } else {
                        UnresolvedKind::External
                    },
                }),
            }
        }
    }

    out.circular = find_cycles(&out.graph);
    log::debug!(
        "imports: {} resolved, {} unresolved, {} cycles",
        out.resolved.len(),
        out.unresolved.len(),
        out.circular.len()
    );
    out
}

/// Resolve one import token written in `from` to a file in `file_set`.
pub fn resolve_import(
    token: &str,
    from: &str,
    file_set: &HashSet<String>,
    parser: &dyn LanguageParser,
) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let dir = parent_dir(from);

    match parser.import_syntax() {
        ImportSyntax::Dotted if token.starts_with('.') => {
            let dots = token.chars().take_while(|&c| c == '.').count();
            let mut base = dir.to_string();
            for _ in 1..dots {
                base = parent_dir(&base).to_string();
            }
            let rest = token[dots..].replace('.', "/");
            probe(&join(&base, &rest), file_set, parser)
        }
        ImportSyntax::Path if token.starts_with('.') => {
            let base = normalize_path(&join(dir, token))?;
            probe(&base, file_set, parser)
        }
        ImportSyntax::Path if token.starts_with('/') => {
            let base = normalize_path(token.trim_start_matches('/'))?;
            probe(&base, file_set, parser)
        }
        syntax => {
            let module = match syntax {
                ImportSyntax::Dotted => token.replace('.', "/"),
                ImportSyntax::Path => token.to_string(),
            };
            let mut candidates = vec![module.clone(), join(dir, &module)];
            if let Some(root) = source_root_ancestor(dir) {
                candidates.push(join(root, &module));
            }
            candidates
                .iter()
                .filter_map(|c| normalize_path(c))
                .find_map(|c| probe(&c, file_set, parser))
        }
    }
}

/// First suffix variant of `base` present in the tree.
fn probe(base: &str, file_set: &HashSet<String>, parser: &dyn LanguageParser) -> Option<String> {
    parser.module_suffixes().iter().find_map(|suffix| {
        let candidate = if base.is_empty() {
            suffix.trim_start_matches('/').to_string()
        } else {
            format!("{base}{suffix}")
        };
        (!candidate.is_empty() && file_set.contains(&candidate)).then_some(candidate)
    })
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join(dir: &str, rest: &str) -> String {
    match (dir.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{dir}/{rest}"),
    }
}

/// Deepest ancestor of `dir` (itself included) named like a source root.
fn source_root_ancestor(dir: &str) -> Option<&str> {
    let mut current = dir;
    while !current.is_empty() {
        let name = current.rsplit('/').next().unwrap_or(current);
        if SOURCE_ROOTS.contains(&name) {
            return Some(current);
        }
        current = parent_dir(current);
    }
    None
}

/// Collapse `.` and `..` segments. `None` when the path climbs above the root.
fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(segment),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{javascript::JavaScriptParser, python::PythonParser};
    use pretty_assertions::assert_eq;

    fn tree(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn normalize_collapses_and_rejects_escape() {
        assert_eq!(normalize_path("a/./b/../c"), Some("a/c".to_string()));
        assert_eq!(normalize_path("../x"), None);
    }

    #[test]
    fn python_absolute_and_package() {
        let files = tree(&["a.py", "pkg/__init__.py", "pkg/util.py"]);
        let py = PythonParser::new();
        assert_eq!(resolve_import("a", "b.py", &files, &py), Some("a.py".to_string()));
        assert_eq!(resolve_import("pkg", "b.py", &files, &py), Some("pkg/__init__.py".to_string()));
        assert_eq!(resolve_import("pkg.util", "b.py", &files, &py), Some("pkg/util.py".to_string()));
        assert_eq!(resolve_import("requests", "b.py", &files, &py), None);
    }

    #[test]
    fn python_relative_walks_up_per_dot() {
        let files = tree(&["app/core/models.py", "app/util.py", "app/core/views.py"]);
        let py = PythonParser::new();
        assert_eq!(
            resolve_import(".models", "app/core/views.py", &files, &py),
            Some("app/core/models.py".to_string())
        );
        assert_eq!(
            resolve_import("..util", "app/core/views.py", &files, &py),
            Some("app/util.py".to_string())
        );
    }

    #[test]
    fn python_same_dir_and_source_root() {
        let files = tree(&["src/proj/helpers.py", "src/proj/cli/main.py", "src/shared.py"]);
        let py = PythonParser::new();
        assert_eq!(
            resolve_import("helpers", "src/proj/x.py", &files, &py),
            Some("src/proj/helpers.py".to_string())
        );
        assert_eq!(
            resolve_import("shared", "src/proj/cli/main.py", &files, &py),
            Some("src/shared.py".to_string())
        );
    }

    #[test]
    fn js_relative_index_and_escape() {
        let files = tree(&["src/components/index.ts", "src/util.js", "src/app.jsx"]);
        let js = JavaScriptParser::new();
        assert_eq!(
            resolve_import("./components", "src/app.jsx", &files, &js),
            Some("src/components/index.ts".to_string())
        );
        assert_eq!(
            resolve_import("../util", "src/components/index.ts", &files, &js),
            Some("src/util.js".to_string())
        );
        assert_eq!(resolve_import("../../../x", "src/app.jsx", &files, &js), None);
        assert_eq!(resolve_import("/src/util", "a/b.js", &files, &js), Some("src/util.js".to_string()));
        assert_eq!(resolve_import("react", "src/app.jsx", &files, &js), None);
    }
}
