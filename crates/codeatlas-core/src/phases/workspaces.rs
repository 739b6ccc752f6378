//! Workspace dependency graph for monorepos.
//!
//! The table comes from an external manifest scanner; this phase only
//! builds the graph, its reverse and its cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{WorkspaceNode, WorkspaceTable};
use crate::graph::cycles::find_cycles;
use crate::graph::dependency_graph::DependencyGraph;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStats {
    pub total_workspaces: usize,
    pub workspace_types: BTreeMap<String, usize>,
    pub internal_edges: usize,
    pub circular_dependency_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceReport {
    /// Sorted by name.
    pub workspaces: Vec<WorkspaceNode>,
    pub dependency_graph: BTreeMap<String, Vec<String>>,
    pub reverse_dependencies: BTreeMap<String, Vec<String>>,
    pub circular_dependencies: Vec<Vec<String>>,
    pub stats: WorkspaceStats,
}

/// Build the workspace report; `None` for an empty table.
///
/// Later entries with a repeated name replace earlier ones.
pub fn analyze_workspaces(table: &WorkspaceTable) -> Option<WorkspaceReport> {
    if table.workspaces.is_empty() {
        return None;
    }

    let by_name: BTreeMap<&str, &WorkspaceNode> = table
        .workspaces
        .iter()
        .map(|w| (w.name.as_str(), w))
        .collect();

    let mut report = WorkspaceReport::default();
    for (name, node) in &by_name {
        let mut deps = node.internal_dependencies.clone();
        deps.sort();
        deps.dedup();
        for dep in &deps {
            report
                .reverse_dependencies
                .entry(dep.clone())
                .or_default()
                .push(name.to_string());
        }
        *report
            .stats
            .workspace_types
            .entry(node.kind.clone())
            .or_default() += 1;
        report.dependency_graph.insert(name.to_string(), deps);
        report.workspaces.push((*node).clone());
    }
    for dependents in report.reverse_dependencies.values_mut() {
        dependents.sort();
    }

    let graph = DependencyGraph::from_adjacency(
        report
            .dependency_graph
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.iter().map(String::as_str))),
    );
    report.circular_dependencies = find_cycles(&graph);

    report.stats.total_workspaces = report.workspaces.len();
    report.stats.internal_edges = report.dependency_graph.values().map(Vec::len).sum();
    report.stats.circular_dependency_count = report.circular_dependencies.len();
    log::debug!(
        "workspaces: {} packages, {} cycles",
        report.stats.total_workspaces,
        report.stats.circular_dependency_count
    );
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str, kind: &str, deps: &[&str]) -> WorkspaceNode {
        WorkspaceNode {
            name: name.to_string(),
            path: format!("packages/{name}"),
            kind: kind.to_string(),
            external_dependencies: BTreeMap::new(),
            internal_dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn mutual_dependency_is_one_cycle() {
        let table = WorkspaceTable {
            schema_version: 1,
            workspaces: vec![node("B", "npm", &["A"]), node("A", "npm", &["B"])],
        };
        let report = analyze_workspaces(&table).unwrap();
        assert_eq!(report.circular_dependencies, vec![vec!["A", "B", "A"]]);
        assert_eq!(report.stats.circular_dependency_count, 1);
        assert_eq!(report.workspaces[0].name, "A");
    }

    #[test]
    fn reverse_dependencies_and_stats() {
        let table = WorkspaceTable {
            schema_version: 1,
            workspaces: vec![
                node("web", "npm", &["ui", "core"]),
                node("ui", "npm", &["core"]),
                node("core", "python", &[]),
            ],
        };
        let report = analyze_workspaces(&table).unwrap();
        assert_eq!(report.dependency_graph["web"], vec!["core", "ui"]);
        assert_eq!(report.reverse_dependencies["core"], vec!["ui", "web"]);
        assert!(report.circular_dependencies.is_empty());
        assert_eq!(report.stats.internal_edges, 3);
        assert_eq!(report.stats.workspace_types["npm"], 2);
    }

    #[test]
    fn empty_table_has_no_report() {
        assert!(analyze_workspaces(&WorkspaceTable::default()).is_none());
    }
}
