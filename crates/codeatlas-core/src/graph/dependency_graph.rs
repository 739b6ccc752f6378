//! Directed graph with stable string ids, backed by petgraph::DiGraph.
//!
//! One type serves the import graph (file paths), the call graph
//! (`file::qualifiedName`) and the workspace graph (package names).

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Wrapper around petgraph::DiGraph keyed by string id.
///
/// Nodes and neighbours are reported in insertion order, so traversals over
/// the same input are deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    /// O(1) string ID → NodeIndex lookup.
    id_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an adjacency list; keys are added before their targets.
    pub fn from_adjacency<'a, I, T>(adjacency: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, T)>,
        T: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::new();
        let mut pending = Vec::new();
        for (from, targets) in adjacency {
            graph.add_node(from);
            pending.push((from, targets));
        }
        for (from, targets) in pending {
            for to in targets {
                graph.add_edge(from, to);
            }
        }
        graph
    }

    /// Get or create a node by string ID.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.id_index.insert(id.to_string(), idx);
        idx
    }

    /// Add an edge, creating missing endpoints. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let a = self.add_node(from);
        let b = self.add_node(to);
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, ());
        true
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.id_index.get(from), self.id_index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node ids in insertion order.
    pub fn nodes(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Direct successors of `id` in edge insertion order.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, Direction::Outgoing)
    }

    fn neighbours(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.id_index.get(id) else {
            return Vec::new();
        };
        // petgraph walks the adjacency list newest-first
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.reverse();
        out
    }
}
