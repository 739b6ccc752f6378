//! Graph structures shared by the cross-file phases.

pub mod cycles;
pub mod dependency_graph;
pub mod symbol_table;
