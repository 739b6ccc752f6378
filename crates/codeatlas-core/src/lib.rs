//! codeatlas core: structural maps of multi-language source trees.
//!
//! Per-file heuristic extraction of functions, imports and entry points,
//! then whole-tree import and call graphs with cycle detection, dead-code
//! detection and complexity scoring. Extraction results are memoized in a
//! content-hash keyed cache so re-scans only parse what changed.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod languages;
pub mod output;
pub mod phases;
pub mod pipeline;
