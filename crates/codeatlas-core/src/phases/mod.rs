//! Scan phases, in pipeline order.

pub mod structure;
pub mod extraction;
pub mod entry_points;
pub mod imports;
pub mod calls;
pub mod analysis;
pub mod complexity;
pub mod workspaces;
