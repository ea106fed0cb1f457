//! Dependency graph module.
//!
//! Collects the direct edges found while walking roots into a petgraph
//! graph, for tree rendering and include-cycle reports.

pub mod engine;
pub mod query;

pub use engine::DependencyGraph;
pub use query::{GraphStats, TreeLine};
