//! Hierarchical Semantic Graph Engine
//!
//! Sector-assigned memory nodes with salience decay and reinforcement,
//! similarity-ranked retrieval, and the directed waypoint graph.

mod engine;
mod graph;

pub use engine::{boost_for_reason, HsgEngine, ScoredMemory};
pub use graph::{GraphNode, GraphView, PruneSummary};
