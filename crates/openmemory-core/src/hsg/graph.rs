//! Waypoint graph: linking, traversal, pruning.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::memory::Sector;

use super::engine::HsgEngine;

// ============================================================================
// TRAVERSAL TYPES
// ============================================================================

/// A node reached by traversal, annotated with how it was reached
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub content: String,
    pub sector: Sector,
    pub salience: f64,
    /// Hops from the root
    pub depth: usize,
    /// Weight of the edge this node was reached through (1.0 for the root)
    pub weight: f64,
}

/// Result of a graph traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    pub root: String,
    pub nodes: Vec<GraphNode>,
}

/// Summary of a waypoint pruning sweep
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneSummary {
    pub weak_removed: usize,
    pub orphans_removed: usize,
}

// ============================================================================
// GRAPH OPERATIONS
// ============================================================================

impl HsgEngine {
    /// Upsert a directed edge between two existing memories
    pub fn link(&self, src_id: &str, dst_id: &str, weight: f64) -> Result<()> {
        if src_id == dst_id {
            return Err(CoreError::BadRequest("cannot link a memory to itself".into()));
        }
        if self.store().get_memory(src_id)?.is_none() {
            return Err(CoreError::NotFound(src_id.to_string()));
        }
        if self.store().get_memory(dst_id)?.is_none() {
            return Err(CoreError::NotFound(dst_id.to_string()));
        }
        self.store().upsert_waypoint(src_id, dst_id, weight)
    }

    /// Breadth-first traversal out to `depth` hops
    ///
    /// Returns at most one entry per reachable memory. Edges whose target
    /// row is missing are skipped: the orphaned-edge invariant may be
    /// temporarily violated between consistency sweeps and traversal must
    /// tolerate that.
    pub fn graph(&self, memory_id: &str, depth: usize) -> Result<GraphView> {
        let root = self
            .store()
            .get_memory(memory_id)?
            .ok_or_else(|| CoreError::NotFound(memory_id.to_string()))?;

        let mut nodes = vec![GraphNode {
            id: root.id.clone(),
            content: root.content.clone(),
            sector: root.primary_sector,
            salience: root.salience,
            depth: 0,
            weight: 1.0,
        }];

        let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut frontier: VecDeque<(String, usize)> = VecDeque::from([(root.id.clone(), 0)]);

        while let Some((id, d)) = frontier.pop_front() {
            if d >= depth {
                continue;
            }
            for edge in self.store().waypoints_from(&id)? {
                if visited.contains(&edge.dst_id) {
                    continue;
                }
                let Some(target) = self.store().get_memory(&edge.dst_id)? else {
                    continue;
                };
                visited.insert(target.id.clone());
                nodes.push(GraphNode {
                    id: target.id.clone(),
                    content: target.content,
                    sector: target.primary_sector,
                    salience: target.salience,
                    depth: d + 1,
                    weight: edge.weight,
                });
                frontier.push_back((target.id, d + 1));
            }
        }

        Ok(GraphView { root: root.id, nodes })
    }

    /// Weekly sweep: drop weak edges and edges with missing endpoints
    pub fn prune_waypoints(&self) -> Result<PruneSummary> {
        let weak_removed = self
            .store()
            .delete_weak_waypoints(self.config().waypoint_prune_threshold)?;
        let orphans_removed = self.store().delete_orphan_waypoints()?;
        self.store()
            .record_maintenance_run("prune", weak_removed + orphans_removed)?;
        Ok(PruneSummary { weak_removed, orphans_removed })
    }
}

// ============================================================================
// TESTS
// ============================================================================
