//! Consistency validator
//!
//! Four passes over a project's memory graph: decision contradiction
//! detection against a curated table of opposing choices, waypoint cycle
//! enumeration, broken-waypoint repair, and orphan reporting.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, MemoryPatch, Sector};

use super::{persist_report, project_memories, sector_memories, write_audit_memory, Severity};

/// Salience cut applied to the older of two contradicting decisions
const CONTRADICTION_PENALTY: f64 = 0.3;
/// Procedural/reflective memories older than this with no edges are orphans
const ORPHAN_AGE_DAYS: f64 = 7.0;

/// Opposing technology and directive choices; a decision matching the left
/// side contradicts a decision matching the right side (and vice versa)
pub(crate) const OPPOSING_CHOICES: &[(&str, &str)] = &[
    ("postgresql", "mongodb"),
    ("postgresql", "mysql"),
    ("mongodb", "mysql"),
    ("rest", "graphql"),
    ("monolith", "microservices"),
    ("tabs", "spaces"),
    ("synchronous", "asynchronous"),
    ("sql", "nosql"),
    ("javascript", "typescript"),
    ("npm", "yarn"),
    ("always", "never"),
];

/// Whether two decision texts land on opposite sides of a known choice
pub(crate) fn contradicts(a: &str, b: &str) -> Option<(&'static str, &'static str)> {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    for &(left, right) in OPPOSING_CHOICES {
        if (a.contains(left) && b.contains(right) && !a.contains(right) && !b.contains(left))
            || (a.contains(right) && b.contains(left) && !a.contains(left) && !b.contains(right))
        {
            return Some((left, right));
        }
    }
    None
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyIssue {
    /// DECISION_CONFLICT | WAYPOINT_CYCLE | BROKEN_WAYPOINT | ORPHAN_MEMORY
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub memories_checked: usize,
    pub issues: Vec<ConsistencyIssue>,
    pub auto_actions_taken: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the consistency validator
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> ConsistencyReport {
    let memories = project_memories(engine, project, user_id);
    let mut issues = Vec::new();
    let mut auto_actions = 0;

    check_decision_conflicts(engine, project, user_id, &mut issues, &mut auto_actions);
    check_waypoint_cycles(engine, &memories, &mut issues);
    repair_broken_waypoints(engine, &mut issues, &mut auto_actions);
    report_orphans(engine, &memories, &mut issues);

    let mut report = ConsistencyReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        memories_checked: memories.len(),
        issues,
        auto_actions_taken: auto_actions,
        persisted: false,
    };

    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "consistency",
        project,
        user_id,
        report.issues.len() as i64,
        &value,
    );
    report
}

/// Pass (a): pairwise decision contradictions. Listings are newest-first,
/// so for a conflicting pair the higher index is the older decision; that
/// is the one whose salience drops.
fn check_decision_conflicts(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    issues: &mut Vec<ConsistencyIssue>,
    auto_actions: &mut usize,
) {
    let decisions = sector_memories(engine, project, user_id, Sector::Reflective);
    let decisions: Vec<&Memory> = decisions
        .iter()
        .filter(|m| m.has_tag("decision"))
        .collect();

    for i in 0..decisions.len() {
        for j in (i + 1)..decisions.len() {
            let newer = decisions[i];
            let older = decisions[j];
            let Some((left, right)) = contradicts(&newer.content, &older.content) else {
                continue;
            };

            let patch = MemoryPatch {
                salience: Some(older.salience - CONTRADICTION_PENALTY),
                ..Default::default()
            };
            if engine.store().update_memory_fields(&older.id, patch).is_ok() {
                *auto_actions += 1;
            }

            let description = format!(
                "decisions disagree on {left} vs {right}; \
                 the older decision's salience was reduced by {CONTRADICTION_PENALTY}"
            );
            write_audit_memory(
                engine,
                project,
                user_id,
                format!("Consistency warning: {description}"),
                &["warning", "consistency"],
                serde_json::json!({
                    "project_name": project,
                    "conflicting": [newer.id, older.id],
                }),
            );
            issues.push(ConsistencyIssue {
                kind: "DECISION_CONFLICT".to_string(),
                severity: Severity::High,
                description,
                memory_ids: vec![newer.id.clone(), older.id.clone()],
            });
        }
    }
}

/// Pass (b): enumerate cycles with a DFS recursion stack
///
/// The visited set is per-walk (path-tracked), not global, so overlapping
/// cycles are each reported once.
fn check_waypoint_cycles(
    engine: &HsgEngine,
    memories: &[Memory],
    issues: &mut Vec<ConsistencyIssue>,
) {
    let project_ids: HashSet<&str> = memories.iter().map(|m| m.id.as_str()).collect();
    let edges = engine.store().all_waypoints().unwrap_or_default();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &edges {
        if project_ids.contains(edge.src_id.as_str()) && project_ids.contains(edge.dst_id.as_str())
        {
            adjacency
                .entry(edge.src_id.as_str())
                .or_default()
                .push(edge.dst_id.as_str());
        }
    }

    let mut seen_cycles: HashSet<Vec<String>> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    fn dfs<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        stack: &mut Vec<&'a str>,
        seen_cycles: &mut HashSet<Vec<String>>,
    ) {
        if let Some(pos) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.sort();
            seen_cycles.insert(cycle);
            return;
        }
        stack.push(node);
        if let Some(next) = adjacency.get(node) {
            for target in next {
                dfs(target, adjacency, stack, seen_cycles);
            }
        }
        stack.pop();
    }

    for memory in memories {
        dfs(&memory.id, &adjacency, &mut stack, &mut seen_cycles);
    }

    for cycle in seen_cycles {
        issues.push(ConsistencyIssue {
            kind: "WAYPOINT_CYCLE".to_string(),
            severity: Severity::Medium,
            description: format!("waypoint cycle through {} memories", cycle.len()),
            memory_ids: cycle,
        });
    }
}

/// Pass (c): delete edges whose endpoints no longer resolve
///
/// An edge is broken when either endpoint is missing; the removal restores
/// the endpoint-existence invariant.
fn repair_broken_waypoints(
    engine: &HsgEngine,
    issues: &mut Vec<ConsistencyIssue>,
    auto_actions: &mut usize,
) {
    match engine.store().delete_orphan_waypoints() {
        Ok(0) => {}
        Ok(removed) => {
            *auto_actions += removed;
            issues.push(ConsistencyIssue {
                kind: "BROKEN_WAYPOINT".to_string(),
                severity: Severity::Medium,
                description: format!("removed {removed} waypoints with missing endpoints"),
                memory_ids: vec![],
            });
        }
        Err(e) => tracing::warn!("broken-waypoint sweep failed: {e}"),
    }
}

/// Pass (d): old procedural/reflective memories with no incident edges are
/// reported, never modified
fn report_orphans(engine: &HsgEngine, memories: &[Memory], issues: &mut Vec<ConsistencyIssue>) {
    let now = now_ms();
    for memory in memories {
        if !matches!(
            memory.primary_sector,
            Sector::Procedural | Sector::Reflective
        ) {
            continue;
        }
        if memory.age_days(now) < ORPHAN_AGE_DAYS {
            continue;
        }
        let outgoing = engine.store().waypoints_from(&memory.id).unwrap_or_default();
        let incoming = engine.store().waypoints_to(&memory.id).unwrap_or_default();
        if outgoing.is_empty() && incoming.is_empty() {
            issues.push(ConsistencyIssue {
                kind: "ORPHAN_MEMORY".to_string(),
                severity: Severity::Low,
                description: format!(
                    "{} memory has no connections after {ORPHAN_AGE_DAYS} days",
                    memory.primary_sector
                ),
                memory_ids: vec![memory.id.clone()],
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{DecisionInput, DEFAULT_USER};
    use crate::analysis::testutil::fixture;

    #[test]
    fn test_contradiction_table() {
        assert!(contradicts("Use PostgreSQL everywhere", "Switch to MongoDB").is_some());
        assert!(contradicts("Use PostgreSQL", "Index tuning for PostgreSQL").is_none());
        // A text mentioning both sides is a comparison, not a stance
        assert!(contradicts("PostgreSQL vs MongoDB tradeoffs", "Use MongoDB").is_none());
    }

    #[tokio::test]
    async fn test_conflicting_decisions_penalize_older() {
        let (engine, agent) = fixture();
        let older = agent
            .record_decision(DecisionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                decision: "Use PostgreSQL".into(),
                rationale: "relational data".into(),
                alternatives: None,
                consequences: None,
            })
            .unwrap();
        let newer = agent
            .record_decision(DecisionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                decision: "Use MongoDB".into(),
                rationale: "schema flexibility".into(),
                alternatives: None,
                consequences: None,
            })
            .unwrap();

        let report = analyze(&engine, "P", DEFAULT_USER).await;

        let conflicts: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == "DECISION_CONFLICT")
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::High);
        assert_eq!(report.auto_actions_taken, 1);

        let old = engine.store().get_memory(&older.id).unwrap().unwrap();
        assert!((old.salience - 0.4).abs() < 1e-9); // 0.7 - 0.3
        let new = engine.store().get_memory(&newer.id).unwrap().unwrap();
        assert!((new.salience - 0.7).abs() < 1e-9);
        assert!(report.persisted);
    }

    #[tokio::test]
    async fn test_cycle_reported_once() {
        let (engine, agent) = fixture();
        let ids: Vec<String> = ["alpha step", "beta step", "gamma step"]
            .iter()
            .map(|content| {
                agent
                    .record_pattern(crate::agent::PatternInput {
                        project_name: "P".into(),
                        user_id: DEFAULT_USER.into(),
                        pattern_name: content.to_string(),
                        description: content.to_string(),
                        example: None,
                        tags: vec![],
                    })
                    .unwrap()
                    .id
            })
            .collect();
        engine.link(&ids[0], &ids[1], 0.9).unwrap();
        engine.link(&ids[1], &ids[2], 0.9).unwrap();
        engine.link(&ids[2], &ids[0], 0.9).unwrap();

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        let cycles: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == "WAYPOINT_CYCLE")
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].memory_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_broken_waypoints_repaired() {
        let (engine, agent) = fixture();
        let anchor = agent
            .record_pattern(crate::agent::PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "anchor".into(),
                description: "anchor pattern".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();
        engine.store().upsert_waypoint(&anchor.id, "missing", 0.9).unwrap();

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert!(report.issues.iter().any(|i| i.kind == "BROKEN_WAYPOINT"));
        assert!(report.auto_actions_taken >= 1);
        assert!(engine.store().all_waypoints().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_project_is_clean() {
        let (engine, _) = fixture();
        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.memories_checked, 0);
        assert!(report.issues.is_empty());
        assert_eq!(report.auto_actions_taken, 0);
        // No side-effect memories on a clean run
        assert_eq!(engine.store().count_memories().unwrap(), 0);
    }
}
