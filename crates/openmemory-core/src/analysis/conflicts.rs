//! Conflict detector
//!
//! Replays the decision contradiction rules over current state and adds
//! three more checks: incompatible pattern pairs, architectural mismatches
//! between decisions and patterns, and port-number collisions across recent
//! actions. Critical conflicts leave a warning memory behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, Sector};

use super::consistency::contradicts;
use super::{persist_report, sector_memories, write_audit_memory, Severity, DAY_MS};

/// Actions older than this don't participate in resource checks
const RESOURCE_LOOKBACK_DAYS: i64 = 14;

/// Pattern pairs that don't coexist in one design
const INCOMPATIBLE_PATTERNS: &[(&str, &str)] = &[
    ("synchronous api", "event driven"),
    ("polling", "webhooks"),
    ("singleton", "stateless"),
    ("shared database", "database per service"),
    ("optimistic locking", "pessimistic locking"),
];

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// DECISION_CONFLICT | PATTERN_INCOMPATIBILITY | ARCHITECTURE_MISMATCH | RESOURCE_CONFLICT
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub conflicts: Vec<Conflict>,
    pub warnings_created: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the conflict detector
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> ConflictReport {
    let decisions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Reflective)
        .into_iter()
        .filter(|m| m.has_tag("decision"))
        .collect();
    let patterns = sector_memories(engine, project, user_id, Sector::Procedural);
    let actions = sector_memories(engine, project, user_id, Sector::Episodic);

    let mut conflicts = Vec::new();
    decision_conflicts(&decisions, &mut conflicts);
    pattern_incompatibilities(&patterns, &mut conflicts);
    architecture_mismatches(&decisions, &patterns, &mut conflicts);
    resource_conflicts(&actions, &mut conflicts);

    let mut warnings_created = 0;
    for conflict in &conflicts {
        if conflict.severity == Severity::Critical {
            let written = write_audit_memory(
                engine,
                project,
                user_id,
                format!("Conflict warning: {}", conflict.description),
                &["warning", "conflict"],
                serde_json::json!({
                    "project_name": project,
                    "conflict_kind": conflict.kind,
                    "memory_ids": conflict.memory_ids,
                }),
            );
            if written.is_some() {
                warnings_created += 1;
            }
        }
    }

    let mut report = ConflictReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        conflicts,
        warnings_created,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "conflicts",
        project,
        user_id,
        report.conflicts.len() as i64,
        &value,
    );
    report
}

fn decision_conflicts(decisions: &[Memory], conflicts: &mut Vec<Conflict>) {
    for i in 0..decisions.len() {
        for j in (i + 1)..decisions.len() {
            if let Some((left, right)) = contradicts(&decisions[i].content, &decisions[j].content)
            {
                conflicts.push(Conflict {
                    kind: "DECISION_CONFLICT".to_string(),
                    severity: Severity::High,
                    description: format!("active decisions disagree on {left} vs {right}"),
                    memory_ids: vec![decisions[i].id.clone(), decisions[j].id.clone()],
                });
            }
        }
    }
}

fn pattern_incompatibilities(patterns: &[Memory], conflicts: &mut Vec<Conflict>) {
    for i in 0..patterns.len() {
        for j in (i + 1)..patterns.len() {
            let a = patterns[i].content.to_lowercase();
            let b = patterns[j].content.to_lowercase();
            for &(left, right) in INCOMPATIBLE_PATTERNS {
                if (a.contains(left) && b.contains(right))
                    || (a.contains(right) && b.contains(left))
                {
                    conflicts.push(Conflict {
                        kind: "PATTERN_INCOMPATIBILITY".to_string(),
                        severity: Severity::High,
                        description: format!(
                            "patterns pull in opposite directions: {left} vs {right}"
                        ),
                        memory_ids: vec![patterns[i].id.clone(), patterns[j].id.clone()],
                    });
                }
            }
        }
    }
}

/// A decision that lands on one side of an incompatibility while an
/// established pattern sits on the other
fn architecture_mismatches(
    decisions: &[Memory],
    patterns: &[Memory],
    conflicts: &mut Vec<Conflict>,
) {
    for decision in decisions {
        let d = decision.content.to_lowercase();
        for pattern in patterns {
            let p = pattern.content.to_lowercase();
            for &(left, right) in INCOMPATIBLE_PATTERNS {
                if (d.contains(left) && p.contains(right)) || (d.contains(right) && p.contains(left))
                {
                    conflicts.push(Conflict {
                        kind: "ARCHITECTURE_MISMATCH".to_string(),
                        severity: Severity::Medium,
                        description: format!(
                            "decision conflicts with an established pattern: {left} vs {right}"
                        ),
                        memory_ids: vec![decision.id.clone(), pattern.id.clone()],
                    });
                }
            }
        }
    }
}

/// Port numbers claimed by more than one recent action
fn resource_conflicts(actions: &[Memory], conflicts: &mut Vec<Conflict>) {
    let cutoff = now_ms() - RESOURCE_LOOKBACK_DAYS * DAY_MS;
    let mut claims: HashMap<u16, Vec<String>> = HashMap::new();

    for action in actions.iter().filter(|a| a.created_at >= cutoff) {
        for port in extract_ports(&action.content) {
            let entry = claims.entry(port).or_default();
            if !entry.contains(&action.id) {
                entry.push(action.id.clone());
            }
        }
    }

    for (port, ids) in claims {
        if ids.len() > 1 {
            conflicts.push(Conflict {
                kind: "RESOURCE_CONFLICT".to_string(),
                severity: Severity::Critical,
                description: format!("port {port} is claimed by {} recent actions", ids.len()),
                memory_ids: ids,
            });
        }
    }
}

/// Ports mentioned as "port NNNN" or ":NNNN"
fn extract_ports(text: &str) -> Vec<u16> {
    let bytes = text.to_lowercase().into_bytes();
    let mut ports = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        let mut j = if bytes[i..].starts_with(b"port") {
            i + 4
        } else if bytes[i] == b':' {
            i + 1
        } else {
            i += 1;
            continue;
        };
        while j < bytes.len() && bytes[j] == b' ' {
            j += 1;
        }
        let start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if let Ok(port) = std::str::from_utf8(&bytes[start..j])
            .unwrap_or("")
            .parse::<u16>()
        {
            if port >= 1024 && !ports.contains(&port) {
                ports.push(port);
            }
        }
        i = start.max(i + 1);
    }
    ports
}

// ============================================================================
// TESTS
// ============================================================================
