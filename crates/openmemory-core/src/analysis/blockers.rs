//! Blocker predictor
//!
//! Five detectors over recent project history, each yielding a probability.
//! Predictions at or above 0.70 leave a warning memory for the recommender
//! and the next session to pick up.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, Sector};

use super::{
    is_failure_outcome, persist_report, sector_memories, tokenize, write_audit_memory, DAY_MS,
};

/// Window the detectors look at
const LOOKBACK_DAYS: i64 = 14;
/// Predictions at or above this write a warning memory
const WARNING_PROBABILITY: f64 = 0.70;
/// Same-type failures needed before repetition is called
const REPEATED_FAILURE_MIN: usize = 3;
/// Complexity mentions needed before a spike is called
const COMPLEXITY_SPIKE_MIN: usize = 5;

const COMPLEXITY_KEYWORDS: &[&str] = &[
    "complex", "complicated", "workaround", "hack", "tangled", "spaghetti", "tech debt",
    "hard to follow", "brittle",
];

const FAILURE_TYPES: &[(&str, &[&str])] = &[
    ("build", &["build", "compile", "link"]),
    ("test", &["test", "assert", "expect"]),
    ("deploy", &["deploy", "release", "rollout"]),
    ("network", &["network", "timeout", "connection", "dns"]),
    ("database", &["database", "migration", "query", "sql"]),
    ("auth", &["auth", "token", "permission", "credential"]),
];

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerPrediction {
    /// REPEATED_FAILURE | DEPENDENCY_MISSING | VELOCITY_DROP | COMPLEXITY_SPIKE | KNOWLEDGE_GAP
    pub kind: String,
    pub probability: f64,
    pub description: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub predictions: Vec<BlockerPrediction>,
    pub warnings_created: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the blocker predictor
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> BlockerReport {
    let now = now_ms();
    let cutoff = now - LOOKBACK_DAYS * DAY_MS;
    let actions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Episodic)
        .into_iter()
        .filter(|m| m.created_at >= cutoff)
        .collect();
    let decisions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Reflective)
        .into_iter()
        .filter(|m| m.has_tag("decision"))
        .collect();
    let patterns = sector_memories(engine, project, user_id, Sector::Procedural);

    let mut predictions = Vec::new();
    repeated_failures(&actions, &mut predictions);
    missing_dependencies(&decisions, &patterns, &mut predictions);
    velocity_drop(&actions, now, &mut predictions);
    complexity_spike(&actions, &mut predictions);
    knowledge_gaps(&decisions, &mut predictions);

    let mut warnings_created = 0;
    for prediction in &predictions {
        if prediction.probability >= WARNING_PROBABILITY {
            let written = write_audit_memory(
                engine,
                project,
                user_id,
                format!(
                    "Blocker warning ({:.0}%): {}",
                    prediction.probability * 100.0,
                    prediction.description
                ),
                &["warning", "blocker-prediction"],
                serde_json::json!({
                    "project_name": project,
                    "blocker_kind": prediction.kind,
                    "probability": prediction.probability,
                }),
            );
            if written.is_some() {
                warnings_created += 1;
            }
        }
    }

    let mut report = BlockerReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now,
        predictions,
        warnings_created,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "blockers",
        project,
        user_id,
        report.predictions.len() as i64,
        &value,
    );
    report
}

fn failure_type(action: &Memory) -> &'static str {
    let text = format!(
        "{} {}",
        action.content,
        action.meta_str("context").unwrap_or("")
    )
    .to_lowercase();
    for &(name, keywords) in FAILURE_TYPES {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return name;
        }
    }
    "other"
}

/// (1) three or more failures of the same type
fn repeated_failures(actions: &[Memory], predictions: &mut Vec<BlockerPrediction>) {
    let mut by_type: HashMap<&str, Vec<String>> = HashMap::new();
    for action in actions.iter().filter(|a| is_failure_outcome(a)) {
        by_type.entry(failure_type(action)).or_default().push(action.id.clone());
    }
    for (kind, ids) in by_type {
        let n = ids.len();
        if n >= REPEATED_FAILURE_MIN {
            predictions.push(BlockerPrediction {
                kind: "REPEATED_FAILURE".to_string(),
                probability: (0.5 + n as f64 * 0.1).min(0.95),
                description: format!("{n} {kind} failures in the last {LOOKBACK_DAYS} days"),
                evidence: ids,
            });
        }
    }
}

/// (2) a technology decision with no procedural pattern backing it
fn missing_dependencies(
    decisions: &[Memory],
    patterns: &[Memory],
    predictions: &mut Vec<BlockerPrediction>,
) {
    for decision in decisions {
        let text = decision
            .meta_str("decision")
            .unwrap_or(&decision.content)
            .to_lowercase();
        if !(text.starts_with("use ") || text.starts_with("adopt ") || text.contains(" use ")) {
            continue;
        }
        let subject = tokenize(&text, 4);
        let backed = patterns.iter().any(|pattern| {
            let pattern_tokens = tokenize(&pattern.content, 4);
            subject.intersection(&pattern_tokens).next().is_some()
        });
        if !backed {
            predictions.push(BlockerPrediction {
                kind: "DEPENDENCY_MISSING".to_string(),
                probability: 0.65,
                description: format!(
                    "technology decision '{}' has no supporting pattern",
                    decision.meta_str("decision").unwrap_or(&decision.content)
                ),
                evidence: vec![decision.id.clone()],
            });
        }
    }
}

/// (3) last week's action rate fell under half the prior week's
fn velocity_drop(actions: &[Memory], now: i64, predictions: &mut Vec<BlockerPrediction>) {
    let week = 7 * DAY_MS;
    let recent = actions.iter().filter(|a| a.created_at >= now - week).count();
    let prior = actions
        .iter()
        .filter(|a| a.created_at < now - week && a.created_at >= now - 2 * week)
        .count();
    if prior >= 2 && (recent as f64) < prior as f64 * 0.5 {
        predictions.push(BlockerPrediction {
            kind: "VELOCITY_DROP".to_string(),
            probability: 0.80,
            description: format!("action rate dropped from {prior} to {recent} per week"),
            evidence: vec![],
        });
    }
}

/// (4) complexity chatter piling up in recent actions
fn complexity_spike(actions: &[Memory], predictions: &mut Vec<BlockerPrediction>) {
    let mut mentions = 0;
    let mut evidence = Vec::new();
    for action in actions {
        let text = action.content.to_lowercase();
        let hits = COMPLEXITY_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
        if hits > 0 {
            mentions += hits;
            evidence.push(action.id.clone());
        }
    }
    if mentions >= COMPLEXITY_SPIKE_MIN {
        predictions.push(BlockerPrediction {
            kind: "COMPLEXITY_SPIKE".to_string(),
            probability: 0.70,
            description: format!("{mentions} complexity mentions across recent actions"),
            evidence,
        });
    }
}

/// (5) decisions recorded without a rationale
fn knowledge_gaps(decisions: &[Memory], predictions: &mut Vec<BlockerPrediction>) {
    for decision in decisions {
        if !decision.content.to_lowercase().contains("rationale") {
            predictions.push(BlockerPrediction {
                kind: "KNOWLEDGE_GAP".to_string(),
                probability: 0.60,
                description: format!(
                    "decision '{}' records no rationale",
                    decision.meta_str("decision").unwrap_or(&decision.content)
                ),
                evidence: vec![decision.id.clone()],
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
