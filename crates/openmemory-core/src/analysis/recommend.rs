//! Context recommender
//!
//! Merges four recommendation sources into one ranked list: proven patterns
//! worth reusing, established decisions worth following, next actions from
//! the project state, and cautions from low-salience patterns and recent
//! warnings.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, Sector};

use super::{
    is_failure_outcome, is_success_outcome, persist_report, sector_memories, tokenize, DAY_MS,
};

/// Success rate at which a pattern is recommended for reuse
const REUSE_SUCCESS_RATE: f64 = 0.7;
/// Salience at which a pattern is recommended even without outcomes
const REUSE_SALIENCE: f64 = 0.8;
/// Context keyword overlap required for a reuse recommendation
const REUSE_OVERLAP: f64 = 0.3;
/// Dependent actions before a decision counts as established
const ESTABLISHED_MIN_ACTIONS: usize = 3;
/// Warnings older than this stop producing cautions
const WARNING_MAX_AGE_DAYS: f64 = 30.0;
/// Patterns below this salience earn a caution
const CAUTION_SALIENCE: f64 = 0.3;

// ============================================================================
// TYPES
// ============================================================================

/// Recommendation priority, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// REUSE_PATTERN | FOLLOW_DECISION | NEXT_ACTION | CAUTION
    pub kind: String,
    pub priority: Priority,
    pub confidence: f64,
    pub description: String,
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub recommendations: Vec<Recommendation>,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the context recommender
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> RecommendReport {
    let patterns = sector_memories(engine, project, user_id, Sector::Procedural);
    let actions = sector_memories(engine, project, user_id, Sector::Episodic);
    let decisions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Reflective)
        .into_iter()
        .filter(|m| m.has_tag("decision"))
        .collect();
    let warnings: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Reflective)
        .into_iter()
        .filter(|m| m.has_tag("warning"))
        .collect();

    let mut recommendations = Vec::new();
    reuse_patterns(engine, &patterns, &actions, &mut recommendations);
    follow_decisions(engine, &decisions, &mut recommendations);
    next_actions(engine, project, user_id, &actions, &mut recommendations);
    cautions(&patterns, &warnings, &mut recommendations);

    // CRITICAL > HIGH > MEDIUM > LOW, then most-confident first
    recommendations.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then(
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    let mut report = RecommendReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        recommendations,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "recommendations",
        project,
        user_id,
        report.recommendations.len() as i64,
        &value,
    );
    report
}

/// (1) proven patterns whose vocabulary overlaps current work
fn reuse_patterns(
    engine: &HsgEngine,
    patterns: &[Memory],
    actions: &[Memory],
    recommendations: &mut Vec<Recommendation>,
) {
    // Current working context: vocabulary of the ten most recent actions
    let mut context_tokens = std::collections::HashSet::new();
    for action in actions.iter().take(10) {
        context_tokens.extend(tokenize(&action.content, 4));
    }
    if context_tokens.is_empty() {
        return;
    }

    for pattern in patterns {
        let mut successes = 0usize;
        let mut failures = 0usize;
        for edge in engine.store().waypoints_from(&pattern.id).unwrap_or_default() {
            if let Ok(Some(action)) = engine.store().get_memory(&edge.dst_id) {
                if is_success_outcome(&action) {
                    successes += 1;
                } else if is_failure_outcome(&action) {
                    failures += 1;
                }
            }
        }
        let outcomes = successes + failures;
        let success_rate = (outcomes > 0).then(|| successes as f64 / outcomes as f64);

        let proven = success_rate.map(|r| r >= REUSE_SUCCESS_RATE).unwrap_or(false)
            || pattern.salience > REUSE_SALIENCE;
        if !proven {
            continue;
        }

        let pattern_tokens = tokenize(&pattern.content, 4);
        if pattern_tokens.is_empty() {
            continue;
        }
        let overlap = pattern_tokens.intersection(&context_tokens).count() as f64
            / pattern_tokens.len() as f64;
        if overlap <= REUSE_OVERLAP {
            continue;
        }

        recommendations.push(Recommendation {
            kind: "REUSE_PATTERN".to_string(),
            priority: Priority::High,
            confidence: success_rate.unwrap_or(pattern.salience),
            description: format!(
                "pattern '{}' matches the current work and has held up",
                pattern.meta_str("pattern_name").unwrap_or(&pattern.content)
            ),
            memory_ids: vec![pattern.id.clone()],
        });
    }
}

/// (2) decisions with enough follow-through to count as established
fn follow_decisions(
    engine: &HsgEngine,
    decisions: &[Memory],
    recommendations: &mut Vec<Recommendation>,
) {
    for decision in decisions {
        let dependents = engine
            .store()
            .waypoints_from(&decision.id)
            .unwrap_or_default()
            .len();
        if dependents >= ESTABLISHED_MIN_ACTIONS {
            recommendations.push(Recommendation {
                kind: "FOLLOW_DECISION".to_string(),
                priority: Priority::Medium,
                confidence: (0.6 + dependents as f64 * 0.05).min(0.9),
                description: format!(
                    "decision '{}' is established with {dependents} dependent actions",
                    decision.meta_str("decision").unwrap_or(&decision.content)
                ),
                memory_ids: vec![decision.id.clone()],
            });
        }
    }
}

/// (3) the state's own task list, plus a nudge for pending actions
fn next_actions(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    actions: &[Memory],
    recommendations: &mut Vec<Recommendation>,
) {
    let states = engine
        .store()
        .memories_with_tag(user_id, "project-state", Some(Sector::Semantic))
        .unwrap_or_default();
    let state = states
        .iter()
        .find(|m| m.has_tag(project) && m.salience > 0.05)
        .and_then(|m| serde_json::from_str::<serde_json::Value>(&m.content).ok());

    if let Some(tasks) = state
        .as_ref()
        .and_then(|s| s.get("next_recommended_tasks"))
        .and_then(|t| t.as_array())
    {
        for task in tasks.iter().filter_map(|t| t.as_str()).take(5) {
            recommendations.push(Recommendation {
                kind: "NEXT_ACTION".to_string(),
                priority: Priority::High,
                confidence: 0.75,
                description: format!("project state queues up: {task}"),
                memory_ids: vec![],
            });
        }
    }

    for action in actions {
        if action.meta_str("outcome") == Some("pending") {
            recommendations.push(Recommendation {
                kind: "NEXT_ACTION".to_string(),
                priority: Priority::Medium,
                confidence: 0.6,
                description: format!("pending action never resolved: {}", action.content),
                memory_ids: vec![action.id.clone()],
            });
        }
    }
}

/// (4) cautions: shaky patterns and fresh warnings
fn cautions(patterns: &[Memory], warnings: &[Memory], recommendations: &mut Vec<Recommendation>) {
    let now = now_ms();
    for pattern in patterns {
        if pattern.salience < CAUTION_SALIENCE && pattern.salience > 0.05 {
            recommendations.push(Recommendation {
                kind: "CAUTION".to_string(),
                priority: Priority::Low,
                confidence: 1.0 - pattern.salience,
                description: format!(
                    "pattern '{}' has lost credibility; avoid it without a rethink",
                    pattern.meta_str("pattern_name").unwrap_or(&pattern.content)
                ),
                memory_ids: vec![pattern.id.clone()],
            });
        }
    }
    for warning in warnings {
        let age_days = (now - warning.created_at) as f64 / DAY_MS as f64;
        if age_days <= WARNING_MAX_AGE_DAYS {
            recommendations.push(Recommendation {
                kind: "CAUTION".to_string(),
                priority: Priority::High,
                confidence: 0.8,
                description: warning.content.clone(),
                memory_ids: vec![warning.id.clone()],
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
