//! Quality gate
//!
//! Five rule families produce blocking and warning violations; the score
//! starts at 100 and loses 20 per blocker, 5 per warning. The gate passes
//! exactly when nothing blocks, and a failing gate leaves a warning memory.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, Sector};

use super::{jaccard, persist_report, sector_memories, tokenize, write_audit_memory, DAY_MS};

/// Test-to-implementation ratio floor, applied once enough implementation
/// work exists
const TEST_RATIO_FLOOR: f64 = 0.3;
const TEST_RATIO_MIN_IMPL: usize = 5;
/// Decisions unreferenced for this long count as not followed
const UNFOLLOWED_AFTER_DAYS: f64 = 7.0;
/// Token similarity at which two actions look like duplicate work
const DUPLICATE_SIMILARITY: f64 = 0.8;

/// Content markers that block the gate outright
const BLOCKING_ANTIPATTERNS: &[&str] = &[
    "hardcoded password",
    "hardcoded secret",
    "hardcoded api key",
    "disabled the tests",
    "skipped code review",
];

/// Content markers that warn
const WARNING_ANTIPATTERNS: &[&str] = &[
    "select *",
    "empty catch",
    "magic number",
    "copy pasted",
    "global variable",
];

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityViolation {
    /// ANTI_PATTERN | TEST_COVERAGE | MISSING_RATIONALE | UNFOLLOWED_DECISION | DUPLICATE_WORK
    pub family: String,
    /// BLOCKING or WARNING
    pub level: String,
    pub description: String,
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub violations: Vec<QualityViolation>,
    pub blocking_count: usize,
    pub warning_count: usize,
    /// `clamp(100 - 20*blocking - 5*warning, 0, 100)`
    pub quality_score: i64,
    pub passed: bool,
    pub persisted: bool,
}

/// The published score formula
pub fn quality_score(blocking: usize, warning: usize) -> i64 {
    (100i64 - 20 * blocking as i64 - 5 * warning as i64).clamp(0, 100)
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the quality gate
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> QualityReport {
    let actions = sector_memories(engine, project, user_id, Sector::Episodic);
    let decisions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Reflective)
        .into_iter()
        .filter(|m| m.has_tag("decision"))
        .collect();

    let mut violations = Vec::new();
    anti_patterns(&actions, &mut violations);
    test_coverage(&actions, &mut violations);
    missing_rationale(&decisions, &mut violations);
    unfollowed_decisions(engine, &decisions, &mut violations);
    duplicate_work(&actions, &mut violations);

    let blocking_count = violations.iter().filter(|v| v.level == "BLOCKING").count();
    let warning_count = violations.iter().filter(|v| v.level == "WARNING").count();
    let score = quality_score(blocking_count, warning_count);
    let passed = blocking_count == 0;

    if !passed {
        write_audit_memory(
            engine,
            project,
            user_id,
            format!(
                "Quality gate failed with score {score}: {blocking_count} blocking, \
                 {warning_count} warning violations"
            ),
            &["warning", "quality-gate"],
            serde_json::json!({
                "project_name": project,
                "quality_score": score,
            }),
        );
    }

    let mut report = QualityReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        violations,
        blocking_count,
        warning_count,
        quality_score: score,
        passed,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "quality",
        project,
        user_id,
        (report.blocking_count + report.warning_count) as i64,
        &value,
    );
    report
}

/// (1) anti-pattern markers in recorded work
fn anti_patterns(actions: &[Memory], violations: &mut Vec<QualityViolation>) {
    for action in actions {
        let text = action.content.to_lowercase();
        for marker in BLOCKING_ANTIPATTERNS {
            if text.contains(marker) {
                violations.push(QualityViolation {
                    family: "ANTI_PATTERN".to_string(),
                    level: "BLOCKING".to_string(),
                    description: format!("recorded work mentions '{marker}'"),
                    memory_ids: vec![action.id.clone()],
                });
            }
        }
        for marker in WARNING_ANTIPATTERNS {
            if text.contains(marker) {
                violations.push(QualityViolation {
                    family: "ANTI_PATTERN".to_string(),
                    level: "WARNING".to_string(),
                    description: format!("recorded work mentions '{marker}'"),
                    memory_ids: vec![action.id.clone()],
                });
            }
        }
    }
}

/// (2) implementation outpacing tests
fn test_coverage(actions: &[Memory], violations: &mut Vec<QualityViolation>) {
    let mut tests = 0usize;
    let mut implementation = 0usize;
    for action in actions {
        let text = action.content.to_lowercase();
        if text.contains("test") {
            tests += 1;
        } else if ["implement", "add", "create", "build", "write"]
            .iter()
            .any(|kw| text.contains(kw))
        {
            implementation += 1;
        }
    }
    if implementation > TEST_RATIO_MIN_IMPL
        && (tests as f64 / implementation as f64) < TEST_RATIO_FLOOR
    {
        violations.push(QualityViolation {
            family: "TEST_COVERAGE".to_string(),
            level: "WARNING".to_string(),
            description: format!(
                "{tests} test actions against {implementation} implementation actions"
            ),
            memory_ids: vec![],
        });
    }
}

/// (3) decisions recorded without a rationale
fn missing_rationale(decisions: &[Memory], violations: &mut Vec<QualityViolation>) {
    for decision in decisions {
        if !decision.content.to_lowercase().contains("rationale") {
            violations.push(QualityViolation {
                family: "MISSING_RATIONALE".to_string(),
                level: "WARNING".to_string(),
                description: format!(
                    "decision '{}' has no recorded rationale",
                    decision.meta_str("decision").unwrap_or(&decision.content)
                ),
                memory_ids: vec![decision.id.clone()],
            });
        }
    }
}

/// (4) decisions nothing ever acted on
fn unfollowed_decisions(
    engine: &HsgEngine,
    decisions: &[Memory],
    violations: &mut Vec<QualityViolation>,
) {
    let now = now_ms();
    for decision in decisions {
        let age_days = (now - decision.created_at) as f64 / DAY_MS as f64;
        if age_days <= UNFOLLOWED_AFTER_DAYS {
            continue;
        }
        let dependents = engine
            .store()
            .waypoints_from(&decision.id)
            .unwrap_or_default();
        if dependents.is_empty() {
            violations.push(QualityViolation {
                family: "UNFOLLOWED_DECISION".to_string(),
                level: "WARNING".to_string(),
                description: format!(
                    "decision '{}' has seen no follow-up actions",
                    decision.meta_str("decision").unwrap_or(&decision.content)
                ),
                memory_ids: vec![decision.id.clone()],
            });
        }
    }
}

/// (5) near-identical actions recorded separately
fn duplicate_work(actions: &[Memory], violations: &mut Vec<QualityViolation>) {
    for i in 0..actions.len() {
        for j in (i + 1)..actions.len() {
            let similarity = jaccard(
                &tokenize(&actions[i].content, 4),
                &tokenize(&actions[j].content, 4),
            );
            if similarity >= DUPLICATE_SIMILARITY {
                violations.push(QualityViolation {
                    family: "DUPLICATE_WORK".to_string(),
                    level: "WARNING".to_string(),
                    description: "two recorded actions describe the same work".to_string(),
                    memory_ids: vec![actions[i].id.clone(), actions[j].id.clone()],
                });
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
