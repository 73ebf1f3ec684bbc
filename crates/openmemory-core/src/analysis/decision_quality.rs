//! Decision quality validator
//!
//! Assesses each reflective decision by the outcomes that depend on it and
//! by whether a newer decision has taken over the same subject.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, MemoryPatch, Sector};

use super::{
    is_failure_outcome, is_success_outcome, jaccard, persist_report, sector_memories, tokenize,
    DAY_MS,
};

/// Dependent successes needed to call a decision validated
const VALIDATED_MIN_SUCCESSES: usize = 3;
/// Days without any dependent action before a decision counts as ignored
const IGNORED_AFTER_DAYS: f64 = 14.0;
/// Subject token overlap above which a newer decision supersedes
const SUBJECT_OVERLAP: f64 = 0.5;

const VALIDATED_BOOST: f64 = 0.10;
const IGNORED_PENALTY: f64 = 0.15;
const REVERSED_PENALTY: f64 = 0.20;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionAssessment {
    pub decision_id: String,
    pub decision: String,
    pub dependent_actions: usize,
    pub successes: usize,
    pub failures: usize,
    /// VALIDATED | SOLID | QUESTIONABLE | IGNORED | REVERSED
    pub status: String,
    /// Id of the newer decision that superseded this one, if any
    pub superseded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionQualityReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub decisions_assessed: usize,
    pub assessments: Vec<DecisionAssessment>,
    pub auto_actions_taken: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the decision-quality validator
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> DecisionQualityReport {
    let reflective = sector_memories(engine, project, user_id, Sector::Reflective);
    let decisions: Vec<&Memory> = reflective
        .iter()
        .filter(|m| m.has_tag("decision"))
        .collect();
    let now = now_ms();

    let mut assessments = Vec::new();
    let mut auto_actions = 0;

    for (index, decision) in decisions.iter().enumerate() {
        let mut successes = 0;
        let mut failures = 0;
        let mut dependents = 0;
        for edge in engine.store().waypoints_from(&decision.id).unwrap_or_default() {
            let Ok(Some(action)) = engine.store().get_memory(&edge.dst_id) else {
                continue;
            };
            if action.primary_sector != Sector::Episodic {
                continue;
            }
            dependents += 1;
            if is_success_outcome(&action) {
                successes += 1;
            } else if is_failure_outcome(&action) {
                failures += 1;
            }
        }

        // Newest-first listing: only earlier indices are newer decisions
        let subject = subject_tokens(decision);
        let superseded_by = decisions[..index]
            .iter()
            .find(|newer| jaccard(&subject, &subject_tokens(newer)) >= SUBJECT_OVERLAP)
            .map(|newer| newer.id.clone());

        let age_days = (now - decision.created_at) as f64 / DAY_MS as f64;
        let status = if superseded_by.is_some() {
            "REVERSED"
        } else if dependents == 0 && age_days > IGNORED_AFTER_DAYS {
            "IGNORED"
        } else if failures > successes {
            "QUESTIONABLE"
        } else if successes >= VALIDATED_MIN_SUCCESSES {
            "VALIDATED"
        } else {
            "SOLID"
        };

        let adjustment = match status {
            "VALIDATED" => Some(decision.salience + VALIDATED_BOOST),
            "IGNORED" => Some(decision.salience - IGNORED_PENALTY),
            "REVERSED" => Some(decision.salience - REVERSED_PENALTY),
            _ => None,
        };
        if let Some(salience) = adjustment {
            let patch = MemoryPatch { salience: Some(salience), ..Default::default() };
            if engine.store().update_memory_fields(&decision.id, patch).is_ok() {
                auto_actions += 1;
            }
        }

        assessments.push(DecisionAssessment {
            decision_id: decision.id.clone(),
            decision: decision
                .meta_str("decision")
                .unwrap_or(&decision.content)
                .to_string(),
            dependent_actions: dependents,
            successes,
            failures,
            status: status.to_string(),
            superseded_by,
        });
    }

    let mut report = DecisionQualityReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now,
        decisions_assessed: assessments.len(),
        assessments,
        auto_actions_taken: auto_actions,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "decision_quality",
        project,
        user_id,
        report.decisions_assessed as i64,
        &value,
    );
    report
}

/// The decision's subject: significant tokens of its decision text, not the
/// rationale, so "Use PostgreSQL" and "Drop PostgreSQL for reads" collide
fn subject_tokens(decision: &Memory) -> std::collections::HashSet<String> {
    tokenize(decision.meta_str("decision").unwrap_or(&decision.content), 4)
}

// ============================================================================
// TESTS
// ============================================================================
