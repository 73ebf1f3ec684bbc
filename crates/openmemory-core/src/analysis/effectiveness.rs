//! Pattern effectiveness validator
//!
//! Scores each procedural pattern by the outcomes of the episodic actions
//! it links to. Winners get auto-reinforced, losers lose salience.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, MemoryPatch, Sector};

use super::{is_failure_outcome, is_success_outcome, persist_report, sector_memories};

/// Success rate at or above which a pattern is auto-reinforced
const REINFORCE_THRESHOLD: f64 = 0.8;
/// Success rate at or below which salience is cut
const DEMOTE_THRESHOLD: f64 = 0.4;
/// Salience cut for failing patterns
const DEMOTE_PENALTY: f64 = 0.15;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAssessment {
    pub pattern_id: String,
    pub pattern_name: String,
    pub linked_actions: usize,
    pub successes: usize,
    pub failures: usize,
    /// Absent when the pattern has no linked outcomes yet
    pub success_rate: Option<f64>,
    /// EXCELLENT | GOOD | MEDIOCRE | FAILING | UNTESTED
    pub classification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub patterns_assessed: usize,
    pub assessments: Vec<PatternAssessment>,
    pub auto_actions_taken: usize,
    pub persisted: bool,
}

fn classify(success_rate: f64) -> &'static str {
    if success_rate >= 0.8 {
        "EXCELLENT"
    } else if success_rate >= 0.6 {
        "GOOD"
    } else if success_rate > DEMOTE_THRESHOLD {
        "MEDIOCRE"
    } else {
        "FAILING"
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the pattern-effectiveness validator
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> EffectivenessReport {
    let patterns = sector_memories(engine, project, user_id, Sector::Procedural);
    let mut assessments = Vec::new();
    let mut auto_actions = 0;

    for pattern in &patterns {
        let mut successes = 0;
        let mut failures = 0;
        let mut linked = 0;
        for edge in engine.store().waypoints_from(&pattern.id).unwrap_or_default() {
            let Ok(Some(action)) = engine.store().get_memory(&edge.dst_id) else {
                continue;
            };
            if action.primary_sector != Sector::Episodic {
                continue;
            }
            linked += 1;
            if is_success_outcome(&action) {
                successes += 1;
            } else if is_failure_outcome(&action) {
                failures += 1;
            }
        }

        let outcomes = successes + failures;
        let success_rate = (outcomes > 0).then(|| successes as f64 / outcomes as f64);
        let classification = match success_rate {
            Some(rate) => classify(rate),
            None => "UNTESTED",
        };

        match success_rate {
            Some(rate) if rate >= REINFORCE_THRESHOLD => {
                if engine.smart_reinforce(&pattern.id, "success").is_ok() {
                    auto_actions += 1;
                }
            }
            Some(rate) if rate <= DEMOTE_THRESHOLD => {
                let patch = MemoryPatch {
                    salience: Some(pattern.salience - DEMOTE_PENALTY),
                    ..Default::default()
                };
                if engine.store().update_memory_fields(&pattern.id, patch).is_ok() {
                    auto_actions += 1;
                }
            }
            _ => {}
        }

        assessments.push(PatternAssessment {
            pattern_id: pattern.id.clone(),
            pattern_name: pattern
                .meta_str("pattern_name")
                .unwrap_or(&pattern.content)
                .to_string(),
            linked_actions: linked,
            successes,
            failures,
            success_rate,
            classification: classification.to_string(),
        });
    }

    let mut report = EffectivenessReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        patterns_assessed: patterns.len(),
        assessments,
        auto_actions_taken: auto_actions,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "effectiveness",
        project,
        user_id,
        report.patterns_assessed as i64,
        &value,
    );
    report
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionInput, PatternInput, DEFAULT_USER};
    use crate::analysis::testutil::fixture;

    fn record_pattern(agent: &crate::agent::AgentMemory, name: &str) -> String {
        agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: name.into(),
                description: format!("{name} description"),
                example: None,
                tags: vec![],
            })
            .unwrap()
            .id
    }

    fn record_outcome(agent: &crate::agent::AgentMemory, pattern: &str, outcome: &str, n: usize) {
        for i in 0..n {
            agent
                .record_action(ActionInput {
                    project_name: "P".into(),
                    user_id: DEFAULT_USER.into(),
                    agent_name: "dev".into(),
                    action: format!("applied pattern run {i} with {outcome}"),
                    outcome: Some(outcome.into()),
                    context: None,
                    related_decision: None,
                    used_pattern: Some(pattern.into()),
                    task_id: None,
                    dependencies: vec![],
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_excellent_pattern_reinforced() {
        let (engine, agent) = fixture();
        let pattern = record_pattern(&agent, "winner");
        record_outcome(&agent, &pattern, "success", 4);

        let before = engine.store().get_memory(&pattern).unwrap().unwrap().salience;
        let report = analyze(&engine, "P", DEFAULT_USER).await;

        let assessment = &report.assessments[0];
        assert_eq!(assessment.classification, "EXCELLENT");
        assert_eq!(assessment.success_rate, Some(1.0));
        assert_eq!(report.auto_actions_taken, 1);

        let after = engine.store().get_memory(&pattern).unwrap().unwrap();
        assert!((after.salience - (before + 0.20)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failing_pattern_demoted() {
        let (engine, agent) = fixture();
        let pattern = record_pattern(&agent, "loser");
        record_outcome(&agent, &pattern, "failure", 3);
        record_outcome(&agent, &pattern, "success", 1);

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        let assessment = &report.assessments[0];
        assert_eq!(assessment.classification, "FAILING");
        assert_eq!(assessment.failures, 3);

        let after = engine.store().get_memory(&pattern).unwrap().unwrap();
        assert!((after.salience - 0.45).abs() < 1e-9); // 0.6 - 0.15
    }

    #[tokio::test]
    async fn test_untested_pattern_untouched() {
        let (engine, agent) = fixture();
        let pattern = record_pattern(&agent, "fresh");

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.assessments[0].classification, "UNTESTED");
        assert_eq!(report.assessments[0].success_rate, None);
        assert_eq!(report.auto_actions_taken, 0);
        let after = engine.store().get_memory(&pattern).unwrap().unwrap();
        assert_eq!(after.salience, 0.6);
    }

    #[tokio::test]
    async fn test_mediocre_band() {
        let (engine, agent) = fixture();
        let pattern = record_pattern(&agent, "mixed");
        record_outcome(&agent, &pattern, "success", 1);
        record_outcome(&agent, &pattern, "failure", 1);

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.assessments[0].classification, "MEDIOCRE");
        assert_eq!(report.auto_actions_taken, 0);
    }
}
