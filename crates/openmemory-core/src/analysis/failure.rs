//! Failure analyzer
//!
//! Determines the root cause of each recent failed action by precedence:
//! linked pattern, linked decision, missing context, external factors,
//! unknown. Pattern and decision failures cost the linked memory salience,
//! and every attributable failure leaves a lesson-learned memory behind.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, MemoryPatch, Sector};

use super::{
    is_failure_outcome, persist_report, sector_memories, write_audit_memory, DAY_MS,
};

/// How far back failed actions are analyzed
const LOOKBACK_DAYS: i64 = 30;
/// Context shorter than this is considered missing
const MIN_CONTEXT_LEN: usize = 10;

const PATTERN_PENALTY: f64 = 0.25;
const PATTERN_FLOOR: f64 = 0.2;
const DECISION_PENALTY: f64 = 0.20;
const DECISION_FLOOR: f64 = 0.3;

const EXTERNAL_KEYWORDS: &[&str] = &[
    "timeout", "network", "rate limit", "outage", "third-party", "third party", "upstream",
    "unavailable", "dns", "certificate",
];

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureFinding {
    pub action_id: String,
    /// PATTERN_FAILURE | DECISION_FAILURE | MISSING_CONTEXT | EXTERNAL_FACTOR | UNKNOWN
    pub root_cause: String,
    pub description: String,
    /// The pattern or decision held responsible, if any
    pub culprit_id: Option<String>,
    /// The lesson-learned memory written for this failure, if any
    pub lesson_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub failures_analyzed: usize,
    pub findings: Vec<FailureFinding>,
    pub lessons_created: usize,
    pub auto_actions_taken: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the failure analyzer
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> FailureReport {
    let cutoff = now_ms() - LOOKBACK_DAYS * DAY_MS;
    let failures: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Episodic)
        .into_iter()
        .filter(|m| is_failure_outcome(m) && m.created_at >= cutoff)
        .collect();

    let mut findings = Vec::new();
    let mut lessons = 0;
    let mut auto_actions = 0;

    for action in &failures {
        let finding = attribute(engine, project, user_id, action, &mut auto_actions);
        if finding.lesson_id.is_some() {
            lessons += 1;
        }
        findings.push(finding);
    }

    let mut report = FailureReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        failures_analyzed: failures.len(),
        findings,
        lessons_created: lessons,
        auto_actions_taken: auto_actions,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "failures",
        project,
        user_id,
        report.failures_analyzed as i64,
        &value,
    );
    report
}

/// Root-cause precedence for one failed action
fn attribute(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    action: &Memory,
    auto_actions: &mut usize,
) -> FailureFinding {
    let incoming = engine.store().waypoints_to(&action.id).unwrap_or_default();

    // (1) a linked procedural pattern takes the blame first
    for edge in &incoming {
        let Ok(Some(source)) = engine.store().get_memory(&edge.src_id) else {
            continue;
        };
        if source.primary_sector == Sector::Procedural {
            let patch = MemoryPatch {
                salience: Some((source.salience - PATTERN_PENALTY).max(PATTERN_FLOOR)),
                ..Default::default()
            };
            if engine.store().update_memory_fields(&source.id, patch).is_ok() {
                *auto_actions += 1;
            }
            let description = format!(
                "pattern '{}' led to a failed action",
                source.meta_str("pattern_name").unwrap_or(&source.content)
            );
            let lesson_id = write_lesson(engine, project, user_id, action, &description);
            return FailureFinding {
                action_id: action.id.clone(),
                root_cause: "PATTERN_FAILURE".to_string(),
                description,
                culprit_id: Some(source.id),
                lesson_id,
            };
        }
    }

    // (2) then a linked reflective decision
    for edge in &incoming {
        let Ok(Some(source)) = engine.store().get_memory(&edge.src_id) else {
            continue;
        };
        if source.primary_sector == Sector::Reflective {
            let patch = MemoryPatch {
                salience: Some((source.salience - DECISION_PENALTY).max(DECISION_FLOOR)),
                ..Default::default()
            };
            if engine.store().update_memory_fields(&source.id, patch).is_ok() {
                *auto_actions += 1;
            }
            let description = format!(
                "decision '{}' led to a failed action",
                source.meta_str("decision").unwrap_or(&source.content)
            );
            let lesson_id = write_lesson(engine, project, user_id, action, &description);
            return FailureFinding {
                action_id: action.id.clone(),
                root_cause: "DECISION_FAILURE".to_string(),
                description,
                culprit_id: Some(source.id),
                lesson_id,
            };
        }
    }

    // (3) too little captured context to diagnose
    let context = action.meta_str("context").unwrap_or("");
    if context.trim().len() < MIN_CONTEXT_LEN {
        let description = "failure recorded without enough context to diagnose".to_string();
        let lesson_id = write_lesson(engine, project, user_id, action, &description);
        return FailureFinding {
            action_id: action.id.clone(),
            root_cause: "MISSING_CONTEXT".to_string(),
            description,
            culprit_id: None,
            lesson_id,
        };
    }

    // (4) external factors are noted but carry no lesson
    let haystack = format!("{} {}", action.content, context).to_lowercase();
    if EXTERNAL_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return FailureFinding {
            action_id: action.id.clone(),
            root_cause: "EXTERNAL_FACTOR".to_string(),
            description: "failure attributed to factors outside the project".to_string(),
            culprit_id: None,
            lesson_id: None,
        };
    }

    // (5) no attribution possible
    FailureFinding {
        action_id: action.id.clone(),
        root_cause: "UNKNOWN".to_string(),
        description: "no root cause could be determined".to_string(),
        culprit_id: None,
        lesson_id: None,
    }
}

fn write_lesson(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    action: &Memory,
    description: &str,
) -> Option<String> {
    write_audit_memory(
        engine,
        project,
        user_id,
        format!("Lesson learned: {description} (action: {})", action.content),
        &["lesson-learned"],
        serde_json::json!({
            "project_name": project,
            "failed_action": action.id,
        }),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionInput, DecisionInput, PatternInput, DEFAULT_USER};
    use crate::analysis::testutil::fixture;

    fn fail_action(
        agent: &crate::agent::AgentMemory,
        action: &str,
        context: Option<&str>,
        pattern: Option<&str>,
        decision: Option<&str>,
    ) {
        agent
            .record_action(ActionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                action: action.into(),
                outcome: Some("failure".into()),
                context: context.map(str::to_string),
                related_decision: decision.map(str::to_string),
                used_pattern: pattern.map(str::to_string),
                task_id: None,
                dependencies: vec![],
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_pattern_failure_precedence_and_lesson() {
        let (engine, agent) = fixture();
        let pattern = agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "pat_A".into(),
                description: "apply this everywhere".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();
        let decision = agent
            .record_decision(DecisionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                decision: "related call".into(),
                rationale: "seemed right".into(),
                alternatives: None,
                consequences: None,
            })
            .unwrap();
        // Linked to both; the pattern takes precedence
        fail_action(&agent, "applied pat_A badly", None, Some(&pattern.id), Some(&decision.id));

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.failures_analyzed, 1);
        assert_eq!(report.findings[0].root_cause, "PATTERN_FAILURE");
        assert_eq!(report.lessons_created, 1);

        let after = engine.store().get_memory(&pattern.id).unwrap().unwrap();
        assert!((after.salience - 0.35).abs() < 1e-9); // 0.6 - 0.25

        let lessons = engine
            .store()
            .memories_with_tag(DEFAULT_USER, "lesson-learned", Some(Sector::Reflective))
            .unwrap();
        assert_eq!(lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_pattern_penalty_floor() {
        let (engine, agent) = fixture();
        let pattern = agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "weak".into(),
                description: "already shaky".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();
        engine
            .store()
            .update_memory_fields(
                &pattern.id,
                MemoryPatch { salience: Some(0.3), ..Default::default() },
            )
            .unwrap();
        fail_action(&agent, "shaky application", None, Some(&pattern.id), None);

        analyze(&engine, "P", DEFAULT_USER).await;
        let after = engine.store().get_memory(&pattern.id).unwrap().unwrap();
        assert!((after.salience - PATTERN_FLOOR).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_decision_failure_when_no_pattern() {
        let (engine, agent) = fixture();
        let decision = agent
            .record_decision(DecisionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                decision: "Deploy straight to prod".into(),
                rationale: "speed".into(),
                alternatives: None,
                consequences: None,
            })
            .unwrap();
        fail_action(&agent, "prod deploy broke", None, None, Some(&decision.id));

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.findings[0].root_cause, "DECISION_FAILURE");
        let after = engine.store().get_memory(&decision.id).unwrap().unwrap();
        assert!((after.salience - 0.5).abs() < 1e-9); // 0.7 - 0.2
    }

    #[tokio::test]
    async fn test_context_and_external_precedence() {
        let (engine, agent) = fixture();
        fail_action(&agent, "something broke", Some("n/a"), None, None);
        fail_action(
            &agent,
            "fetch failed",
            Some("upstream API returned 503, their status page confirms an outage"),
            None,
            None,
        );
        fail_action(
            &agent,
            "silent breakage",
            Some("a long context that explains quite a lot but matches nothing"),
            None,
            None,
        );

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert_eq!(report.failures_analyzed, 3);
        let causes: Vec<&str> = report.findings.iter().map(|f| f.root_cause.as_str()).collect();
        assert!(causes.contains(&"MISSING_CONTEXT"));
        assert!(causes.contains(&"EXTERNAL_FACTOR"));
        assert!(causes.contains(&"UNKNOWN"));
        // Only the missing-context failure carries a lesson
        assert_eq!(report.lessons_created, 1);
    }
}
