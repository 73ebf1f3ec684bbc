//! Anomaly detector
//!
//! Compares the last 24 hours against 7-day baselines: activity spikes and
//! drops, failure-rate spikes, confidence collapse, high-value patterns
//! falling out of use, and runaway memory growth. Critical and high
//! findings leave alert memories.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, Sector};

use super::{
    is_failure_outcome, persist_report, project_memories, sector_memories, write_audit_memory,
    Severity, DAY_MS,
};

/// Spike multiplier; deviation at 3x escalates severity
const SPIKE_FACTOR: f64 = 2.0;
const SPIKE_ESCALATION: f64 = 3.0;
/// Drop multiplier
const DROP_FACTOR: f64 = 0.5;
/// Absolute floor of failures before a failure-rate spike is called
const FAILURE_SPIKE_MIN: usize = 3;
/// Confidence thresholds over recent emotional memories
const CONFIDENCE_FLOOR: f64 = 0.4;
const NEGATIVE_RATE_CEILING: f64 = 0.6;
const CONFIDENCE_MIN_SAMPLES: usize = 5;
/// High-salience patterns absent from this share of recent actions deviate
const PATTERN_ABSENCE_RATE: f64 = 0.9;
const PATTERN_SALIENCE: f64 = 0.7;
/// Memory growth multiplier
const GROWTH_FACTOR: f64 = 3.0;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    /// ACTIVITY_SPIKE | ACTIVITY_DROP | FAILURE_RATE_SPIKE | CONFIDENCE_DROP
    /// | PATTERN_DEVIATION | MEMORY_GROWTH
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    pub observed: f64,
    pub baseline: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub anomalies: Vec<Anomaly>,
    pub alerts_created: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the anomaly detector
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> AnomalyReport {
    let now = now_ms();
    let day_ago = now - DAY_MS;
    let week_ago = now - 7 * DAY_MS;

    let actions = sector_memories(engine, project, user_id, Sector::Episodic);
    let recent_day: Vec<&Memory> = actions.iter().filter(|a| a.created_at >= day_ago).collect();
    let baseline_week: Vec<&Memory> = actions
        .iter()
        .filter(|a| a.created_at >= week_ago && a.created_at < day_ago)
        .collect();
    let daily_avg = baseline_week.len() as f64 / 6.0;

    let mut anomalies = Vec::new();
    activity_level(&recent_day, daily_avg, &mut anomalies);
    failure_rate(&recent_day, &baseline_week, &mut anomalies);
    confidence_drop(engine, project, user_id, day_ago, &mut anomalies);
    pattern_deviation(engine, project, user_id, &actions, week_ago, &mut anomalies);
    memory_growth(engine, project, user_id, day_ago, week_ago, &mut anomalies);

    let mut alerts_created = 0;
    for anomaly in &anomalies {
        if matches!(anomaly.severity, Severity::Critical | Severity::High) {
            let written = write_audit_memory(
                engine,
                project,
                user_id,
                format!("Anomaly alert: {}", anomaly.description),
                &["warning", "anomaly-alert"],
                serde_json::json!({
                    "project_name": project,
                    "anomaly_kind": anomaly.kind,
                }),
            );
            if written.is_some() {
                alerts_created += 1;
            }
        }
    }

    let mut report = AnomalyReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now,
        anomalies,
        alerts_created,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "anomalies",
        project,
        user_id,
        report.anomalies.len() as i64,
        &value,
    );
    report
}

fn activity_level(recent: &[&Memory], daily_avg: f64, anomalies: &mut Vec<Anomaly>) {
    let observed = recent.len() as f64;
    if daily_avg <= 0.0 {
        return;
    }
    if observed >= daily_avg * SPIKE_FACTOR {
        let severity = if observed >= daily_avg * SPIKE_ESCALATION {
            Severity::High
        } else {
            Severity::Medium
        };
        anomalies.push(Anomaly {
            kind: "ACTIVITY_SPIKE".to_string(),
            severity,
            description: format!(
                "{observed:.0} actions in 24h against a {daily_avg:.1}/day baseline"
            ),
            observed,
            baseline: daily_avg,
        });
    } else if daily_avg >= 1.0 && observed <= daily_avg * DROP_FACTOR {
        anomalies.push(Anomaly {
            kind: "ACTIVITY_DROP".to_string(),
            severity: Severity::Medium,
            description: format!(
                "{observed:.0} actions in 24h against a {daily_avg:.1}/day baseline"
            ),
            observed,
            baseline: daily_avg,
        });
    }
}

fn failure_rate(recent: &[&Memory], baseline: &[&Memory], anomalies: &mut Vec<Anomaly>) {
    let recent_failures = recent.iter().filter(|a| is_failure_outcome(a)).count();
    if recent_failures < FAILURE_SPIKE_MIN || recent.is_empty() {
        return;
    }
    let recent_rate = recent_failures as f64 / recent.len() as f64;
    let baseline_failures = baseline.iter().filter(|a| is_failure_outcome(a)).count();
    let baseline_rate = if baseline.is_empty() {
        0.0
    } else {
        baseline_failures as f64 / baseline.len() as f64
    };

    if recent_rate > baseline_rate * SPIKE_FACTOR || baseline_rate == 0.0 {
        anomalies.push(Anomaly {
            kind: "FAILURE_RATE_SPIKE".to_string(),
            severity: if recent_rate >= 0.5 {
                Severity::Critical
            } else {
                Severity::High
            },
            description: format!(
                "{recent_failures} failures in 24h ({:.0}% of actions, baseline {:.0}%)",
                recent_rate * 100.0,
                baseline_rate * 100.0
            ),
            observed: recent_rate,
            baseline: baseline_rate,
        });
    }
}

fn confidence_drop(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    since: i64,
    anomalies: &mut Vec<Anomaly>,
) {
    let emotions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Emotional)
        .into_iter()
        .filter(|m| m.created_at >= since)
        .collect();
    if emotions.len() < CONFIDENCE_MIN_SAMPLES {
        return;
    }

    let confidences: Vec<f64> = emotions.iter().filter_map(|m| m.meta_f64("confidence")).collect();
    let avg_confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };
    let negative = emotions
        .iter()
        .filter(|m| matches!(m.meta_str("sentiment"), Some("negative") | Some("frustrated")))
        .count();
    let negative_rate = negative as f64 / emotions.len() as f64;

    let low_confidence = avg_confidence.map(|c| c < CONFIDENCE_FLOOR).unwrap_or(false);
    if low_confidence || negative_rate > NEGATIVE_RATE_CEILING {
        anomalies.push(Anomaly {
            kind: "CONFIDENCE_DROP".to_string(),
            severity: Severity::High,
            description: format!(
                "agent confidence degraded: avg {:.2}, negative rate {:.0}%",
                avg_confidence.unwrap_or(0.0),
                negative_rate * 100.0
            ),
            observed: avg_confidence.unwrap_or(negative_rate),
            baseline: CONFIDENCE_FLOOR,
        });
    }
}

fn pattern_deviation(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    actions: &[Memory],
    week_ago: i64,
    anomalies: &mut Vec<Anomaly>,
) {
    let recent_ids: Vec<&str> = actions
        .iter()
        .filter(|a| a.created_at >= week_ago)
        .map(|a| a.id.as_str())
        .collect();
    if recent_ids.len() < 5 {
        return;
    }

    for pattern in sector_memories(engine, project, user_id, Sector::Procedural) {
        if pattern.salience <= PATTERN_SALIENCE {
            continue;
        }
        let linked_recent = engine
            .store()
            .waypoints_from(&pattern.id)
            .unwrap_or_default()
            .iter()
            .filter(|w| recent_ids.contains(&w.dst_id.as_str()))
            .count();
        let absence_rate = 1.0 - linked_recent as f64 / recent_ids.len() as f64;
        if absence_rate >= PATTERN_ABSENCE_RATE {
            anomalies.push(Anomaly {
                kind: "PATTERN_DEVIATION".to_string(),
                severity: Severity::Medium,
                description: format!(
                    "high-salience pattern '{}' is absent from {:.0}% of recent actions",
                    pattern.meta_str("pattern_name").unwrap_or(&pattern.content),
                    absence_rate * 100.0
                ),
                observed: absence_rate,
                baseline: PATTERN_ABSENCE_RATE,
            });
        }
    }
}

fn memory_growth(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    day_ago: i64,
    week_ago: i64,
    anomalies: &mut Vec<Anomaly>,
) {
    let memories = project_memories(engine, project, user_id);
    let recent = memories.iter().filter(|m| m.created_at >= day_ago).count() as f64;
    let baseline =
        memories.iter().filter(|m| m.created_at >= week_ago && m.created_at < day_ago).count()
            as f64
            / 6.0;
    if baseline > 0.0 && recent > baseline * GROWTH_FACTOR {
        anomalies.push(Anomaly {
            kind: "MEMORY_GROWTH".to_string(),
            severity: Severity::Medium,
            description: format!(
                "{recent:.0} new memories in 24h against a {baseline:.1}/day baseline"
            ),
            observed: recent,
            baseline,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionInput, EmotionInput, DEFAULT_USER};
    use crate::analysis::testutil::fixture;

    fn backdated_action(engine: &crate::hsg::HsgEngine, text: &str, age_days: f64, outcome: &str) {
        let memory = engine
            .remember(crate::memory::MemoryInput {
                content: text.into(),
                tags: vec!["P".into(), "action".into()],
                meta: serde_json::json!({"project_name": "P", "outcome": outcome}),
                user_id: DEFAULT_USER.into(),
                sector: Sector::Episodic,
                salience: 0.5,
            })
            .unwrap();
        let at = now_ms() - (age_days * DAY_MS as f64) as i64;
        engine.store().set_timestamps(&memory.id, at, at).unwrap();
    }

    #[tokio::test]
    async fn test_activity_spike_and_escalation() {
        let (engine, _) = fixture();
        // Baseline: one action a day for six prior days
        for day in 1..7 {
            backdated_action(&engine, &format!("steady work day {day}"), day as f64 + 0.1, "success");
        }
        // Burst: four actions today (4x baseline)
        for i in 0..4 {
            backdated_action(&engine, &format!("burst item {i}"), 0.0, "success");
        }

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        let spike = report
            .anomalies
            .iter()
            .find(|a| a.kind == "ACTIVITY_SPIKE")
            .expect("spike expected");
        assert_eq!(spike.severity, Severity::High);
        assert!(report.alerts_created >= 1);
    }

    #[tokio::test]
    async fn test_activity_drop() {
        let (engine, _) = fixture();
        for day in 1..7 {
            for i in 0..2 {
                backdated_action(&engine, &format!("work {day}-{i}"), day as f64 + 0.1, "success");
            }
        }
        // Nothing today

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert!(report.anomalies.iter().any(|a| a.kind == "ACTIVITY_DROP"));
    }

    #[tokio::test]
    async fn test_failure_spike_needs_absolute_floor() {
        let (engine, _) = fixture();
        backdated_action(&engine, "one failure only", 0.0, "failure");
        backdated_action(&engine, "and another", 0.0, "failure");

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert!(!report.anomalies.iter().any(|a| a.kind == "FAILURE_RATE_SPIKE"));

        backdated_action(&engine, "third failure crosses the floor", 0.0, "failure");
        let report = analyze(&engine, "P", DEFAULT_USER).await;
        let spike = report
            .anomalies
            .iter()
            .find(|a| a.kind == "FAILURE_RATE_SPIKE")
            .expect("failure spike expected");
        assert_eq!(spike.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_confidence_drop_over_emotions() {
        let (engine, agent) = fixture();
        for i in 0..5 {
            agent
                .record_emotion(EmotionInput {
                    project_name: "P".into(),
                    user_id: DEFAULT_USER.into(),
                    agent_name: "dev".into(),
                    feeling: format!("stuck again, attempt {i}"),
                    sentiment: Some("frustrated".into()),
                    confidence: Some(0.2),
                    related_action: None,
                })
                .unwrap();
        }

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        let drop = report
            .anomalies
            .iter()
            .find(|a| a.kind == "CONFIDENCE_DROP")
            .expect("confidence drop expected");
        assert_eq!(drop.severity, Severity::High);
        assert!(report.alerts_created >= 1);
    }

    #[tokio::test]
    async fn test_quiet_project_no_anomalies() {
        let (engine, agent) = fixture();
        agent
            .record_action(ActionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                action: "routine upkeep".into(),
                outcome: Some("success".into()),
                context: None,
                related_decision: None,
                used_pattern: None,
                task_id: None,
                dependencies: vec![],
            })
            .unwrap();

        let report = analyze(&engine, "P", DEFAULT_USER).await;
        assert!(report.anomalies.is_empty());
        assert_eq!(report.alerts_created, 0);
    }
}
