//! Confidence adjuster
//!
//! Recomputes salience from five usage signals and applies the delta when
//! it is worth a write. Each applied adjustment records a human-readable
//! reason.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, MemoryPatch, Sector, SALIENCE_FLOOR, SALIENCE_MAX};

use super::{
    is_failure_outcome, is_success_outcome, persist_report, project_memories, DAY_MS,
};

/// Adjustments smaller than this are not written
const MIN_ADJUSTMENT: f64 = 0.05;
/// Age penalty starts here
const AGE_PENALTY_AFTER_DAYS: f64 = 30.0;
const AGE_PENALTY_CAP: f64 = 0.3;
/// Staleness penalty starts here
const STALE_AFTER_DAYS: f64 = 14.0;
const STALE_PENALTY_CAP: f64 = 0.25;
const USAGE_BOOST_CAP: f64 = 0.2;
const VALIDATION_BOOST_CAP: f64 = 0.15;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceAdjustment {
    pub memory_id: String,
    pub old_salience: f64,
    pub new_salience: f64,
    pub adjustment: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub memories_scanned: usize,
    pub adjustments: Vec<ConfidenceAdjustment>,
    pub adjustments_applied: usize,
    pub persisted: bool,
}

/// Salience histogram for `/confidence/distribution`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceDistribution {
    pub project_name: String,
    pub total: usize,
    /// Bucket edges at 0.2 steps: [0,0.2), [0.2,0.4), ... [0.8,1.0]
    pub buckets: [usize; 5],
    pub average: Option<f64>,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the confidence adjuster
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> ConfidenceReport {
    let memories = project_memories(engine, project, user_id);
    let now = now_ms();

    let mut adjustments = Vec::new();
    let mut applied = 0;

    for memory in &memories {
        // Archived rows are out of the active band and left alone
        if memory.salience < SALIENCE_FLOOR {
            continue;
        }
        let (delta, reason) = compute_signals(engine, memory, now);
        if delta.abs() <= MIN_ADJUSTMENT {
            continue;
        }

        let new_salience = (memory.salience + delta).clamp(SALIENCE_FLOOR, SALIENCE_MAX);
        if (new_salience - memory.salience).abs() < f64::EPSILON {
            continue;
        }
        let patch = MemoryPatch { salience: Some(new_salience), ..Default::default() };
        if engine.store().update_memory_fields(&memory.id, patch).is_ok() {
            applied += 1;
            adjustments.push(ConfidenceAdjustment {
                memory_id: memory.id.clone(),
                old_salience: memory.salience,
                new_salience,
                adjustment: delta,
                reason,
            });
        }
    }

    let mut report = ConfidenceReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now,
        memories_scanned: memories.len(),
        adjustments,
        adjustments_applied: applied,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "confidence",
        project,
        user_id,
        report.adjustments_applied as i64,
        &value,
    );
    report
}

/// The five signals, summed; the reason names each non-zero contributor
fn compute_signals(engine: &HsgEngine, memory: &Memory, now: i64) -> (f64, String) {
    let age_days = memory.age_days(now).max(0.0);
    let idle_days = ((now - memory.last_seen_at) as f64 / DAY_MS as f64).max(0.0);
    let mut reasons = Vec::new();
    let mut total = 0.0;

    // (1) usage frequency rewards memories that keep getting retrieved
    let usage = (memory.coactivations as f64 / age_days.max(1.0) * 0.5).min(USAGE_BOOST_CAP);
    if usage > 0.0 {
        total += usage;
        reasons.push(format!("frequent use (+{usage:.2})"));
    }

    // (2) age penalty after thirty days
    if age_days > AGE_PENALTY_AFTER_DAYS {
        let penalty = ((age_days - AGE_PENALTY_AFTER_DAYS) * 0.005).min(AGE_PENALTY_CAP);
        total -= penalty;
        reasons.push(format!("age ({age_days:.0}d, -{penalty:.2})"));
    }

    // (3) staleness penalty after two idle weeks
    if idle_days > STALE_AFTER_DAYS {
        let penalty = ((idle_days - STALE_AFTER_DAYS) * 0.01).min(STALE_PENALTY_CAP);
        total -= penalty;
        reasons.push(format!("unused for {idle_days:.0}d (-{penalty:.2})"));
    }

    // (4) outcome signal for procedural and reflective memories
    if matches!(memory.primary_sector, Sector::Procedural | Sector::Reflective) {
        let mut successes = 0usize;
        let mut failures = 0usize;
        for edge in engine.store().waypoints_from(&memory.id).unwrap_or_default() {
            if let Ok(Some(action)) = engine.store().get_memory(&edge.dst_id) {
                if is_success_outcome(&action) {
                    successes += 1;
                } else if is_failure_outcome(&action) {
                    failures += 1;
                }
            }
        }
        let outcomes = successes + failures;
        if outcomes > 0 {
            let rate = successes as f64 / outcomes as f64;
            let signal = (rate - 0.5) * 0.3;
            total += signal;
            reasons.push(format!("success rate {:.0}% ({signal:+.2})", rate * 100.0));
        }

        // (5) validation boost counts successful dependents directly
        let validation = (successes as f64 * 0.05).min(VALIDATION_BOOST_CAP);
        if validation > 0.0 {
            total += validation;
            reasons.push(format!("validated by {successes} outcomes (+{validation:.2})"));
        }
    }

    (total, reasons.join(", "))
}

/// Salience histogram over a project's memories
pub fn distribution(engine: &HsgEngine, project: &str, user_id: &str) -> ConfidenceDistribution {
    let memories = project_memories(engine, project, user_id);
    let mut buckets = [0usize; 5];
    let mut sum = 0.0;
    for memory in &memories {
        let index = ((memory.salience / 0.2) as usize).min(4);
        buckets[index] += 1;
        sum += memory.salience;
    }
    ConfidenceDistribution {
        project_name: project.to_string(),
        total: memories.len(),
        buckets,
        average: if memories.is_empty() {
            None
        } else {
            Some(sum / memories.len() as f64)
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
