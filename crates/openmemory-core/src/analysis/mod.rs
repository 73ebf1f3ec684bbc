//! Autonomous Analysis
//!
//! The analyzer battery: validators, self-correction, proactive
//! intelligence, and learning/quality. Every analyzer follows one contract:
//!
//! - read-mostly over the store, best-effort (a failed read contributes an
//!   empty sub-pass, never an error to the caller);
//! - side effects limited to audit memories, salience adjustments, and its
//!   own append-only report table;
//! - an infallible `analyze` that always returns a report, with
//!   `persisted: false` when the report row could not be written.
//!
//! All analyzers can run concurrently against the same store; the
//! [`autonomous`] orchestrator relies on that.

pub mod anomaly;
pub mod autonomous;
pub mod blockers;
pub mod confidence;
pub mod conflicts;
pub mod consistency;
pub mod consolidation;
pub mod decision_quality;
pub mod effectiveness;
pub mod failure;
pub mod patterns;
pub mod quality;
pub mod recommend;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{Memory, MemoryInput, Sector};

pub(crate) const DAY_MS: i64 = 86_400_000;

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Issue severity used across analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Significant tokens of a text: lowercase alphanumeric runs of `min_len`+
pub(crate) fn tokenize(text: &str, min_len: usize) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= min_len)
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard similarity over two token sets
pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

pub(crate) fn is_failure_outcome(memory: &Memory) -> bool {
    matches!(memory.meta_str("outcome"), Some("failure") | Some("error"))
}

pub(crate) fn is_success_outcome(memory: &Memory) -> bool {
    memory.meta_str("outcome") == Some("success")
}

/// All project-tagged memories for a user, empty on read failure
pub(crate) fn project_memories(engine: &HsgEngine, project: &str, user_id: &str) -> Vec<Memory> {
    engine
        .store()
        .memories_with_tag(user_id, project, None)
        .unwrap_or_default()
}

/// Project memories in one sector, empty on read failure
pub(crate) fn sector_memories(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    sector: Sector,
) -> Vec<Memory> {
    engine
        .store()
        .memories_with_tag(user_id, project, Some(sector))
        .unwrap_or_default()
}

/// Write a reflective audit memory (warning, lesson, alert); returns its id
///
/// Best-effort: analyzers keep going when the audit write fails.
pub(crate) fn write_audit_memory(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    content: String,
    extra_tags: &[&str],
    meta: serde_json::Value,
) -> Option<String> {
    let mut tags = vec![project.to_string()];
    for tag in extra_tags {
        tags.push(tag.to_string());
    }
    match engine.remember(MemoryInput {
        content,
        tags,
        meta,
        user_id: user_id.to_string(),
        sector: Sector::Reflective,
        salience: 0.7,
    }) {
        Ok(memory) => Some(memory.id),
        Err(e) => {
            tracing::warn!(project, "failed to write audit memory: {e}");
            None
        }
    }
}

/// Persist one report row; returns whether it landed
///
/// The store retries once internally after (re)creating the table. On a
/// second failure the analyzer still hands its computed report back to the
/// caller, flagged unpersisted.
pub(crate) fn persist_report(
    engine: &HsgEngine,
    analyzer: &str,
    project: &str,
    user_id: &str,
    headline_count: i64,
    report: &serde_json::Value,
) -> bool {
    match engine
        .store()
        .append_report(analyzer, project, user_id, headline_count, report)
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(analyzer, project, "report not persisted: {e}");
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
