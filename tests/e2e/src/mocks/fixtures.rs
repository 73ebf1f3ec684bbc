//! Request payload factory
//!
//! Builders for the JSON bodies the journeys send, so tests read as
//! scenarios rather than payload plumbing. All builders target project
//! `"P"` unless told otherwise.

use serde_json::{json, Value};

pub const PROJECT: &str = "P";
pub const AGENT: &str = "dev";

/// Minimal valid state payload
pub fn state(progress: u64) -> Value {
    json!({
        "project_name": PROJECT,
        "state": {"progress_percentage": progress},
    })
}

/// State payload with queued next tasks
pub fn state_with_tasks(progress: u64, tasks: &[&str]) -> Value {
    json!({
        "project_name": PROJECT,
        "state": {
            "progress_percentage": progress,
            "next_recommended_tasks": tasks,
        },
    })
}

/// Action payload; outcome and links are optional
pub fn action(text: &str) -> Value {
    json!({
        "project_name": PROJECT,
        "agent_name": AGENT,
        "action": text,
    })
}

pub fn action_with_outcome(text: &str, outcome: &str) -> Value {
    let mut payload = action(text);
    payload["outcome"] = json!(outcome);
    payload
}

pub fn action_linked(text: &str, outcome: &str, decision: Option<&str>, pattern: Option<&str>) -> Value {
    let mut payload = action_with_outcome(text, outcome);
    if let Some(id) = decision {
        payload["related_decision"] = json!(id);
    }
    if let Some(id) = pattern {
        payload["used_pattern"] = json!(id);
    }
    payload
}

pub fn pattern(name: &str, description: &str) -> Value {
    json!({
        "project_name": PROJECT,
        "pattern_name": name,
        "description": description,
    })
}

pub fn decision(decision: &str, rationale: &str) -> Value {
    json!({
        "project_name": PROJECT,
        "decision": decision,
        "rationale": rationale,
    })
}

pub fn emotion(feeling: &str, sentiment: &str, confidence: f64) -> Value {
    json!({
        "project_name": PROJECT,
        "agent_name": AGENT,
        "feeling": feeling,
        "sentiment": sentiment,
        "confidence": confidence,
    })
}

pub fn link(source: &str, target: &str, weight: f64) -> Value {
    json!({
        "project_name": PROJECT,
        "source": source,
        "target": target,
        "weight": weight,
    })
}

pub fn query(text: &str, memory_type: &str) -> Value {
    json!({
        "project_name": PROJECT,
        "query": text,
        "memory_type": memory_type,
        "k": 10,
    })
}
