//! Request handlers
//!
//! Split by concern: the agent memory surface, the analyzer surface, and
//! enforcement introspection. Write-style handlers funnel through the
//! enforcement gate before touching the engine and release their lock in
//! the response path.

pub mod analysis;
pub mod enforcement;
pub mod memory;

use openmemory_core::{GateRequest, DEFAULT_USER};
use serde::Deserialize;

/// Common query parameters for project-scoped GETs
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub depth: Option<usize>,
}

impl ProjectQuery {
    pub fn user(&self) -> &str {
        self.user_id.as_deref().unwrap_or(DEFAULT_USER)
    }
}

/// Build the gate request for a write-style call
///
/// Operations whose contract carries an `agent_name` (action, emotion) must
/// present it; the rest act as the system agent.
pub(crate) fn gate_request(action_type: &str, payload: &serde_json::Value) -> GateRequest {
    let explicit_agent = payload.get("agent_name").and_then(|v| v.as_str());
    let agent_name = match action_type {
        "action" | "emotion" => explicit_agent.unwrap_or(""),
        _ => explicit_agent.unwrap_or(DEFAULT_USER),
    };
    GateRequest {
        project_name: payload
            .get("project_name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        agent_name: agent_name.to_string(),
        action_type: action_type.to_string(),
        task_id: payload
            .get("task_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        dependencies: payload
            .get("dependencies")
            .and_then(|v| v.as_array())
            .map(|deps| {
                deps.iter()
                    .filter_map(|d| d.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        payload: payload.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_request_extraction() {
        let payload = serde_json::json!({
            "project_name": "P",
            "agent_name": "dev",
            "task_id": "t1",
            "dependencies": ["a", "b"],
            "action": "x",
        });
        let request = gate_request("action", &payload);
        assert_eq!(request.project_name, "P");
        assert_eq!(request.agent_name, "dev");
        assert_eq!(request.task_id.as_deref(), Some("t1"));
        assert_eq!(request.dependencies, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_agent_name_defaults_by_operation() {
        let payload = serde_json::json!({"project_name": "P"});
        // Actions must name their agent
        assert_eq!(gate_request("action", &payload).agent_name, "");
        // System-level writes act as the default user
        assert_eq!(gate_request("state", &payload).agent_name, DEFAULT_USER);
    }
}
