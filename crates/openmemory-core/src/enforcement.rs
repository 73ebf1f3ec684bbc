//! Enforcement Gate
//!
//! Mandatory-usage middleware in front of every write-style agent call:
//! identity checks, initialized-project checks, dependency gating, payload
//! schema presence, and the per-task lock table. Warnings never block; they
//! are logged and returned alongside the result.
//!
//! The lock table and the action log are the gate's only mutable state,
//! both in-process. Locks are keyed `project_name:task_id`, held by one
//! agent at a time, and reclaimable after five minutes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Sector};

/// Locks older than this are considered abandoned
const LOCK_STALE_MS: i64 = 5 * 60 * 1000;
/// Ring buffer size for the action log
const ACTION_LOG_CAP: usize = 512;

// ============================================================================
// TYPES
// ============================================================================

/// A write-style call presented to the gate
#[derive(Debug, Clone, Deserialize)]
pub struct GateRequest {
    pub project_name: String,
    pub agent_name: String,
    /// One of: state, action, pattern, decision, emotion, link, reinforce
    pub action_type: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// The raw payload the schema checks run against
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Successful gate passage; carries the held lock key, if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateTicket {
    pub warnings: Vec<String>,
    pub lock_key: Option<String>,
}

#[derive(Debug, Clone)]
struct LockEntry {
    agent_name: String,
    action_type: String,
    acquired_at: i64,
}

/// One lock as exposed by `/enforcement/locks`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    pub key: String,
    pub agent_name: String,
    pub action_type: String,
    pub acquired_at: i64,
    pub age_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionLogEntry {
    timestamp: i64,
    project_name: String,
    agent_name: String,
    action_type: String,
    allowed: bool,
}

/// Per-project counters for `/enforcement/stats`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStats {
    pub total_checks: u64,
    pub allowed: u64,
    pub rejected: u64,
    pub warnings_issued: u64,
}

/// `/enforcement/health` payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateHealth {
    pub auth_mode: String,
    pub active_locks: usize,
    pub action_log_entries: usize,
    pub memory_count: i64,
    pub max_active_memories: u64,
}

// ============================================================================
// GATE
// ============================================================================

/// The enforcement gate; cheap to clone via `Arc`
pub struct EnforcementGate {
    engine: Arc<HsgEngine>,
    locks: Mutex<HashMap<String, LockEntry>>,
    action_log: Mutex<VecDeque<ActionLogEntry>>,
    stats: Mutex<HashMap<String, GateStats>>,
}

impl EnforcementGate {
    pub fn new(engine: Arc<HsgEngine>) -> Self {
        Self {
            engine,
            locks: Mutex::new(HashMap::new()),
            action_log: Mutex::new(VecDeque::new()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Run all checks and, when a task is named, take the lock
    ///
    /// The caller must pass the returned ticket to [`Self::finish`] in its
    /// response pipeline so the lock is released; abandoned locks age out
    /// after five minutes regardless.
    pub fn begin(&self, request: &GateRequest) -> Result<GateTicket> {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        if request.project_name.trim().is_empty() {
            violations.push("missing project_name".to_string());
        }
        if request.agent_name.trim().is_empty() {
            violations.push("missing agent_name".to_string());
        }

        // Non-initial writes require the project to have been initialized
        // with a state memory
        if !violations.is_empty() {
            return self.reject(request, violations, warnings);
        }
        if request.action_type != "state" {
            let has_state = self.project_initialized(request)?;
            if !has_state {
                violations.push(format!(
                    "project '{}' has no stored state; store project state first",
                    request.project_name
                ));
            }
        }

        // Dependency gating: every named dependency must be completed
        if request.task_id.is_some() {
            for dep in &request.dependencies {
                match self.engine.store().get_memory(dep)? {
                    Some(memory) if memory.has_tag("completed") => {}
                    Some(_) => violations.push(format!("dependency '{dep}' is not completed")),
                    None => violations.push(format!("dependency '{dep}' does not exist")),
                }
            }
        }

        self.check_payload_schema(request, &mut violations);
        self.collect_warnings(request, &mut warnings);

        if !violations.is_empty() {
            return self.reject(request, violations, warnings);
        }

        // Lock acquisition is the last step so a rejected request never
        // holds a lock
        let lock_key = match &request.task_id {
            Some(task_id) => Some(self.acquire_lock(request, task_id)?),
            None => None,
        };

        self.log_action(request, true);
        self.bump_stats(request, true, warnings.len());
        for warning in &warnings {
            tracing::warn!(
                project = %request.project_name,
                agent = %request.agent_name,
                "enforcement warning: {warning}"
            );
        }
        Ok(GateTicket { warnings, lock_key })
    }

    /// Release the ticket's lock; called from the response pipeline
    pub fn finish(&self, ticket: &GateTicket) {
        if let Some(key) = &ticket.lock_key {
            if let Ok(mut locks) = self.locks.lock() {
                locks.remove(key);
            }
        }
    }

    fn reject(
        &self,
        request: &GateRequest,
        violations: Vec<String>,
        warnings: Vec<String>,
    ) -> Result<GateTicket> {
        self.log_action(request, false);
        self.bump_stats(request, false, warnings.len());
        Err(CoreError::EnforcementViolation { violations, warnings })
    }

    fn project_initialized(&self, request: &GateRequest) -> Result<bool> {
        let states = self.engine.store().memories_with_tag(
            request
                .payload
                .get("user_id")
                .and_then(|v| v.as_str())
                .unwrap_or(crate::agent::DEFAULT_USER),
            "project-state",
            Some(Sector::Semantic),
        )?;
        Ok(states.iter().any(|m| m.has_tag(&request.project_name)))
    }

    fn check_payload_schema(&self, request: &GateRequest, violations: &mut Vec<String>) {
        let required: &[&str] = match request.action_type.as_str() {
            "state" => &["state"],
            "action" => &["action"],
            "pattern" => &["pattern_name", "description"],
            "decision" => &["decision", "rationale"],
            "emotion" => &["feeling"],
            "link" => &["source", "target"],
            "reinforce" => &["memory_id"],
            _ => &[],
        };
        for field in required {
            let present = request
                .payload
                .get(field)
                .map(|v| !v.is_null() && v.as_str().map(|s| !s.trim().is_empty()).unwrap_or(true))
                .unwrap_or(false);
            if !present {
                violations.push(format!(
                    "{} payload requires '{field}'",
                    request.action_type
                ));
            }
        }
    }

    fn collect_warnings(&self, request: &GateRequest, warnings: &mut Vec<String>) {
        let text = request.payload.to_string().to_lowercase();
        for phrase in ["are you sure", "please confirm", "waiting for user", "shall i"] {
            if text.contains(phrase) {
                warnings.push(format!(
                    "payload appears to wait on user confirmation (\"{phrase}\"); \
                     agents should proceed autonomously"
                ));
                break;
            }
        }
    }

    // ========================================================================
    // LOCKS
    // ========================================================================

    fn acquire_lock(&self, request: &GateRequest, task_id: &str) -> Result<String> {
        let key = format!("{}:{}", request.project_name, task_id);
        let now = now_ms();
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| CoreError::Init("lock table poisoned".to_string()))?;

        if let Some(existing) = locks.get(&key) {
            let stale = now - existing.acquired_at > LOCK_STALE_MS;
            if !stale && existing.agent_name != request.agent_name {
                return Err(CoreError::ResourceLocked {
                    holder: existing.agent_name.clone(),
                    task: key,
                });
            }
        }
        locks.insert(
            key.clone(),
            LockEntry {
                agent_name: request.agent_name.clone(),
                action_type: request.action_type.clone(),
                acquired_at: now,
            },
        );
        Ok(key)
    }

    /// Current lock table, stale entries included with their age
    pub fn active_locks(&self) -> Vec<LockView> {
        let now = now_ms();
        let Ok(locks) = self.locks.lock() else {
            return Vec::new();
        };
        let mut views: Vec<LockView> = locks
            .iter()
            .map(|(key, entry)| LockView {
                key: key.clone(),
                agent_name: entry.agent_name.clone(),
                action_type: entry.action_type.clone(),
                acquired_at: entry.acquired_at,
                age_ms: now - entry.acquired_at,
            })
            .collect();
        views.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at));
        views
    }

    /// Drop stale locks; returns how many were reclaimed
    pub fn reclaim_stale_locks(&self) -> usize {
        let now = now_ms();
        let Ok(mut locks) = self.locks.lock() else {
            return 0;
        };
        let before = locks.len();
        locks.retain(|_, entry| now - entry.acquired_at <= LOCK_STALE_MS);
        before - locks.len()
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    fn log_action(&self, request: &GateRequest, allowed: bool) {
        if let Ok(mut log) = self.action_log.lock() {
            if log.len() >= ACTION_LOG_CAP {
                log.pop_front();
            }
            log.push_back(ActionLogEntry {
                timestamp: now_ms(),
                project_name: request.project_name.clone(),
                agent_name: request.agent_name.clone(),
                action_type: request.action_type.clone(),
                allowed,
            });
        }
    }

    fn bump_stats(&self, request: &GateRequest, allowed: bool, warnings: usize) {
        if let Ok(mut stats) = self.stats.lock() {
            let entry = stats.entry(request.project_name.clone()).or_default();
            entry.total_checks += 1;
            if allowed {
                entry.allowed += 1;
            } else {
                entry.rejected += 1;
            }
            entry.warnings_issued += warnings as u64;
        }
    }

    /// Counters for one project
    pub fn stats(&self, project: &str) -> GateStats {
        self.stats
            .lock()
            .ok()
            .and_then(|stats| stats.get(project).cloned())
            .unwrap_or_default()
    }

    /// Gate health summary
    pub fn health(&self) -> GateHealth {
        GateHealth {
            auth_mode: self.engine.config().auth_mode.clone(),
            active_locks: self.locks.lock().map(|l| l.len()).unwrap_or(0),
            action_log_entries: self.action_log.lock().map(|l| l.len()).unwrap_or(0),
            memory_count: self.engine.store().count_memories().unwrap_or(0),
            max_active_memories: self.engine.config().max_active_memories,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
