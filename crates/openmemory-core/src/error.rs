//! Error taxonomy shared across the engine, the agent facade, and the
//! analyzers.
//!
//! Writes are local-or-fail: a failing insert aborts the operation with no
//! partial row. Reads are best-effort at the call sites (a retrieval failure
//! becomes an empty result). Background loops catch and log.

/// Core error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Missing or invalid request fields; no side effects were taken
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Memory or state record missing
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedding port failed; the record was not persisted
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    /// Record store write failure
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Enforcement lock held by another agent within the stale window
    #[error("resource locked: {task} held by {holder}")]
    ResourceLocked {
        /// Agent currently holding the lock
        holder: String,
        /// The `project:task` lock key
        task: String,
    },

    /// Aggregated enforcement gate rejection
    #[error("enforcement violation: {}", violations.join("; "))]
    EnforcementViolation {
        /// Blocking violations
        violations: Vec<String>,
        /// Non-blocking warnings
        warnings: Vec<String>,
    },

    /// Internal inconsistency detected during an analyzer run; repaired in
    /// place and recorded in the report, never surfaced to HTTP callers
    #[error("validation error: {0}")]
    ValidationError(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Initialization error
    #[error("init error: {0}")]
    Init(String),
}

/// Core result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_message_joins() {
        let err = CoreError::EnforcementViolation {
            violations: vec!["missing project_name".into(), "missing agent_name".into()],
            warnings: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("missing project_name"));
        assert!(msg.contains("; "));
    }

    #[test]
    fn test_locked_message_names_holder() {
        let err = CoreError::ResourceLocked {
            holder: "builder-1".into(),
            task: "proj:task-9".into(),
        };
        assert_eq!(err.to_string(), "resource locked: proj:task-9 held by builder-1");
    }
}
