//! # OpenMemory Core
//!
//! Self-hosted cognitive memory engine for AI agents working across
//! long-lived software projects:
//!
//! - **Hierarchical Semantic Graph**: memories assigned to five cognitive
//!   sectors (semantic, episodic, procedural, reflective, emotional) and
//!   linked by weighted waypoint edges
//! - **Decay and reinforcement**: per-sector decay rates, salience clamped
//!   to an active floor, reason-driven reinforcement boosts
//! - **Similarity retrieval**: cosine similarity amplified by salience and
//!   usage, so frequently-validated memories outrank one-off noise
//! - **Autonomous analysis**: validators, self-correction, proactive
//!   intelligence, and learning/quality analyzers sharing one contract and
//!   running concurrently against the same store
//! - **Enforcement gate**: mandatory-usage checks and per-task locks in
//!   front of every write
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use openmemory_core::{
//!     AgentMemory, Config, HashEmbedder, HsgEngine, MemoryStore, StateInput,
//! };
//!
//! let config = Config::from_env();
//! let store = Arc::new(MemoryStore::open(config.db_path.clone())?);
//! let embedder = Box::new(HashEmbedder::new(config.vector_dim));
//! let engine = Arc::new(HsgEngine::new(store, embedder, config));
//! let agent = AgentMemory::new(engine.clone());
//!
//! agent.store_state(StateInput {
//!     project_name: "demo".into(),
//!     user_id: "ai-agent-system".into(),
//!     state: serde_json::json!({"progress_percentage": 0}),
//! })?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod agent;
pub mod analysis;
pub mod config;
pub mod embed;
pub mod enforcement;
pub mod error;
pub mod hsg;
pub mod maintenance;
pub mod memory;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Memory model
pub use memory::{
    importance_score, now_ms, Memory, MemoryInput, MemoryMetrics, MemoryPatch, Sector, Sentiment,
    Tier, Waypoint, SALIENCE_ARCHIVE, SALIENCE_FLOOR, SALIENCE_MAX, SALIENCE_MERGE_SINK,
};

// Configuration
pub use config::{Config, DecayRates};

// Errors
pub use error::{CoreError, Result};

// Embedding port
pub use embed::{cosine_similarity, EmbedError, Embedder, HashEmbedder};

// Storage
pub use storage::{MemoryStore, ReportRow};

// Engine
pub use hsg::{boost_for_reason, GraphNode, GraphView, HsgEngine, PruneSummary, ScoredMemory};

// Agent facade
pub use agent::{
    ActionInput, AgentMemory, DecisionInput, EmotionInput, LinkInput, PatternInput, ProjectContext,
    QueryInput, SentimentSummary, SessionMode, StateInput, StateView, DEFAULT_USER,
};

// Enforcement gate
pub use enforcement::{EnforcementGate, GateHealth, GateRequest, GateStats, GateTicket, LockView};

// Maintenance loops
pub use maintenance::{spawn_maintenance, spawn_maintenance_with_hook, ReflectionHook};

// Analysis
pub use analysis::autonomous::{self, AutonomousReport};
pub use analysis::Severity;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
