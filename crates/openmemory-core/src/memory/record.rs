//! Memory records and waypoint edges
//!
//! A [`Memory`] carries agent-authored content, its embedding, a JSON meta
//! bag with a closed set of recognised keys (unknown keys are stored
//! verbatim but never queried), and the salience/coactivation counters the
//! decay and reinforcement algebra operates on.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::sector::{Sector, Tier};

// ============================================================================
// SALIENCE CONSTANTS
// ============================================================================

/// Active floor; decay never pushes salience below this
pub const SALIENCE_FLOOR: f64 = 0.1;
/// Upper clamp on every write
pub const SALIENCE_MAX: f64 = 1.0;
/// Archive tier, intentionally below the active floor
pub const SALIENCE_ARCHIVE: f64 = 0.05;
/// Merge sink for consolidated duplicates
pub const SALIENCE_MERGE_SINK: f64 = 0.01;

/// Current time in milliseconds since the epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// MEMORY
// ============================================================================

/// A memory node in the hierarchical semantic graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// The agent-authored content
    pub content: String,
    /// Fixed-dimension embedding vector
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Short labels; order-independent, duplicates ignored, always includes
    /// the project name for project-scoped records
    pub tags: Vec<String>,
    /// Structured attributes (outcome, sentiment, confidence, ...)
    pub meta: serde_json::Value,
    /// Owner namespace; all reads are scoped by user
    pub user_id: String,
    /// Cognitive sector, immutable after creation
    pub primary_sector: Sector,
    /// Importance weight, clamped to [0.1, 1.0] on active writes
    pub salience: f64,
    /// Retrieval hits plus explicit reinforcements
    pub coactivations: i64,
    /// Millisecond timestamps
    pub created_at: i64,
    pub updated_at: i64,
    pub last_seen_at: i64,
}

impl Memory {
    /// Tier classification, derived from freshness and importance
    ///
    /// With `dt = now - max(last_seen_at, updated_at)`: hot when seen within
    /// six days and either well-used or high-salience, warm when recent or
    /// moderately salient, cold otherwise.
    pub fn tier(&self, now: i64) -> Tier {
        let dt_days = (now - self.last_seen_at.max(self.updated_at)) as f64 / 86_400_000.0;
        if dt_days < 6.0 && (self.coactivations > 5 || self.salience > 0.7) {
            Tier::Hot
        } else if dt_days < 6.0 || self.salience > 0.4 {
            Tier::Warm
        } else {
            Tier::Cold
        }
    }

    /// Importance score exposed in metrics
    pub fn importance(&self) -> f64 {
        importance_score(self.salience, self.coactivations)
    }

    /// Age in days at `now`
    pub fn age_days(&self, now: i64) -> f64 {
        ((now - self.created_at) as f64 / 86_400_000.0).max(0.0)
    }

    /// String value from the meta bag
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }

    /// Float value from the meta bag
    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta.get(key).and_then(|v| v.as_f64())
    }

    /// Whether the memory carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// `salience * (1 + ln(1 + coactivations))`
pub fn importance_score(salience: f64, coactivations: i64) -> f64 {
    salience * (1.0 + (1.0 + coactivations as f64).ln())
}

// ============================================================================
// INPUTS AND PATCHES
// ============================================================================

/// Input for creating a memory through the engine
#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
    pub content: String,
    pub tags: Vec<String>,
    pub meta: serde_json::Value,
    pub user_id: String,
    pub sector: Sector,
    /// Initial salience, clamped to the active range on write
    pub salience: f64,
}

/// Partial update applied to a stored memory; `None` fields are untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPatch {
    pub salience: Option<f64>,
    pub coactivations: Option<i64>,
    pub last_seen_at: Option<i64>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.salience.is_none() && self.coactivations.is_none() && self.last_seen_at.is_none()
    }
}

// ============================================================================
// WAYPOINTS
// ============================================================================

/// A directed, weighted edge between two memories
///
/// At most one edge exists per ordered pair; writes are upserts. Semantic
/// roles (`led_to`, `used`, `resulted_in`, `informed_by`) live in the meta
/// of the endpoints, not on the edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub src_id: String,
    pub dst_id: String,
    /// Edge weight in [0, 1]
    pub weight: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// METRICS
// ============================================================================

/// Per-memory metrics surfaced by the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub id: String,
    pub salience: f64,
    pub coactivations: i64,
    pub age_days: f64,
    /// `coactivations / max(age_days, 1)`
    pub usage_frequency: f64,
    pub importance_score: f64,
    pub tier: Tier,
    pub sector: Sector,
}

// ============================================================================
// TESTS
// ============================================================================
