//! Memory Model
//!
//! The atomic unit is a [`Memory`]: agent-authored content with an embedding,
//! assigned to one of five cognitive sectors, weighted by salience, and
//! linked to other memories through directed [`Waypoint`] edges.

mod record;
mod sector;

pub use record::{
    Memory, MemoryInput, MemoryMetrics, MemoryPatch, Waypoint, importance_score, now_ms,
    SALIENCE_ARCHIVE, SALIENCE_FLOOR, SALIENCE_MAX, SALIENCE_MERGE_SINK,
};
pub use sector::{Sector, Sentiment, Tier};
