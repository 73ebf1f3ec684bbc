//! Runtime configuration
//!
//! A single environment-sourced struct read once at boot. Values live in
//! process memory; changing them requires a restart.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `OPENMEMORY_DB_PATH` | platform data dir | SQLite database file |
//! | `OPENMEMORY_VECTOR_DIM` | 256 | embedding dimensions |
//! | `OPENMEMORY_DECAY_INTERVAL_MIN` | 1440 | minutes between decay sweeps |
//! | `OPENMEMORY_PRUNE_INTERVAL_MIN` | 10080 | minutes between waypoint prunes |
//! | `OPENMEMORY_WAYPOINT_PRUNE_THRESHOLD` | 0.05 | weight below which edges go |
//! | `OPENMEMORY_ARCHIVE_THRESHOLD` | 0.15 | salience below which old unused memories archive |
//! | `OPENMEMORY_MERGE_THRESHOLD` | 0.85 | Jaccard similarity for duplicate merge |
//! | `OPENMEMORY_PORT` | 8080 | HTTP listen port |
//! | `OPENMEMORY_MAX_PAYLOAD_BYTES` | 1048576 | request body cap |
//! | `OPENMEMORY_MAX_ACTIVE_MEMORIES` | 100000 | soft ceiling reported in health |
//! | `OPENMEMORY_CACHE_SEGMENTS` | 8 | query-embedding cache segments |
//! | `OPENMEMORY_AUTH_MODE` | "none" | auth shim mode (out of core scope) |

use std::path::PathBuf;

use crate::memory::Sector;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-sector decay rates, in salience units per day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRates {
    pub emotional: f64,
    pub episodic: f64,
    pub procedural: f64,
    pub semantic: f64,
    pub reflective: f64,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            emotional: 0.020,
            episodic: 0.015,
            procedural: 0.008,
            semantic: 0.005,
            reflective: 0.001,
        }
    }
}

impl DecayRates {
    /// Decay rate for a sector
    pub fn for_sector(&self, sector: Sector) -> f64 {
        match sector {
            Sector::Emotional => self.emotional,
            Sector::Episodic => self.episodic,
            Sector::Procedural => self.procedural,
            Sector::Semantic => self.semantic,
            Sector::Reflective => self.reflective,
        }
    }

    fn from_env() -> Self {
        let d = Self::default();
        Self {
            emotional: env_parse("OPENMEMORY_DECAY_EMOTIONAL", d.emotional),
            episodic: env_parse("OPENMEMORY_DECAY_EPISODIC", d.episodic),
            procedural: env_parse("OPENMEMORY_DECAY_PROCEDURAL", d.procedural),
            semantic: env_parse("OPENMEMORY_DECAY_SEMANTIC", d.semantic),
            reflective: env_parse("OPENMEMORY_DECAY_REFLECTIVE", d.reflective),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database file; `None` selects the platform data directory
    pub db_path: Option<PathBuf>,
    /// Embedding vector dimensions
    pub vector_dim: usize,
    /// Minutes between decay sweeps
    pub decay_interval_min: u64,
    /// Minutes between waypoint prunes
    pub prune_interval_min: u64,
    /// Waypoints below this weight are pruned
    pub waypoint_prune_threshold: f64,
    /// Salience below which old, unused memories are archived
    pub archive_threshold: f64,
    /// Jaccard similarity at or above which duplicates merge
    pub merge_threshold: f64,
    /// Per-sector decay rates
    pub decay: DecayRates,
    /// HTTP listen port
    pub port: u16,
    /// Maximum request payload in bytes
    pub max_payload_bytes: usize,
    /// Soft ceiling on active memories, reported in health output
    pub max_active_memories: u64,
    /// Query-embedding cache segments
    pub cache_segments: usize,
    /// Authentication shim mode
    pub auth_mode: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            vector_dim: 256,
            decay_interval_min: 24 * 60,
            prune_interval_min: 7 * 24 * 60,
            waypoint_prune_threshold: 0.05,
            archive_threshold: 0.15,
            merge_threshold: 0.85,
            decay: DecayRates::default(),
            port: 8080,
            max_payload_bytes: 1024 * 1024,
            max_active_memories: 100_000,
            cache_segments: 8,
            auth_mode: "none".to_string(),
        }
    }
}

impl Config {
    /// Build a config from `OPENMEMORY_*` environment variables, falling
    /// back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            db_path: std::env::var("OPENMEMORY_DB_PATH").ok().map(PathBuf::from),
            vector_dim: env_parse("OPENMEMORY_VECTOR_DIM", d.vector_dim),
            decay_interval_min: env_parse("OPENMEMORY_DECAY_INTERVAL_MIN", d.decay_interval_min),
            prune_interval_min: env_parse("OPENMEMORY_PRUNE_INTERVAL_MIN", d.prune_interval_min),
            waypoint_prune_threshold: env_parse(
                "OPENMEMORY_WAYPOINT_PRUNE_THRESHOLD",
                d.waypoint_prune_threshold,
            ),
            archive_threshold: env_parse("OPENMEMORY_ARCHIVE_THRESHOLD", d.archive_threshold),
            merge_threshold: env_parse("OPENMEMORY_MERGE_THRESHOLD", d.merge_threshold),
            decay: DecayRates::from_env(),
            port: env_parse("OPENMEMORY_PORT", d.port),
            max_payload_bytes: env_parse("OPENMEMORY_MAX_PAYLOAD_BYTES", d.max_payload_bytes),
            max_active_memories: env_parse("OPENMEMORY_MAX_ACTIVE_MEMORIES", d.max_active_memories),
            cache_segments: env_parse("OPENMEMORY_CACHE_SEGMENTS", d.cache_segments),
            auth_mode: std::env::var("OPENMEMORY_AUTH_MODE").unwrap_or(d.auth_mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_decay_ordering() {
        let d = DecayRates::default();
        // Emotional decays fastest, reflective slowest
        assert!(d.emotional > d.episodic);
        assert!(d.episodic > d.procedural);
        assert!(d.procedural > d.semantic);
        assert!(d.semantic > d.reflective);
    }

    #[test]
    fn test_sector_lookup() {
        let d = DecayRates::default();
        assert_eq!(d.for_sector(Sector::Emotional), 0.020);
        assert_eq!(d.for_sector(Sector::Reflective), 0.001);
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.vector_dim, 256);
        assert_eq!(c.decay_interval_min, 1440);
        assert_eq!(c.merge_threshold, 0.85);
        assert_eq!(c.archive_threshold, 0.15);
    }
}
