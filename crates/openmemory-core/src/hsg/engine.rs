//! Engine core: writes, retrieval, reinforcement, decay.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::embed::{cosine_similarity, Embedder};
use crate::error::{CoreError, Result};
use crate::memory::{
    now_ms, Memory, MemoryInput, MemoryMetrics, MemoryPatch, Sector, SALIENCE_FLOOR, SALIENCE_MAX,
};
use crate::storage::MemoryStore;

// ============================================================================
// RETRIEVAL RESULT
// ============================================================================

/// A retrieval hit with its scoring breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub memory: Memory,
    /// Raw cosine similarity to the query
    pub similarity: f64,
    /// `similarity * salience * (1 + ln(1 + coactivations))`
    pub score: f64,
}

/// Boost applied by smart reinforcement, keyed by reason
pub fn boost_for_reason(reason: &str) -> Option<f64> {
    match reason {
        "success" => Some(0.20),
        "frequent_use" => Some(0.15),
        "critical_decision" => Some(0.25),
        "reference" => Some(0.10),
        _ => None,
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// The HSG engine: owns the store handle, the embedding port, and the
/// query-embedding cache
pub struct HsgEngine {
    store: Arc<MemoryStore>,
    embedder: Box<dyn Embedder>,
    config: Config,
    /// Repeated queries skip the embedder
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl HsgEngine {
    pub fn new(store: Arc<MemoryStore>, embedder: Box<dyn Embedder>, config: Config) -> Self {
        let capacity = NonZeroUsize::new(config.cache_segments.max(1) * 16)
            .unwrap_or(NonZeroUsize::new(128).expect("128 is non-zero"));
        Self {
            store,
            embedder,
            config,
            query_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Create a memory: embed the content, clamp salience to the active
    /// range, and persist. No row is written when the embedder fails.
    pub fn remember(&self, input: MemoryInput) -> Result<Memory> {
        let embedding = self
            .embedder
            .embed(&input.content)
            .map_err(|e| CoreError::EmbedderUnavailable(e.to_string()))?;

        let mut tags = Vec::new();
        for tag in input.tags {
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let now = now_ms();
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            content: input.content,
            embedding,
            tags,
            meta: if input.meta.is_object() {
                input.meta
            } else {
                serde_json::json!({})
            },
            user_id: input.user_id,
            primary_sector: input.sector,
            salience: input.salience.clamp(SALIENCE_FLOOR, SALIENCE_MAX),
            coactivations: 0,
            created_at: now,
            updated_at: now,
            last_seen_at: now,
        };
        self.store.insert_memory(&memory)?;
        Ok(memory)
    }

    // ========================================================================
    // RETRIEVAL
    // ========================================================================

    /// Similarity-ranked retrieval over a sector subset
    ///
    /// Cosine similarity is the primary signal; salience and usage act as
    /// multiplicative amplifiers so frequently-validated memories outrank
    /// one-off noise at equal similarity. Returned memories are touched
    /// (`coactivations += 1`, `last_seen_at = now`).
    pub fn query(
        &self,
        text: &str,
        k: usize,
        sectors: &[Sector],
        user_id: &str,
    ) -> Result<Vec<ScoredMemory>> {
        let query_vec = self.embed_query(text)?;
        let candidates = self.store.memories_by_sectors(user_id, sectors)?;

        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|m| {
                let similarity = cosine_similarity(&query_vec, &m.embedding) as f64;
                let score =
                    similarity * m.salience * (1.0 + (1.0 + m.coactivations as f64).ln());
                ScoredMemory { memory: m, similarity, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.memory.created_at.cmp(&a.memory.created_at))
        });
        scored.truncate(k);

        for hit in &mut scored {
            // Touch failures degrade the counters, not the response
            if let Err(e) = self.store.touch_memory(&hit.memory.id) {
                tracing::warn!(id = %hit.memory.id, "failed to touch memory: {e}");
            } else {
                hit.memory.coactivations += 1;
                hit.memory.last_seen_at = now_ms();
            }
        }
        Ok(scored)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(vec) = cache.get(text) {
                return Ok(vec.clone());
            }
        }
        let vec = self
            .embedder
            .embed(text)
            .map_err(|e| CoreError::EmbedderUnavailable(e.to_string()))?;
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(text.to_string(), vec.clone());
        }
        Ok(vec)
    }

    // ========================================================================
    // REINFORCEMENT
    // ========================================================================

    /// Raw reinforcement: salience rises by `boost` (capped at 1.0) and the
    /// coactivation counter always increments
    pub fn reinforce(&self, id: &str, boost: f64) -> Result<Memory> {
        if !(0.0..=1.0).contains(&boost) {
            return Err(CoreError::BadRequest(format!(
                "boost must be within [0, 1], got {boost}"
            )));
        }
        let memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        self.store.update_memory_fields(
            id,
            MemoryPatch {
                salience: Some((memory.salience + boost).min(SALIENCE_MAX)),
                coactivations: Some(memory.coactivations + 1),
                last_seen_at: Some(now_ms()),
            },
        )?;
        self.store
            .get_memory(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// Reason-driven reinforcement using the fixed boost table
    pub fn smart_reinforce(&self, id: &str, reason: &str) -> Result<(Memory, f64)> {
        let boost = boost_for_reason(reason).ok_or_else(|| {
            CoreError::BadRequest(format!(
                "unknown reinforcement reason '{reason}' \
                 (expected success, frequent_use, critical_decision, or reference)"
            ))
        })?;
        let memory = self.reinforce(id, boost)?;
        Ok((memory, boost))
    }

    // ========================================================================
    // DECAY
    // ========================================================================

    /// One decay tick across all sectors
    ///
    /// `dt` is the time since the previous sweep (the configured interval
    /// when no sweep has ever run). Salience drops by `lambda * dt_days`,
    /// floored at 0.1; archived rows are untouched. Decay applies whether
    /// or not the memory was recently seen.
    pub fn decay_sweep(&self) -> Result<usize> {
        let now = now_ms();
        let dt_days = match self.store.last_maintenance_run("decay")? {
            Some(last) => ((now - last) as f64 / 86_400_000.0).max(0.0),
            None => self.config.decay_interval_min as f64 / (24.0 * 60.0),
        };

        let mut touched = 0;
        for sector in Sector::ALL {
            let lambda = self.config.decay.for_sector(sector);
            touched += self.store.apply_decay(sector, lambda, dt_days)?;
        }
        self.store.record_maintenance_run("decay", touched)?;
        Ok(touched)
    }

    // ========================================================================
    // METRICS
    // ========================================================================

    /// Per-memory metrics for the HTTP surface
    pub fn metrics(&self, id: &str) -> Result<MemoryMetrics> {
        let memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let now = now_ms();
        let age_days = memory.age_days(now);
        Ok(MemoryMetrics {
            id: memory.id.clone(),
            salience: memory.salience,
            coactivations: memory.coactivations,
            age_days,
            usage_frequency: memory.coactivations as f64 / age_days.max(1.0),
            importance_score: memory.importance(),
            tier: memory.tier(now),
            sector: memory.primary_sector,
        })
    }

    /// Top-N memories for a user ranked by importance score
    pub fn most_important(&self, user_id: &str, n: usize) -> Result<Vec<Memory>> {
        let mut memories = self.store.memories_for_user(user_id)?;
        memories.sort_by(|a, b| {
            b.importance()
                .partial_cmp(&a.importance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        memories.truncate(n);
        Ok(memories)
    }
}

// ============================================================================
// TESTS
// ============================================================================
