//! Memory consolidator
//!
//! Merges near-duplicate memories within each sector, archives memories
//! that have decayed into irrelevance, and cleans orphaned waypoints.
//! Merges are mass-preserving: coactivations sum into the survivor and a
//! fraction of each duplicate's salience carries over.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{
    now_ms, Memory, MemoryPatch, Sector, SALIENCE_ARCHIVE, SALIENCE_MAX, SALIENCE_MERGE_SINK,
};

use super::{jaccard, persist_report, project_memories, tokenize};

/// Memories younger than this are never consolidated
const MIN_AGE_DAYS: f64 = 7.0;
/// Fraction of a duplicate's salience folded into the survivor
const MERGE_CARRY: f64 = 0.3;
/// Tokens shorter than this don't participate in similarity
const MERGE_TOKEN_LEN: usize = 4;
/// Age beyond which cold, unused memories are archived
const ARCHIVE_AGE_DAYS: f64 = 90.0;
/// Coactivation ceiling for archive candidates
const ARCHIVE_MAX_COACTIVATIONS: i64 = 2;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRecord {
    pub survivor_id: String,
    pub merged_id: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub memories_scanned: usize,
    pub merges: Vec<MergeRecord>,
    pub archived: Vec<String>,
    pub orphan_waypoints_removed: usize,
    pub persisted: bool,
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the consolidator
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> ConsolidationReport {
    let merge_threshold = engine.config().merge_threshold;
    let archive_threshold = engine.config().archive_threshold;
    let now = now_ms();

    let memories = project_memories(engine, project, user_id);
    let mut merges = Vec::new();
    let mut consumed: HashSet<String> = HashSet::new();

    // Duplicate merge, per sector, oldest-enough rows only
    for sector in Sector::ALL {
        let eligible: Vec<&Memory> = memories
            .iter()
            .filter(|m| {
                m.primary_sector == sector
                    && m.age_days(now) >= MIN_AGE_DAYS
                    && m.salience > SALIENCE_MERGE_SINK
            })
            .collect();

        for i in 0..eligible.len() {
            for j in (i + 1)..eligible.len() {
                let a = eligible[i];
                let b = eligible[j];
                if consumed.contains(&a.id) || consumed.contains(&b.id) {
                    continue;
                }
                let similarity = jaccard(
                    &tokenize(&a.content, MERGE_TOKEN_LEN),
                    &tokenize(&b.content, MERGE_TOKEN_LEN),
                );
                if similarity < merge_threshold {
                    continue;
                }

                // Lexicographic-first id survives
                let (survivor, duplicate) = if a.id < b.id { (a, b) } else { (b, a) };
                if merge_pair(engine, &survivor.id, &duplicate.id).is_ok() {
                    consumed.insert(duplicate.id.clone());
                    merges.push(MergeRecord {
                        survivor_id: survivor.id.clone(),
                        merged_id: duplicate.id.clone(),
                        similarity,
                    });
                }
            }
        }
    }

    // Archive tier: decayed, unused, old
    let mut archived = Vec::new();
    for memory in &memories {
        if consumed.contains(&memory.id) {
            continue;
        }
        if memory.salience < archive_threshold
            && memory.salience > SALIENCE_ARCHIVE
            && memory.coactivations < ARCHIVE_MAX_COACTIVATIONS
            && memory.age_days(now) > ARCHIVE_AGE_DAYS
        {
            let patch = MemoryPatch {
                salience: Some(SALIENCE_ARCHIVE),
                ..Default::default()
            };
            if engine.store().update_memory_fields(&memory.id, patch).is_ok() {
                archived.push(memory.id.clone());
            }
        }
    }

    let orphan_waypoints_removed = engine.store().delete_orphan_waypoints().unwrap_or(0);

    let mut report = ConsolidationReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now,
        memories_scanned: memories.len(),
        merges,
        archived,
        orphan_waypoints_removed,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "consolidation",
        project,
        user_id,
        (report.merges.len() + report.archived.len()) as i64,
        &value,
    );
    report
}

/// Fold a duplicate into its survivor: salience carry, coactivation sum,
/// waypoint move, then sink the duplicate
///
/// Both rows are re-read from the store: a survivor can absorb several
/// duplicates in one pass, and a duplicate may itself have absorbed others
/// before losing, so the pre-pass snapshot is stale by now. Computing from
/// current rows is what keeps merges mass-preserving across chains.
fn merge_pair(engine: &HsgEngine, survivor_id: &str, duplicate_id: &str) -> crate::error::Result<()> {
    let survivor = engine
        .store()
        .get_memory(survivor_id)?
        .ok_or_else(|| crate::error::CoreError::NotFound(survivor_id.to_string()))?;
    let duplicate = engine
        .store()
        .get_memory(duplicate_id)?
        .ok_or_else(|| crate::error::CoreError::NotFound(duplicate_id.to_string()))?;

    let merged_salience =
        (survivor.salience + duplicate.salience * MERGE_CARRY).min(SALIENCE_MAX);
    engine.store().update_memory_fields(
        survivor_id,
        MemoryPatch {
            salience: Some(merged_salience),
            coactivations: Some(survivor.coactivations + duplicate.coactivations),
            ..Default::default()
        },
    )?;
    engine.store().move_waypoints(duplicate_id, survivor_id)?;
    engine.store().update_memory_fields(
        duplicate_id,
        MemoryPatch {
            salience: Some(SALIENCE_MERGE_SINK),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// Current consolidation standing for `/consolidation/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationStats {
    pub project_name: String,
    pub active: usize,
    pub archived: usize,
    pub merged: usize,
    pub recent_runs: Vec<crate::storage::ReportRow>,
}

pub fn stats(engine: &HsgEngine, project: &str, user_id: &str) -> ConsolidationStats {
    let memories = project_memories(engine, project, user_id);
    let mut active = 0;
    let mut archived = 0;
    let mut merged = 0;
    for memory in &memories {
        if memory.salience <= SALIENCE_MERGE_SINK {
            merged += 1;
        } else if memory.salience <= SALIENCE_ARCHIVE {
            archived += 1;
        } else {
            active += 1;
        }
    }
    ConsolidationStats {
        project_name: project.to_string(),
        active,
        archived,
        merged,
        recent_runs: engine
            .store()
            .latest_reports("consolidation", project, 5)
            .unwrap_or_default(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
