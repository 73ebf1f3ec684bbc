//! Success-pattern extractor
//!
//! Mines recent successful actions for three kinds of reusable patterns:
//! repeated 3-step sequences, named approaches, and named techniques.
//! Extractions confident and frequent enough are persisted as procedural
//! memories and linked back to the actions that demonstrated them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::{now_ms, Memory, MemoryInput, Sector};

use super::{is_success_outcome, persist_report, sector_memories, DAY_MS};

/// Window the extractor mines
const LOOKBACK_DAYS: i64 = 30;
/// Sequence observations required
const SEQUENCE_MIN: usize = 2;
/// Actions mentioning an approach required
const APPROACH_MIN: usize = 3;
/// Actions mentioning a technique required
const TECHNIQUE_MIN: usize = 2;
/// Persistence thresholds
const PERSIST_CONFIDENCE: f64 = 0.6;
const PERSIST_FREQUENCY: usize = 2;
/// Weight of the link from an extracted pattern to its source actions
const SOURCE_LINK_WEIGHT: f64 = 0.75;

const APPROACH_BUNDLES: &[(&str, &[&str])] = &[
    ("test-driven", &["test first", "tdd", "wrote the test before"]),
    ("incremental", &["incremental", "step by step", "iterative", "small steps"]),
    ("refactor-first", &["refactor", "cleaned up before", "restructure first"]),
];

const TECHNIQUE_BUNDLES: &[(&str, &[&str])] = &[
    ("error-handling", &["error handling", "handled errors", "recover", "graceful"]),
    ("validation", &["validate", "validation", "sanity check"]),
    ("logging", &["logging", "structured logs", "log line"]),
    ("documentation", &["documented", "docs", "readme", "comment"]),
];

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPattern {
    /// SEQUENCE | APPROACH | TECHNIQUE
    pub kind: String,
    pub name: String,
    pub confidence: f64,
    pub frequency: usize,
    /// Id of the persisted procedural memory, when thresholds were met
    pub memory_id: Option<String>,
    pub source_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternExtractionReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub actions_mined: usize,
    pub patterns_extracted: usize,
    pub patterns: Vec<ExtractedPattern>,
    pub persisted: bool,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Collapse an action description to its normalized shape: lowercase,
/// quoted literals replaced by one placeholder, digit runs collapsed.
/// An unterminated quote swallows the rest of the string into the
/// placeholder.
pub(crate) fn normalize_action(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut last_space = false;

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
                out.push_str("<lit>");
                last_space = false;
            }
            d if d.is_ascii_digit() => {
                while chars.peek().is_some_and(|p| p.is_ascii_digit()) {
                    chars.next();
                }
                out.push_str("<n>");
                last_space = false;
            }
            w if w.is_whitespace() => {
                if !last_space && !out.is_empty() {
                    out.push(' ');
                }
                last_space = true;
            }
            other => {
                out.extend(other.to_lowercase());
                last_space = false;
            }
        }
    }
    out.trim_end().to_string()
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Run the success-pattern extractor
pub async fn analyze(engine: &HsgEngine, project: &str, user_id: &str) -> PatternExtractionReport {
    let cutoff = now_ms() - LOOKBACK_DAYS * DAY_MS;
    // Listings come newest-first with a stable tiebreak; reversing restores
    // chronological order for sequence mining
    let mut actions: Vec<Memory> = sector_memories(engine, project, user_id, Sector::Episodic)
        .into_iter()
        .filter(|m| is_success_outcome(m) && m.created_at >= cutoff)
        .collect();
    actions.reverse();

    let mut patterns = Vec::new();
    mine_sequences(&actions, &mut patterns);
    mine_bundles(&actions, APPROACH_BUNDLES, "APPROACH", APPROACH_MIN, &mut patterns);
    mine_bundles(&actions, TECHNIQUE_BUNDLES, "TECHNIQUE", TECHNIQUE_MIN, &mut patterns);

    let existing = sector_memories(engine, project, user_id, Sector::Procedural);
    let mut extracted = 0;
    for pattern in &mut patterns {
        if pattern.confidence < PERSIST_CONFIDENCE || pattern.frequency < PERSIST_FREQUENCY {
            continue;
        }
        // One persisted memory per pattern name; re-extraction reinforces
        // nothing and creates nothing
        let already = existing.iter().any(|m| {
            m.has_tag("extracted-pattern") && m.meta_str("pattern_name") == Some(&pattern.name)
        });
        if already {
            continue;
        }
        if let Some(id) = persist_pattern(engine, project, user_id, pattern) {
            pattern.memory_id = Some(id);
            extracted += 1;
        }
    }

    let mut report = PatternExtractionReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        actions_mined: actions.len(),
        patterns_extracted: extracted,
        patterns,
        persisted: false,
    };
    let value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    report.persisted = persist_report(
        engine,
        "patterns",
        project,
        user_id,
        report.patterns_extracted as i64,
        &value,
    );
    report
}

/// (a) sliding 3-step windows over normalized actions
fn mine_sequences(actions: &[Memory], patterns: &mut Vec<ExtractedPattern>) {
    let normalized: Vec<String> = actions.iter().map(|a| normalize_action(&a.content)).collect();
    let mut counts: HashMap<[&str; 3], Vec<usize>> = HashMap::new();
    for (index, window) in normalized.windows(3).enumerate() {
        let key = [window[0].as_str(), window[1].as_str(), window[2].as_str()];
        counts.entry(key).or_default().push(index);
    }

    for (steps, starts) in counts {
        let n = starts.len();
        if n < SEQUENCE_MIN {
            continue;
        }
        let mut sources = Vec::new();
        for start in &starts {
            for offset in 0..3 {
                let id = &actions[start + offset].id;
                if !sources.contains(id) {
                    sources.push(id.clone());
                }
            }
        }
        patterns.push(ExtractedPattern {
            kind: "SEQUENCE".to_string(),
            name: format!("sequence: {} -> {} -> {}", steps[0], steps[1], steps[2]),
            confidence: (0.5 + n as f64 * 0.1).min(0.95),
            frequency: n,
            memory_id: None,
            source_actions: sources,
        });
    }
}

/// (b)/(c) keyword bundles counted per action
fn mine_bundles(
    actions: &[Memory],
    bundles: &[(&str, &[&str])],
    kind: &str,
    min_actions: usize,
    patterns: &mut Vec<ExtractedPattern>,
) {
    for &(name, keywords) in bundles {
        let matching: Vec<&Memory> = actions
            .iter()
            .filter(|a| {
                let text = a.content.to_lowercase();
                keywords.iter().any(|kw| text.contains(kw))
            })
            .collect();
        let n = matching.len();
        if n < min_actions {
            continue;
        }
        patterns.push(ExtractedPattern {
            kind: kind.to_string(),
            name: format!("{kind}: {name}").to_lowercase(),
            confidence: (0.5 + n as f64 * 0.1).min(0.95),
            frequency: n,
            memory_id: None,
            source_actions: matching.iter().map(|m| m.id.clone()).collect(),
        });
    }
}

fn persist_pattern(
    engine: &HsgEngine,
    project: &str,
    user_id: &str,
    pattern: &ExtractedPattern,
) -> Option<String> {
    let memory = engine
        .remember(MemoryInput {
            content: format!(
                "{} (observed {} times in successful work)",
                pattern.name, pattern.frequency
            ),
            tags: vec![
                project.to_string(),
                "pattern".to_string(),
                "extracted-pattern".to_string(),
            ],
            meta: serde_json::json!({
                "project_name": project,
                "pattern_name": pattern.name,
                "confidence": pattern.confidence,
            }),
            user_id: user_id.to_string(),
            sector: Sector::Procedural,
            salience: pattern.confidence,
        })
        .ok()?;

    for action_id in &pattern.source_actions {
        if let Err(e) = engine
            .store()
            .upsert_waypoint(&memory.id, action_id, SOURCE_LINK_WEIGHT)
        {
            tracing::warn!("could not link extracted pattern to source: {e}");
        }
    }
    Some(memory.id)
}

// ============================================================================
// TESTS
// ============================================================================
