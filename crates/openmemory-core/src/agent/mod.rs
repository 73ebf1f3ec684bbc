//! Agent API
//!
//! Project-scoped facade over the HSG engine. Every write tags the record
//! with the project name plus role-specific labels and assigns the sector
//! deterministically:
//!
//! | operation | sector |
//! |---|---|
//! | store state | semantic |
//! | record action | episodic |
//! | record pattern | procedural |
//! | record decision | reflective |
//! | record emotion | emotional |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hsg::{HsgEngine, ScoredMemory};
use crate::memory::{Memory, MemoryInput, MemoryPatch, Sector, Sentiment, SALIENCE_ARCHIVE};

/// Default owner namespace for agent traffic
pub const DEFAULT_USER: &str = "ai-agent-system";

/// Auto-waypoint weights for role links
const WEIGHT_RELATED_DECISION: f64 = 0.85;
const WEIGHT_USED_PATTERN: f64 = 0.75;
const WEIGHT_RELATED_ACTION: f64 = 0.70;
const WEIGHT_DEFAULT_LINK: f64 = 0.8;

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

// ============================================================================
// INPUTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StateInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub agent_name: String,
    pub action: String,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub related_decision: Option<String>,
    #[serde(default)]
    pub used_pattern: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub pattern_name: String,
    pub description: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub decision: String,
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Option<String>,
    #[serde(default)]
    pub consequences: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmotionInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub agent_name: String,
    pub feeling: String,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub related_action: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkInput {
    /// Used by the enforcement gate; the edge itself is project-agnostic
    #[serde(default)]
    pub project_name: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryInput {
    pub project_name: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    pub query: String,
    /// Maps to a sector subset: state/action/pattern/decision/emotion or a
    /// literal sector name; absent means all sectors
    #[serde(default)]
    pub memory_type: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    10
}

// ============================================================================
// VIEWS
// ============================================================================

/// Session mode derived from state presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    Initialize,
    Resume,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateView {
    pub project_name: String,
    pub state: serde_json::Value,
    pub mode: SessionMode,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_name: String,
    pub mode: SessionMode,
    pub state: Option<serde_json::Value>,
    pub recent_actions: Vec<Memory>,
    pub patterns: Vec<Memory>,
    pub decisions: Vec<Memory>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSummary {
    pub project_name: String,
    /// `improving`, `declining`, or `stable`
    pub trend: String,
    pub counts: std::collections::BTreeMap<String, usize>,
    pub average_confidence: Option<f64>,
    pub total: usize,
}

// ============================================================================
// FACADE
// ============================================================================

/// Project-scoped operations over the engine
pub struct AgentMemory {
    engine: Arc<HsgEngine>,
}

impl AgentMemory {
    pub fn new(engine: Arc<HsgEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<HsgEngine> {
        &self.engine
    }

    fn require(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(CoreError::BadRequest(format!("missing required field '{field}'")));
        }
        Ok(())
    }

    // ========================================================================
    // STATE
    // ========================================================================

    /// Upsert the project state memory
    ///
    /// Sectors are immutable, so the previous state record is soft-archived
    /// instead of mutated; reads pick the newest active record.
    pub fn store_state(&self, input: StateInput) -> Result<Memory> {
        Self::require(&input.project_name, "project_name")?;
        if !input.state.is_object() {
            return Err(CoreError::BadRequest("state must be a JSON object".into()));
        }

        let previous = self.find_state_memory(&input.project_name, &input.user_id)?;

        let content = serde_json::to_string(&input.state)
            .map_err(|e| CoreError::BadRequest(format!("unserializable state: {e}")))?;
        let memory = self.engine.remember(MemoryInput {
            content,
            tags: vec![input.project_name.clone(), "project-state".to_string()],
            meta: serde_json::json!({
                "project_name": input.project_name,
                "sector": "semantic",
            }),
            user_id: input.user_id,
            sector: Sector::Semantic,
            salience: 0.9,
        })?;

        if let Some(old) = previous {
            self.engine.store().update_memory_fields(
                &old.id,
                MemoryPatch { salience: Some(SALIENCE_ARCHIVE), ..Default::default() },
            )?;
            self.engine.store().upsert_waypoint(&memory.id, &old.id, 0.5)?;
        }
        Ok(memory)
    }

    fn find_state_memory(&self, project: &str, user_id: &str) -> Result<Option<Memory>> {
        let states = self
            .engine
            .store()
            .memories_with_tag(user_id, "project-state", Some(Sector::Semantic))?;
        Ok(states
            .into_iter()
            .find(|m| m.has_tag(project) && m.salience > SALIENCE_ARCHIVE))
    }

    /// Latest state; `NotFound` maps to mode INITIALIZE at the HTTP layer
    pub fn get_state(&self, project: &str, user_id: &str) -> Result<StateView> {
        let memory = self
            .find_state_memory(project, user_id)?
            .ok_or_else(|| CoreError::NotFound(format!("no state for project '{project}'")))?;
        let state = serde_json::from_str(&memory.content)
            .unwrap_or(serde_json::Value::Null);
        Ok(StateView {
            project_name: project.to_string(),
            state,
            mode: SessionMode::Resume,
            updated_at: memory.updated_at,
        })
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    /// Record an episodic action, auto-linking its decision and pattern
    pub fn record_action(&self, input: ActionInput) -> Result<Memory> {
        Self::require(&input.project_name, "project_name")?;
        Self::require(&input.agent_name, "agent_name")?;
        Self::require(&input.action, "action")?;

        let mut meta = serde_json::json!({
            "project_name": input.project_name,
            "agent_name": input.agent_name,
        });
        if let Some(outcome) = &input.outcome {
            meta["outcome"] = serde_json::json!(outcome);
        }
        if let Some(context) = &input.context {
            meta["context"] = serde_json::json!(context);
        }
        if let Some(decision) = &input.related_decision {
            meta["related_decision"] = serde_json::json!(decision);
        }
        if let Some(pattern) = &input.used_pattern {
            meta["used_pattern"] = serde_json::json!(pattern);
        }
        if let Some(task) = &input.task_id {
            meta["task_id"] = serde_json::json!(task);
        }

        let memory = self.engine.remember(MemoryInput {
            content: input.action,
            tags: vec![
                input.project_name.clone(),
                "action".to_string(),
                input.agent_name.clone(),
            ],
            meta,
            user_id: input.user_id,
            sector: Sector::Episodic,
            salience: 0.5,
        })?;

        // Auto-waypoints from the informing records to the action
        if let Some(decision_id) = &input.related_decision {
            if self.engine.store().get_memory(decision_id)?.is_some() {
                self.engine
                    .store()
                    .upsert_waypoint(decision_id, &memory.id, WEIGHT_RELATED_DECISION)?;
            }
        }
        if let Some(pattern_id) = &input.used_pattern {
            if self.engine.store().get_memory(pattern_id)?.is_some() {
                self.engine
                    .store()
                    .upsert_waypoint(pattern_id, &memory.id, WEIGHT_USED_PATTERN)?;
            }
        }
        Ok(memory)
    }

    /// Record a procedural pattern
    pub fn record_pattern(&self, input: PatternInput) -> Result<Memory> {
        Self::require(&input.project_name, "project_name")?;
        Self::require(&input.pattern_name, "pattern_name")?;
        Self::require(&input.description, "description")?;

        let mut content = format!("{}: {}", input.pattern_name, input.description);
        if let Some(example) = &input.example {
            content.push_str("\nExample: ");
            content.push_str(example);
        }

        let mut tags = vec![input.project_name.clone(), "pattern".to_string()];
        for tag in input.tags {
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        self.engine.remember(MemoryInput {
            content,
            tags,
            meta: serde_json::json!({
                "project_name": input.project_name,
                "pattern_name": input.pattern_name,
            }),
            user_id: input.user_id,
            sector: Sector::Procedural,
            salience: 0.6,
        })
    }

    /// Record a reflective decision
    pub fn record_decision(&self, input: DecisionInput) -> Result<Memory> {
        Self::require(&input.project_name, "project_name")?;
        Self::require(&input.decision, "decision")?;
        Self::require(&input.rationale, "rationale")?;

        let mut content = format!("Decision: {}\nRationale: {}", input.decision, input.rationale);
        if let Some(alternatives) = &input.alternatives {
            content.push_str("\nAlternatives: ");
            content.push_str(alternatives);
        }
        if let Some(consequences) = &input.consequences {
            content.push_str("\nConsequences: ");
            content.push_str(consequences);
        }

        self.engine.remember(MemoryInput {
            content,
            tags: vec![input.project_name.clone(), "decision".to_string()],
            meta: serde_json::json!({
                "project_name": input.project_name,
                "decision": input.decision,
                "rationale": input.rationale,
            }),
            user_id: input.user_id,
            sector: Sector::Reflective,
            salience: 0.7,
        })
    }

    /// Record an emotional observation, auto-linking the triggering action
    pub fn record_emotion(&self, input: EmotionInput) -> Result<Memory> {
        Self::require(&input.project_name, "project_name")?;
        Self::require(&input.agent_name, "agent_name")?;
        Self::require(&input.feeling, "feeling")?;

        let sentiment = match &input.sentiment {
            Some(raw) => Sentiment::parse_name(raw).ok_or_else(|| {
                CoreError::BadRequest(format!("unknown sentiment '{raw}'"))
            })?,
            None => Sentiment::Neutral,
        };
        if let Some(confidence) = input.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(CoreError::BadRequest(format!(
                    "confidence must be within [0, 1], got {confidence}"
                )));
            }
        }

        let mut meta = serde_json::json!({
            "project_name": input.project_name,
            "agent_name": input.agent_name,
            "sentiment": sentiment.as_str(),
        });
        if let Some(confidence) = input.confidence {
            meta["confidence"] = serde_json::json!(confidence);
        }
        if let Some(action) = &input.related_action {
            meta["related_action"] = serde_json::json!(action);
        }

        let memory = self.engine.remember(MemoryInput {
            content: input.feeling,
            tags: vec![input.project_name.clone(), "emotion".to_string()],
            meta,
            user_id: input.user_id,
            sector: Sector::Emotional,
            salience: 0.5,
        })?;

        if let Some(action_id) = &input.related_action {
            if self.engine.store().get_memory(action_id)?.is_some() {
                self.engine
                    .store()
                    .upsert_waypoint(action_id, &memory.id, WEIGHT_RELATED_ACTION)?;
            }
        }
        Ok(memory)
    }

    /// Explicitly link two memories; the relationship label lands in the
    /// source memory's meta
    pub fn link_memories(&self, input: LinkInput) -> Result<()> {
        Self::require(&input.source, "source")?;
        Self::require(&input.target, "target")?;
        let weight = input.weight.unwrap_or(WEIGHT_DEFAULT_LINK);
        if !(0.0..=1.0).contains(&weight) {
            return Err(CoreError::BadRequest(format!(
                "weight must be within [0, 1], got {weight}"
            )));
        }
        self.engine.link(&input.source, &input.target, weight)?;
        if let Some(relationship) = &input.relationship {
            self.engine.store().merge_meta(
                &input.source,
                &serde_json::json!({ "relationship": relationship, "related_to": input.target }),
            )?;
        }
        Ok(())
    }

    // ========================================================================
    // RETRIEVAL
    // ========================================================================

    fn sectors_for_type(memory_type: Option<&str>) -> Result<Vec<Sector>> {
        let Some(raw) = memory_type else {
            return Ok(Sector::ALL.to_vec());
        };
        let sectors = match raw.to_lowercase().as_str() {
            "" | "all" | "any" => Sector::ALL.to_vec(),
            "state" | "semantic" => vec![Sector::Semantic],
            "action" | "episodic" => vec![Sector::Episodic],
            "pattern" | "procedural" => vec![Sector::Procedural],
            "decision" | "reflective" => vec![Sector::Reflective],
            "emotion" | "emotional" => vec![Sector::Emotional],
            other => {
                return Err(CoreError::BadRequest(format!("unknown memory_type '{other}'")))
            }
        };
        Ok(sectors)
    }

    /// Sector-filtered similarity retrieval scoped to a project
    pub fn query(&self, input: QueryInput) -> Result<Vec<ScoredMemory>> {
        Self::require(&input.project_name, "project_name")?;
        Self::require(&input.query, "query")?;
        let sectors = Self::sectors_for_type(input.memory_type.as_deref())?;

        // Over-fetch, then keep project-tagged hits up to k
        let hits = self
            .engine
            .query(&input.query, input.k * 4, &sectors, &input.user_id)?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.memory.has_tag(&input.project_name))
            .take(input.k)
            .collect())
    }

    /// Sector-scoped listing, newest first
    pub fn list(
        &self,
        project: &str,
        user_id: &str,
        sector: Sector,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        let mut memories = self
            .engine
            .store()
            .memories_with_tag(user_id, project, Some(sector))?;
        memories.truncate(limit);
        Ok(memories)
    }

    /// Combined project context with the derived session mode
    pub fn context(&self, project: &str, user_id: &str) -> Result<ProjectContext> {
        let state = self.find_state_memory(project, user_id)?;
        let mode = if state.is_some() {
            SessionMode::Resume
        } else {
            SessionMode::Initialize
        };
        Ok(ProjectContext {
            project_name: project.to_string(),
            mode,
            state: state.map(|m| {
                serde_json::from_str(&m.content).unwrap_or(serde_json::Value::Null)
            }),
            recent_actions: self.list(project, user_id, Sector::Episodic, 10)?,
            patterns: self.list(project, user_id, Sector::Procedural, 10)?,
            decisions: self.list(project, user_id, Sector::Reflective, 10)?,
        })
    }

    /// Aggregated sentiment trend over the project's emotional memories
    ///
    /// Trend compares the mean sentiment score of the newer half against the
    /// older half; a gap above 0.1 either way breaks "stable".
    pub fn sentiment(&self, project: &str, user_id: &str) -> Result<SentimentSummary> {
        let emotions = self
            .engine
            .store()
            .memories_with_tag(user_id, project, Some(Sector::Emotional))?;

        let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
        let mut confidences = Vec::new();
        let mut scores = Vec::new();
        // Listing is newest-first; keep chronological order for the halves
        for memory in emotions.iter().rev() {
            let sentiment = memory
                .meta_str("sentiment")
                .and_then(Sentiment::parse_name)
                .unwrap_or_default();
            *counts.entry(sentiment.as_str().to_string()).or_default() += 1;
            scores.push(sentiment.score());
            if let Some(confidence) = memory.meta_f64("confidence") {
                confidences.push(confidence);
            }
        }

        let trend = if scores.len() < 2 {
            "stable".to_string()
        } else {
            let mid = scores.len() / 2;
            let older: f64 = scores[..mid].iter().sum::<f64>() / mid as f64;
            let newer: f64 =
                scores[mid..].iter().sum::<f64>() / (scores.len() - mid) as f64;
            if newer - older > 0.1 {
                "improving".to_string()
            } else if older - newer > 0.1 {
                "declining".to_string()
            } else {
                "stable".to_string()
            }
        };

        Ok(SentimentSummary {
            project_name: project.to_string(),
            trend,
            total: scores.len(),
            counts,
            average_confidence: if confidences.is_empty() {
                None
            } else {
                Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
            },
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embed::HashEmbedder;
    use crate::storage::MemoryStore;

    fn agent() -> AgentMemory {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let engine = Arc::new(HsgEngine::new(
            store,
            Box::new(HashEmbedder::new(64)),
            Config::default(),
        ));
        AgentMemory::new(engine)
    }

    fn state_input(project: &str, progress: u64) -> StateInput {
        StateInput {
            project_name: project.to_string(),
            user_id: DEFAULT_USER.to_string(),
            state: serde_json::json!({"progress_percentage": progress}),
        }
    }

    #[test]
    fn test_state_initialize_then_resume() {
        let agent = agent();
        let err = agent.get_state("P", DEFAULT_USER).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        agent.store_state(state_input("P", 0)).unwrap();
        let view = agent.get_state("P", DEFAULT_USER).unwrap();
        assert_eq!(view.mode, SessionMode::Resume);
        assert_eq!(view.state["progress_percentage"], 0);
    }

    #[test]
    fn test_state_upsert_returns_last_written() {
        let agent = agent();
        agent.store_state(state_input("P", 10)).unwrap();
        agent.store_state(state_input("P", 55)).unwrap();

        let view = agent.get_state("P", DEFAULT_USER).unwrap();
        assert_eq!(view.state["progress_percentage"], 55);
        // Exactly one active state memory; the older one was archived
        let states = agent
            .engine()
            .store()
            .memories_with_tag(DEFAULT_USER, "project-state", Some(Sector::Semantic))
            .unwrap();
        let active: Vec<_> = states.iter().filter(|m| m.salience > 0.05).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_action_auto_waypoints() {
        let agent = agent();
        let decision = agent
            .record_decision(DecisionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                decision: "Use PostgreSQL".into(),
                rationale: "Relational fits the data".into(),
                alternatives: None,
                consequences: None,
            })
            .unwrap();
        let pattern = agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "migration-first".into(),
                description: "Write the migration before the code".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();

        let action = agent
            .record_action(ActionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                action: "implemented login".into(),
                outcome: Some("success".into()),
                context: None,
                related_decision: Some(decision.id.clone()),
                used_pattern: Some(pattern.id.clone()),
                task_id: None,
                dependencies: vec![],
            })
            .unwrap();

        let from_decision = agent.engine().store().waypoints_from(&decision.id).unwrap();
        assert_eq!(from_decision.len(), 1);
        assert_eq!(from_decision[0].dst_id, action.id);
        assert_eq!(from_decision[0].weight, 0.85);

        let from_pattern = agent.engine().store().waypoints_from(&pattern.id).unwrap();
        assert_eq!(from_pattern[0].weight, 0.75);
        assert_eq!(action.meta["outcome"], "success");
    }

    #[test]
    fn test_emotion_validation_and_waypoint() {
        let agent = agent();
        let action = agent
            .record_action(ActionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                action: "deployed the service".into(),
                outcome: None,
                context: None,
                related_decision: None,
                used_pattern: None,
                task_id: None,
                dependencies: vec![],
            })
            .unwrap();

        let emotion = agent
            .record_emotion(EmotionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                feeling: "relieved the deploy went out clean".into(),
                sentiment: Some("positive".into()),
                confidence: Some(0.9),
                related_action: Some(action.id.clone()),
            })
            .unwrap();

        let edges = agent.engine().store().waypoints_from(&action.id).unwrap();
        assert_eq!(edges[0].dst_id, emotion.id);
        assert_eq!(edges[0].weight, 0.70);

        let err = agent
            .record_emotion(EmotionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                feeling: "weird".into(),
                sentiment: Some("ecstatic".into()),
                confidence: None,
                related_action: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));

        let err = agent
            .record_emotion(EmotionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                feeling: "confident".into(),
                sentiment: None,
                confidence: Some(1.4),
                related_action: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[test]
    fn test_query_scopes_to_project() {
        let agent = agent();
        agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "retry".into(),
                description: "retry transient failures with backoff".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();
        agent
            .record_pattern(PatternInput {
                project_name: "Q".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "retry".into(),
                description: "retry transient failures with backoff".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();

        let hits = agent
            .query(QueryInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                query: "retry backoff".into(),
                memory_type: Some("pattern".into()),
                k: 10,
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].memory.has_tag("P"));
    }

    #[test]
    fn test_unknown_memory_type_rejected() {
        let agent = agent();
        let err = agent
            .query(QueryInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                query: "anything".into(),
                memory_type: Some("working".into()),
                k: 5,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[test]
    fn test_context_modes() {
        let agent = agent();
        let ctx = agent.context("P", DEFAULT_USER).unwrap();
        assert_eq!(ctx.mode, SessionMode::Initialize);
        assert!(ctx.state.is_none());

        agent.store_state(state_input("P", 40)).unwrap();
        agent
            .record_action(ActionInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                agent_name: "dev".into(),
                action: "wired the context endpoint".into(),
                outcome: None,
                context: None,
                related_decision: None,
                used_pattern: None,
                task_id: None,
                dependencies: vec![],
            })
            .unwrap();

        let ctx = agent.context("P", DEFAULT_USER).unwrap();
        assert_eq!(ctx.mode, SessionMode::Resume);
        assert_eq!(ctx.recent_actions.len(), 1);
        assert_eq!(ctx.state.unwrap()["progress_percentage"], 40);
    }

    #[test]
    fn test_sentiment_trend() {
        let agent = agent();
        let feelings = [
            ("frustrated", "frustrated"),
            ("negative", "stuck on the schema"),
            ("positive", "tests passing now"),
            ("confident", "ready to ship"),
        ];
        for (sentiment, feeling) in feelings {
            agent
                .record_emotion(EmotionInput {
                    project_name: "P".into(),
                    user_id: DEFAULT_USER.into(),
                    agent_name: "dev".into(),
                    feeling: feeling.into(),
                    sentiment: Some(sentiment.into()),
                    confidence: Some(0.8),
                    related_action: None,
                })
                .unwrap();
        }

        let summary = agent.sentiment("P", DEFAULT_USER).unwrap();
        assert_eq!(summary.trend, "improving");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.counts["frustrated"], 1);
        assert_eq!(summary.average_confidence, Some(0.8));
    }

    #[test]
    fn test_link_default_weight_and_relationship() {
        let agent = agent();
        let a = agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "a".into(),
                description: "first".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();
        let b = agent
            .record_pattern(PatternInput {
                project_name: "P".into(),
                user_id: DEFAULT_USER.into(),
                pattern_name: "b".into(),
                description: "second".into(),
                example: None,
                tags: vec![],
            })
            .unwrap();

        agent
            .link_memories(LinkInput {
                project_name: "P".into(),
                source: a.id.clone(),
                target: b.id.clone(),
                weight: None,
                relationship: Some("informed_by".into()),
            })
            .unwrap();

        let edges = agent.engine().store().waypoints_from(&a.id).unwrap();
        assert_eq!(edges[0].weight, 0.8);
        let src = agent.engine().store().get_memory(&a.id).unwrap().unwrap();
        assert_eq!(src.meta["relationship"], "informed_by");
    }
}
