//! Agent memory surface: records, retrieval, graph, metrics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use openmemory_core::{
    ActionInput, CoreError, DecisionInput, EmotionInput, LinkInput, Memory, PatternInput,
    QueryInput, Sector, StateInput,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::{gate_request, ProjectQuery};

const DEFAULT_LIST_LIMIT: usize = 20;
const DEFAULT_GRAPH_DEPTH: usize = 2;

/// Run one gated write: checks, lock, handler, release
fn gated<T>(
    state: &AppState,
    action_type: &str,
    body: Value,
    op: impl FnOnce(Value) -> Result<T, CoreError>,
) -> Result<(T, Vec<String>), CoreError> {
    let ticket = state.gate.begin(&gate_request(action_type, &body))?;
    let outcome = op(body);
    state.gate.finish(&ticket);
    outcome.map(|value| (value, ticket.warnings))
}

fn parse<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, CoreError> {
    serde_json::from_value(body).map_err(|e| CoreError::BadRequest(e.to_string()))
}

fn created(memory: &Memory, warnings: Vec<String>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "memoryId": memory.id,
        "sector": memory.primary_sector,
        "warnings": warnings,
    }))
}

// ============================================================================
// STATE
// ============================================================================

pub async fn store_state(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (memory, warnings) = gated(&state, "state", body, |body| {
        state.agent.store_state(parse::<StateInput>(body)?)
    })?;
    Ok(created(&memory, warnings))
}

/// Missing state is the INITIALIZE signal, not an error tone
pub async fn get_state(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Response {
    match state.agent.get_state(&project, query.user()) {
        Ok(view) => Json(view).into_response(),
        Err(CoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"projectName": project, "mode": "INITIALIZE"})),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

// ============================================================================
// RECORDS
// ============================================================================

pub async fn record_action(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (memory, warnings) = gated(&state, "action", body, |body| {
        state.agent.record_action(parse::<ActionInput>(body)?)
    })?;
    Ok(created(&memory, warnings))
}

pub async fn record_pattern(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (memory, warnings) = gated(&state, "pattern", body, |body| {
        state.agent.record_pattern(parse::<PatternInput>(body)?)
    })?;
    Ok(created(&memory, warnings))
}

pub async fn record_decision(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (memory, warnings) = gated(&state, "decision", body, |body| {
        state.agent.record_decision(parse::<DecisionInput>(body)?)
    })?;
    Ok(created(&memory, warnings))
}

pub async fn record_emotion(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (memory, warnings) = gated(&state, "emotion", body, |body| {
        state.agent.record_emotion(parse::<EmotionInput>(body)?)
    })?;
    Ok(created(&memory, warnings))
}

pub async fn link_memories(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let (_, warnings) = gated(&state, "link", body, |body| {
        state.agent.link_memories(parse::<LinkInput>(body)?)
    })?;
    Ok(Json(json!({"ok": true, "warnings": warnings})))
}

// ============================================================================
// REINFORCEMENT
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReinforceBody {
    pub boost: f64,
}

pub async fn reinforce(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Json(body): Json<ReinforceBody>,
) -> ApiResult<Json<Value>> {
    let memory = state.engine.reinforce(&memory_id, body.boost)?;
    Ok(Json(json!({
        "ok": true,
        "memoryId": memory.id,
        "salience": memory.salience,
        "coactivations": memory.coactivations,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SmartReinforceBody {
    pub memory_id: String,
    pub reason: String,
}

pub async fn smart_reinforce(
    State(state): State<AppState>,
    Json(body): Json<SmartReinforceBody>,
) -> ApiResult<Json<Value>> {
    let (memory, boost) = state.engine.smart_reinforce(&body.memory_id, &body.reason)?;
    Ok(Json(json!({
        "ok": true,
        "memoryId": memory.id,
        "reason": body.reason,
        "boost": boost,
        "salience": memory.salience,
        "coactivations": memory.coactivations,
    })))
}

// ============================================================================
// GRAPH AND METRICS
// ============================================================================

pub async fn graph(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let depth = query.depth.unwrap_or(DEFAULT_GRAPH_DEPTH);
    let view = state.engine.graph(&memory_id, depth)?;
    Ok(Json(json!(view)))
}

pub async fn metrics(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let metrics = state.engine.metrics(&memory_id)?;
    Ok(Json(json!(metrics)))
}

#[derive(Debug, Deserialize)]
pub struct ImportantBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub n: Option<usize>,
}

pub async fn important(
    State(state): State<AppState>,
    Json(body): Json<ImportantBody>,
) -> ApiResult<Json<Value>> {
    let user = body.user_id.as_deref().unwrap_or(openmemory_core::DEFAULT_USER);
    let memories = state.engine.most_important(user, body.n.unwrap_or(10))?;
    let listed: Vec<Value> = memories
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "content": m.content,
                "sector": m.primary_sector,
                "salience": m.salience,
                "coactivations": m.coactivations,
                "importanceScore": m.importance(),
            })
        })
        .collect();
    Ok(Json(json!({"memories": listed})))
}

// ============================================================================
// RETRIEVAL
// ============================================================================

pub async fn query_memories(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let input: QueryInput = parse(body)?;
    let hits = state.agent.query(input)?;
    let count = hits.len();
    Ok(Json(json!({"count": count, "results": hits})))
}

fn list_response(memories: Vec<Memory>) -> Json<Value> {
    let listed: Vec<Value> = memories
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "content": m.content,
                "tags": m.tags,
                "meta": m.meta,
                "salience": m.salience,
                "createdAt": m.created_at,
            })
        })
        .collect();
    Json(json!({"count": listed.len(), "memories": listed}))
}

pub async fn history(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let memories = state.agent.list(
        &project,
        query.user(),
        Sector::Episodic,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )?;
    Ok(list_response(memories))
}

pub async fn patterns(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let memories = state.agent.list(
        &project,
        query.user(),
        Sector::Procedural,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )?;
    Ok(list_response(memories))
}

pub async fn decisions(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let memories = state.agent.list(
        &project,
        query.user(),
        Sector::Reflective,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )?;
    Ok(list_response(memories))
}

pub async fn emotions(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let memories = state.agent.list(
        &project,
        query.user(),
        Sector::Emotional,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )?;
    Ok(list_response(memories))
}

pub async fn context(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let context = state.agent.context(&project, query.user())?;
    Ok(Json(json!(context)))
}

pub async fn sentiment(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let summary = state.agent.sentiment(&project, query.user())?;
    Ok(Json(json!(summary)))
}
