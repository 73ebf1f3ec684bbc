//! Enforcement introspection: stats, locks, health.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn stats(State(state): State<AppState>, Path(project): Path<String>) -> Json<Value> {
    let stats = state.gate.stats(&project);
    Json(json!({"projectName": project, "stats": stats}))
}

pub async fn locks(State(state): State<AppState>) -> Json<Value> {
    let reclaimed = state.gate.reclaim_stale_locks();
    let locks = state.gate.active_locks();
    Json(json!({"reclaimedStale": reclaimed, "locks": locks}))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gate.health()))
}
