//! Analyzer surface: validators, self-correction, proactive intelligence,
//! learning, quality, and the autonomous fan-out.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use openmemory_core::analysis::{
    anomaly, blockers, confidence, conflicts, consistency, consolidation, decision_quality,
    effectiveness, failure, patterns, quality, recommend,
};
use openmemory_core::{autonomous, Sector, DEFAULT_USER};

use crate::error::ApiResult;
use crate::state::AppState;

use super::ProjectQuery;

// ============================================================================
// VALIDATORS (C6)
// ============================================================================

pub async fn validate_consistency(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = consistency::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn validate_effectiveness(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = effectiveness::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn validate_decisions(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = decision_quality::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

/// All three validators, concurrently
pub async fn validate_all(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let user = query.user();
    let (consistency_report, effectiveness_report, decisions_report) = tokio::join!(
        consistency::analyze(&state.engine, &project, user),
        effectiveness::analyze(&state.engine, &project, user),
        decision_quality::analyze(&state.engine, &project, user),
    );
    Json(json!({
        "consistency": consistency_report,
        "effectiveness": effectiveness_report,
        "decisions": decisions_report,
    }))
}

// ============================================================================
// SELF-CORRECTION (C7)
// ============================================================================

pub async fn analyze_failures(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = failure::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

/// Reflective lesson-learned memories for a project
pub async fn lessons(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let memories = state
        .engine
        .store()
        .memories_with_tag(query.user(), "lesson-learned", Some(Sector::Reflective))?;
    let listed: Vec<Value> = memories
        .iter()
        .filter(|m| m.has_tag(&project))
        .map(|m| json!({"id": m.id, "content": m.content, "createdAt": m.created_at}))
        .collect();
    Ok(Json(json!({"count": listed.len(), "lessons": listed})))
}

pub async fn adjust_confidence(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = confidence::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn confidence_distribution(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    Json(json!(confidence::distribution(&state.engine, &project, query.user())))
}

pub async fn consolidate(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = consolidation::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn consolidation_stats(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    Json(json!(consolidation::stats(&state.engine, &project, query.user())))
}

// ============================================================================
// PROACTIVE (C8)
// ============================================================================

pub async fn detect_conflicts(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = conflicts::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn predict_blockers(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = blockers::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn recommendations(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = recommend::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

// ============================================================================
// LEARNING AND QUALITY (C9)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DetectPatternsBody {
    pub project_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /detect-patterns triggers the extractor with a body-scoped project
pub async fn detect_patterns(
    State(state): State<AppState>,
    Json(body): Json<DetectPatternsBody>,
) -> Json<Value> {
    let user = body.user_id.as_deref().unwrap_or(DEFAULT_USER);
    let report = patterns::analyze(&state.engine, &body.project_name, user).await;
    Json(json!(report))
}

pub async fn learn_patterns(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = patterns::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn learn_stats(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Value>> {
    let extracted = state
        .engine
        .store()
        .memories_with_tag(query.user(), "extracted-pattern", Some(Sector::Procedural))?;
    let project_extracted = extracted.iter().filter(|m| m.has_tag(&project)).count();
    let runs = state.engine.store().latest_reports("patterns", &project, 10)?;
    Ok(Json(json!({
        "projectName": project,
        "patternsOnRecord": project_extracted,
        "recentRuns": runs,
    })))
}

pub async fn quality_gate(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = quality::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

pub async fn quality_trends(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<Value>> {
    let runs = state.engine.store().latest_reports("quality", &project, 20)?;
    let trend: Vec<Value> = runs
        .iter()
        .map(|row| {
            json!({
                "timestamp": row.timestamp,
                "qualityScore": row.report.get("qualityScore").cloned().unwrap_or(Value::Null),
                "passed": row.report.get("passed").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    Ok(Json(json!({"projectName": project, "runs": trend})))
}

pub async fn detect_anomalies(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = anomaly::analyze(&state.engine, &project, query.user()).await;
    Json(json!(report))
}

// ============================================================================
// ORCHESTRATION (C10)
// ============================================================================

pub async fn run_autonomous(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Json<Value> {
    let report = autonomous::run(&state.engine, &project, query.user()).await;
    Json(json!(report))
}
