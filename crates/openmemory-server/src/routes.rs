//! Router assembly
//!
//! Every path lives under the `/ai-agents/` root. CORS is unrestricted; the
//! authentication shim in front of this router is out of scope.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{analysis, enforcement, memory};
use crate::state::AppState;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Agent memory surface (C5)
        .route("/state", post(memory::store_state))
        .route("/state/{project}", get(memory::get_state))
        .route("/action", post(memory::record_action))
        .route("/pattern", post(memory::record_pattern))
        .route("/decision", post(memory::record_decision))
        .route("/emotion", post(memory::record_emotion))
        .route("/link", post(memory::link_memories))
        .route("/graph/{memory_id}", get(memory::graph))
        .route("/reinforce/{memory_id}", post(memory::reinforce))
        .route("/smart-reinforce", post(memory::smart_reinforce))
        .route("/metrics/{memory_id}", get(memory::metrics))
        .route("/query", post(memory::query_memories))
        .route("/important", post(memory::important))
        .route("/history/{project}", get(memory::history))
        .route("/patterns/{project}", get(memory::patterns))
        .route("/decisions/{project}", get(memory::decisions))
        .route("/emotions/{project}", get(memory::emotions))
        .route("/context/{project}", get(memory::context))
        .route("/sentiment/{project}", get(memory::sentiment))
        // Validators (C6)
        .route("/validate/consistency/{project}", get(analysis::validate_consistency))
        .route("/validate/effectiveness/{project}", get(analysis::validate_effectiveness))
        .route("/validate/decisions/{project}", get(analysis::validate_decisions))
        .route("/validate/{project}", get(analysis::validate_all))
        // Self-correction (C7)
        .route("/analyze/failures/{project}", get(analysis::analyze_failures))
        .route("/lessons/{project}", get(analysis::lessons))
        .route("/adjust/confidence/{project}", post(analysis::adjust_confidence))
        .route("/confidence/distribution/{project}", get(analysis::confidence_distribution))
        .route("/consolidate/{project}", post(analysis::consolidate))
        .route("/consolidation/stats/{project}", get(analysis::consolidation_stats))
        // Proactive intelligence (C8)
        .route("/detect/conflicts/{project}", get(analysis::detect_conflicts))
        .route("/detect/anomalies/{project}", get(analysis::detect_anomalies))
        .route("/predict/blockers/{project}", get(analysis::predict_blockers))
        .route("/recommend/{project}", get(analysis::recommendations))
        // Learning and quality (C9)
        .route("/detect-patterns", post(analysis::detect_patterns))
        .route("/learn/patterns/{project}", post(analysis::learn_patterns))
        .route("/learn/stats/{project}", get(analysis::learn_stats))
        .route("/quality/gate/{project}", get(analysis::quality_gate))
        .route("/quality/trends/{project}", get(analysis::quality_trends))
        // Orchestration (C10)
        .route("/autonomous/{project}", post(analysis::run_autonomous))
        // Enforcement introspection (C11)
        .route("/enforcement/stats/{project}", get(enforcement::stats))
        .route("/enforcement/locks", get(enforcement::locks))
        .route("/enforcement/health", get(enforcement::health));

    let max_payload = state.engine.config().max_payload_bytes;
    Router::new()
        .nest("/ai-agents", api)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_payload))
        .with_state(state)
}
