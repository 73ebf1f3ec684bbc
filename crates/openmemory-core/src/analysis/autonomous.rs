//! Autonomous orchestration
//!
//! One entry point fans out every analyzer concurrently and composes a
//! single combined report. Concurrency is a latency contract: the analyzers
//! are awaited together, never in sequence.

use serde::{Deserialize, Serialize};

use crate::hsg::HsgEngine;
use crate::memory::now_ms;

use super::{
    anomaly, blockers, confidence, conflicts, consistency, consolidation, decision_quality,
    effectiveness, failure, patterns, quality, recommend,
};

// ============================================================================
// COMBINED REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSection {
    pub consistency: consistency::ConsistencyReport,
    pub effectiveness: effectiveness::EffectivenessReport,
    pub decisions: decision_quality::DecisionQualityReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfCorrectionSection {
    pub failures: failure::FailureReport,
    pub confidence: confidence::ConfidenceReport,
    pub consolidation: consolidation::ConsolidationReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProactiveSection {
    pub conflicts: conflicts::ConflictReport,
    pub blockers: blockers::BlockerReport,
    pub recommendations: recommend::RecommendReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySection {
    pub patterns: patterns::PatternExtractionReport,
    pub gate: quality::QualityReport,
    pub anomalies: anomaly::AnomalyReport,
}

/// Headline numbers across all subsystems
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousSummary {
    pub total_issues: usize,
    pub total_predictions: usize,
    pub total_recommendations: usize,
    pub patterns_extracted: usize,
    pub lessons_created: usize,
    pub auto_actions_taken: usize,
    pub quality_score: i64,
    pub quality_passed: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousReport {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub validation: ValidationSection,
    pub self_correction: SelfCorrectionSection,
    pub proactive: ProactiveSection,
    pub quality: QualitySection,
    pub summary: AutonomousSummary,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Run every analyzer concurrently and compose the combined report
pub async fn run(engine: &HsgEngine, project: &str, user_id: &str) -> AutonomousReport {
    let started = std::time::Instant::now();

    let (
        consistency_report,
        effectiveness_report,
        decisions_report,
        failures_report,
        confidence_report,
        consolidation_report,
        conflicts_report,
        blockers_report,
        recommend_report,
        patterns_report,
        gate_report,
        anomalies_report,
    ) = tokio::join!(
        consistency::analyze(engine, project, user_id),
        effectiveness::analyze(engine, project, user_id),
        decision_quality::analyze(engine, project, user_id),
        failure::analyze(engine, project, user_id),
        confidence::analyze(engine, project, user_id),
        consolidation::analyze(engine, project, user_id),
        conflicts::analyze(engine, project, user_id),
        blockers::analyze(engine, project, user_id),
        recommend::analyze(engine, project, user_id),
        patterns::analyze(engine, project, user_id),
        quality::analyze(engine, project, user_id),
        anomaly::analyze(engine, project, user_id),
    );

    let summary = AutonomousSummary {
        total_issues: consistency_report.issues.len()
            + conflicts_report.conflicts.len()
            + anomalies_report.anomalies.len()
            + gate_report.violations.len(),
        total_predictions: blockers_report.predictions.len(),
        total_recommendations: recommend_report.recommendations.len(),
        patterns_extracted: patterns_report.patterns_extracted,
        lessons_created: failures_report.lessons_created,
        auto_actions_taken: consistency_report.auto_actions_taken
            + effectiveness_report.auto_actions_taken
            + decisions_report.auto_actions_taken
            + failures_report.auto_actions_taken
            + confidence_report.adjustments_applied,
        quality_score: gate_report.quality_score,
        quality_passed: gate_report.passed,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    AutonomousReport {
        project_name: project.to_string(),
        user_id: user_id.to_string(),
        timestamp: now_ms(),
        validation: ValidationSection {
            consistency: consistency_report,
            effectiveness: effectiveness_report,
            decisions: decisions_report,
        },
        self_correction: SelfCorrectionSection {
            failures: failures_report,
            confidence: confidence_report,
            consolidation: consolidation_report,
        },
        proactive: ProactiveSection {
            conflicts: conflicts_report,
            blockers: blockers_report,
            recommendations: recommend_report,
        },
        quality: QualitySection {
            patterns: patterns_report,
            gate: gate_report,
            anomalies: anomalies_report,
        },
        summary,
    }
}

// ============================================================================
// TESTS
// ============================================================================
