//! Journey: the autonomous fan-out composes one report.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;
use serde_json::json;

#[tokio::test]
async fn empty_project_reports_all_zero_with_no_side_effects() {
    let server = TestServer::new();

    let report = server.post_ok("/autonomous/EMPTY", json!({})).await;
    let summary = &report["summary"];
    assert_eq!(summary["totalIssues"], 0);
    assert_eq!(summary["totalPredictions"], 0);
    assert_eq!(summary["totalRecommendations"], 0);
    assert_eq!(summary["patternsExtracted"], 0);
    assert_eq!(summary["lessonsCreated"], 0);
    assert_eq!(summary["autoActionsTaken"], 0);
    assert_eq!(summary["qualityScore"], 100);
    assert_eq!(summary["qualityPassed"], true);

    // No side-effect memories were written
    assert_eq!(server.state.engine.store().count_memories().unwrap(), 0);
}

#[tokio::test]
async fn busy_project_rolls_findings_into_sections() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(30)).await;
    server
        .post_ok("/decision", fixtures::decision("Use PostgreSQL", "relational"))
        .await;
    server
        .post_ok("/decision", fixtures::decision("Use MongoDB", "documents"))
        .await;
    server
        .post_ok("/action", fixtures::action_with_outcome("implemented ingest", "success"))
        .await;

    let report = server.post_ok("/autonomous/P", json!({})).await;
    assert!(report["validation"]["consistency"]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["kind"] == "DECISION_CONFLICT"));
    assert!(report["proactive"]["conflicts"]["conflicts"].is_array());
    assert!(report["selfCorrection"]["consolidation"]["memoriesScanned"].is_number());
    assert!(report["quality"]["gate"]["passed"].is_boolean());
    assert!(report["summary"]["totalIssues"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn analyzer_reports_are_persisted_per_analyzer() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    server.post_ok("/autonomous/P", json!({})).await;

    // Each analyzer owns its table; spot-check a few
    for analyzer in ["consistency", "quality", "blockers", "consolidation"] {
        let rows = server
            .state
            .engine
            .store()
            .latest_reports(analyzer, "P", 5)
            .unwrap();
        assert_eq!(rows.len(), 1, "missing report row for {analyzer}");
    }
}
