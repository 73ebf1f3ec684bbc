//! Journey: sequence mining thresholds over the wire.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;
use serde_json::json;

async fn initialized() -> TestServer {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
}

/// Record one pass of the migration cycle
async fn migration_round(server: &TestServer, round: usize) {
    for step in ["wrote migration", "ran migration", "verified schema"] {
        server
            .post_ok(
                "/action",
                fixtures::action_with_outcome(&format!("{step} {round}"), "success"),
            )
            .await;
    }
}

#[tokio::test]
async fn repeated_sequence_extracted_with_high_confidence() {
    let server = initialized().await;
    for round in 0..3 {
        migration_round(&server, round).await;
    }

    let report = server
        .post_ok("/learn/patterns/P", json!({}))
        .await;
    assert!(report["patternsExtracted"].as_u64().unwrap() >= 1);
    let best = report["patterns"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["kind"] == "SEQUENCE")
        .map(|p| p["confidence"].as_f64().unwrap())
        .fold(0.0f64, f64::max);
    assert!(best >= 0.8);

    // Extracted patterns land as tagged procedural memories
    let stats = server.get_ok("/learn/stats/P").await;
    assert!(stats["patternsOnRecord"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn single_sequence_extracts_nothing() {
    let server = initialized().await;
    migration_round(&server, 0).await;

    let report = server.post_ok("/learn/patterns/P", json!({})).await;
    assert_eq!(report["patternsExtracted"], 0);
}

#[tokio::test]
async fn detect_patterns_body_scoped_trigger() {
    let server = initialized().await;
    server
        .post_ok("/action", fixtures::action_with_outcome("added validation to ingest", "success"))
        .await;
    server
        .post_ok("/action", fixtures::action_with_outcome("extended validation coverage", "success"))
        .await;

    let report = server
        .post_ok("/detect-patterns", json!({"project_name": "P"}))
        .await;
    assert!(report["patterns"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["kind"] == "TECHNIQUE"));
}
