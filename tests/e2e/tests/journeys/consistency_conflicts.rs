//! Journey: contradicting decisions are caught and the older one demoted.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;

#[tokio::test]
async fn contradicting_decisions_penalize_the_older_one() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let older = server
        .post_ok("/decision", fixtures::decision("Use PostgreSQL", "relational model fits"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();
    let newer = server
        .post_ok("/decision", fixtures::decision("Use MongoDB", "schema flexibility"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();
    let older_before = server.get_ok(&format!("/metrics/{older}")).await["salience"]
        .as_f64()
        .unwrap();

    let report = server.get_ok("/validate/consistency/P").await;
    let issues = report["issues"].as_array().unwrap();
    let conflicts: Vec<_> = issues
        .iter()
        .filter(|i| i["kind"] == "DECISION_CONFLICT")
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["severity"], "high");
    assert_eq!(report["autoActionsTaken"], 1);

    // The older decision lost 0.3 salience; the newer one is untouched
    let older_after = server.get_ok(&format!("/metrics/{older}")).await["salience"]
        .as_f64()
        .unwrap();
    assert!((older_before - older_after - 0.3).abs() < 1e-9);
    let newer_salience = server.get_ok(&format!("/metrics/{newer}")).await["salience"]
        .as_f64()
        .unwrap();
    assert!((newer_salience - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn validate_all_runs_three_validators() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
        .post_ok("/pattern", fixtures::pattern("steady", "a pattern with no outcomes yet"))
        .await;

    let report = server.get_ok("/validate/P").await;
    assert!(report["consistency"].is_object());
    assert_eq!(report["effectiveness"]["patternsAssessed"], 1);
    assert!(report["decisions"]["decisionsAssessed"].is_number());
}

#[tokio::test]
async fn conflict_detector_flags_port_collisions() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
        .post_ok("/action", fixtures::action("started the gateway on port 8080"))
        .await;
    server
        .post_ok("/action", fixtures::action("bound the exporter on port 8080"))
        .await;

    let report = server.get_ok("/detect/conflicts/P").await;
    let conflicts = report["conflicts"].as_array().unwrap();
    assert!(conflicts
        .iter()
        .any(|c| c["kind"] == "RESOURCE_CONFLICT" && c["severity"] == "critical"));
    assert_eq!(report["warningsCreated"], 1);
}
