//! Journey: a failed action rooted in a pattern produces a lesson.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;

#[tokio::test]
async fn pattern_failure_writes_lesson_and_demotes_pattern() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let pat_a = server
        .post_ok("/pattern", fixtures::pattern("pat_A", "apply this aggressive shortcut"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();
    let salience_before = server.get_ok(&format!("/metrics/{pat_a}")).await["salience"]
        .as_f64()
        .unwrap();

    server
        .post_ok(
            "/action",
            fixtures::action_linked("shortcut blew up in staging", "failure", None, Some(&pat_a)),
        )
        .await;

    let report = server.get_ok("/analyze/failures/P").await;
    assert_eq!(report["failuresAnalyzed"], 1);
    assert_eq!(report["findings"][0]["rootCause"], "PATTERN_FAILURE");
    assert_eq!(report["lessonsCreated"], 1);

    // One reflective lesson-learned memory exists
    let lessons = server.get_ok("/lessons/P").await;
    assert_eq!(lessons["count"], 1);

    // The pattern lost ~0.25 salience, floored at 0.2
    let salience_after = server.get_ok(&format!("/metrics/{pat_a}")).await["salience"]
        .as_f64()
        .unwrap();
    assert!((salience_before - salience_after - 0.25).abs() < 1e-9);
    assert!(salience_after >= 0.2);
}

#[tokio::test]
async fn external_failures_carry_no_lesson() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let mut payload = fixtures::action_with_outcome("fetch failed against upstream", "failure");
    payload["context"] =
        serde_json::json!("the upstream dependency reported an outage on their status page");
    server.post_ok("/action", payload).await;

    let report = server.get_ok("/analyze/failures/P").await;
    assert_eq!(report["failuresAnalyzed"], 1);
    assert_eq!(report["findings"][0]["rootCause"], "EXTERNAL_FACTOR");
    assert_eq!(report["lessonsCreated"], 0);

    let lessons = server.get_ok("/lessons/P").await;
    assert_eq!(lessons["count"], 0);
}
