//! Journey: quality gate scoring math over the wire.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;

#[tokio::test]
async fn two_blocking_three_warnings_scores_45() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    for text in [
        "committed a hardcoded password in the config loader",
        "left a hardcoded secret in the deploy script",
        "query reads with select * until the schema settles",
        "left an empty catch around the retry loop",
        "tuned the magic number in the scheduler",
    ] {
        server.post_ok("/action", fixtures::action(text)).await;
    }

    let report = server.get_ok("/quality/gate/P").await;
    assert_eq!(report["blockingCount"], 2);
    assert_eq!(report["warningCount"], 3);
    assert_eq!(report["qualityScore"], 45);
    assert_eq!(report["passed"], false);
}

#[tokio::test]
async fn zero_violations_passes_at_100() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
        .post_ok("/action", fixtures::action("reviewed the deployment checklist"))
        .await;

    let report = server.get_ok("/quality/gate/P").await;
    assert_eq!(report["passed"], true);
    assert_eq!(report["qualityScore"], 100);
}

#[tokio::test]
async fn quality_trends_read_back_past_runs() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
        .post_ok("/action", fixtures::action("kept a hardcoded password around"))
        .await;

    server.get_ok("/quality/gate/P").await;
    server.get_ok("/quality/gate/P").await;

    let trends = server.get_ok("/quality/trends/P").await;
    let runs = trends["runs"].as_array().unwrap();
    assert!(runs.len() >= 2);
    assert_eq!(runs[0]["passed"], false);
    assert!(runs[0]["qualityScore"].is_number());
}
