//! Journey: the gate rejects bad writes and reports its own health.

use axum::http::StatusCode;
use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;
use serde_json::json;

#[tokio::test]
async fn action_without_agent_name_is_rejected() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let (status, body) = server
        .post("/action", json!({"project_name": "P", "action": "anonymous work"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["err"], "EnforcementViolation");
    assert!(body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v.as_str().unwrap().contains("agent_name")));
}

#[tokio::test]
async fn writes_to_uninitialized_project_are_rejected() {
    let server = TestServer::new();
    let (status, body) = server
        .post("/action", fixtures::action("work before init"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v.as_str().unwrap().contains("no stored state")));
}

#[tokio::test]
async fn decision_without_rationale_field_is_rejected() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let (status, body) = server
        .post("/decision", json!({"project_name": "P", "decision": "Use X"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v.as_str().unwrap().contains("rationale")));
}

#[tokio::test]
async fn unmet_dependencies_block_task_writes() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    let dep = server
        .post_ok("/action", fixtures::action("incomplete prerequisite"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();

    let mut payload = fixtures::action("dependent step");
    payload["task_id"] = json!("t1");
    payload["dependencies"] = json!([dep]);
    let (status, body) = server.post("/action", payload).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v.as_str().unwrap().contains("not completed")));
}

#[tokio::test]
async fn confirmation_phrases_warn_but_do_not_block() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;

    let body = server
        .post_ok(
            "/action",
            fixtures::action("prepared rollback plan, are you sure prompts removed"),
        )
        .await;
    assert_eq!(body["ok"], true);
    assert!(!body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stats_locks_and_health_surfaces() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server.post_ok("/action", fixtures::action("normal work")).await;
    let _ = server
        .post("/decision", json!({"project_name": "P", "decision": "half"}))
        .await;

    let stats = server.get_ok("/enforcement/stats/P").await;
    assert_eq!(stats["stats"]["totalChecks"], 3);
    assert_eq!(stats["stats"]["allowed"], 2);
    assert_eq!(stats["stats"]["rejected"], 1);

    let locks = server.get_ok("/enforcement/locks").await;
    assert!(locks["locks"].as_array().unwrap().is_empty());

    let health = server.get_ok("/enforcement/health").await;
    assert_eq!(health["authMode"], "none");
    assert!(health["memoryCount"].as_i64().unwrap() >= 2);
}
