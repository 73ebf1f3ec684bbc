//! Journey: initialize, resume, and state round-trips.

use axum::http::StatusCode;
use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;
use serde_json::json;

#[tokio::test]
async fn initialize_then_resume() {
    let server = TestServer::new();

    // A project nobody has touched reports INITIALIZE with a 404 tone
    let (status, body) = server.get("/state/P").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["mode"], "INITIALIZE");

    server.post_ok("/state", fixtures::state(0)).await;

    let body = server.get_ok("/state/P").await;
    assert_eq!(body["mode"], "RESUME");
    assert_eq!(body["state"]["progress_percentage"], 0);
}

#[tokio::test]
async fn state_upsert_returns_exact_last_write() {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(10)).await;
    server
        .post_ok(
            "/state",
            json!({
                "project_name": "P",
                "state": {
                    "progress_percentage": 72,
                    "current_phase": "hardening",
                    "nested": {"queue": ["a", "b"]},
                },
            }),
        )
        .await;

    let body = server.get_ok("/state/P").await;
    assert_eq!(body["state"]["progress_percentage"], 72);
    assert_eq!(body["state"]["current_phase"], "hardening");
    assert_eq!(body["state"]["nested"]["queue"], json!(["a", "b"]));
}

#[tokio::test]
async fn context_reflects_mode_and_recent_work() {
    let server = TestServer::new();

    let body = server.get_ok("/context/P").await;
    assert_eq!(body["mode"], "INITIALIZE");

    server.post_ok("/state", fixtures::state(40)).await;
    server.post_ok("/action", fixtures::action("wired the context route")).await;
    server
        .post_ok("/pattern", fixtures::pattern("thin-handlers", "keep handlers one call deep"))
        .await;

    let body = server.get_ok("/context/P").await;
    assert_eq!(body["mode"], "RESUME");
    assert_eq!(body["recentActions"].as_array().unwrap().len(), 1);
    assert_eq!(body["patterns"].as_array().unwrap().len(), 1);
    assert_eq!(body["state"]["progress_percentage"], 40);
}

#[tokio::test]
async fn state_survives_restart() {
    let server = TestServer::new_file_backed();
    server.post_ok("/state", fixtures::state(55)).await;

    let server = server.restart();
    let body = server.get_ok("/state/P").await;
    assert_eq!(body["mode"], "RESUME");
    assert_eq!(body["state"]["progress_percentage"], 55);
}

#[tokio::test]
async fn bad_state_payload_rejected() {
    let server = TestServer::new();
    let (status, body) = server
        .post("/state", json!({"project_name": "P", "state": "not an object"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err"], "BadRequest");
}
