//! Journey: actions auto-link their decision and pattern; links upsert.

use openmemory_e2e_tests::mocks::fixtures;
use openmemory_e2e_tests::TestServer;
use serde_json::json;

async fn initialized() -> TestServer {
    let server = TestServer::new();
    server.post_ok("/state", fixtures::state(0)).await;
    server
}

#[tokio::test]
async fn action_auto_waypoints_with_spec_weights() {
    let server = initialized().await;
    let dec1 = server
        .post_ok("/decision", fixtures::decision("Use session tokens", "stateless auth"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();
    let pat1 = server
        .post_ok("/pattern", fixtures::pattern("guard-first", "validate before touching state"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();

    let act1 = server
        .post_ok(
            "/action",
            fixtures::action_linked("implemented login", "success", Some(&dec1), Some(&pat1)),
        )
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();

    // The decision's one-hop graph includes the action at weight 0.85
    let graph = server.get_ok(&format!("/graph/{dec1}?depth=1")).await;
    let nodes = graph["nodes"].as_array().unwrap();
    let linked = nodes.iter().find(|n| n["id"] == json!(act1)).expect("act1 reachable");
    assert_eq!(linked["weight"], 0.85);
    assert_eq!(linked["depth"], 1);

    // The pattern's one-hop graph includes it at 0.75
    let graph = server.get_ok(&format!("/graph/{pat1}?depth=1")).await;
    let nodes = graph["nodes"].as_array().unwrap();
    let linked = nodes.iter().find(|n| n["id"] == json!(act1)).expect("act1 reachable");
    assert_eq!(linked["weight"], 0.75);
}

#[tokio::test]
async fn link_twice_keeps_one_edge_with_second_weight() {
    let server = initialized().await;
    let a = server
        .post_ok("/pattern", fixtures::pattern("first", "first pattern body"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();
    let b = server
        .post_ok("/pattern", fixtures::pattern("second", "second pattern body"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();

    server.post_ok("/link", fixtures::link(&a, &b, 0.4)).await;
    server.post_ok("/link", fixtures::link(&a, &b, 0.9)).await;

    let edges = server.state.engine.store().waypoints_from(&a).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].weight, 0.9);
}

#[tokio::test]
async fn graph_traversal_is_cycle_safe() {
    let server = initialized().await;
    let mut ids = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let id = server
            .post_ok("/pattern", fixtures::pattern(name, "cycle member"))
            .await["memoryId"]
            .as_str()
            .unwrap()
            .to_string();
        ids.push(id);
    }
    server.post_ok("/link", fixtures::link(&ids[0], &ids[1], 0.9)).await;
    server.post_ok("/link", fixtures::link(&ids[1], &ids[2], 0.9)).await;
    server.post_ok("/link", fixtures::link(&ids[2], &ids[0], 0.9)).await;

    let graph = server.get_ok(&format!("/graph/{}?depth=10", ids[0])).await;
    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
}

#[tokio::test]
async fn query_is_sector_and_project_scoped() {
    let server = initialized().await;
    server
        .post_ok("/pattern", fixtures::pattern("retry-backoff", "retry transient failures with backoff"))
        .await;
    server
        .post_ok("/action", fixtures::action("unrelated episodic work item"))
        .await;

    let body = server
        .post_ok("/query", fixtures::query("retry transient failures", "pattern"))
        .await;
    assert_eq!(body["count"], 1);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["primarySector"], "procedural");
}

#[tokio::test]
async fn metrics_and_reinforcement() {
    let server = initialized().await;
    let id = server
        .post_ok("/pattern", fixtures::pattern("measured", "pattern under measurement"))
        .await["memoryId"]
        .as_str()
        .unwrap()
        .to_string();

    let body = server
        .post_ok(&format!("/reinforce/{id}"), json!({"boost": 0.2}))
        .await;
    assert_eq!(body["coactivations"], 1);

    // Smart reinforcement N times raises salience by at most N * boost
    for _ in 0..5 {
        server
            .post_ok("/smart-reinforce", json!({"memory_id": id, "reason": "success"}))
            .await;
    }
    let metrics = server.get_ok(&format!("/metrics/{id}")).await;
    assert_eq!(metrics["salience"], 1.0);
    assert_eq!(metrics["coactivations"], 6);
    assert_eq!(metrics["sector"], "procedural");
    assert_eq!(metrics["tier"], "hot");
    assert!(metrics["importanceScore"].as_f64().unwrap() > 1.0);
}
