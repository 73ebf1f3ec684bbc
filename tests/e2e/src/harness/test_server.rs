//! In-process test server
//!
//! Builds the production router over an isolated store and drives it with
//! `tower`'s oneshot, so tests exercise the exact request surface the
//! binary serves without binding a socket.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use openmemory_core::{Config, HashEmbedder, HsgEngine, MemoryStore};
use openmemory_server::{build_router, AppState};

/// One isolated server instance per test
pub struct TestServer {
    router: Router,
    /// Shared state for direct engine-level assertions
    pub state: AppState,
    /// Keeps a file-backed database alive for the test's duration
    temp_dir: Option<TempDir>,
    db_path: Option<PathBuf>,
}

impl TestServer {
    /// Server over a fresh in-memory store
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::open_in_memory().expect("in-memory store"));
        Self::with_store(store, None, None)
    }

    /// Server over a file-backed store in a temp directory; shut it down
    /// and reopen to exercise persistence
    pub fn new_file_backed() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("openmemory-test.db");
        let store = Arc::new(MemoryStore::open(Some(db_path.clone())).expect("file store"));
        Self::with_store(store, Some(temp_dir), Some(db_path))
    }

    /// Drop this server but keep its database; the returned server reads
    /// the same file
    pub fn restart(self) -> Self {
        let db_path = self.db_path.clone().expect("restart requires a file-backed server");
        let temp_dir = {
            let Self { temp_dir, .. } = self;
            temp_dir
        };
        let store = Arc::new(MemoryStore::open(Some(db_path.clone())).expect("reopen store"));
        Self::with_store(store, temp_dir, Some(db_path))
    }

    fn with_store(
        store: Arc<MemoryStore>,
        temp_dir: Option<TempDir>,
        db_path: Option<PathBuf>,
    ) -> Self {
        let engine = Arc::new(HsgEngine::new(
            store,
            Box::new(HashEmbedder::new(64)),
            Config::default(),
        ));
        let state = AppState::from_engine(engine);
        Self {
            router: build_router(state.clone()),
            state,
            temp_dir,
            db_path,
        }
    }

    /// Issue one request against the router; the path is relative to the
    /// `/ai-agents` root
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let uri = format!("/ai-agents{path}");
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// POST helper
    pub async fn post(&self, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.request("POST", path, Some(body)).await
    }

    /// GET helper
    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        self.request("GET", path, None).await
    }

    /// POST that must succeed; returns the body
    pub async fn post_ok(&self, path: &str, body: serde_json::Value) -> serde_json::Value {
        let (status, json) = self.post(path, body).await;
        assert_eq!(status, StatusCode::OK, "POST {path} failed: {json}");
        json
    }

    /// GET that must succeed; returns the body
    pub async fn get_ok(&self, path: &str) -> serde_json::Value {
        let (status, json) = self.get(path).await;
        assert_eq!(status, StatusCode::OK, "GET {path} failed: {json}");
        json
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}
