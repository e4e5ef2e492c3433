//! Shared fixtures: an axum stand-in for the node API and an in-process
//! supervisor that serves it on each descriptor's ports.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use gauntlet_runtime::supervisor::{ensure_ports_free, poll_ready};
use gauntlet_runtime::{
    GauntletConfig, NodeClient, NodeDescriptor, NodeHandle, NodeRole, NodeStatus,
    ProcessSupervisor, StopMethod, StopReport, SupervisorError, API_TOKEN_HEADER,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ----------------------------------------------------------------------------
// Mock Node
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub neighbors: usize,
    /// Answer 429 once this many publishes were accepted
    pub rate_limit_after: Option<usize>,
    pub reject_duplicates: bool,
    pub api_token: String,
    /// Every API route except `/health` answers 500
    pub server_errors: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            neighbors: 2,
            rate_limit_after: None,
            reject_duplicates: true,
            api_token: "real_token".to_string(),
            server_errors: false,
        }
    }
}

struct MockState {
    behavior: MockBehavior,
    published: AtomicUsize,
    seen: Mutex<HashSet<String>>,
}

pub fn api_router(behavior: MockBehavior) -> Router {
    if behavior.server_errors {
        return Router::new()
            .route("/health", get(health))
            .fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    }
    let state = Arc::new(MockState {
        behavior,
        published: AtomicUsize::new(0),
        seen: Mutex::new(HashSet::new()),
    });
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/neighbor/list", get(neighbor_list))
        .route("/api/v1/neighbor/add", post(neighbor_add))
        .route("/api/v1/bulletin/publish", post(publish))
        .route("/api/v1/message/send", post(message_send))
        .route("/api/v1/node/info", get(node_info))
        .route("/api/v1/admin/*rest", get(protected))
        .route("/api/v1/node/neighbors/*rest", get(protected))
        .with_state(state)
}

pub fn admin_router(behavior: MockBehavior) -> Router {
    let state = Arc::new(MockState {
        behavior,
        published: AtomicUsize::new(0),
        seen: Mutex::new(HashSet::new()),
    });
    Router::new()
        .route("/api/v1/admin/*rest", get(protected))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn neighbor_list(State(state): State<Arc<MockState>>) -> Json<Value> {
    let neighbors: Vec<Value> = (0..state.behavior.neighbors)
        .map(|i| json!({ "id": format!("peer{}", i) }))
        .collect();
    Json(json!({ "neighbors": neighbors }))
}

fn hostile(text: &str) -> bool {
    text.len() > 4096
        || text.contains("<script")
        || text.contains("DROP TABLE")
        || text.contains("..")
        || text.chars().any(|c| c.is_control())
}

fn parse(body: &Bytes) -> Result<Value, StatusCode> {
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn publish(State(state): State<Arc<MockState>>, body: Bytes) -> StatusCode {
    let value = match parse(&body) {
        Ok(value) => value,
        Err(status) => return status,
    };
    if value.get("sender_id").is_some() {
        return StatusCode::FORBIDDEN;
    }
    let content = value.get("content").and_then(Value::as_str).unwrap_or_default();
    if hostile(content) || content.starts_with("[") {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    if let Some(id) = value.get("message_id").and_then(Value::as_str) {
        let fresh = state.seen.lock().unwrap().insert(id.to_string());
        if !fresh && state.behavior.reject_duplicates {
            return StatusCode::CONFLICT;
        }
    }
    let count = state.published.fetch_add(1, Ordering::SeqCst);
    match state.behavior.rate_limit_after {
        Some(limit) if count >= limit => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::OK,
    }
}

async fn message_send(body: Bytes) -> StatusCode {
    let value = match parse(&body) {
        Ok(value) => value,
        Err(status) => return status,
    };
    let to = value.get("to").and_then(Value::as_str).unwrap_or_default();
    let content = value.get("content").and_then(Value::as_str).unwrap_or_default();
    if !to.chars().all(|c| c.is_ascii_alphanumeric()) || hostile(content) {
        return StatusCode::BAD_REQUEST;
    }
    StatusCode::OK
}

async fn neighbor_add(body: Bytes) -> StatusCode {
    match parse(&body) {
        Ok(value) if value.get("address").and_then(Value::as_str).is_some_and(|a| a.starts_with("/ip4/")) => {
            StatusCode::OK
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn node_info(Query(params): Query<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
    if params.get("q").is_some_and(|q| hostile(q) || q.contains('\'')) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({ "id": "mock", "version": "0.0.0" })))
}

async fn protected(State(state): State<Arc<MockState>>, headers: HeaderMap) -> StatusCode {
    match headers.get(API_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        None => StatusCode::UNAUTHORIZED,
        Some(token) if token == state.behavior.api_token => StatusCode::OK,
        Some(_) => StatusCode::FORBIDDEN,
    }
}

pub async fn serve(listener: TcpListener, router: Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    })
}

/// A mock API on an ephemeral port, with a descriptor pointing at it
pub async fn spawn_mock(index: usize, behavior: MockBehavior) -> (NodeDescriptor, JoinHandle<()>) {
    let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut node = descriptor(
        index,
        NodeRole::Normal,
        api.local_addr().unwrap().port(),
        admin.local_addr().unwrap().port(),
    );
    node.status = NodeStatus::Running;
    let api_task = serve(api, api_router(behavior.clone())).await;
    let admin_task = serve(admin, admin_router(behavior)).await;
    let handle = tokio::spawn(async move {
        let _ = tokio::join!(api_task, admin_task);
    });
    (node, handle)
}

pub fn descriptor(index: usize, role: NodeRole, http_port: u16, admin_port: u16) -> NodeDescriptor {
    let id = NodeDescriptor::id_for(index);
    NodeDescriptor {
        data_dir: Path::new("/tmp/gauntlet-mock/data").join(&id),
        log_file: Path::new("/tmp/gauntlet-mock/logs").join(format!("{}.log", id)),
        id,
        index,
        role,
        p2p_port: 0,
        http_port,
        admin_port,
        bootstrap_address: None,
        pid: 0,
        status: NodeStatus::Stopped,
    }
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ----------------------------------------------------------------------------
// In-process Supervisor
// ----------------------------------------------------------------------------

/// Serves the mock API on each node's ports instead of launching a binary
pub struct InProcessSupervisor {
    client: NodeClient,
    behavior: MockBehavior,
    /// Node ids whose start fails
    fail: HashSet<String>,
    running: tokio::sync::Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
    started: AtomicUsize,
}

impl InProcessSupervisor {
    pub fn new(client: NodeClient, behavior: MockBehavior) -> Self {
        Self {
            client,
            behavior,
            fail: HashSet::new(),
            running: tokio::sync::Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, ids: &[&str]) -> Self {
        self.fail = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSupervisor for InProcessSupervisor {
    fn kind(&self) -> &'static str {
        "in-process"
    }

    async fn start(&self, node: &NodeHandle, _extra_args: &[String]) -> Result<(), SupervisorError> {
        let descriptor = node.read().await.clone();
        let result = if self.fail.contains(&descriptor.id) {
            Err(SupervisorError::LaunchFailed {
                node: descriptor.id.clone(),
                reason: "No such file or directory".to_string(),
            })
        } else {
            ensure_ports_free(&descriptor)
        };
        if let Err(e) = result {
            let mut guard = node.write().await;
            guard.status = NodeStatus::Failed;
            guard.pid = 0;
            return Err(e);
        }

        let p2p = TcpListener::bind(("127.0.0.1", descriptor.p2p_port)).await.unwrap();
        let api = TcpListener::bind(("127.0.0.1", descriptor.http_port)).await.unwrap();
        let admin = TcpListener::bind(("127.0.0.1", descriptor.admin_port)).await.unwrap();
        let tasks = vec![
            tokio::spawn(async move {
                while p2p.accept().await.is_ok() {}
            }),
            serve(api, api_router(self.behavior.clone())).await,
            serve(admin, admin_router(self.behavior.clone())).await,
        ];
        self.running.lock().await.insert(descriptor.id.clone(), tasks);

        let pid = 40_000 + self.started.fetch_add(1, Ordering::SeqCst) as u32;
        let mut guard = node.write().await;
        guard.pid = pid;
        guard.status = NodeStatus::Starting;
        Ok(())
    }

    async fn wait_ready(&self, node: &NodeHandle, timeout: Duration) -> bool {
        poll_ready(&self.client, node, timeout, Duration::from_millis(20), || async { false }).await
    }

    async fn stop(&self, node: &NodeHandle, _grace: Duration) -> StopReport {
        let id = node.read().await.id.clone();
        let method = match self.running.lock().await.remove(&id) {
            Some(tasks) => {
                for task in tasks {
                    task.abort();
                }
                StopMethod::Graceful
            }
            None => StopMethod::NotRunning,
        };
        let mut guard = node.write().await;
        guard.status = NodeStatus::Stopped;
        guard.pid = 0;
        StopReport::new(id, method)
    }
}

/// Config tuned for fast in-process runs
pub fn fast_config(work_dir: &Path, output_dir: &Path, port_offset: u16) -> GauntletConfig {
    let mut config = GauntletConfig::default();
    config.topology.work_dir = work_dir.to_path_buf();
    config.topology.p2p_base = 41_000 + port_offset;
    config.topology.http_base = 42_000 + port_offset;
    config.topology.admin_base = 43_000 + port_offset;
    config.output.dir = output_dir.to_path_buf();
    config.node.request_timeout_ms = 2000;
    config.timing.readiness_timeout_secs = 5;
    config.timing.settle_ms = 0;
    config.timing.observe_secs = 1;
    config.timing.sample_interval_ms = 200;
    config.timing.health_timeout_ms = 1000;
    config.attacks.pause_ms = 0;
    config.attacks.exhaustion_connections = 4;
    config.attacks.exhaustion_hold_ms = 100;
    config
}
