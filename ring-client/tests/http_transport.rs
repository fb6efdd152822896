//! NodeHandle over real HTTP against an in-process fake node.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chordprobe_client::{HttpTransport, NodeHandle, RpcError};
use ring_types::{NodeAddress, NodeInfo, ReconfigureRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeNode {
    storage: HashMap<String, String>,
    joined_via: Option<String>,
    reconfigured: Option<ReconfigureRequest>,
    self_addr: String,
}

type Shared = Arc<Mutex<FakeNode>>;

async fn hello() -> &'static str {
    "hello"
}

async fn node_info(Extension(node): Extension<Shared>) -> Json<serde_json::Value> {
    let addr = node.lock().unwrap().self_addr.clone();
    Json(serde_json::json!({
        "node_hash": "00000000000000aa",
        "successor": addr,
        "predecessor": "unknown",
        "others": ["finger-7", addr]
    }))
}

async fn join(
    Extension(node): Extension<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    node.lock().unwrap().joined_via = params.get("nprime").cloned();
    (StatusCode::OK, "Joined")
}

async fn leave() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_value(
    Extension(node): Extension<Shared>,
    Path(key): Path<String>,
) -> (StatusCode, String) {
    match node.lock().unwrap().storage.get(&key) {
        Some(value) => (StatusCode::OK, value.clone()),
        None => (StatusCode::NOT_FOUND, "Key not found".into()),
    }
}

async fn put_value(
    Extension(node): Extension<Shared>,
    Path(key): Path<String>,
    body: String,
) -> StatusCode {
    node.lock().unwrap().storage.insert(key, body);
    StatusCode::OK
}

async fn reconfigure(
    Extension(node): Extension<Shared>,
    Json(request): Json<ReconfigureRequest>,
) -> StatusCode {
    node.lock().unwrap().reconfigured = Some(request);
    StatusCode::OK
}

async fn spawn_fake_node() -> (NodeHandle<HttpTransport>, Shared) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = NodeAddress::new("127.0.0.1", port);

    let state: Shared = Arc::new(Mutex::new(FakeNode {
        self_addr: address.to_string(),
        ..FakeNode::default()
    }));

    let app = Router::new()
        .route("/helloworld", get(hello))
        .route("/node-info", get(node_info))
        .route("/join", post(join))
        .route("/leave", post(leave))
        .route("/storage/:key", get(get_value).put(put_value))
        .route("/reconfigure", post(reconfigure))
        .layer(Extension(Arc::clone(&state)));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let handle = NodeHandle::new(address, Arc::new(HttpTransport::new()));
    (handle, state)
}

// ============================================================================
// Liveness and snapshots
// ============================================================================

#[tokio::test]
async fn ping_succeeds_on_2xx() {
    let (node, _) = spawn_fake_node().await;
    assert!(node.ping().await);
}

#[tokio::test]
async fn node_info_decodes() {
    let (node, _) = spawn_fake_node().await;
    let info: NodeInfo = node.get_info().await.unwrap();
    assert_eq!(info.node_hash, "00000000000000aa");
    assert_eq!(info.successor.as_ref(), Some(node.address()));
    assert!(info.predecessor.is_none());
    assert_eq!(info.others[0], "finger-7");
}

// ============================================================================
// Control
// ============================================================================

#[tokio::test]
async fn join_sends_seed_as_query_param() {
    let (node, state) = spawn_fake_node().await;
    let seed = NodeAddress::new("c1", 50000);

    assert!(node.join(&seed).await);
    assert_eq!(
        state.lock().unwrap().joined_via.as_deref(),
        Some("c1:50000")
    );
}

#[tokio::test]
async fn non_2xx_collapses_to_false() {
    let (node, _) = spawn_fake_node().await;

    assert!(!node.leave().await);
    assert_eq!(
        node.try_leave().await,
        Err(RpcError::Status {
            op: "leave",
            status: 500
        })
    );
}

#[tokio::test]
async fn unknown_route_is_a_failure() {
    let (node, _) = spawn_fake_node().await;
    assert!(!node.reset().await);
}

#[tokio::test]
async fn reconfigure_posts_json_body() {
    let (node, state) = spawn_fake_node().await;
    let request = ReconfigureRequest {
        nodes: vec![node.address().clone()],
        max_nodes: 16,
        finger_table_size: 4,
    };

    assert!(node.reconfigure(&request).await);
    assert_eq!(state.lock().unwrap().reconfigured, Some(request));
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test]
async fn get_missing_key_is_absent() {
    let (node, _) = spawn_fake_node().await;
    assert_eq!(node.get("missing").await, (false, String::new()));
}

#[tokio::test]
async fn put_then_get_returns_body() {
    let (node, state) = spawn_fake_node().await;

    assert!(node.put("k1", "abcdefghij").await);
    assert_eq!(
        state.lock().unwrap().storage.get("k1").map(String::as_str),
        Some("abcdefghij")
    );
    assert_eq!(node.get("k1").await, (true, "abcdefghij".to_string()));
}
