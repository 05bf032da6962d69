//! Integration tests for the HTTP service and state posting.

#![cfg(feature = "api")]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::util::ServiceExt;

use microgrid_sim::api::{AppState, router, serve_listener};
use microgrid_sim::db::Database;
use microgrid_sim::error::PublishError;
use microgrid_sim::publisher::{HttpPublisher, StatePublisher};
use microgrid_sim::runner::Runner;

async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Serves the API on an ephemeral port.
async fn spawn_server(db: Option<Arc<Database>>) -> (SocketAddr, Arc<AppState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(db));
    tokio::spawn(serve_listener(state.clone(), listener));
    (addr, state)
}

fn publisher(addr: SocketAddr, path: &str) -> HttpPublisher {
    HttpPublisher::new(
        format!("http://{addr}{path}"),
        Duration::from_secs(5),
        1,
        Duration::from_millis(10),
    )
    .unwrap()
}

#[tokio::test]
async fn insert_replaces_previous_state() {
    let state = Arc::new(AppState::new(None));
    call(&state, post_json("/insert", r#"{"data": {"step": 1}}"#)).await;
    call(&state, post_json("/insert", r#"{"data": {"step": 2}}"#)).await;

    let (status, json) = call(&state, get("/soc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["step"], 2);
}

#[tokio::test]
async fn jobs_posted_over_http_drive_node_load() {
    let db = common::demo_db();
    let state = Arc::new(AppState::new(Some(db.clone())));
    let (status, _) = call(
        &state,
        post_json("/jobs", r#"{"gridname": "PT02", "load": 90.0}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut runner = Runner::from_config(
        &common::short_demo(1),
        db,
        Box::new(common::MemoryPublisher::default()),
    )
    .unwrap();
    let tick = runner.tick(0).await.unwrap();
    assert_eq!(tick.grids[1].nodes[0].cpu_pct, 90.0);

    let (status, json) = call(&state, get("/soc/history?grid=PT02")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn http_publisher_posts_to_live_server() {
    let (addr, _state) = spawn_server(None).await;
    let db = common::demo_db();
    let mut runner = Runner::from_config(
        &common::short_demo(3),
        db,
        Box::new(publisher(addr, "/insert")),
    )
    .unwrap();
    let summary = runner.run().await.unwrap();
    assert_eq!(summary.publish_failures, 0);

    let body: Value = reqwest::get(format!("http://{addr}/soc"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"]["step"], 2);
    assert_eq!(body["state"]["grids"][0]["name"], "ES10");
    assert!(body["state"]["grids"][0]["soc"].is_f64());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, _state) = spawn_server(Some(common::demo_db())).await;
    let state = runner_state().await;

    // /jobs rejects the {"data": ...} envelope
    let err = publisher(addr, "/jobs").publish(&state).await.unwrap_err();
    assert!(
        matches!(err, PublishError::Status { status: 400, .. }),
        "{err}"
    );
}

#[tokio::test]
async fn server_errors_surface_after_retries() {
    // no database attached: /jobs answers 503
    let (addr, _state) = spawn_server(None).await;
    let state = runner_state().await;

    let err = publisher(addr, "/jobs").publish(&state).await.unwrap_err();
    assert!(
        matches!(err, PublishError::Status { status: 503, .. }),
        "{err}"
    );
}

async fn runner_state() -> microgrid_sim::sim::types::GridsState {
    let mut runner = Runner::from_config(
        &common::short_demo(1),
        common::demo_db(),
        Box::new(common::MemoryPublisher::default()),
    )
    .unwrap();
    runner.tick(0).await.unwrap()
}
