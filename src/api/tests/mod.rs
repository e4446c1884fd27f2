use super::*;
use crate::orchestrator::test_helpers::{MockFetcher, gated_orchestrator, release_and_shutdown};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

mod tasks;

/// Router over an orchestrator whose fetches block on the returned gate
fn test_app() -> (Router, Arc<DownloadOrchestrator>, Arc<MockFetcher>, Arc<Semaphore>) {
    let (orchestrator, fetcher, gate, _store) = gated_orchestrator();
    let orchestrator = Arc::new(orchestrator);
    let app = create_router(orchestrator.clone(), Arc::new(Config::default()));
    (app, orchestrator, fetcher, gate)
}

/// Send one request and decode the JSON body (Null when empty)
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn work_json(id: &str, chapters: usize) -> Value {
    let chapters: Vec<Value> = (1..=chapters)
        .map(|n| serde_json::json!({"id": n.to_string(), "title": format!("Chapter {n}")}))
        .collect();
    serde_json::json!({"id": id, "source": "test", "chapters": chapters})
}

#[tokio::test]
async fn cors_headers_are_added_when_enabled() {
    let (app, orchestrator, _fetcher, gate) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn cors_can_be_disabled() {
    let (orchestrator, _fetcher, _gate, _store) = gated_orchestrator();
    let mut config = Config::default();
    config.api.cors_enabled = false;
    let app = create_router(Arc::new(orchestrator), Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[test]
fn cors_layer_accepts_explicit_origins() {
    // Invalid header values are skipped rather than rejected
    let _layer = build_cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
}

#[tokio::test]
async fn api_server_binds_and_serves() {
    let (orchestrator, _fetcher, _gate, _store) = gated_orchestrator();
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let server = tokio::spawn(start_api_server(Arc::new(orchestrator), Arc::new(config)));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(!server.is_finished());
    server.abort();
}
