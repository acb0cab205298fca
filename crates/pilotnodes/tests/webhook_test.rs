// crates/pilotnodes/tests/webhook_test.rs

mod common;

use common::{closed_port_url, init_tracing, spawn_http_server, spawn_silent_server};
use pilotcore::{payload, NodeContext, NodeError, NodeStrategy, Payload};
use pilotnodes::WebhookNode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

fn webhook_context(config: Value, inputs: Payload) -> NodeContext {
    let Value::Object(config) = config else {
        panic!("config must be an object");
    };
    NodeContext::new("w", "exec-webhook", "user-1")
        .with_config(config)
        .with_inputs(inputs)
}

#[tokio::test]
async fn test_webhook_posts_inputs_as_json() {
    init_tracing();
    let (url, mut requests) =
        spawn_http_server("200 OK", "application/json", r#"{"received":true}"#).await;

    let ctx = webhook_context(
        json!({ "url": format!("{}/hook", url), "headers": { "X-Source": "pilot" } }),
        payload([("summary", json!("short"))]),
    );
    let out = WebhookNode::new().execute(ctx).await.expect("webhook should succeed");

    assert_eq!(out["status"], json!(200));
    assert_eq!(out["statusText"], json!("OK"));
    assert_eq!(out["success"], json!(true));
    assert_eq!(out["data"], json!({ "received": true }));
    assert_eq!(out["headers"]["content-type"], json!("application/json"));

    let request = requests.recv().await.expect("server saw the request");
    assert_eq!(request.method(), "POST");
    assert!(request.head.starts_with("POST /hook "));
    assert_eq!(request.header("content-type").as_deref(), Some("application/json"));
    assert_eq!(request.header("x-source").as_deref(), Some("pilot"));
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, json!({ "summary": "short" }));
}

#[tokio::test]
async fn test_webhook_get_sends_no_body() {
    init_tracing();
    let (url, mut requests) = spawn_http_server("200 OK", "text/plain", "pong").await;

    let ctx = webhook_context(
        json!({ "url": url, "method": "get" }),
        payload([("ignored", json!(1))]),
    );
    let out = WebhookNode::new().execute(ctx).await.unwrap();

    assert_eq!(out["data"], json!("pong"), "non-JSON bodies come back as text");
    let request = requests.recv().await.unwrap();
    assert_eq!(request.method(), "GET");
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_webhook_error_status_is_not_a_node_failure() {
    init_tracing();
    let (url, _requests) =
        spawn_http_server("404 Not Found", "application/json", r#"{"error":"nope"}"#).await;

    let ctx = webhook_context(json!({ "url": url }), Payload::new());
    let out = WebhookNode::new().execute(ctx).await.unwrap();

    assert_eq!(out["status"], json!(404));
    assert_eq!(out["success"], json!(false));
    assert_eq!(out["data"]["error"], json!("nope"));
}

#[tokio::test]
async fn test_webhook_authentication_headers() {
    init_tracing();
    let (url, mut requests) = spawn_http_server("204 No Content", "text/plain", "").await;
    let node = WebhookNode::new();

    let bearer = webhook_context(
        json!({
            "url": url,
            "authentication": { "type": "bearer", "config": { "token": "s3cret" } }
        }),
        Payload::new(),
    );
    node.execute(bearer).await.unwrap();
    let request = requests.recv().await.unwrap();
    assert_eq!(request.header("authorization").as_deref(), Some("Bearer s3cret"));

    let api_key = webhook_context(
        json!({
            "url": url,
            "authentication": { "type": "api_key", "config": { "key": "k-123" } }
        }),
        Payload::new(),
    );
    node.execute(api_key).await.unwrap();
    let request = requests.recv().await.unwrap();
    assert_eq!(request.header("x-api-key").as_deref(), Some("k-123"));

    let basic = webhook_context(
        json!({
            "url": url,
            "authentication": {
                "type": "basic",
                "config": { "username": "ada", "password": "lovelace" }
            }
        }),
        Payload::new(),
    );
    node.execute(basic).await.unwrap();
    let request = requests.recv().await.unwrap();
    assert_eq!(
        request.header("authorization").as_deref(),
        Some("Basic YWRhOmxvdmVsYWNl")
    );
}

#[tokio::test]
async fn test_webhook_timeout_is_network_error() {
    init_tracing();
    let url = spawn_silent_server().await;

    let ctx = webhook_context(json!({ "url": url, "timeout": 100 }), Payload::new());
    let started = Instant::now();
    let err = WebhookNode::new().execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::NetworkError(_)), "got {:?}", err);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "timeout should cut the request short"
    );
}

#[tokio::test]
async fn test_webhook_connection_refused_is_network_error() {
    init_tracing();
    let url = closed_port_url().await;

    let ctx = webhook_context(json!({ "url": url }), Payload::new());
    let err = WebhookNode::new().execute(ctx).await.unwrap_err();

    assert_eq!(err.kind(), "node.network_error");
}

#[tokio::test]
async fn test_webhook_rejects_malformed_url() {
    let ctx = webhook_context(json!({ "url": "not a url" }), Payload::new());
    let err = WebhookNode::new().execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::InvalidConfig(_)));
}
