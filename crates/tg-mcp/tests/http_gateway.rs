//! HTTP transport against an in-process fake Pipedream API

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tg_core::{CredentialState, CredentialStore};
use tg_mcp::transport::{router, HttpTransport};
use tg_mcp::{McpServer, McpServerConfig, ToolGateway};
use tg_provider::PipedreamClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tower::ServiceExt;

const API_KEY: &str = "pd-secret-key";
const PROJECT_ID: &str = "proj_123";

/// Fake workflow API recording what reached it
struct FakePipedream {
    list_calls: AtomicUsize,
    list_status: AtomicU16,
    executed: Mutex<Vec<(String, Value)>>,
    auth_headers: Mutex<Vec<String>>,
}

impl FakePipedream {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            list_calls: AtomicUsize::new(0),
            list_status: AtomicU16::new(200),
            executed: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
        })
    }

    fn record_auth(&self, headers: &HeaderMap) {
        if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            self.auth_headers.lock().unwrap().push(auth.to_string());
        }
    }
}

fn send_email_descriptor() -> Value {
    json!({
        "name": "send-email",
        "description": "Send an email",
        "inputSchema": {
            "type": "object",
            "properties": {"to": {"type": "string"}},
            "required": ["to"]
        }
    })
}

async fn list_workflows(
    State(fake): State<Arc<FakePipedream>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    fake.list_calls.fetch_add(1, Ordering::SeqCst);
    fake.record_auth(&headers);

    let status = fake.list_status.load(Ordering::SeqCst);
    if status != 200 {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "upstream exploded").into_response();
    }
    assert_eq!(project_id, PROJECT_ID);
    Json(json!({ "data": [send_email_descriptor()] })).into_response()
}

async fn execute_workflow(
    State(fake): State<Arc<FakePipedream>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(args): Json<Value>,
) -> Response {
    fake.record_auth(&headers);
    fake.executed.lock().unwrap().push((name.clone(), args));

    match name.as_str() {
        "send-email" => Json(json!({"status": "sent"})).into_response(),
        "slow-email" => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Json(json!({"status": "sent"})).into_response()
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "workflow crashed").into_response(),
    }
}

async fn spawn_fake(fake: Arc<FakePipedream>) -> String {
    let app = Router::new()
        .route("/v1/projects/:project_id/workflows", get(list_workflows))
        .route("/v1/workflows/:name/execute", post(execute_workflow))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn configured() -> CredentialState {
    CredentialStore::from_values(Some(API_KEY.into()), Some(PROJECT_ID.into()))
}

fn gateway_server(credentials: CredentialState, base_url: &str, ttl: Duration) -> Arc<McpServer> {
    let client = PipedreamClient::new(base_url, Duration::from_secs(5)).unwrap();
    let gateway = ToolGateway::new(credentials, Arc::new(client), ttl);
    Arc::new(McpServer::new(McpServerConfig::default(), Arc::new(gateway)))
}

fn gateway_app(credentials: CredentialState, base_url: &str, ttl: Duration) -> Router {
    router(gateway_server(credentials, base_url, ttl))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get_tools() -> Request<Body> {
    Request::builder().uri("/tools").body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

#[tokio::test]
async fn unconfigured_gateway_lists_nothing_and_rejects_calls() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(
        CredentialStore::from_values(None, None),
        &base_url,
        Duration::from_secs(30),
    );

    let (status, body) = send(&app, get_tools()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tools": []}));

    let (status, body) = send(
        &app,
        post_json("/execute-tool", json!({"tool": "send-email", "args": {}}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "provider not configured");

    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 0);
    assert!(fake.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn listing_returns_provider_descriptor_verbatim() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    let (status, body) = send(&app, get_tools()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tools": [send_email_descriptor()]}));

    // served from cache the second time
    let (_, again) = send(&app, get_tools()).await;
    assert_eq!(again, body);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        fake.auth_headers.lock().unwrap().as_slice(),
        [format!("Bearer {}", API_KEY)]
    );
}

#[tokio::test]
async fn listing_outage_before_first_success_is_empty() {
    let fake = FakePipedream::new();
    fake.list_status.store(500, Ordering::SeqCst);
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    let (status, body) = send(&app, get_tools()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tools": []}));
}

#[tokio::test]
async fn listing_outage_after_expiry_serves_stale_catalog() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_millis(50));

    let (_, fresh) = send(&app, get_tools()).await;
    assert_eq!(fresh["tools"].as_array().unwrap().len(), 1);

    fake.list_status.store(500, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(120)).await;

    let (status, stale) = send(&app, get_tools()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stale, fresh);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn execute_forwards_arguments_and_returns_result() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    let (status, body) = send(
        &app,
        post_json(
            "/execute-tool",
            json!({"tool": "send-email", "args": {"to": "a@b.com"}}).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": {"status": "sent"}}));
    assert_eq!(
        fake.executed.lock().unwrap().as_slice(),
        [("send-email".to_string(), json!({"to": "a@b.com"}))]
    );
    // execution bypasses the catalog
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn provider_failure_maps_to_bad_gateway() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    let (status, body) = send(
        &app,
        post_json("/execute-tool", json!({"tool": "flaky", "args": {}}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("500"), "unexpected error: {}", message);
}

#[tokio::test]
async fn execute_rejects_malformed_bodies() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    for body in [
        "{not json".to_string(),
        json!({"tool": "send-email"}).to_string(),
        json!({"tool": "send-email", "args": null}).to_string(),
        json!({"tool": "   ", "args": {}}).to_string(),
        json!({"args": {}}).to_string(),
    ] {
        let (status, response) = send(&app, post_json("/execute-tool", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert!(response["error"].is_string(), "body {}", body);
    }

    assert!(fake.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_presence_without_secrets() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(
        CredentialStore::from_values(Some(API_KEY.into()), None),
        &base_url,
        Duration::from_secs(30),
    );

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let raw = String::from_utf8(bytes.to_vec()).unwrap();
    let body: Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mcp-server");
    assert!(body["timestamp"].is_string());
    assert_eq!(
        body["pipedream"],
        json!({"api_key_configured": true, "project_id_configured": false})
    );
    assert_eq!(body["catalog"]["cached_tools"], 0);
    assert!(!raw.contains(API_KEY));
}

#[tokio::test]
async fn mcp_endpoint_speaks_json_rpc() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let app = gateway_app(configured(), &base_url, Duration::from_secs(30));

    let (status, body) = send(
        &app,
        post_json(
            "/mcp",
            json!({"jsonrpc": "2.0", "id": 9, "method": "tools/list"}).to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 9);
    assert_eq!(body["result"]["tools"][0]["name"], "send-email");

    let (status, body) = send(
        &app,
        post_json(
            "/mcp",
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);

    let (_, body) = send(&app, post_json("/mcp", "{broken")).await;
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn shutdown_lets_in_flight_execution_finish() {
    let fake = FakePipedream::new();
    let base_url = spawn_fake(fake.clone()).await;
    let server = gateway_server(configured(), &base_url, Duration::from_secs(30));

    let http = HttpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = http.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(http.serve_with_shutdown(server, async move {
        let _ = stop_rx.await;
    }));

    let body = json!({"tool": "slow-email", "args": {"to": "a@b.com"}}).to_string();
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!(
                "POST /execute-tool HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                addr,
                body.len(),
                body
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    // stop while the provider is still working on the call
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200"), "unexpected response: {}", raw);
    assert!(raw.contains(r#"{"result":{"status":"sent"}}"#), "unexpected response: {}", raw);

    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server must stop once in-flight requests finish")
        .unwrap()
        .unwrap();
}
