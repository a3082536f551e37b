//! HTTP Transport
//!
//! REST endpoints for remote callers plus JSON-RPC over `POST /mcp`:
//! - `GET /tools`: current catalog
//! - `POST /execute-tool`: run one tool, `{ tool, args }`
//! - `GET /health`: liveness and configuration presence
//! - `POST /mcp`: the same dispatcher the stdio transport uses

use crate::{JsonRpcError, McpRequest, McpResponse, McpServer};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tg_core::{FailureKind, ToolCallRequest, ToolCallResult};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// HTTP transport bound to a listener
pub struct HttpTransport {
    listener: TcpListener,
}

impl HttpTransport {
    /// Bind the listener up front so a bad address fails at startup
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {}", addr))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `signal` resolves, then let in-flight requests finish
    pub async fn serve_with_shutdown<F>(self, server: Arc<McpServer>, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(server).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

        info!(addr = %self.local_addr()?, "HTTP transport listening");
        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await
            .context("HTTP server failed")?;
        info!("HTTP transport stopped");
        Ok(())
    }
}

/// Routes of the HTTP transport, without the CORS layer
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/execute-tool", post(execute_tool_handler))
        .route("/mcp", post(mcp_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Body of `POST /execute-tool`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteToolRequest {
    pub tool: String,
    /// `null` and absent are both rejected
    #[serde(default)]
    pub args: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub pipedream: PipedreamHealth,
    pub catalog: CatalogHealth,
}

#[derive(Debug, Serialize)]
pub struct PipedreamHealth {
    pub api_key_configured: bool,
    pub project_id_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogHealth {
    pub cached_tools: usize,
    pub age_secs: Option<u64>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Configuration | FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::Provider => StatusCode::BAD_GATEWAY,
    }
}

// === Handlers ===

async fn root_handler(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(json!({
        "service": server.name(),
        "version": crate::SERVER_VERSION,
        "protocol": crate::PROTOCOL_VERSION,
        "endpoints": {
            "tools": "GET /tools",
            "execute": "POST /execute-tool",
            "health": "GET /health",
            "mcp": "POST /mcp"
        }
    }))
}

async fn health_handler(State(server): State<Arc<McpServer>>) -> Json<HealthResponse> {
    let status = server.service().status().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mcp-server".to_string(),
        version: crate::SERVER_VERSION.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        pipedream: PipedreamHealth {
            api_key_configured: status.api_key_configured,
            project_id_configured: status.project_id_configured,
        },
        catalog: CatalogHealth {
            cached_tools: status.cached_tools,
            age_secs: status.catalog_age_secs,
        },
    })
}

async fn tools_handler(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    let tools = server.service().list_tools().await;
    debug!(count = tools.len(), "Serving tool catalog");
    Json(json!({ "tools": tools }))
}

async fn execute_tool_handler(
    State(server): State<Arc<McpServer>>,
    payload: std::result::Result<Json<ExecuteToolRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let Some(args) = body.args else {
        return error_response(StatusCode::BAD_REQUEST, "args is required");
    };

    let outcome = match ToolCallRequest::new(body.tool, args) {
        Ok(request) => server.service().call_tool(request).await,
        Err(e) => ToolCallResult::from(e),
    };

    match outcome {
        ToolCallResult::Success(result) => Json(json!({ "result": result })).into_response(),
        ToolCallResult::Failure { kind, message } => {
            if kind == FailureKind::Provider {
                warn!(error = %message, "Tool execution failed at provider");
            }
            error_response(status_for(kind), message)
        }
    }
}

async fn mcp_handler(
    State(server): State<Arc<McpServer>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let value = match payload {
        Ok(Json(value)) => value,
        Err(rejection) => {
            let error = JsonRpcError::parse_error(rejection.body_text());
            return Json(McpResponse::error(None, error)).into_response();
        }
    };

    let id = value.get("id").filter(|id| !id.is_null()).cloned();
    let request: McpRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            let error = JsonRpcError::invalid_request(e.to_string());
            return Json(McpResponse::error(id, error)).into_response();
        }
    };

    if request.is_notification() {
        server.handle_notification(request).await;
        return StatusCode::ACCEPTED.into_response();
    }

    debug!(method = %request.method, "HTTP MCP request");
    Json(server.handle_request(request).await).into_response()
}
