//! MCP Server
//!
//! JSON-RPC dispatch on top of a [`ToolService`]. Transport-agnostic: the
//! stdio transport and the HTTP `/mcp` endpoint both feed it.
//!
//! Both the MCP method names (`tools/list`, `tools/call`) and the plain
//! operation names (`list_tools`, `call_tool`) are accepted.

use crate::gateway::ToolService;
use crate::protocol::{JsonRpcError, McpRequest, McpResponse};
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use serde_json::{json, Value};
use std::sync::Arc;
use tg_core::{FailureKind, ToolCallRequest, ToolCallResult};
use tracing::{debug, info, warn};

/// Server configuration
#[derive(Debug, Clone, Default)]
pub struct McpServerConfig {
    /// Server name override
    pub name: Option<String>,
}

/// JSON-RPC front of the gateway
pub struct McpServer {
    config: McpServerConfig,
    service: Arc<dyn ToolService>,
}

impl McpServer {
    pub fn new(config: McpServerConfig, service: Arc<dyn ToolService>) -> Self {
        Self { config, service }
    }

    /// The Protocol Core behind this server
    pub fn service(&self) -> &Arc<dyn ToolService> {
        &self.service
    }

    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or(SERVER_NAME)
    }

    /// Handle an MCP request that expects a response
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        debug!(method = %request.method, "Handling MCP request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => McpResponse::success(request.id, json!({})),
            "tools/list" | "list_tools" => self.handle_tools_list(request).await,
            "tools/call" | "call_tool" => self.handle_tools_call(request).await,
            _ => McpResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        }
    }

    /// Handle a notification; nothing is sent back
    pub async fn handle_notification(&self, request: McpRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => info!("Client initialized"),
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&self, request: McpRequest) -> McpResponse {
        let client_info = request.params.as_ref().and_then(|p| p.get("clientInfo"));
        let client_name = client_info
            .and_then(|ci| ci.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let client_version = client_info
            .and_then(|ci| ci.get("version"))
            .and_then(Value::as_str)
            .unwrap_or("?");

        info!(client = %client_name, version = %client_version, "Client connected");

        McpResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.name(),
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    async fn handle_tools_list(&self, request: McpRequest) -> McpResponse {
        let tools = self.service.list_tools().await;
        McpResponse::success(request.id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, request: McpRequest) -> McpResponse {
        let call = match parse_call_params(request.params.as_ref()) {
            Ok(call) => call,
            Err(error) => return McpResponse::error(request.id, error),
        };

        match self.service.call_tool(call).await {
            ToolCallResult::Success(result) => {
                let mut body = json!({
                    "content": [{
                        "type": "text",
                        "text": serde_json::to_string_pretty(&result).unwrap_or_default()
                    }],
                    "isError": false
                });
                if result.is_object() {
                    body["structuredContent"] = result;
                }
                McpResponse::success(request.id, body)
            }
            ToolCallResult::Failure {
                kind: FailureKind::Configuration,
                message,
            } => McpResponse::error(
                request.id,
                JsonRpcError::not_configured(message).with_data(json!({ "kind": "configuration" })),
            ),
            ToolCallResult::Failure {
                kind: FailureKind::Validation,
                message,
            } => McpResponse::error(request.id, JsonRpcError::invalid_params(message)),
            ToolCallResult::Failure {
                kind: FailureKind::Provider,
                message,
            } => {
                warn!(error = %message, "Provider failure reported to MCP client");
                McpResponse::success(
                    request.id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": format!("Error: {}", message)
                        }],
                        "isError": true
                    }),
                )
            }
        }
    }
}

/// Extract `{ name, arguments }`. Omitted arguments mean "no arguments" (`{}`);
/// an explicit null is rejected.
fn parse_call_params(params: Option<&Value>) -> Result<ToolCallRequest, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;

    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;

    let arguments = match params.get("arguments") {
        None => json!({}),
        Some(arguments) => arguments.clone(),
    };

    ToolCallRequest::new(name, arguments).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}
