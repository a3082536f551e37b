//! Transport Layer
//!
//! - Stdio: newline-delimited JSON-RPC for a local host process
//! - HTTP: REST endpoints plus JSON-RPC over `POST /mcp`
//!
//! Both serve the same [`McpServer`](crate::McpServer) and never know about
//! each other.

mod http;
mod stdio;

pub use http::{
    router, CatalogHealth, ExecuteToolRequest, HealthResponse, HttpTransport, PipedreamHealth,
};
pub use stdio::{StdioSession, StdioTransport};

use anyhow::Result;
use std::sync::Arc;

/// Generic MCP handler trait for transport layer
#[async_trait::async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse;

    async fn handle_notification(&self, _request: crate::McpRequest) {}
}

/// Transport trait - implement for new transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests using this transport
    async fn serve(self, server: Arc<crate::McpServer>) -> Result<()>;
}

#[async_trait::async_trait]
impl McpHandler for crate::McpServer {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse {
        crate::McpServer::handle_request(self, request).await
    }

    async fn handle_notification(&self, request: crate::McpRequest) {
        crate::McpServer::handle_notification(self, request).await
    }
}
