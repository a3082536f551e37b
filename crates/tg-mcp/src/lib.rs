//! tg-mcp: tool gateway front end
//!
//! Exposes Pipedream workflows as tools to two kinds of caller:
//!
//! ```text
//! stdin  → JSON-RPC ─┐
//!                    ├→ McpServer → ToolGateway → CatalogCache / PipedreamClient
//! HTTP   → REST/RPC ─┘
//! ```
//!
//! Methods:
//! - initialize → handshake
//! - tools/list, list_tools → cached catalog
//! - tools/call, call_tool → live workflow execution

pub mod gateway;
pub mod protocol;
pub mod server;
pub mod transport;

pub use gateway::{GatewayStatus, ToolGateway, ToolService};
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use server::{McpServer, McpServerConfig};

/// Name reported in the `initialize` handshake
pub const SERVER_NAME: &str = "pipedream-mcp-server";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP protocol revision spoken by this server
pub const PROTOCOL_VERSION: &str = "2024-11-05";
