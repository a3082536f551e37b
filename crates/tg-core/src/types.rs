//! Domain types shared by the provider client, the cache and the transports

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::time::Instant;

/// A provider workflow exposed as a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Passed through verbatim; the gateway never interprets it.
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Snapshot of the provider's tools. Replaced wholesale, never edited.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    entries: Vec<ToolDescriptor>,
    fetched_at: Option<Instant>,
}

impl ToolCatalog {
    /// Catalog fetched just now
    pub fn fetched(entries: Vec<ToolDescriptor>) -> Self {
        Self {
            entries,
            fetched_at: Some(Instant::now()),
        }
    }

    /// Placeholder served before any listing succeeded
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            fetched_at: None,
        }
    }

    pub fn entries(&self) -> &[ToolDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time since the listing was fetched; None for the placeholder catalog
    pub fn age(&self) -> Option<std::time::Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    tool_name: String,
    arguments: Value,
}

impl ToolCallRequest {
    /// Build a request, rejecting blank tool names and absent (null) arguments.
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Result<Self> {
        let tool_name = tool_name.into();
        if tool_name.trim().is_empty() {
            return Err(Error::validation("tool name must not be empty"));
        }
        if arguments.is_null() {
            return Err(Error::validation("arguments must be a JSON value, not null"));
        }
        Ok(Self { tool_name, arguments })
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }
}

/// Why a tool call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Validation,
    Provider,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Configuration => write!(f, "configuration"),
            FailureKind::Validation => write!(f, "validation"),
            FailureKind::Provider => write!(f, "provider"),
        }
    }
}

/// Outcome of a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallResult {
    Success(Value),
    Failure { kind: FailureKind, message: String },
}

impl ToolCallResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ToolCallResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn provider_failure(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Provider, message)
    }

    pub fn not_configured() -> Self {
        Error::configuration("provider not configured").into()
    }
}

impl From<Error> for ToolCallResult {
    fn from(err: Error) -> Self {
        match err {
            Error::Configuration(msg) => Self::failure(FailureKind::Configuration, msg),
            Error::Validation(msg) | Error::Decode(msg) => Self::failure(FailureKind::Validation, msg),
            other => Self::failure(FailureKind::Provider, other.to_string()),
        }
    }
}
