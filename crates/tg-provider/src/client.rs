//! Workflow Provider Client
//!
//! Narrow HTTP client for the Pipedream API: list the workflows of a project
//! and execute one by name. Every failure is normalized; nothing here panics
//! or leaks a raw transport error to the caller.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tg_core::{Credentials, Error, Result, ToolCallResult, ToolDescriptor};
use tracing::{debug, warn};

/// Longest slice of a provider error body echoed back to callers
const ERROR_BODY_EXCERPT: usize = 200;

/// Remote workflow provider
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    /// List the project's workflows as tool descriptors
    async fn list_workflows(&self, creds: &Credentials) -> Result<Vec<ToolDescriptor>>;

    /// Execute a workflow with `arguments` as its request body
    async fn execute_workflow(
        &self,
        creds: &Credentials,
        tool_name: &str,
        arguments: &Value,
    ) -> ToolCallResult;
}

/// Pipedream REST client. Stateless between calls; one instance is shared by
/// every transport.
#[derive(Debug, Clone)]
pub struct PipedreamClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl PipedreamClient {
    /// Create a client for `base_url` whose calls give up after `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Settings(format!("invalid provider URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Settings(format!("provider URL cannot be a base: {}", base_url)));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tool-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Settings(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client, base_url })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl WorkflowProvider for PipedreamClient {
    async fn list_workflows(&self, creds: &Credentials) -> Result<Vec<ToolDescriptor>> {
        let url = self.endpoint(&["v1", "projects", creds.project_id(), "workflows"]);
        debug!(url = %url, "Listing provider workflows");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(creds.api_key())
            .send()
            .await
            .map_err(|e| Error::provider(describe_transport_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(describe_transport_error(&e)))?;

        if !status.is_success() {
            return Err(Error::provider(status_message(status.as_u16(), &body)));
        }

        let body: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)
                .map_err(|e| Error::provider(format!("malformed workflow listing: {}", e)))?
        };

        parse_workflow_listing(body)
    }

    async fn execute_workflow(
        &self,
        creds: &Credentials,
        tool_name: &str,
        arguments: &Value,
    ) -> ToolCallResult {
        let url = self.endpoint(&["v1", "workflows", tool_name, "execute"]);
        debug!(tool = %tool_name, url = %url, "Executing provider workflow");

        let response = match self
            .http_client
            .post(url)
            .bearer_auth(creds.api_key())
            .json(arguments)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Workflow execution request failed");
                return ToolCallResult::provider_failure(describe_transport_error(&e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolCallResult::provider_failure(describe_transport_error(&e)),
        };

        if !status.is_success() {
            warn!(tool = %tool_name, status = status.as_u16(), "Workflow execution rejected by provider");
            return ToolCallResult::provider_failure(status_message(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return ToolCallResult::Success(Value::Null);
        }

        match serde_json::from_str(&body) {
            Ok(value) => ToolCallResult::Success(value),
            Err(e) => ToolCallResult::provider_failure(format!("malformed provider response: {}", e)),
        }
    }
}

/// Turn a listing body into descriptors.
///
/// Accepts a bare array or an object wrapping it under `data` or `workflows`.
/// Missing descriptions and schemas default to empty values; entries without a
/// name are skipped and duplicate names keep their first occurrence.
pub fn parse_workflow_listing(body: Value) -> Result<Vec<ToolDescriptor>> {
    let items = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("workflows")) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => return Ok(Vec::new()),
            _ => return Err(Error::provider("workflow listing has no data array")),
        },
        other => {
            return Err(Error::provider(format!(
                "unexpected workflow listing type: {}",
                json_type(&other)
            )))
        }
    };

    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(items.len());

    for item in items {
        let Some(name) = item
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            warn!("Skipping workflow without a name");
            continue;
        };

        if !seen.insert(name.to_string()) {
            warn!(tool = %name, "Skipping duplicate workflow name");
            continue;
        }

        let description = item
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let input_schema = item
            .get("inputSchema")
            .or_else(|| item.get("input_schema"))
            .filter(|s| !s.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        tools.push(ToolDescriptor::new(name, description, input_schema));
    }

    Ok(tools)
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "provider request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect to provider: {}", err)
    } else {
        format!("provider request failed: {}", err)
    }
}

fn status_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("provider returned status {}", status);
    }
    let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
    format!("provider returned status {}: {}", status, excerpt)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
