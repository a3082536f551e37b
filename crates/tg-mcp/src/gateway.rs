//! Protocol Core
//!
//! The two operations every transport exposes, with no knowledge of wire
//! formats. Listings go through the catalog cache; calls always reach the
//! provider live, because execution has side effects.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tg_core::{CredentialState, ToolCallRequest, ToolCallResult, ToolDescriptor};
use tg_provider::{CacheStats, CatalogCache, WorkflowProvider};
use tracing::{debug, info};

/// Transport-facing interface of the gateway
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Current tool catalog. Empty when unconfigured; never fails.
    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Execute a validated tool call
    async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult;

    /// Configuration presence and catalog state, without secrets
    async fn status(&self) -> GatewayStatus;
}

/// Snapshot reported by health endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStatus {
    pub api_key_configured: bool,
    pub project_id_configured: bool,
    pub cached_tools: usize,
    pub catalog_age_secs: Option<u64>,
}

/// Pipedream-backed [`ToolService`]
pub struct ToolGateway {
    credentials: CredentialState,
    provider: Arc<dyn WorkflowProvider>,
    cache: CatalogCache,
    catalog_ttl: Duration,
}

impl ToolGateway {
    pub fn new(
        credentials: CredentialState,
        provider: Arc<dyn WorkflowProvider>,
        catalog_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            cache: CatalogCache::new(Arc::clone(&provider)),
            provider,
            catalog_ttl,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl ToolService for ToolGateway {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let Some(creds) = self.credentials.credentials() else {
            debug!("Provider not configured, reporting empty catalog");
            return Vec::new();
        };

        let catalog = self.cache.get_or_refresh(creds, self.catalog_ttl).await;
        catalog.entries().to_vec()
    }

    async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        let Some(creds) = self.credentials.credentials() else {
            return ToolCallResult::not_configured();
        };

        info!(tool = %request.tool_name(), "Executing tool");
        let result = self
            .provider
            .execute_workflow(creds, request.tool_name(), request.arguments())
            .await;

        if let ToolCallResult::Failure { kind, message } = &result {
            info!(tool = %request.tool_name(), kind = %kind, error = %message, "Tool call failed");
        }
        result
    }

    async fn status(&self) -> GatewayStatus {
        let snapshot = self.cache.snapshot().await;
        GatewayStatus {
            api_key_configured: self.credentials.api_key_configured(),
            project_id_configured: self.credentials.project_id_configured(),
            cached_tools: snapshot.as_ref().map_or(0, |c| c.len()),
            catalog_age_secs: snapshot.and_then(|c| c.age()).map(|age| age.as_secs()),
        }
    }
}
