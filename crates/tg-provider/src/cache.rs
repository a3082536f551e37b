//! Tool Catalog Cache
//!
//! Holds the last successful workflow listing. Availability wins over
//! freshness: once one listing has succeeded, a provider outage serves the
//! stale catalog instead of an empty one.
//!
//! Refreshes are single-flight. A caller that queued behind an in-flight
//! listing reuses its outcome rather than issuing another provider call.

use crate::client::WorkflowProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tg_core::{Credentials, ToolCatalog};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served a fresh catalog without touching the provider
    pub hits: u64,
    /// Provider listing calls issued
    pub refreshes: u64,
    /// Provider listing calls that failed
    pub refresh_failures: u64,
    /// Callers that reused another caller's refresh attempt
    pub coalesced: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    coalesced: AtomicU64,
}

#[derive(Default)]
struct RefreshState {
    /// When the latest listing attempt finished
    last_finished: Option<Instant>,
}

/// Single-writer, multi-reader cache of the provider's tool catalog
pub struct CatalogCache {
    provider: Arc<dyn WorkflowProvider>,
    held: RwLock<Option<Arc<ToolCatalog>>>,
    /// Serializes refreshes; guards the completion time of the latest attempt
    refresh: Mutex<RefreshState>,
    counters: Counters,
}

impl CatalogCache {
    pub fn new(provider: Arc<dyn WorkflowProvider>) -> Self {
        Self {
            provider,
            held: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            counters: Counters::default(),
        }
    }

    /// Return a catalog no older than `max_age`, refreshing if needed.
    ///
    /// Never fails: a failed refresh yields the previously held catalog, or
    /// an empty one if no listing ever succeeded.
    pub async fn get_or_refresh(&self, creds: &Credentials, max_age: Duration) -> Arc<ToolCatalog> {
        if let Some(catalog) = self.fresh(max_age).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return catalog;
        }

        let requested_at = Instant::now();
        let mut state = self.refresh.lock().await;

        // An attempt finished while we waited for the lock; reuse its outcome
        if state.last_finished.is_some_and(|at| at >= requested_at) {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("Reusing concurrent catalog refresh");
            return self.current().await;
        }

        if let Some(catalog) = self.fresh(max_age).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return catalog;
        }

        self.counters.refreshes.fetch_add(1, Ordering::Relaxed);
        let outcome = self.provider.list_workflows(creds).await;
        state.last_finished = Some(Instant::now());

        match outcome {
            Ok(entries) => {
                let catalog = Arc::new(ToolCatalog::fetched(entries));
                *self.held.write().await = Some(Arc::clone(&catalog));
                info!(tools = catalog.len(), "Tool catalog refreshed");
                catalog
            }
            Err(e) => {
                self.counters.refresh_failures.fetch_add(1, Ordering::Relaxed);
                let fallback = self.current().await;
                warn!(
                    error = %e,
                    stale_tools = fallback.len(),
                    "Catalog refresh failed, serving last known catalog"
                );
                fallback
            }
        }
    }

    /// The held catalog, regardless of age, without refreshing
    pub async fn snapshot(&self) -> Option<Arc<ToolCatalog>> {
        self.held.read().await.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            refreshes: self.counters.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.counters.refresh_failures.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }

    async fn fresh(&self, max_age: Duration) -> Option<Arc<ToolCatalog>> {
        let held = self.held.read().await;
        held.as_ref()
            .filter(|c| c.age().is_some_and(|age| age <= max_age))
            .cloned()
    }

    async fn current(&self) -> Arc<ToolCatalog> {
        self.snapshot()
            .await
            .unwrap_or_else(|| Arc::new(ToolCatalog::empty()))
    }
}
