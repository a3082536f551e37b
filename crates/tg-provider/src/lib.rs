//! tg-provider: the gateway's view of the remote workflow provider
//!
//! - [`client`]: the [`WorkflowProvider`] trait and its Pipedream implementation
//! - [`cache`]: time-bounded, single-flight cache of the tool catalog

pub mod cache;
pub mod client;

pub use cache::{CacheStats, CatalogCache};
pub use client::{parse_workflow_listing, PipedreamClient, WorkflowProvider};
