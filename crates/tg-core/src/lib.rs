//! tg-core: shared foundation for the tool gateway
//!
//! - [`error`]: the gateway error taxonomy
//! - [`config`]: environment-file loading and process settings
//! - [`credentials`]: provider credential resolution
//! - [`types`]: tool descriptors, catalogs and call results

pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

pub use config::GatewaySettings;
pub use credentials::{CredentialState, CredentialStore, Credentials};
pub use error::{Error, Result};
pub use types::{FailureKind, ToolCallRequest, ToolCallResult, ToolCatalog, ToolDescriptor};
