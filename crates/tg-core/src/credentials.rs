//! Provider Credential Store
//!
//! Resolves the Pipedream API key and project id once at startup. Missing
//! values never fail the process: they produce [`CredentialState::Unconfigured`],
//! which downstream components treat as "zero tools, every call fails".

use std::fmt;
use std::sync::Arc;

/// Environment variable holding the provider API key
pub const API_KEY_VAR: &str = "PIPEDREAM_API_KEY";

/// Environment variable holding the provider project id
pub const PROJECT_ID_VAR: &str = "PIPEDREAM_PROJECT_ID";

/// Provider credentials. Immutable once resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    project_id: String,
}

impl Credentials {
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Outcome of credential resolution
#[derive(Debug, Clone)]
pub enum CredentialState {
    Configured(Arc<Credentials>),
    Unconfigured {
        api_key_configured: bool,
        project_id_configured: bool,
    },
}

impl CredentialState {
    pub fn credentials(&self) -> Option<&Arc<Credentials>> {
        match self {
            CredentialState::Configured(creds) => Some(creds),
            CredentialState::Unconfigured { .. } => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, CredentialState::Configured(_))
    }

    pub fn api_key_configured(&self) -> bool {
        match self {
            CredentialState::Configured(_) => true,
            CredentialState::Unconfigured { api_key_configured, .. } => *api_key_configured,
        }
    }

    pub fn project_id_configured(&self) -> bool {
        match self {
            CredentialState::Configured(_) => true,
            CredentialState::Unconfigured { project_id_configured, .. } => *project_id_configured,
        }
    }
}

/// Resolves [`CredentialState`] from configuration values
pub struct CredentialStore;

impl CredentialStore {
    /// Read both values from the process environment.
    pub fn resolve() -> CredentialState {
        Self::from_values(
            std::env::var(API_KEY_VAR).ok(),
            std::env::var(PROJECT_ID_VAR).ok(),
        )
    }

    /// Pure form of [`resolve`](Self::resolve). Blank values count as absent.
    pub fn from_values(api_key: Option<String>, project_id: Option<String>) -> CredentialState {
        let api_key = api_key.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let project_id = project_id.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match (api_key, project_id) {
            (Some(api_key), Some(project_id)) => {
                CredentialState::Configured(Arc::new(Credentials { api_key, project_id }))
            }
            (api_key, project_id) => CredentialState::Unconfigured {
                api_key_configured: api_key.is_some(),
                project_id_configured: project_id.is_some(),
            },
        }
    }
}
