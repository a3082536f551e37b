//! Gateway Configuration
//!
//! Two layers:
//! - [`load_environment`] pulls `KEY=VALUE` lines from an environment file into
//!   the process environment (never overriding variables that are already set).
//! - [`GatewaySettings`] is built once at startup from defaults, an optional
//!   TOML file and `GATEWAY_*` environment variables.
//!
//! Provider secrets are not part of the settings; they are resolved separately
//! by [`crate::credentials::CredentialStore`].

use crate::error::{Error, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment file read at startup unless `GATEWAY_ENV_FILE` names another
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Prefix for settings read from the environment
pub const SETTINGS_ENV_PREFIX: &str = "GATEWAY";

/// Apply the environment file to the process environment.
///
/// Variables that are already set win. Returns the path that was applied.
pub fn load_environment() -> Option<String> {
    let path = std::env::var("GATEWAY_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path, "No environment file, using existing environment");
            return None;
        }
        Err(e) => {
            warn!(path = %path, error = %e, "Failed to read environment file");
            return None;
        }
    };

    let applied = content
        .lines()
        .filter_map(parse_env_line)
        .filter(|(key, _)| std::env::var_os(key).is_none())
        .map(|(key, value)| std::env::set_var(key, value))
        .count();
    debug!(path = %path, applied, "Applied environment file");
    Some(path)
}

/// `KEY=VALUE`, optionally quoted and prefixed with `export`
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Runtime settings for the gateway process
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Address the HTTP transport binds to
    pub http_addr: String,
    /// Whether the stdio transport runs alongside HTTP
    pub stdio_enabled: bool,
    /// Freshness window of the tool catalog cache
    pub catalog_ttl_secs: u64,
    /// Upper bound for every outbound provider call
    pub request_timeout_secs: u64,
    /// Base URL of the workflow provider API
    pub provider_base_url: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            stdio_enabled: true,
            catalog_ttl_secs: 30,
            request_timeout_secs: 30,
            provider_base_url: "https://api.pipedream.com".to_string(),
        }
    }
}

impl GatewaySettings {
    /// Load settings from defaults, an optional TOML file and `GATEWAY_*` variables.
    ///
    /// With no explicit file, `gateway.toml` in the working directory is used
    /// if present. A bare `PORT` variable rebinds the HTTP port unless
    /// `GATEWAY_HTTP_ADDR` is set.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let settings = Self::load_with_prefix(config_file, SETTINGS_ENV_PREFIX)?;
        let explicit_addr = std::env::var(format!("{}_HTTP_ADDR", SETTINGS_ENV_PREFIX)).is_ok();
        let settings = if explicit_addr {
            settings
        } else {
            settings.with_port_override(std::env::var("PORT").ok().as_deref())?
        };
        settings.validate()?;
        Ok(settings)
    }

    fn load_with_prefix(config_file: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match config_file {
            Some(path) => builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml)),
            None => builder.add_source(File::with_name("gateway").required(false)),
        };

        let settings: Self = builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Replace the port of `http_addr` with `port`, keeping the host.
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self> {
        let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(self);
        };
        let port: u16 = port
            .parse()
            .map_err(|_| Error::Settings(format!("invalid PORT value: {}", port)))?;
        let host = self
            .http_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.http_addr = format!("{}:{}", host, port);
        Ok(self)
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.http_addr.trim().is_empty() {
            return Err(Error::Settings("http_addr must not be empty".into()));
        }
        if self.catalog_ttl_secs == 0 {
            return Err(Error::Settings("catalog_ttl_secs must be greater than zero".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Settings("request_timeout_secs must be greater than zero".into()));
        }
        if !self.provider_base_url.starts_with("http://") && !self.provider_base_url.starts_with("https://") {
            return Err(Error::Settings(format!(
                "provider_base_url must be an http(s) URL, got {}",
                self.provider_base_url
            )));
        }
        Ok(())
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
