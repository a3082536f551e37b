//! tool-gateway: Pipedream workflows as MCP tools
//!
//! Usage:
//!   tool-gateway                       # stdio + HTTP on $PORT (default 8080)
//!   tool-gateway --http 127.0.0.1:9000
//!   tool-gateway --no-stdio            # HTTP only

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tg_core::{CredentialStore, GatewaySettings};
use tg_mcp::transport::{HttpTransport, StdioTransport, Transport};
use tg_mcp::{McpServer, McpServerConfig, ToolGateway};
use tg_provider::PipedreamClient;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tool-gateway")]
#[command(about = "Expose Pipedream workflows over MCP stdio and HTTP", version)]
struct Cli {
    /// HTTP listen address (overrides settings and PORT)
    #[arg(long, value_name = "ADDR")]
    http: Option<String>,

    /// Do not serve the stdio transport
    #[arg(long)]
    no_stdio: bool,

    /// Settings file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Server name override
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stderr only: stdout carries the stdio protocol
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    if let Some(path) = tg_core::config::load_environment() {
        info!(path = %path, "Loaded environment file");
    }

    let mut settings =
        GatewaySettings::load(cli.config.as_deref()).context("failed to load gateway settings")?;
    if let Some(addr) = cli.http {
        settings.http_addr = addr;
    }
    if cli.no_stdio {
        settings.stdio_enabled = false;
    }

    let credentials = CredentialStore::resolve();
    info!(
        api_key_configured = credentials.api_key_configured(),
        project_id_configured = credentials.project_id_configured(),
        "Pipedream credentials resolved"
    );
    if !credentials.is_configured() {
        warn!("Pipedream not configured: tool listings will be empty and calls will fail");
    }

    let client = PipedreamClient::new(&settings.provider_base_url, settings.request_timeout())
        .context("failed to build provider client")?;
    let gateway = ToolGateway::new(credentials, Arc::new(client), settings.catalog_ttl());
    let server = Arc::new(McpServer::new(
        McpServerConfig { name: cli.name },
        Arc::new(gateway),
    ));

    info!(
        name = %server.name(),
        catalog_ttl_secs = settings.catalog_ttl_secs,
        request_timeout_secs = settings.request_timeout_secs,
        "Tool gateway initialized"
    );

    let http = HttpTransport::bind(&settings.http_addr).await?;

    if settings.stdio_enabled {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            match StdioTransport::new().serve(server).await {
                Ok(()) => info!("Stdio session ended, HTTP keeps serving"),
                Err(e) => error!(error = %e, "Stdio transport failed"),
            }
        });
    }

    http.serve_with_shutdown(Arc::clone(&server), shutdown_signal()).await?;

    info!("Tool gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
