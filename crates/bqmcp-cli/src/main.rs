use anyhow::{Context, Result};
use bqmcp_adapter_bq::BigQueryWarehouse;
use bqmcp_core::config::{ServerConfig, Transport};
use bqmcp_core::CredentialNormalizer;
use bqmcp_mcp::McpServer;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bqmcp", version, about = "Read-only BigQuery gateway for MCP clients")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "bqmcp.yaml")]
    config: PathBuf,

    /// Google Cloud project id.
    #[arg(long = "project-id", env = "GOOGLE_CLOUD_PROJECT")]
    project_id: Option<String>,

    /// Location/region queries run in (default: US).
    #[arg(long)]
    location: Option<String>,

    /// Path to a service account key file.
    #[arg(long = "key-file")]
    key_file: Option<PathBuf>,

    /// Serve HTTP/WebSocket instead of stdio.
    #[arg(long, default_value_t = false)]
    http: bool,

    /// HTTP bind host.
    #[arg(long)]
    host: Option<String>,

    /// HTTP bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol frames in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    apply_overrides(&mut config, &cli);

    let project_id = config.validate().context("Invalid configuration")?;
    let identity =
        CredentialNormalizer::normalize(project_id, config.credentials.raw_credentials())
            .context("Invalid credentials")?;

    info!(
        project_id = %identity.project_id(),
        location = %config.location,
        credentials = ?identity.kind(),
        transport = ?config.mcp.transport,
        "Starting bqmcp"
    );
    if config.mcp.is_http() {
        info!(address = %config.mcp.bind_address(), "Serving MCP over HTTP");
    }

    let warehouse = BigQueryWarehouse::from_identity(&identity)
        .await
        .context("Failed to initialize BigQuery client")?;

    let server = McpServer::new(
        Arc::new(warehouse),
        identity.project_id().clone(),
        config.location.clone(),
    );

    server
        .run(&config.mcp)
        .await
        .context("MCP server failed")?;

    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<ServerConfig> {
    if path.exists() {
        ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))
    } else {
        warn!(config = %path.display(), "Config file not found, using defaults");
        Ok(ServerConfig::default())
    }
}

/// Command-line flags override the config file.
fn apply_overrides(config: &mut ServerConfig, cli: &Cli) {
    if let Some(project_id) = &cli.project_id {
        config.project_id = Some(project_id.clone());
    }
    if let Some(location) = &cli.location {
        config.location = location.clone();
    }
    if let Some(key_file) = &cli.key_file {
        config.credentials.key_file = Some(key_file.clone());
    }
    if cli.http {
        config.mcp.transport = Transport::Http;
    }
    if let Some(host) = &cli.host {
        config.mcp.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.mcp.port = port;
    }
}
