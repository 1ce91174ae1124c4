//! # spaces-mcp
//!
//! MCP tool server for managing Hugging Face Spaces over SSE and HTTP.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use spaces_core::AuthContext;
use spaces_hub::{HubClient, HubConfig, DEFAULT_BASE_URL};
use spaces_server::ServerConfig;
use spaces_telemetry::TelemetryConfig;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Hugging Face Spaces MCP server.
#[derive(Parser, Debug)]
#[command(name = "spaces-mcp", about = "MCP server for Hugging Face Spaces")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Default API token for calls that bring none of their own.
    #[arg(long, env = "HUGGINGFACE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Hugging Face API root.
    #[arg(long, env = "HF_API_BASE", default_value = DEFAULT_BASE_URL)]
    hub_url: String,

    /// Deadline for a single backend call, in seconds.
    #[arg(long, default_value = "30")]
    backend_timeout: u64,

    /// Buffered inbound messages per streaming session.
    #[arg(long, default_value = "64")]
    session_queue: usize,

    /// Default log level (RUST_LOG overrides).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Per-module level, e.g. `spaces_hub=debug`. Repeatable.
    #[arg(long = "log-module", value_name = "MODULE=LEVEL", value_parser = parse_module_level)]
    log_modules: Vec<(String, Level)>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn parse_module_level(raw: &str) -> Result<(String, Level), String> {
    let (module, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=LEVEL, got '{raw}'"))?;
    if module.is_empty() {
        return Err(format!("missing module name in '{raw}'"));
    }
    let level = level
        .parse::<Level>()
        .map_err(|e| format!("invalid level in '{raw}': {e}"))?;
    Ok((module.to_owned(), level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    spaces_telemetry::init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        module_levels: cli.log_modules,
        json: cli.log_json,
    })
    .context("Failed to initialize logging")?;

    let hub_config = HubConfig {
        base_url: cli.hub_url.clone(),
        request_timeout_secs: cli.backend_timeout,
        ..Default::default()
    };
    let client = HubClient::new(&hub_config).context("Failed to build Hugging Face client")?;

    let default_auth = AuthContext::from_raw(cli.token.as_deref());
    if default_auth.has_token() {
        tracing::info!("Default API token configured");
    } else {
        tracing::warn!("No default API token; token-gated operations need a per-request token");
    }

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        session_queue_size: cli.session_queue,
        backend_timeout_secs: cli.backend_timeout,
    };
    let handle = spaces_server::start(config, Arc::new(client), default_auth)
        .await
        .context("Failed to start server")?;

    tracing::info!(
        addr = %handle.addr,
        hub = %hub_config.base_url,
        "Spaces MCP server ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown(SHUTDOWN_TIMEOUT).await;
    Ok(())
}
