//! Relay service binary.
//!
//! Receives GitHub webhooks and posts notifications into Discord channels.
//!
//! # Environment Variables
//!
//! - `DISCORD_BOT_TOKEN` - Discord bot token (required)
//! - `WEBHOOK_HOST` / `WEBHOOK_PORT` - listen address (default `0.0.0.0:8000`)
//! - `DATA_PATH` - config snapshot file; empty keeps state in memory
//! - `WEBHOOK_SERVER_URL` - public base URL reported by repository setup
//! - `ADMIN_TOKEN` - bearer token for `/admin`
//! - `RUST_LOG` - log filter override

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notify::DiscordChannel;
use relay::{
    config::{Config, DEFAULT_MAX_BODY_BYTES},
    server, Dispatcher, MemoryStore, Pipeline, Registry,
};

const DEFAULT_LOG_FILTER: &str = "relay=info,relay_server=info,notify=info,tower_http=info";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// GitHub webhook to Discord relay.
#[derive(Parser)]
#[command(name = "relay-server")]
#[command(about = "Relay GitHub webhook events into Discord channels")]
#[command(version)]
struct Cli {
    /// Interface to bind
    #[arg(long, env = "WEBHOOK_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 8000)]
    port: u16,

    /// Discord bot token
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// Discord REST base URL
    #[arg(
        long,
        env = "DISCORD_API_BASE",
        default_value = notify::channels::discord::DEFAULT_API_BASE
    )]
    discord_api_base: String,

    /// Config snapshot file (empty to keep state in memory only)
    #[arg(long, env = "DATA_PATH", default_value = "./data/relay.json")]
    data_path: String,

    /// Public base URL GitHub delivers to
    #[arg(long, env = "WEBHOOK_SERVER_URL")]
    public_url: Option<String>,

    /// Bearer token required on /admin routes
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Per-channel delivery timeout in seconds
    #[arg(long, env = "DELIVERY_TIMEOUT_SECS", default_value_t = 10)]
    delivery_timeout_secs: u64,

    /// Deliveries in flight per event
    #[arg(long, env = "MAX_CONCURRENT_DELIVERIES", default_value_t = 8)]
    max_concurrent_deliveries: usize,

    /// Maximum webhook body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            host: self.host,
            port: self.port,
            discord_token: Some(self.discord_token).filter(|t| !t.is_empty()),
            discord_api_base: self.discord_api_base,
            data_path: Some(self.data_path)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            public_url: self.public_url.filter(|u| !u.is_empty()),
            admin_token: self.admin_token.filter(|t| !t.is_empty()),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            max_concurrent_deliveries: self.max_concurrent_deliveries,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(DEFAULT_LOG_FILTER)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format).context("Invalid log filter")?;

    info!("Starting relay service...");

    let config = cli.into_config();

    let store = match &config.data_path {
        Some(path) => {
            info!(path = %path.display(), "Loading config snapshot");
            MemoryStore::open(path)
                .await
                .with_context(|| format!("Failed to load config snapshot {}", path.display()))?
        }
        None => {
            warn!("No DATA_PATH configured - configuration will not survive restarts");
            MemoryStore::new()
        }
    };

    let Some(token) = config.discord_token.clone() else {
        anyhow::bail!("DISCORD_BOT_TOKEN must not be empty");
    };
    let discord = DiscordChannel::new(token).with_api_base(config.discord_api_base.clone());

    if config.admin_token.is_none() {
        warn!("No ADMIN_TOKEN configured - admin API is unauthenticated");
    }

    let dispatcher = Dispatcher::new(Arc::new(discord))
        .with_timeout(config.delivery_timeout)
        .with_max_concurrency(config.max_concurrent_deliveries);
    let pipeline = Pipeline::new(Registry::new(Arc::new(store)), dispatcher);

    let addr = format!("{}:{}", config.host, config.port);
    let state = server::AppState::new(config, pipeline);
    let app = server::build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(addr = %addr, "Relay service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Relay service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
