//! OAuth 2.0 Authorization Server - Entry Point
//!
//! Serves the token, authorize and resource endpoints over HTTP, backed by the
//! in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oauth2_server::{
    Config, MemoryStorage, Server,
    models::Client,
    server::routes::{DEFAULT_MAX_CONCURRENCY, RouterOptions},
};

#[derive(Parser, Debug)]
#[command(name = "oauth2-server")]
#[command(about = "OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL for the metadata document (e.g., https://auth.example.com)
    #[arg(long, default_value = "http://localhost:8000", env = "BASE_URL")]
    base_url: String,

    /// JSON file with an array of clients to register at startup
    #[arg(long, env = "OAUTH2_CLIENTS")]
    clients: Option<PathBuf>,

    /// Approve every authorization request as this user (development only)
    #[arg(long)]
    approve_as: Option<String>,

    /// Maximum number of requests handled at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

fn load_clients(path: &PathBuf) -> anyhow::Result<Vec<Client>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clients file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid clients file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting OAuth 2.0 server");

    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    let storage = Arc::new(MemoryStorage::new());
    if let Some(path) = &cli.clients {
        let clients = load_clients(path)?;
        tracing::info!(count = clients.len(), "Registering clients");
        for client in clients {
            storage.register_client(client).await;
        }
    }
    Arc::clone(&storage).start_cleanup_task();

    if cli.approve_as.is_some() {
        tracing::warn!("Authorization requests are approved automatically");
    }

    let server = Arc::new(Server::new(storage, config)?);
    let options = RouterOptions {
        base_url: cli.base_url,
        approve_as: cli.approve_as,
        max_concurrency: cli.max_concurrency,
    };
    server.run_http(cli.port, options).await
}
