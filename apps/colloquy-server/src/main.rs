use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use colloquy_config::load_config;
use colloquy_engine::{OpenAiClientConfig, OpenAiClientFactory};
use colloquy_runtime::{CredentialResolver, SessionConfig, SessionService};
use colloquy_stores::{SqliteQueryExecutor, SqliteTranscriptStore};

#[derive(Debug, Parser)]
#[command(name = "colloquy-server")]
struct Args {
    #[arg(long, default_value = "config/colloquy.yaml")]
    config: PathBuf,
    /// Override the configured listen address
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)
        .with_context(|| format!("load config from {}", args.config.display()))?;

    let store = match config.stores.backend.trim() {
        "memory" => Arc::new(SqliteTranscriptStore::connect_in_memory().await?),
        _ => Arc::new(SqliteTranscriptStore::connect(&config.stores.database_url).await?),
    };
    store.seed_demo_products().await?;

    let executor = Arc::new(SqliteQueryExecutor::new(store.pool()));
    let clients = Arc::new(OpenAiClientFactory::new(OpenAiClientConfig {
        endpoint: config.engine.endpoint.clone(),
        model: config.engine.model.clone(),
        timeout_secs: config.engine.timeout_secs,
    }));
    let credentials = CredentialResolver::from_env(&config.engine.api_key_env);

    let sessions = Arc::new(SessionService::new(
        store,
        executor,
        clients,
        credentials,
        SessionConfig {
            max_tool_rounds: config.runtime.max_tool_rounds,
            enforce_safety: config.runtime.enforce_safety,
            history_limit: config.runtime.history_limit,
        },
    ));

    let listen: SocketAddr = match args.listen {
        Some(listen) => listen,
        None => config
            .server
            .listen
            .parse()
            .context("invalid server.listen address")?,
    };

    colloquy_server::run_server(sessions, listen).await
}
