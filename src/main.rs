use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use org_manager::config::StorageBackend;
use org_manager::{app, AppConfig, AppState};

/// Multi-tenant organization management API
#[derive(Debug, Parser)]
#[command(name = "org-manager", version, about)]
struct Args {
    /// Port to listen on (overrides ORG_API_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides API_BIND_ADDR)
    #[arg(short, long)]
    bind: Option<String>,

    /// Keep all data in process memory instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("org_manager=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let storage = args.in_memory.then_some(StorageBackend::Memory);
    let mut config = AppConfig::from_env_with_storage(storage)?;
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(bind) = args.bind {
        config.api.bind_addr = bind;
    }
    tracing::info!("Starting org-manager in {:?} mode", config.environment);

    let bind_addr = format!("{}:{}", config.api.bind_addr, config.api.port);
    let state = AppState::from_config(config).await?;
    let router = app(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
