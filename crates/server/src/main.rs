//! Urchin control-plane server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use urchin_core::config::AppConfig;
use urchin_seedpeer::{HttpSeedPeerClient, StaticDirectory};
use urchin_server::{create_router, AppState};

/// Urchin - dataset replication control plane
#[derive(Parser, Debug)]
#[command(name = "urchind")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "URCHIN_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("urchin v{}", env!("CARGO_PKG_VERSION"));

    let mut figment = Figment::new();
    let config_path = std::path::Path::new(&args.config);
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}, using env and defaults", args.config);
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("URCHIN_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    let store = urchin_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    store
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("metadata store initialized");

    let seed_peers = Arc::new(HttpSeedPeerClient::new());
    let directory = Arc::new(StaticDirectory::from_entries(&config.seed_peers));
    tracing::info!(
        seed_peers = config.seed_peers.len(),
        "seed peer directory loaded"
    );

    let bind = config.server.bind.clone();
    let state = AppState::new(config, store, seed_peers, directory);
    let controller = Arc::clone(&state.controller);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain in-flight scale workers before the process exits.
    tracing::info!("draining replication workers");
    controller.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
