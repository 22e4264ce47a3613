//! Beacon pledge collection server — entry point.
//!
//! Loads the project registry, replays the pledge journal into the
//! in-memory store, spawns the background claim watcher, and serves the
//! HTTP API until ctrl-c.

mod api;
mod chain;
mod config;
mod db;
mod errors;
mod intake;
mod registry;
mod watcher;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beacon_protocol::PledgeStore;

use chain::{ChainBackend, HttpChainClient};
use config::Config;
use intake::PledgeIntake;
use registry::{ClaimStates, ProjectRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging; RUST_LOG controls verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Pledge journal and projects.
    let pool = db::init_pool(&config.database_url).await?;
    let registry = Arc::new(ProjectRegistry::load_dir(&config.projects_dir)?);
    info!(projects = registry.count(), "project registry loaded");

    let store = Arc::new(PledgeStore::new());
    let claims = Arc::new(ClaimStates::default());
    db::restore_state(&pool, &registry, &store, &claims).await?;

    // Chain collaborator shared by intake and the claim watcher.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let chain: Arc<dyn ChainBackend> =
        Arc::new(HttpChainClient::new(client, config.chain_rpc_url.clone()));

    let intake = Arc::new(PledgeIntake::new(
        Arc::clone(&store),
        Arc::clone(&chain),
        pool.clone(),
    ));

    // ─── Background claim watcher ─────────────────────────
    let shutdown = CancellationToken::new();
    tokio::spawn(watcher::run(
        Arc::new(watcher::WatcherState {
            registry: Arc::clone(&registry),
            store: Arc::clone(&store),
            claims: Arc::clone(&claims),
            chain,
            pool,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }),
        shutdown.clone(),
    ));

    // ─── HTTP API ─────────────────────────────────────────
    let app = api::router(api::ApiState {
        registry,
        store,
        claims,
        intake,
    });

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
