//! caelum-shards - Reflection queue and mint relay service
//!
//! Default port 5730. Configuration: CLI → environment → TOML → defaults.

use anyhow::Result;
use caelum_common::config::{load_or_default, RootFolderInitializer};
use caelum_common::EventBus;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use caelum_shards::config::{Args, ShardsConfig, MODULE_NAME};
use caelum_shards::db::{self, SqliteCounterStore, SqliteReflectionStore};
use caelum_shards::mint::{MintBatchProcessor, MintIntentBuilder, MintRelayClient, RelayMode};
use caelum_shards::notify::Notifier;
use caelum_shards::store::ReflectionStore;
use caelum_shards::{build_router, AppState};

/// Bare levels expand to this crate's targets; anything else is used as a directive
fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!(
            "caelum_shards={l},caelum_common={l},tower_http={l}",
            l = level
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    // Loaded before tracing exists so the TOML log level can seed the filter
    let toml_config = load_or_default(MODULE_NAME, args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter_directive(&toml_config.logging.level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Caelum Shards (caelum-shards) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ShardsConfig::resolve(&args, &toml_config)?;

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    let store = Arc::new(SqliteReflectionStore::new(pool.clone()));
    let counters = Arc::new(SqliteCounterStore::new(pool));

    let pending = store.mint_claims().await?;
    if !pending.is_empty() {
        warn!(
            count = pending.len(),
            "Mint claims awaiting verification; see GET /api/mint/pending"
        );
    }

    let event_bus = EventBus::new(100);

    let relay = match config.relay.clone() {
        Some(relay_config) => {
            info!(
                endpoint = %relay_config.endpoint,
                mode = %relay_config.mode,
                "Mint relay configured"
            );
            if relay_config.mode == RelayMode::Sig {
                warn!("Relay mode is sig but no server-side signer is wired; batch mints will fail until one is");
            }
            Some(MintRelayClient::new(relay_config)?)
        }
        None => {
            warn!("MINT_ENDPOINT_URL not set; minting disabled");
            None
        }
    };

    let builder = MintIntentBuilder::new(config.domain.clone(), config.gateway_base.clone());
    let processor = Arc::new(MintBatchProcessor::new(
        store.clone(),
        relay,
        builder,
        event_bus.clone(),
    ));

    if !config.notifier.is_empty() {
        Notifier::new(config.notifier.clone())?.spawn(&event_bus);
        info!("Webhook notifier started");
    }

    let state = AppState::new(store, counters, processor, event_bus)
        .with_stats_secret(config.stats_secret.clone());
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("caelum-shards stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
