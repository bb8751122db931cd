//! offline-gateway: cache-first offline gateway for a news site.
//!
//! Starts the gateway in front of the configured origin:
//!   load config → restore snapshot → install → activate → serve
//! and keeps the dynamic generation trimmed while running.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use offline_gateway::cache::snapshot;
use offline_gateway::cache::store::{CacheStore, SharedStore};
use offline_gateway::config::{Cli, Config};
use offline_gateway::gateway::fetcher::HttpFetcher;
use offline_gateway::gateway::host::TracingHost;
use offline_gateway::gateway::sync::SyncQueue;
use offline_gateway::gateway::{OfflineGateway, WorkerEvent};
use offline_gateway::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "offline_gateway=debug,tower_http=debug"
    } else {
        "offline_gateway=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("offline-gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?.with_cli(&cli)?;
    let config = Arc::new(config);

    info!(
        origin = %config.upstream.origin,
        static_generation = %config.cache.static_cache_name(),
        dynamic_generation = %config.cache.dynamic_cache_name(),
        assets = config.cache.static_assets.len(),
        "Configuration loaded"
    );

    // Restore the store from a previous run, if any.
    let quota = config.cache.quota_bytes;
    let store = match &config.cache.snapshot_path {
        Some(path) => match snapshot::load(path, quota).await {
            Ok(Some(store)) => store,
            Ok(None) => CacheStore::new(quota),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable snapshot");
                CacheStore::new(quota)
            }
        },
        None => CacheStore::new(quota),
    };
    let shared_store: SharedStore = Arc::new(RwLock::new(store));

    let sync_queue = match &config.sync.queue_path {
        Some(path) => SyncQueue::open(path).await?,
        None => SyncQueue::in_memory(),
    };

    let fetcher = HttpFetcher::new(&config.upstream, &config.origin_url()?)?;
    let gateway = Arc::new(OfflineGateway::new(
        config.clone(),
        shared_store,
        Arc::new(fetcher),
        Arc::new(TracingHost),
        sync_queue,
    )?);

    // Install and activate. A failed install leaves the gateway passing
    // everything through; it is retried on the next start.
    match gateway.dispatch(WorkerEvent::Install).await {
        Ok(_) => {
            gateway.dispatch(WorkerEvent::Activate).await?;
        }
        Err(e) => error!(error = %e, "Install failed, serving without cache"),
    }

    let shutdown = CancellationToken::new();
    let trimmer = gateway.spawn_trimmer(shutdown.clone());

    // Build the HTTP router.
    let state = Arc::new(AppState {
        gateway: gateway.clone(),
        start_time: Instant::now(),
    });
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    shutdown.cancel();
    let _ = trimmer.await;
    gateway.settle().await;
    if let Err(e) = gateway.save_snapshot().await {
        error!(error = %e, "Failed to save cache snapshot");
    }

    Ok(())
}
