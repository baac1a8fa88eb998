use std::sync::Arc;

use stellar_route_engine::config::Config;
use stellar_route_engine::gateway::{self, HorizonHttpGateway};
use stellar_route_engine::graph::RouteGraph;
use stellar_route_engine::registry::{
    AnchorRegistry, AssetRegistry, InMemoryAnchorRegistry, InMemoryAssetRegistry,
};
use stellar_route_engine::scheduler::GraphScheduler;
use stellar_route_engine::{builder, cache, db, metrics};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting route engine");

    let config = Config::load()?;
    tracing::info!(
        max_hops = config.graph.max_hops,
        network_passphrase = %config.network_passphrase,
        "Configuration loaded"
    );

    let db = db::create_pool(&config.database.url).await?;
    tracing::info!("Database connected");

    db::run_migrations(&db).await?;
    tracing::info!("Database migrations complete");

    let graph = Arc::new(RouteGraph::new());
    let route_cache = Arc::new(cache::RouteCache::new(
        db.clone(),
        config.cache.memory_capacity,
        config.cache.memory_ttl,
        config.cache.persistent_ttl,
    ));

    // Asset and anchor catalogs are external collaborators (§1: "out of
    // scope... described only by their contracts"); the in-memory
    // implementations stand in until a real crawler/registry service feeds
    // this process.
    let asset_registry: Arc<dyn AssetRegistry> = Arc::new(InMemoryAssetRegistry::new(vec![]));
    let anchor_registry: Arc<dyn AnchorRegistry> = Arc::new(InMemoryAnchorRegistry::new(vec![]));
    let horizon: Arc<dyn gateway::HorizonGateway> = Arc::new(HorizonHttpGateway::new(
        config.horizon.base_url.clone(),
        config.horizon.orderbook_timeout,
    ));

    let builder_config = builder::BuilderConfig {
        orderbook_min_depth: config.graph.orderbook_min_depth,
        orderbook_concurrency: config.graph.orderbook_concurrency,
        orderbook_timeout: config.horizon.orderbook_timeout,
        skip_dex_discovery: config.graph.skip_dex_discovery,
    };

    // Constructed here so the query surface is ready the moment an external
    // caller (embedding binary, test harness) wants to invoke
    // `query::handle_query` against this process's engine state.
    let resolver_config = config.resolver_config();
    tracing::debug!(
        default_max_hops = resolver_config.default_max_hops,
        default_max_routes = resolver_config.default_max_routes,
        "Resolver config ready"
    );

    let scheduler = GraphScheduler::start(
        graph.clone(),
        route_cache.clone(),
        asset_registry.clone(),
        anchor_registry.clone(),
        horizon.clone(),
        builder_config,
        config.scheduler.clone(),
    );

    let (sweep_shutdown_tx, sweep_shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let sweep_handle =
        route_cache
            .clone()
            .spawn_sweep_task(config.cache.sweep_interval, sweep_shutdown_rx);

    let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], 9090));
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_addr).await {
            tracing::error!(error = %e, "metrics server error");
        }
    });

    tracing::info!("Route engine running");
    wait_for_shutdown_signal().await;

    tracing::info!("Shutdown requested, stopping scheduler");
    scheduler.stop().await;
    let _ = sweep_shutdown_tx.send(()).await;
    let _ = sweep_handle.await;
    metrics_task.abort();

    tracing::info!("Route engine stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stellar_route_engine=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM).
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
