//! Graph scheduler: owns the timers that keep the route graph current — an
//! initial build shortly after startup, a light DEX-only refresh every few
//! minutes, and a full rebuild on a longer cadence — plus a manual trigger
//! for out-of-band rebuild requests. Modeled on the watcher manager's
//! `JoinSet` + shutdown-channel `select!` loop, one timer per concurrent
//! task instead of one task per chain.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::builder::{run_full_build, run_light_refresh, BuilderConfig};
use crate::cache::RouteCache;
use crate::config::SchedulerConfig;
use crate::graph::{EdgeType, RouteGraph};
use crate::metrics;
use crate::registry::{AnchorRegistry, AssetRegistry};

use crate::gateway::HorizonGateway;

fn edge_type_label(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::Dex => "dex",
        EdgeType::AnchorBridge => "anchor_bridge",
        EdgeType::XlmHub => "xlm_hub",
    }
}

async fn record_graph_stats(graph: &RouteGraph) {
    let snapshot = graph.snapshot().await;
    let stats = snapshot.stats();
    let edges_by_type: Vec<(&str, usize)> = stats
        .edges_by_type
        .iter()
        .map(|(edge_type, count)| (edge_type_label(*edge_type), *count))
        .collect();
    metrics::set_graph_stats(snapshot.version, stats.node_count, &edges_by_type);
}

/// A request to run a full rebuild outside of the scheduled cadence.
enum Command {
    TriggerRebuild,
}

pub struct GraphScheduler {
    commands: mpsc::Sender<Command>,
    shutdown: mpsc::Sender<()>,
}

impl GraphScheduler {
    /// Start the scheduler's background tasks. Returns immediately; the
    /// timers and the manual-trigger listener run on spawned tasks until
    /// [`GraphScheduler::stop`] is called.
    pub fn start(
        graph: Arc<RouteGraph>,
        cache: Arc<RouteCache>,
        asset_registry: Arc<dyn AssetRegistry>,
        anchor_registry: Arc<dyn AnchorRegistry>,
        horizon: Arc<dyn HorizonGateway>,
        builder_config: BuilderConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(run_loop(
            graph,
            cache,
            asset_registry,
            anchor_registry,
            horizon,
            builder_config,
            scheduler_config,
            command_rx,
            shutdown_rx,
        ));

        Self {
            commands: command_tx,
            shutdown: shutdown_tx,
        }
    }

    /// Ask for an out-of-band full rebuild. Non-blocking: if one is already
    /// in flight, the request is dropped on the floor (the in-flight build
    /// already covers it).
    pub async fn trigger_rebuild(&self) {
        let _ = self.commands.send(Command::TriggerRebuild).await;
    }

    pub async fn stop(&self) {
        let _ = self.shutdown.send(()).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    graph: Arc<RouteGraph>,
    cache: Arc<RouteCache>,
    asset_registry: Arc<dyn AssetRegistry>,
    anchor_registry: Arc<dyn AnchorRegistry>,
    horizon: Arc<dyn HorizonGateway>,
    builder_config: BuilderConfig,
    scheduler_config: SchedulerConfig,
    mut commands: mpsc::Receiver<Command>,
    mut shutdown: mpsc::Receiver<()>,
) {
    // Guards against a light refresh and a full rebuild racing each other;
    // `run_full_build`/`run_light_refresh` already serialize against the
    // graph's own build lock, this just keeps our two timer tasks from
    // calling into the builder concurrently and duplicating work.
    let build_mutex = Arc::new(Mutex::new(()));

    let mut tasks = JoinSet::new();

    {
        let graph = graph.clone();
        let cache = cache.clone();
        let asset_registry = asset_registry.clone();
        let anchor_registry = anchor_registry.clone();
        let horizon = horizon.clone();
        let builder_config = builder_config.clone();
        let build_mutex = build_mutex.clone();
        let delay = scheduler_config.initial_build_delay;
        tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            do_full_build(
                &graph,
                &cache,
                asset_registry.as_ref(),
                anchor_registry.as_ref(),
                horizon.as_ref(),
                &builder_config,
                &build_mutex,
            )
            .await;
        });
    }

    {
        let graph = graph.clone();
        let asset_registry = asset_registry.clone();
        let horizon = horizon.clone();
        let builder_config = builder_config.clone();
        let build_mutex = build_mutex.clone();
        let interval = scheduler_config.light_refresh_interval;
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _guard = build_mutex.lock().await;
                let started = std::time::Instant::now();
                match run_light_refresh(&graph, asset_registry.as_ref(), horizon.as_ref(), &builder_config)
                    .await
                {
                    Ok(true) => {
                        info!("light refresh completed");
                        metrics::record_build("light", "ok", started.elapsed().as_secs_f64());
                        record_graph_stats(&graph).await;
                    }
                    Ok(false) => {
                        info!("light refresh skipped, full build in progress");
                        metrics::record_build("light", "skipped", started.elapsed().as_secs_f64());
                    }
                    Err(e) => {
                        error!(error = %e, "light refresh failed");
                        metrics::record_build("light", "error", started.elapsed().as_secs_f64());
                    }
                }
            }
        });
    }

    {
        let graph = graph.clone();
        let cache = cache.clone();
        let asset_registry = asset_registry.clone();
        let anchor_registry = anchor_registry.clone();
        let horizon = horizon.clone();
        let builder_config = builder_config.clone();
        let build_mutex = build_mutex.clone();
        let interval = scheduler_config.full_rebuild_interval;
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                do_full_build(
                    &graph,
                    &cache,
                    asset_registry.as_ref(),
                    anchor_registry.as_ref(),
                    horizon.as_ref(),
                    &builder_config,
                    &build_mutex,
                )
                .await;
            }
        });
    }

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("graph scheduler stopping");
                tasks.abort_all();
                return;
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::TriggerRebuild) => {
                        if graph.is_building() {
                            warn!("manual rebuild requested while a build is already in progress, ignoring");
                            continue;
                        }
                        do_full_build(
                            &graph,
                            &cache,
                            asset_registry.as_ref(),
                            anchor_registry.as_ref(),
                            horizon.as_ref(),
                            &builder_config,
                            &build_mutex,
                        )
                        .await;
                    }
                    None => {
                        // all senders dropped, nothing left to do but wait for shutdown
                    }
                }
            }
        }
    }
}

async fn do_full_build(
    graph: &RouteGraph,
    cache: &RouteCache,
    asset_registry: &dyn AssetRegistry,
    anchor_registry: &dyn AnchorRegistry,
    horizon: &dyn HorizonGateway,
    builder_config: &BuilderConfig,
    build_mutex: &Mutex<()>,
) {
    let _guard = build_mutex.lock().await;
    let started = std::time::Instant::now();
    match run_full_build(graph, asset_registry, anchor_registry, horizon, builder_config).await {
        Ok(true) => {
            let version = graph.version().await;
            info!(version, "full graph rebuild completed");
            metrics::record_build("full", "ok", started.elapsed().as_secs_f64());
            record_graph_stats(graph).await;
            cache.invalidate_all().await;
        }
        Ok(false) => {
            info!("full rebuild skipped, already in progress");
            metrics::record_build("full", "skipped", started.elapsed().as_secs_f64());
        }
        Err(e) => {
            error!(error = %e, "full graph rebuild failed");
            metrics::record_build("full", "error", started.elapsed().as_secs_f64());
        }
    }
}

