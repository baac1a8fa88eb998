//! Graph builder: the atomic full-rebuild sequence and the lighter,
//! DEX-only refresh that runs between full rebuilds.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eyre::Result;

use crate::discovery::{
    dex_candidate_pairs, discover_anchor_bridge_edges, discover_dex_edges, discover_xlm_hub_edges,
    DiscoveredEdge,
};
use crate::gateway::HorizonGateway;
use crate::graph::{GraphInner, NodeAttrs, RouteGraph};
use crate::registry::{AnchorRegistry, AssetRegistry};
use crate::types::AssetSource;

#[derive(Clone)]
pub struct BuilderConfig {
    pub orderbook_min_depth: f64,
    pub orderbook_concurrency: usize,
    pub orderbook_timeout: Duration,
    pub skip_dex_discovery: bool,
}

fn install_edges(graph: &mut GraphInner, edges: Vec<DiscoveredEdge>) {
    for discovered in edges {
        if !graph.has_node(&discovered.dst) {
            graph.add_or_update_node(discovered.dst.clone(), lightweight_node_attrs());
        }
        if !graph.has_node(&discovered.src) {
            graph.add_or_update_node(discovered.src.clone(), lightweight_node_attrs());
        }
        let _ = graph.add_edge(&discovered.src, &discovered.dst, discovered.edge);
    }
}

/// Attrs for a node that enters the graph only because an edge points at
/// it (never seen in the routable-asset registry) — tagged `Synthetic` so
/// callers can tell it apart from a registry-backed node.
fn lightweight_node_attrs() -> NodeAttrs {
    NodeAttrs {
        source: Some(AssetSource::Synthetic),
        ..Default::default()
    }
}

/// Run the full atomic rebuild sequence described in the component design.
/// Returns `Ok(false)` without mutating the graph if a build is already in
/// progress.
pub async fn run_full_build(
    graph: &RouteGraph,
    asset_registry: &dyn AssetRegistry,
    anchor_registry: &dyn AnchorRegistry,
    horizon: &dyn HorizonGateway,
    config: &BuilderConfig,
) -> Result<bool> {
    if !graph.start_build() {
        return Ok(false);
    }

    let started = Instant::now();
    let result = run_full_build_inner(asset_registry, anchor_registry, horizon, config).await;

    match result {
        Ok(inner) => {
            graph.complete_full_build(inner, started.elapsed()).await;
            Ok(true)
        }
        Err(err) => {
            graph.release_build_lock();
            Err(err)
        }
    }
}

async fn run_full_build_inner(
    asset_registry: &dyn AssetRegistry,
    anchor_registry: &dyn AnchorRegistry,
    horizon: &dyn HorizonGateway,
    config: &BuilderConfig,
) -> Result<GraphInner> {
    let mut inner = GraphInner::empty();

    let routable = asset_registry.routable_assets().await?;
    if routable.is_empty() {
        return Ok(inner);
    }

    for record in &routable {
        inner.add_or_update_node(
            record.key.clone(),
            NodeAttrs {
                domain: Some(record.domain.clone()),
                display_name: Some(record.display_name.clone()),
                verified: Some(record.verified),
                num_accounts: Some(record.num_accounts),
                source: Some(record.source),
                ..Default::default()
            },
        );
    }

    if !config.skip_dex_discovery {
        let assets: Vec<_> = routable.iter().map(|r| r.key.clone()).collect();
        let domain_of: HashMap<_, _> = routable
            .iter()
            .filter_map(|r| r.domain.clone().map(|d| (r.key.clone(), d)))
            .collect();
        let pairs = dex_candidate_pairs(&assets, &domain_of);
        let dex_edges = discover_dex_edges(
            horizon,
            pairs,
            config.orderbook_min_depth,
            config.orderbook_concurrency,
            config.orderbook_timeout,
        )
        .await;
        install_edges(&mut inner, dex_edges);
    }

    let anchors = anchor_registry.active_anchors().await?;
    let bridge_edges = discover_anchor_bridge_edges(&anchors);
    install_edges(&mut inner, bridge_edges);

    let dex_covered = inner.pairs_with_dex_edges();
    let all_keys: Vec<_> = inner.nodes.keys().cloned().collect();
    let verified_of: HashMap<_, _> = inner
        .nodes
        .values()
        .map(|n| (n.key.clone(), n.verified))
        .collect();
    let hub_edges = discover_xlm_hub_edges(&all_keys, &verified_of, &dex_covered);
    install_edges(&mut inner, hub_edges);

    Ok(inner)
}

/// Re-run DEX discovery only and overwrite existing DEX edges in place.
/// The graph version and build timestamp are preserved by
/// [`RouteGraph::complete_light_refresh`]. No-ops if a full build is
/// currently in progress.
pub async fn run_light_refresh(
    graph: &RouteGraph,
    asset_registry: &dyn AssetRegistry,
    horizon: &dyn HorizonGateway,
    config: &BuilderConfig,
) -> Result<bool> {
    if graph.is_building() {
        return Ok(false);
    }

    let current = graph.snapshot().await;
    let routable = asset_registry.routable_assets().await?;
    if routable.is_empty() {
        return Ok(false);
    }

    let mut inner = (*current).clone();
    let assets: Vec<_> = routable.iter().map(|r| r.key.clone()).collect();
    let domain_of: HashMap<_, _> = routable
        .iter()
        .filter_map(|r| r.domain.clone().map(|d| (r.key.clone(), d)))
        .collect();

    for record in &routable {
        if !inner.has_node(&record.key) {
            let node_attrs = NodeAttrs {
                domain: Some(record.domain.clone()),
                display_name: Some(record.display_name.clone()),
                verified: Some(record.verified),
                num_accounts: Some(record.num_accounts),
                source: Some(record.source),
                ..Default::default()
            };
            inner.add_or_update_node(record.key.clone(), node_attrs);
        }
    }

    let pairs = dex_candidate_pairs(&assets, &domain_of);
    let dex_edges = discover_dex_edges(
        horizon,
        pairs,
        config.orderbook_min_depth,
        config.orderbook_concurrency,
        config.orderbook_timeout,
    )
    .await;
    install_edges(&mut inner, dex_edges);

    graph.complete_light_refresh(inner).await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{HorizonGateway as _, Orderbook, OrderbookLevel, StrictSendPathRecord};
    use crate::registry::{AnchorRecord, AssetRecord, InMemoryAnchorRegistry, InMemoryAssetRegistry};
    use crate::types::AssetKey;
    use async_trait::async_trait;

    struct EmptyHorizon;

    #[async_trait]
    impl HorizonGateway for EmptyHorizon {
        async fn get_orderbook(
            &self,
            _selling: &AssetKey,
            _buying: &AssetKey,
            _depth_limit: u32,
        ) -> Result<Orderbook> {
            Ok(Orderbook {
                bids: vec![OrderbookLevel {
                    price: 0.2,
                    amount: 500.0,
                }],
                asks: vec![OrderbookLevel {
                    price: 0.21,
                    amount: 500.0,
                }],
            })
        }

        async fn find_strict_send_paths(
            &self,
            _source: &AssetKey,
            _source_amount: crate::types::Amount,
            _destinations: &[AssetKey],
        ) -> Result<Vec<StrictSendPathRecord>> {
            Ok(vec![])
        }
    }

    fn config() -> BuilderConfig {
        BuilderConfig {
            orderbook_min_depth: 0.01,
            orderbook_concurrency: 3,
            orderbook_timeout: Duration::from_secs(1),
            skip_dex_discovery: false,
        }
    }

    #[tokio::test]
    async fn full_build_with_empty_registry_completes_with_empty_graph() {
        let graph = RouteGraph::new();
        let assets = InMemoryAssetRegistry::new(vec![]);
        let anchors = InMemoryAnchorRegistry::new(vec![]);
        let horizon = EmptyHorizon;
        let ran = run_full_build(&graph, &assets, &anchors, &horizon, &config())
            .await
            .unwrap();
        assert!(ran);
        assert_eq!(graph.version().await, 1);
        assert_eq!(graph.snapshot().await.nodes.len(), 0);
    }

    #[tokio::test]
    async fn full_build_installs_dex_edges_between_native_and_assets() {
        let graph = RouteGraph::new();
        let usdc = AssetRecord::new(AssetKey::new("USDC", Some("GISSUER")));
        let xlm = AssetRecord::new(AssetKey::native());
        let assets = InMemoryAssetRegistry::new(vec![xlm, usdc.clone()]);
        let anchors = InMemoryAnchorRegistry::new(vec![]);
        let horizon = EmptyHorizon;

        run_full_build(&graph, &assets, &anchors, &horizon, &config())
            .await
            .unwrap();

        let snapshot = graph.snapshot().await;
        let xlm_node = snapshot.node(&AssetKey::native()).unwrap();
        assert!(!xlm_node.edges_to(&usdc.key).is_empty());
    }

    #[tokio::test]
    async fn concurrent_full_build_is_rejected() {
        let graph = RouteGraph::new();
        assert!(graph.start_build());
        let assets = InMemoryAssetRegistry::new(vec![]);
        let anchors = InMemoryAnchorRegistry::new(vec![]);
        let horizon = EmptyHorizon;
        let ran = run_full_build(&graph, &assets, &anchors, &horizon, &config())
            .await
            .unwrap();
        assert!(!ran);
    }

    #[tokio::test]
    async fn light_refresh_preserves_version() {
        let graph = RouteGraph::new();
        let xlm = AssetRecord::new(AssetKey::native());
        let usdc = AssetRecord::new(AssetKey::new("USDC", Some("GISSUER")));
        let assets = InMemoryAssetRegistry::new(vec![xlm, usdc]);
        let anchors = InMemoryAnchorRegistry::new(vec![]);
        let horizon = EmptyHorizon;

        run_full_build(&graph, &assets, &anchors, &horizon, &config())
            .await
            .unwrap();
        let version_after_build = graph.version().await;

        run_light_refresh(&graph, &assets, &horizon, &config())
            .await
            .unwrap();
        assert_eq!(graph.version().await, version_after_build);
    }

    #[tokio::test]
    async fn anchor_bridge_creates_lightweight_nodes_for_unlisted_assets() {
        let graph = RouteGraph::new();
        let xlm = AssetRecord::new(AssetKey::native());
        let assets = InMemoryAssetRegistry::new(vec![xlm]);
        let usdx = AssetKey::new("USDX", Some("GANCHOR"));
        let eurx = AssetKey::new("EURX", Some("GANCHOR"));
        let anchor = AnchorRecord {
            domain: "ex.io".into(),
            active: true,
            health: 0.9,
            assets: vec![
                crate::registry::AnchorAssetCapability {
                    key: usdx.clone(),
                    active: true,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 0.5,
                },
                crate::registry::AnchorAssetCapability {
                    key: eurx.clone(),
                    active: true,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 0.5,
                },
            ],
        };
        let anchors = InMemoryAnchorRegistry::new(vec![anchor]);
        let horizon = EmptyHorizon;

        run_full_build(&graph, &assets, &anchors, &horizon, &config())
            .await
            .unwrap();

        let snapshot = graph.snapshot().await;
        assert!(snapshot.has_node(&usdx));
        assert!(snapshot.has_node(&eurx));
        assert!(!snapshot.node(&usdx).unwrap().edges_to(&eurx).is_empty());
    }
}
