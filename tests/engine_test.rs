//! End-to-end scenarios against the engine's public surface: graph, resolver,
//! and the in-memory cache layer. No live network dependency — every
//! scenario builds its own graph snapshot and a stub Horizon gateway.

use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;

use stellar_route_engine::cache::memory::MemoryCache;
use stellar_route_engine::errors::EngineError;
use stellar_route_engine::gateway::{HorizonGateway, Orderbook, StrictSendPathRecord};
use stellar_route_engine::graph::{
    AnchorBridgeAttrs, DexAttrs, Edge, EdgeKind, EdgeType, GraphInner, NodeAttrs, RouteGraph,
};
use stellar_route_engine::resolver::{find_routes, ResolverConfig, RouteQuery};
use stellar_route_engine::types::{Amount, AssetKey, PriceSource, QueryMode};

mod helpers {
    use super::*;

    pub fn asset(code: &str) -> AssetKey {
        AssetKey::new(code, Some("GISSUER"))
    }

    pub fn resolver_config() -> ResolverConfig {
        ResolverConfig {
            default_max_hops: 4,
            default_max_routes: 5,
            build_ready_grace_period: Duration::from_millis(50),
            strict_send_timeout: Duration::from_secs(1),
        }
    }

    pub struct NullHorizon;

    #[async_trait]
    impl HorizonGateway for NullHorizon {
        async fn get_orderbook(
            &self,
            _selling: &AssetKey,
            _buying: &AssetKey,
            _depth_limit: u32,
        ) -> Result<Orderbook> {
            Ok(Orderbook::default())
        }

        async fn find_strict_send_paths(
            &self,
            _source: &AssetKey,
            _source_amount: Amount,
            _destinations: &[AssetKey],
        ) -> Result<Vec<StrictSendPathRecord>> {
            Ok(vec![])
        }
    }

    pub fn query(source: AssetKey, destination: AssetKey, amount: &str) -> RouteQuery {
        RouteQuery {
            source,
            destination,
            amount: Amount::parse(amount).unwrap(),
            mode: QueryMode::Send,
            max_hops: None,
            max_routes: None,
            no_cache: false,
        }
    }
}

use helpers::*;

/// Scenario 1: a single direct DEX hop resolves to exactly one route with a
/// composite score above the midpoint.
#[tokio::test]
async fn direct_dex_hop_resolves_single_route() {
    let graph = RouteGraph::new();
    let mut inner = GraphInner::empty();
    let usdc = asset("USDC");
    let native = AssetKey::native();
    inner.add_or_update_node(usdc.clone(), NodeAttrs::default());
    inner.add_or_update_node(native.clone(), NodeAttrs::default());
    inner
        .add_edge(
            &usdc,
            &native,
            Edge::new(
                native.clone(),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 0.25,
                    top_ask: 0.26,
                    spread: 0.038,
                    bid_depth: 5000.0,
                    ask_depth: 5000.0,
                    bid_count: 3,
                    ask_count: 3,
                }),
                0.13,
            ),
        )
        .unwrap();
    graph.complete_full_build(inner, Duration::from_millis(1)).await;

    let response = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdc, native, "100"))
        .await
        .unwrap();

    assert_eq!(response.routes.len(), 1);
    assert_eq!(response.routes[0].edge_types, vec![EdgeType::Dex]);
    assert!(response.routes[0].score.composite > 0.5);
}

/// Scenario 2: an anchor-bridge route deducts the anchor's percentage fee
/// from the receive amount.
#[tokio::test]
async fn anchor_bridge_route_deducts_percentage_fee() {
    let graph = RouteGraph::new();
    let mut inner = GraphInner::empty();
    let usdx = asset("USDX");
    let eurx = asset("EURX");
    inner.add_or_update_node(usdx.clone(), NodeAttrs::default());
    inner.add_or_update_node(eurx.clone(), NodeAttrs::default());
    inner
        .add_edge(
            &usdx,
            &eurx,
            Edge::new(
                eurx.clone(),
                EdgeKind::AnchorBridge(AnchorBridgeAttrs {
                    anchor_domain: "ex.io".into(),
                    anchor_health: 0.9,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 1.0,
                }),
                0.33,
            ),
        )
        .unwrap();
    graph.complete_full_build(inner, Duration::from_millis(1)).await;

    let response = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdx, eurx, "100"))
        .await
        .unwrap();

    assert_eq!(response.routes.len(), 1);
    let receive: f64 = response.routes[0].receive_amount.parse().unwrap();
    assert!((receive - 99.0).abs() < 0.01);
}

/// Scenario 4: with two independent paths between the same source and
/// destination, the resolver returns both, ranked by composite score.
#[tokio::test]
async fn multiple_disjoint_paths_are_all_returned() {
    let graph = RouteGraph::new();
    let mut inner = GraphInner::empty();
    let usdc = asset("USDC");
    let native = AssetKey::native();
    let eurx = asset("EURX");
    inner.add_or_update_node(usdc.clone(), NodeAttrs::default());
    inner.add_or_update_node(native.clone(), NodeAttrs::default());
    inner.add_or_update_node(eurx.clone(), NodeAttrs::default());

    // Path 1: direct DEX hop.
    inner
        .add_edge(
            &usdc,
            &native,
            Edge::new(
                native.clone(),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 0.25,
                    top_ask: 0.26,
                    spread: 0.038,
                    bid_depth: 5000.0,
                    ask_depth: 5000.0,
                    bid_count: 3,
                    ask_count: 3,
                }),
                0.13,
            ),
        )
        .unwrap();

    // Path 2: USDC -> EURX (anchor bridge) -> XLM (DEX), two hops.
    inner
        .add_edge(
            &usdc,
            &eurx,
            Edge::new(
                eurx.clone(),
                EdgeKind::AnchorBridge(AnchorBridgeAttrs {
                    anchor_domain: "ex.io".into(),
                    anchor_health: 0.9,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 0.5,
                }),
                0.5,
            ),
        )
        .unwrap();
    inner
        .add_edge(
            &eurx,
            &native,
            Edge::new(
                native.clone(),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 0.9,
                    top_ask: 0.91,
                    spread: 0.011,
                    bid_depth: 2000.0,
                    ask_depth: 2000.0,
                    bid_count: 2,
                    ask_count: 2,
                }),
                0.2,
            ),
        )
        .unwrap();

    graph.complete_full_build(inner, Duration::from_millis(1)).await;

    let response = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdc, native, "100"))
        .await
        .unwrap();

    assert_eq!(response.routes.len(), 2);
    // Ranked best-first.
    assert!(response.routes[0].score.composite >= response.routes[1].score.composite);
    let hop_counts: Vec<usize> = response.routes.iter().map(|r| r.hops).collect();
    assert!(hop_counts.contains(&1));
    assert!(hop_counts.contains(&2));
}

/// Scenario 5: a response cached against the current graph version is
/// served back unchanged on a repeated lookup.
#[tokio::test]
async fn repeated_query_is_served_from_memory_cache() {
    let graph = RouteGraph::new();
    let mut inner = GraphInner::empty();
    let usdc = asset("USDC");
    let native = AssetKey::native();
    inner.add_or_update_node(usdc.clone(), NodeAttrs::default());
    inner.add_or_update_node(native.clone(), NodeAttrs::default());
    inner
        .add_edge(
            &usdc,
            &native,
            Edge::new(
                native.clone(),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 0.25,
                    top_ask: 0.26,
                    spread: 0.038,
                    bid_depth: 5000.0,
                    ask_depth: 5000.0,
                    bid_count: 3,
                    ask_count: 3,
                }),
                0.13,
            ),
        )
        .unwrap();
    graph.complete_full_build(inner, Duration::from_millis(1)).await;
    let version = graph.version().await;

    let response = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdc.clone(), native.clone(), "100"))
        .await
        .unwrap();

    let mut cache = MemoryCache::new(10, Duration::from_secs(30));
    let key = query(usdc, native, "100").cache_key("100");
    cache.put(key.clone(), response.clone(), version);

    let hit = cache.get(&key, version).expect("expected a cache hit");
    assert_eq!(hit.routes.len(), response.routes.len());
    assert_eq!(hit.routes[0].id, response.routes[0].id);
    assert_eq!(hit.meta.graph_version, response.meta.graph_version);
}

/// Scenario 6: bumping the graph version (a full rebuild) invalidates every
/// entry pinned to the old version, even before its TTL elapses.
#[tokio::test]
async fn graph_rebuild_invalidates_pinned_cache_entries() {
    let graph = RouteGraph::new();
    let mut inner = GraphInner::empty();
    let usdc = asset("USDC");
    let native = AssetKey::native();
    inner.add_or_update_node(usdc.clone(), NodeAttrs::default());
    inner.add_or_update_node(native.clone(), NodeAttrs::default());
    inner
        .add_edge(
            &usdc,
            &native,
            Edge::new(
                native.clone(),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 0.25,
                    top_ask: 0.26,
                    spread: 0.038,
                    bid_depth: 5000.0,
                    ask_depth: 5000.0,
                    bid_count: 3,
                    ask_count: 3,
                }),
                0.13,
            ),
        )
        .unwrap();
    graph.complete_full_build(inner.clone(), Duration::from_millis(1)).await;
    let old_version = graph.version().await;

    let response = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdc.clone(), native.clone(), "100"))
        .await
        .unwrap();

    let mut cache = MemoryCache::new(10, Duration::from_secs(30));
    let key = query(usdc, native, "100").cache_key("100");
    cache.put(key.clone(), response, old_version);
    assert!(cache.get(&key, old_version).is_some());

    // A second full build bumps the version, the way a scheduled rebuild would.
    graph.complete_full_build(inner, Duration::from_millis(1)).await;
    let new_version = graph.version().await;
    assert_ne!(old_version, new_version);

    assert!(cache.get(&key, new_version).is_none());
}

/// A malformed query (equal source and destination) is rejected before any
/// graph traversal is attempted.
#[tokio::test]
async fn rejects_identical_source_and_destination() {
    let graph = RouteGraph::new();
    graph.complete_full_build(GraphInner::empty(), Duration::from_millis(1)).await;
    let usdc = asset("USDC");
    let result = find_routes(&graph, &NullHorizon, &resolver_config(), &query(usdc.clone(), usdc, "100")).await;
    assert!(matches!(result, Err(EngineError::BadRequest(_))));
}
