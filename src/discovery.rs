//! Edge discovery: turns registry snapshots and Horizon orderbook data into
//! the three families of weighted edges the graph builder installs.
//!
//! Each discovery pass is independent of the others and degrades gracefully:
//! a single orderbook query failing only drops that one candidate pair, it
//! never aborts the whole pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::gateway::HorizonGateway;
use crate::graph::{AnchorBridgeAttrs, DexAttrs, Edge, EdgeKind, UnorderedPair, XlmHubAttrs};
use crate::registry::AnchorRecord;
use crate::types::AssetKey;

const DEX_BASE: f64 = 0.1;
const SPREAD_MULT: f64 = 2.0;
const LIQ_BONUS: f64 = 0.5;

const BRIDGE_BASE: f64 = 0.3;
const HEALTH_PENALTY: f64 = 0.5;
const FEE_MULT: f64 = 1.0;

const XLM_HUB_BASE: f64 = 0.4;
const XLM_HUB_UNVERIFIED: f64 = 0.2;

/// One directed edge discovered between two assets, ready for
/// [`crate::graph::GraphInner::add_edge`].
pub struct DiscoveredEdge {
    pub src: AssetKey,
    pub dst: AssetKey,
    pub edge: Edge,
}

fn dex_weight(depth: f64, spread: f64) -> f64 {
    let liquidity_term = 1.0 - 1.0 / (depth + 2.0).log2();
    (DEX_BASE + SPREAD_MULT * spread - LIQ_BONUS * liquidity_term).max(0.01)
}

fn bridge_weight(health: f64, fee_a_pct: f64, fee_b_pct: f64) -> f64 {
    (BRIDGE_BASE + (1.0 - health) * HEALTH_PENALTY + (fee_a_pct + fee_b_pct) * FEE_MULT).max(0.01)
}

fn xlm_hub_weight(is_unverified: bool) -> f64 {
    XLM_HUB_BASE + if is_unverified { XLM_HUB_UNVERIFIED } else { 0.0 }
}

/// Candidate unordered pairs for DEX discovery: every non-native asset
/// paired with the native asset (hub-and-spoke), plus every intra-domain
/// pair for anchor domains with at least two present assets.
pub fn dex_candidate_pairs(
    assets: &[AssetKey],
    domain_of: &HashMap<AssetKey, String>,
) -> Vec<UnorderedPair> {
    let native = AssetKey::native();
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for asset in assets {
        if asset.is_native() {
            continue;
        }
        let pair = crate::graph::unordered_pair(asset, &native);
        if seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }

    let mut by_domain: HashMap<&str, Vec<&AssetKey>> = HashMap::new();
    for asset in assets {
        if let Some(domain) = domain_of.get(asset) {
            by_domain.entry(domain.as_str()).or_default().push(asset);
        }
    }
    for members in by_domain.values() {
        if members.len() < 2 {
            continue;
        }
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let pair = crate::graph::unordered_pair(members[i], members[j]);
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            }
        }
    }

    pairs
}

/// Run DEX discovery across `pairs`, bounded by `concurrency` in-flight
/// orderbook queries, each subject to `timeout`. Pairs whose orderbook
/// query fails, times out, or falls below `min_depth` are dropped silently
/// (logged at debug) rather than aborting the pass.
pub async fn discover_dex_edges(
    gateway: &dyn HorizonGateway,
    pairs: Vec<UnorderedPair>,
    min_depth: f64,
    concurrency: usize,
    timeout: Duration,
) -> Vec<DiscoveredEdge> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut futures = FuturesUnordered::new();

    for (a, b) in pairs {
        let semaphore = semaphore.clone();
        futures.push(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let result = tokio::time::timeout(timeout, gateway.get_orderbook(&a, &b, 20)).await;
            (a, b, result)
        });
    }

    let mut edges = Vec::new();
    while let Some((a, b, result)) = futures.next().await {
        let orderbook = match result {
            Ok(Ok(ob)) => ob,
            Ok(Err(err)) => {
                tracing::debug!(pair = %format!("{a}/{b}"), error = %err, "orderbook query failed");
                continue;
            }
            Err(_) => {
                tracing::debug!(pair = %format!("{a}/{b}"), "orderbook query timed out");
                continue;
            }
        };

        let bid_depth = orderbook.bid_depth();
        let ask_depth = orderbook.ask_depth();
        if bid_depth.max(ask_depth) < min_depth {
            continue;
        }

        let top_bid = orderbook.top_bid();
        let top_ask = orderbook.top_ask();
        let spread = match (top_bid, top_ask) {
            (Some(bid), Some(ask)) if ask > 0.0 => ((ask - bid).abs() / ask).min(1.0),
            _ => 1.0,
        };

        let attrs = DexAttrs {
            top_bid: top_bid.unwrap_or(0.0),
            top_ask: top_ask.unwrap_or(0.0),
            spread,
            bid_depth,
            ask_depth,
            bid_count: orderbook.bids.len() as u32,
            ask_count: orderbook.asks.len() as u32,
        };

        // a -> b sells `a`, buys `b`: priced off the ask side (what a buyer
        // of `b` must pay). b -> a swaps the interpretation onto the bid side.
        let fwd_weight = dex_weight(ask_depth, spread);
        let rev_weight = dex_weight(bid_depth, spread);

        edges.push(DiscoveredEdge {
            src: a.clone(),
            dst: b.clone(),
            edge: Edge::new(b.clone(), EdgeKind::Dex(attrs.clone()), fwd_weight),
        });
        edges.push(DiscoveredEdge {
            src: b.clone(),
            dst: a.clone(),
            edge: Edge::new(a, EdgeKind::Dex(attrs), rev_weight),
        });
    }

    edges
}

/// Anchor-bridge discovery: bidirectional edges between every pair of
/// actively-bridgeable assets on the same anchor.
pub fn discover_anchor_bridge_edges(anchors: &[AnchorRecord]) -> Vec<DiscoveredEdge> {
    let mut edges = Vec::new();

    for anchor in anchors {
        let bridgeable: Vec<_> = anchor
            .assets
            .iter()
            .filter(|a| a.active && (a.deposit_enabled || a.withdraw_enabled))
            .collect();

        for i in 0..bridgeable.len() {
            for j in (i + 1)..bridgeable.len() {
                let a = bridgeable[i];
                let b = bridgeable[j];
                let weight = bridge_weight(anchor.health, a.fee_percent, b.fee_percent);

                let fwd_attrs = AnchorBridgeAttrs {
                    anchor_domain: anchor.domain.clone(),
                    anchor_health: anchor.health,
                    deposit_enabled: b.deposit_enabled,
                    withdraw_enabled: a.withdraw_enabled,
                    fee_fixed: b.fee_fixed,
                    fee_percent: b.fee_percent,
                };
                let rev_attrs = AnchorBridgeAttrs {
                    anchor_domain: anchor.domain.clone(),
                    anchor_health: anchor.health,
                    deposit_enabled: a.deposit_enabled,
                    withdraw_enabled: b.withdraw_enabled,
                    fee_fixed: a.fee_fixed,
                    fee_percent: a.fee_percent,
                };

                edges.push(DiscoveredEdge {
                    src: a.key.clone(),
                    dst: b.key.clone(),
                    edge: Edge::new(b.key.clone(), EdgeKind::AnchorBridge(fwd_attrs), weight),
                });
                edges.push(DiscoveredEdge {
                    src: b.key.clone(),
                    dst: a.key.clone(),
                    edge: Edge::new(a.key.clone(), EdgeKind::AnchorBridge(rev_attrs), weight),
                });
            }
        }
    }

    edges
}

/// XLM-hub fallback discovery: bidirectional edges to the native asset for
/// every non-native asset not already covered by a DEX edge to native.
pub fn discover_xlm_hub_edges(
    assets: &[AssetKey],
    verified_of: &HashMap<AssetKey, bool>,
    dex_covered_pairs: &HashSet<UnorderedPair>,
) -> Vec<DiscoveredEdge> {
    let native = AssetKey::native();
    let mut edges = Vec::new();

    for asset in assets {
        if asset.is_native() {
            continue;
        }
        let pair = crate::graph::unordered_pair(asset, &native);
        if dex_covered_pairs.contains(&pair) {
            continue;
        }

        let is_unverified = !verified_of.get(asset).copied().unwrap_or(false);
        let weight = xlm_hub_weight(is_unverified);

        let fwd_attrs = XlmHubAttrs {
            origin_asset_code: asset.code().to_string(),
            origin_domain: None,
            estimated: true,
        };
        let rev_attrs = fwd_attrs.clone();

        edges.push(DiscoveredEdge {
            src: asset.clone(),
            dst: native.clone(),
            edge: Edge::new(native.clone(), EdgeKind::XlmHub(fwd_attrs), weight),
        });
        edges.push(DiscoveredEdge {
            src: native.clone(),
            dst: asset.clone(),
            edge: Edge::new(asset.clone(), EdgeKind::XlmHub(rev_attrs), weight),
        });
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dex_weight_respects_floor() {
        let w = dex_weight(0.0, 1.0);
        assert!(w >= 0.01);
    }

    #[test]
    fn dex_weight_improves_with_depth() {
        let shallow = dex_weight(10.0, 0.1);
        let deep = dex_weight(10_000.0, 0.1);
        assert!(deep < shallow);
    }

    #[test]
    fn bridge_weight_penalizes_poor_health_and_fees() {
        let healthy = bridge_weight(1.0, 0.0, 0.0);
        let unhealthy = bridge_weight(0.2, 2.0, 2.0);
        assert!(unhealthy > healthy);
        assert!((healthy - BRIDGE_BASE).abs() < 1e-9);
    }

    #[test]
    fn xlm_hub_weight_penalizes_unverified() {
        assert!(xlm_hub_weight(true) > xlm_hub_weight(false));
    }

    #[test]
    fn dex_candidate_pairs_includes_hub_and_domain_pairs() {
        let usdc = AssetKey::new("USDC", Some("GISSUER1"));
        let eurc = AssetKey::new("EURC", Some("GISSUER1"));
        let assets = vec![AssetKey::native(), usdc.clone(), eurc.clone()];
        let mut domains = HashMap::new();
        domains.insert(usdc.clone(), "ex.io".to_string());
        domains.insert(eurc.clone(), "ex.io".to_string());

        let pairs = dex_candidate_pairs(&assets, &domains);
        assert!(pairs.contains(&crate::graph::unordered_pair(&usdc, &AssetKey::native())));
        assert!(pairs.contains(&crate::graph::unordered_pair(&eurc, &AssetKey::native())));
        assert!(pairs.contains(&crate::graph::unordered_pair(&usdc, &eurc)));
    }

    #[test]
    fn xlm_hub_skips_pairs_already_covered_by_dex() {
        let usdc = AssetKey::new("USDC", Some("GISSUER1"));
        let covered = AssetKey::new("EURC", Some("GISSUER1"));
        let mut dex_pairs = HashSet::new();
        dex_pairs.insert(crate::graph::unordered_pair(&covered, &AssetKey::native()));

        let mut verified = HashMap::new();
        verified.insert(usdc.clone(), true);

        let edges =
            discover_xlm_hub_edges(&[usdc.clone(), covered.clone()], &verified, &dex_pairs);
        assert!(edges.iter().any(|e| e.src == usdc));
        assert!(!edges.iter().any(|e| e.src == covered));
    }
}
