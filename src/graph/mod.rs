#![allow(dead_code)]

//! The in-memory route graph: a directed multigraph of assets (nodes) and
//! typed, weighted edges, plus the build-lock and versioning machinery that
//! lets the scheduler rebuild it while queries keep reading the prior
//! version.
//!
//! Builds publish a freshly constructed [`GraphInner`] by swapping an `Arc`
//! behind a `RwLock` (Design Note in the spec: "construct a fresh graph
//! object and atomically swap the live pointer"). Readers take the lock only
//! long enough to clone the `Arc` and then traverse lock-free.

pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::types::AssetKey;

pub use edge::{AnchorBridgeAttrs, DexAttrs, Edge, EdgeKind, EdgeType, XlmHubAttrs};
pub use node::{Node, NodeAttrs};

/// An unordered pair of asset keys, used to dedupe DEX candidates and to
/// mask XLM-hub discovery against pairs already covered by DEX edges.
pub type UnorderedPair = (AssetKey, AssetKey);

pub fn unordered_pair(a: &AssetKey, b: &AssetKey) -> UnorderedPair {
    if a.to_string() <= b.to_string() {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// One complete, immutable snapshot of the graph.
#[derive(Debug, Clone)]
pub struct GraphInner {
    pub nodes: HashMap<AssetKey, Node>,
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub build_duration: Duration,
}

impl GraphInner {
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
            version: 0,
            built_at: Utc::now(),
            build_duration: Duration::ZERO,
        }
    }

    /// Create a node or merge attributes into an existing one without
    /// touching its adjacency.
    pub fn add_or_update_node(&mut self, key: AssetKey, attrs: NodeAttrs) {
        match self.nodes.get_mut(&key) {
            Some(existing) => existing.merge(attrs),
            None => {
                let node = Node::new(key.clone(), attrs);
                self.nodes.insert(key, node);
            }
        }
    }

    pub fn has_node(&self, key: &AssetKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &AssetKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Add or replace a directed edge `src -> dst`. Requires both endpoints
    /// to already exist. If an edge of the same type already exists between
    /// the pair it is replaced in place (the light-refresh primitive);
    /// otherwise it is appended.
    pub fn add_edge(&mut self, src: &AssetKey, dst: &AssetKey, edge: Edge) -> eyre::Result<()> {
        if !self.nodes.contains_key(dst) {
            return Err(eyre::eyre!("add_edge: target node {dst} does not exist"));
        }
        let slot_key = edge.anchor_domain().map(str::to_string);
        let edge_type = edge.edge_type();
        let node = self
            .nodes
            .get_mut(src)
            .ok_or_else(|| eyre::eyre!("add_edge: source node {src} does not exist"))?;
        let bucket = node.edges.entry(dst.clone()).or_default();
        // DEX and XLM-hub edges are unique per pair and overwrite in place
        // (the light-refresh primitive). Anchor-bridge edges are keyed by
        // anchor domain too, since distinct anchors on the same pair must
        // be kept as separate edges.
        if let Some(existing) = bucket
            .iter_mut()
            .find(|e| e.edge_type() == edge_type && e.anchor_domain().map(str::to_string) == slot_key)
        {
            *existing = edge;
        } else {
            bucket.push(edge);
        }
        Ok(())
    }

    /// Add two directed edges `a -> b` and `b -> a` with independent
    /// attributes.
    pub fn add_bidirectional(
        &mut self,
        a: &AssetKey,
        b: &AssetKey,
        fwd: Edge,
        rev: Edge,
    ) -> eyre::Result<()> {
        self.add_edge(a, b, fwd)?;
        self.add_edge(b, a, rev)?;
        Ok(())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.all_edges().count()).sum()
    }

    pub fn stats(&self) -> GraphStats {
        let node_count = self.nodes.len();
        let mut per_type = HashMap::new();
        let mut nodes_with_edges = 0usize;
        let mut weight_sum = 0.0f64;
        let mut weight_count = 0usize;
        for node in self.nodes.values() {
            let mut has_edge = false;
            for edge in node.all_edges() {
                has_edge = true;
                *per_type.entry(edge.edge_type()).or_insert(0usize) += 1;
                if edge.weight.is_finite() {
                    weight_sum += edge.weight;
                    weight_count += 1;
                }
            }
            if has_edge {
                nodes_with_edges += 1;
            }
        }
        let edge_count: usize = per_type.values().sum();
        GraphStats {
            node_count,
            edge_count,
            edges_by_type: per_type,
            nodes_with_outgoing_edges: nodes_with_edges,
            connectivity_ratio: if node_count == 0 {
                0.0
            } else {
                nodes_with_edges as f64 / node_count as f64
            },
            mean_edge_weight: if weight_count == 0 {
                0.0
            } else {
                weight_sum / weight_count as f64
            },
        }
    }

    /// Unordered pairs already covered by at least one DEX edge (either
    /// direction).
    pub fn pairs_with_dex_edges(&self) -> HashSet<UnorderedPair> {
        let mut set = HashSet::new();
        for node in self.nodes.values() {
            for edge in node.all_edges() {
                if edge.edge_type() == EdgeType::Dex {
                    set.insert(unordered_pair(&node.key, &edge.to));
                }
            }
        }
        set
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub edges_by_type: HashMap<EdgeType, usize>,
    pub nodes_with_outgoing_edges: usize,
    pub connectivity_ratio: f64,
    pub mean_edge_weight: f64,
}

/// Process-wide route graph: the live snapshot plus the build lock.
pub struct RouteGraph {
    inner: RwLock<Arc<GraphInner>>,
    building: AtomicBool,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(GraphInner::empty())),
            building: AtomicBool::new(false),
        }
    }

    /// Clone the current snapshot handle. Cheap; does not hold the lock
    /// beyond the clone.
    pub async fn snapshot(&self) -> Arc<GraphInner> {
        self.inner.read().await.clone()
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Attempt to acquire the build lock. Returns `false` without mutating
    /// state if a build is already in progress.
    pub fn start_build(&self) -> bool {
        self.building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Publish a fully-built graph as a full rebuild: bumps the version,
    /// stamps the build duration, releases the build lock. The caller must
    /// have already set `new_inner.version` to `old_version + 1` via
    /// [`RouteGraph::next_version`], or simply call [`RouteGraph::complete_full_build`].
    pub async fn complete_full_build(&self, mut new_inner: GraphInner, duration: Duration) {
        let mut guard = self.inner.write().await;
        new_inner.version = guard.version + 1;
        new_inner.built_at = Utc::now();
        new_inner.build_duration = duration;
        *guard = Arc::new(new_inner);
        self.building.store(false, Ordering::SeqCst);
    }

    /// Publish a graph as a light refresh: the version is preserved from
    /// the snapshot the refresh was computed against (edges were
    /// overwritten in place, conceptually).
    pub async fn complete_light_refresh(&self, mut new_inner: GraphInner) {
        let mut guard = self.inner.write().await;
        new_inner.version = guard.version;
        new_inner.built_at = guard.built_at;
        new_inner.build_duration = guard.build_duration;
        *guard = Arc::new(new_inner);
    }

    /// Release the build lock without publishing anything (used when a
    /// build aborts early, e.g. an empty routable-asset set).
    pub fn release_build_lock(&self) {
        self.building.store(false, Ordering::SeqCst);
    }
}

impl Default for RouteGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetSource;

    fn key(code: &str) -> AssetKey {
        AssetKey::new(code, None)
    }

    #[test]
    fn add_edge_requires_existing_endpoints() {
        let mut g = GraphInner::empty();
        g.add_or_update_node(key("XLM"), NodeAttrs::default());
        let edge = Edge::new(
            key("USDC"),
            EdgeKind::XlmHub(XlmHubAttrs {
                origin_asset_code: "USDC".into(),
                origin_domain: None,
                estimated: true,
            }),
            0.4,
        );
        assert!(g.add_edge(&key("XLM"), &key("USDC"), edge).is_err());
    }

    #[test]
    fn add_edge_same_type_replaces_in_place() {
        let mut g = GraphInner::empty();
        g.add_or_update_node(key("XLM"), NodeAttrs::default());
        g.add_or_update_node(key("USDC"), NodeAttrs::default());
        let mk = |w: f64| {
            Edge::new(
                key("USDC"),
                EdgeKind::Dex(DexAttrs {
                    top_bid: 1.0,
                    top_ask: 1.0,
                    spread: 0.0,
                    bid_depth: 100.0,
                    ask_depth: 100.0,
                    bid_count: 1,
                    ask_count: 1,
                }),
                w,
            )
        };
        g.add_edge(&key("XLM"), &key("USDC"), mk(0.5)).unwrap();
        g.add_edge(&key("XLM"), &key("USDC"), mk(0.3)).unwrap();
        let edges = g.node(&key("XLM")).unwrap().edges_to(&key("USDC"));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.3);
    }

    #[test]
    fn distinct_anchor_bridges_on_same_pair_are_kept_separate() {
        let mut g = GraphInner::empty();
        g.add_or_update_node(key("USDX"), NodeAttrs::default());
        g.add_or_update_node(key("EURX"), NodeAttrs::default());
        let mk = |domain: &str, w: f64| {
            Edge::new(
                key("EURX"),
                EdgeKind::AnchorBridge(AnchorBridgeAttrs {
                    anchor_domain: domain.into(),
                    anchor_health: 0.9,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 1.0,
                }),
                w,
            )
        };
        g.add_edge(&key("USDX"), &key("EURX"), mk("ex.io", 0.5))
            .unwrap();
        g.add_edge(&key("USDX"), &key("EURX"), mk("other.io", 0.4))
            .unwrap();
        let edges = g.node(&key("USDX")).unwrap().edges_to(&key("EURX"));
        assert_eq!(edges.len(), 2);
        let best = g.node(&key("USDX")).unwrap().best_edge_to(&key("EURX"));
        assert_eq!(best.unwrap().weight, 0.4);
    }

    #[tokio::test]
    async fn complete_full_build_bumps_version_and_clears_lock() {
        let graph = RouteGraph::new();
        assert!(graph.start_build());
        let mut inner = GraphInner::empty();
        inner.add_or_update_node(
            key("XLM"),
            NodeAttrs {
                source: Some(AssetSource::Network),
                ..Default::default()
            },
        );
        graph
            .complete_full_build(inner, Duration::from_millis(5))
            .await;
        assert_eq!(graph.version().await, 1);
        assert!(!graph.is_building());
    }

    #[test]
    fn concurrent_build_trigger_is_rejected() {
        let graph = RouteGraph::new();
        assert!(graph.start_build());
        assert!(!graph.start_build());
    }
}
