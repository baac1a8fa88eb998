//! k-shortest simple paths over the route graph, Yen's-algorithm-style:
//! one Dijkstra-like shortest path, then repeated spur searches that
//! deviate from previously accepted paths at each prefix position.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::graph::GraphInner;
use crate::types::AssetKey;

/// A directed edge block: a specific `src -> dst` pair, used to forbid a
/// single directed edge during a spur search.
pub type DirectedPair = (AssetKey, AssetKey);

#[derive(Debug, Clone)]
pub struct FoundPath {
    pub nodes: Vec<AssetKey>,
    pub total_weight: f64,
}

impl FoundPath {
    fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

#[derive(Clone)]
struct HeapEntry {
    cost: f64,
    hops: usize,
    nodes: Vec<AssetKey>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.nodes == other.nodes
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap: smallest cost first, then fewer hops,
        // then lexicographic node sequence as the final tie-break.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node_key().cmp(&self.node_key()))
    }
}

impl HeapEntry {
    fn node_key(&self) -> String {
        self.nodes
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(">")
    }
}

/// Lowest-cost simple path from `src` to `dst` honoring the hop cap,
/// avoidance sets, and best-edge-per-pair rule. Returns `None` if no path
/// exists within `max_hops`.
pub fn shortest_path(
    graph: &GraphInner,
    src: &AssetKey,
    dst: &AssetKey,
    max_hops: u8,
    avoid_nodes: &HashSet<AssetKey>,
    avoid_edges: &HashSet<DirectedPair>,
) -> Option<FoundPath> {
    if src == dst {
        return None;
    }
    if avoid_nodes.contains(src) || avoid_nodes.contains(dst) {
        return None;
    }
    if !graph.has_node(src) || !graph.has_node(dst) {
        return None;
    }

    let mut heap = BinaryHeap::new();
    heap.push(HeapEntry {
        cost: 0.0,
        hops: 0,
        nodes: vec![src.clone()],
    });

    // Best known cost to reach a node with a given number of hops consumed,
    // so we don't rediscover strictly worse partial paths endlessly.
    let mut best_cost: HashMap<AssetKey, f64> = HashMap::new();

    while let Some(entry) = heap.pop() {
        let current = entry.nodes.last().unwrap().clone();
        if current == *dst {
            return Some(FoundPath {
                nodes: entry.nodes,
                total_weight: entry.cost,
            });
        }
        if entry.hops as u8 >= max_hops {
            continue;
        }
        if let Some(&known) = best_cost.get(&current) {
            if known < entry.cost {
                continue;
            }
        }

        let node = match graph.node(&current) {
            Some(n) => n,
            None => continue,
        };

        let mut neighbors: Vec<&AssetKey> = node.edges.keys().collect();
        neighbors.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

        for neighbor in neighbors {
            if avoid_nodes.contains(neighbor) {
                continue;
            }
            if entry.nodes.contains(neighbor) && neighbor != dst {
                continue;
            }
            if avoid_edges.contains(&(current.clone(), neighbor.clone())) {
                continue;
            }
            let Some(edge) = node.best_edge_to(neighbor) else {
                continue;
            };
            let next_cost = entry.cost + edge.weight;
            let mut next_nodes = entry.nodes.clone();
            next_nodes.push(neighbor.clone());
            heap.push(HeapEntry {
                cost: next_cost,
                hops: entry.hops + 1,
                nodes: next_nodes,
            });
        }

        best_cost
            .entry(current)
            .and_modify(|c| *c = c.min(entry.cost))
            .or_insert(entry.cost);
    }

    None
}

/// Up to `k` simple paths from `src` to `dst`, each at most `max_hops`
/// edges, sorted by ascending total weight. Empty if `src == dst` or no
/// path exists.
pub fn k_shortest_paths(
    graph: &GraphInner,
    src: &AssetKey,
    dst: &AssetKey,
    k: usize,
    max_hops: u8,
) -> Vec<FoundPath> {
    if src == dst || k == 0 {
        return vec![];
    }

    let empty_nodes = HashSet::new();
    let empty_edges = HashSet::new();
    let Some(first) = shortest_path(graph, src, dst, max_hops, &empty_nodes, &empty_edges) else {
        return vec![];
    };

    let mut accepted: Vec<FoundPath> = vec![first];
    let mut seen_sequences: HashSet<Vec<AssetKey>> = HashSet::new();
    seen_sequences.insert(accepted[0].nodes.clone());

    let mut candidates: Vec<FoundPath> = Vec::new();

    while accepted.len() < k {
        let last = accepted.last().unwrap().clone();

        for spur_index in 0..last.nodes.len().saturating_sub(1) {
            let spur_node = &last.nodes[spur_index];
            let root_path = &last.nodes[..=spur_index];

            let mut avoid_edges: HashSet<DirectedPair> = HashSet::new();
            for accepted_path in &accepted {
                if accepted_path.nodes.len() > spur_index
                    && accepted_path.nodes[..=spur_index] == *root_path
                    && accepted_path.nodes.len() > spur_index + 1
                {
                    avoid_edges.insert((
                        accepted_path.nodes[spur_index].clone(),
                        accepted_path.nodes[spur_index + 1].clone(),
                    ));
                }
            }

            let mut avoid_nodes: HashSet<AssetKey> = HashSet::new();
            for node in &root_path[..root_path.len() - 1] {
                avoid_nodes.insert(node.clone());
            }

            let remaining_hops = max_hops.saturating_sub(spur_index as u8);
            if remaining_hops == 0 {
                continue;
            }

            let Some(spur_path) = shortest_path(
                graph,
                spur_node,
                dst,
                remaining_hops,
                &avoid_nodes,
                &avoid_edges,
            ) else {
                continue;
            };

            let mut full_nodes = root_path[..root_path.len() - 1].to_vec();
            full_nodes.extend(spur_path.nodes.iter().cloned());

            if full_nodes.len() as u8 - 1 > max_hops {
                continue;
            }
            if seen_sequences.contains(&full_nodes) {
                continue;
            }

            let root_weight = path_weight(graph, &root_path[..=spur_index]);
            let total_weight = root_weight + spur_path.total_weight;

            candidates.push(FoundPath {
                nodes: full_nodes.clone(),
                total_weight,
            });
            seen_sequences.insert(full_nodes);
        }

        if candidates.is_empty() {
            break;
        }

        candidates.sort_by(|a, b| {
            a.total_weight
                .total_cmp(&b.total_weight)
                .then_with(|| a.hops().cmp(&b.hops()))
                .then_with(|| node_seq_key(&a.nodes).cmp(&node_seq_key(&b.nodes)))
        });

        let best = candidates.remove(0);
        accepted.push(best);
    }

    accepted.truncate(k);
    accepted
}

fn node_seq_key(nodes: &[AssetKey]) -> String {
    nodes.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(">")
}

fn path_weight(graph: &GraphInner, nodes: &[AssetKey]) -> f64 {
    let mut total = 0.0;
    for pair in nodes.windows(2) {
        let Some(node) = graph.node(&pair[0]) else {
            return f64::INFINITY;
        };
        match node.best_edge_to(&pair[1]) {
            Some(edge) => total += edge.weight,
            None => return f64::INFINITY,
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DexAttrs, Edge, EdgeKind, NodeAttrs};

    fn key(code: &str) -> AssetKey {
        AssetKey::new(code, None)
    }

    fn dex_edge(to: &str, weight: f64) -> Edge {
        Edge::new(
            key(to),
            EdgeKind::Dex(DexAttrs {
                top_bid: 1.0,
                top_ask: 1.0,
                spread: 0.01,
                bid_depth: 1000.0,
                ask_depth: 1000.0,
                bid_count: 1,
                ask_count: 1,
            }),
            weight,
        )
    }

    fn build_diamond() -> GraphInner {
        let mut g = GraphInner::empty();
        for code in ["A", "B1", "B2", "B3", "B4", "C"] {
            g.add_or_update_node(key(code), NodeAttrs::default());
        }
        g.add_edge(&key("A"), &key("B1"), dex_edge("B1", 0.1)).unwrap();
        g.add_edge(&key("B1"), &key("C"), dex_edge("C", 0.5)).unwrap();
        g.add_edge(&key("A"), &key("B2"), dex_edge("B2", 0.3)).unwrap();
        g.add_edge(&key("B2"), &key("C"), dex_edge("C", 0.5)).unwrap();
        g.add_edge(&key("A"), &key("B3"), dex_edge("B3", 0.5)).unwrap();
        g.add_edge(&key("B3"), &key("C"), dex_edge("C", 0.5)).unwrap();
        g.add_edge(&key("A"), &key("B4"), dex_edge("B4", 0.7)).unwrap();
        g.add_edge(&key("B4"), &key("C"), dex_edge("C", 0.5)).unwrap();
        g
    }

    #[test]
    fn shortest_path_finds_cheapest_route() {
        let g = build_diamond();
        let path = shortest_path(&g, &key("A"), &key("C"), 4, &HashSet::new(), &HashSet::new())
            .unwrap();
        assert_eq!(path.nodes, vec![key("A"), key("B1"), key("C")]);
        assert!((path.total_weight - 0.6).abs() < 1e-9);
    }

    #[test]
    fn same_source_and_destination_returns_none() {
        let g = build_diamond();
        assert!(shortest_path(&g, &key("A"), &key("A"), 4, &HashSet::new(), &HashSet::new())
            .is_none());
    }

    #[test]
    fn k_shortest_diversity_returns_three_ascending() {
        let g = build_diamond();
        let paths = k_shortest_paths(&g, &key("A"), &key("C"), 3, 4);
        assert_eq!(paths.len(), 3);
        let weights: Vec<f64> = paths.iter().map(|p| p.total_weight).collect();
        assert!((weights[0] - 0.6).abs() < 1e-9);
        assert!((weights[1] - 0.8).abs() < 1e-9);
        assert!((weights[2] - 1.0).abs() < 1e-9);
        let mut sequences = HashSet::new();
        for p in &paths {
            assert!(sequences.insert(p.nodes.clone()));
        }
    }

    #[test]
    fn hop_cap_excludes_longer_paths() {
        let mut g = GraphInner::empty();
        for code in ["A", "B", "C", "D"] {
            g.add_or_update_node(key(code), NodeAttrs::default());
        }
        g.add_edge(&key("A"), &key("B"), dex_edge("B", 0.1)).unwrap();
        g.add_edge(&key("B"), &key("C"), dex_edge("C", 0.1)).unwrap();
        g.add_edge(&key("C"), &key("D"), dex_edge("D", 0.1)).unwrap();
        assert!(shortest_path(&g, &key("A"), &key("D"), 2, &HashSet::new(), &HashSet::new())
            .is_none());
        assert!(shortest_path(&g, &key("A"), &key("D"), 3, &HashSet::new(), &HashSet::new())
            .is_some());
    }

    #[test]
    fn avoid_nodes_blocks_traversal() {
        let g = build_diamond();
        let mut avoid = HashSet::new();
        avoid.insert(key("B1"));
        let path = shortest_path(&g, &key("A"), &key("C"), 4, &avoid, &HashSet::new()).unwrap();
        assert_eq!(path.nodes, vec![key("A"), key("B2"), key("C")]);
    }

    #[test]
    fn best_edge_per_pair_picks_lowest_weight_parallel_edge() {
        let mut g = GraphInner::empty();
        g.add_or_update_node(key("A"), NodeAttrs::default());
        g.add_or_update_node(key("B"), NodeAttrs::default());
        g.add_edge(
            &key("A"),
            &key("B"),
            Edge::new(
                key("B"),
                EdgeKind::AnchorBridge(crate::graph::AnchorBridgeAttrs {
                    anchor_domain: "a.io".into(),
                    anchor_health: 0.9,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 1.0,
                }),
                0.5,
            ),
        )
        .unwrap();
        g.add_edge(
            &key("A"),
            &key("B"),
            Edge::new(
                key("B"),
                EdgeKind::AnchorBridge(crate::graph::AnchorBridgeAttrs {
                    anchor_domain: "b.io".into(),
                    anchor_health: 0.99,
                    deposit_enabled: true,
                    withdraw_enabled: true,
                    fee_fixed: 0.0,
                    fee_percent: 0.1,
                }),
                0.31,
            ),
        )
        .unwrap();
        let path = shortest_path(&g, &key("A"), &key("B"), 2, &HashSet::new(), &HashSet::new())
            .unwrap();
        assert!((path.total_weight - 0.31).abs() < 1e-9);
    }
}
