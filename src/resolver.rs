#![allow(dead_code)]

//! Route resolver: the end-to-end query handler. Validates inputs, runs
//! the pathfinder, enriches via Horizon, scores and ranks, and assembles
//! the wire-shaped route manifests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::errors::EngineError;
use crate::gateway::HorizonGateway;
use crate::graph::{EdgeKind, EdgeType, GraphInner, RouteGraph};
use crate::pathfinder::k_shortest_paths;
use crate::types::{Amount, AssetKey, PriceSource, QueryMode, Strategy};

pub struct ResolverConfig {
    pub default_max_hops: u8,
    pub default_max_routes: usize,
    pub build_ready_grace_period: Duration,
    pub strict_send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub source: AssetKey,
    pub destination: AssetKey,
    pub amount: Amount,
    pub mode: QueryMode,
    pub max_hops: Option<u8>,
    pub max_routes: Option<usize>,
    pub no_cache: bool,
}

impl RouteQuery {
    /// The canonical cache key `srcKey|dstKey|amount|mode`. `amount_input`
    /// is the literal input string, preserved byte-for-byte since cache
    /// correctness depends on it (no numeric normalization).
    pub fn cache_key(&self, amount_input: &str) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source,
            self.destination,
            amount_input,
            match self.mode {
                QueryMode::Send => "send",
                QueryMode::Receive => "receive",
            }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegDetail {
    pub from: AssetKey,
    pub to: AssetKey,
    pub edge_type: EdgeType,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub composite: f64,
    pub amount: f64,
    pub weight: f64,
    pub hops: f64,
    pub liquidity: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteManifest {
    pub id: String,
    pub source: AssetKey,
    pub destination: AssetKey,
    pub send_amount: String,
    pub receive_amount: String,
    pub hops: usize,
    pub path: Vec<AssetKey>,
    pub legs: Vec<LegDetail>,
    pub total_weight: f64,
    pub edge_types: Vec<EdgeType>,
    pub score: ScoreBreakdown,
    pub graph_version: u64,
    pub computed_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub price_source: PriceSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveMeta {
    pub source: AssetKey,
    pub destination: AssetKey,
    pub amount: String,
    pub mode: QueryMode,
    pub route_count: usize,
    pub strategy: Strategy,
    pub graph_version: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub compute_time_ms: u128,
    /// Stamped by the cache layer on lookup; always `false`/`None` on a
    /// freshly computed response.
    pub cached: bool,
    pub cache_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub routes: Vec<RouteManifest>,
    pub meta: ResolveMeta,
}

/// Internal candidate being built up through the pipeline stages.
#[derive(Clone)]
struct Candidate {
    path: Vec<AssetKey>,
    legs: Vec<LegDetail>,
    total_weight: f64,
    estimated_receive: Amount,
    horizon_receive: Option<Amount>,
    price_source: PriceSource,
}

fn walk_legs(graph: &GraphInner, nodes: &[AssetKey]) -> Option<Vec<LegDetail>> {
    let mut legs = Vec::new();
    for pair in nodes.windows(2) {
        let from_node = graph.node(&pair[0])?;
        let edge = from_node.best_edge_to(&pair[1])?;
        legs.push(LegDetail {
            from: pair[0].clone(),
            to: pair[1].clone(),
            edge_type: edge.edge_type(),
            kind: edge.kind.clone(),
        });
    }
    Some(legs)
}

/// Pre-enrichment estimate: walk legs applying each edge type's naive
/// conversion formula, floored at zero.
fn estimate_without_horizon(legs: &[LegDetail], send_amount: Amount) -> Amount {
    let mut running = send_amount.as_f64();
    for leg in legs {
        running = match &leg.kind {
            EdgeKind::Dex(attrs) => {
                if attrs.top_ask > 0.0 {
                    running * attrs.top_ask * (1.0 - attrs.spread)
                } else {
                    running
                }
            }
            EdgeKind::AnchorBridge(attrs) => {
                let after_fixed = (running - attrs.fee_fixed).max(0.0);
                after_fixed * (1.0 - attrs.fee_percent / 100.0)
            }
            EdgeKind::XlmHub(_) => running * 0.98,
        };
        running = running.max(0.0);
    }
    Amount::from_f64(running)
}

fn route_id(path: &[AssetKey], amount: Amount, mode: QueryMode) -> String {
    let mut hasher = DefaultHasher::new();
    for key in path {
        key.to_string().hash(&mut hasher);
    }
    amount.to_string().hash(&mut hasher);
    (mode == QueryMode::Send).hash(&mut hasher);
    format!("route_{:016x}", hasher.finish())
}

fn mean_ask_depth(legs: &[LegDetail]) -> Option<f64> {
    let depths: Vec<f64> = legs
        .iter()
        .filter_map(|l| match &l.kind {
            EdgeKind::Dex(attrs) => Some(attrs.ask_depth),
            _ => None,
        })
        .collect();
    if depths.is_empty() {
        None
    } else {
        Some(depths.iter().sum::<f64>() / depths.len() as f64)
    }
}

fn liquidity_subscore(legs: &[LegDetail]) -> f64 {
    let edge_types: Vec<EdgeType> = legs.iter().map(|l| l.edge_type).collect();
    let has_dex = edge_types.iter().any(|t| *t == EdgeType::Dex);
    let has_only_hub = !edge_types.is_empty() && edge_types.iter().all(|t| *t == EdgeType::XlmHub);
    let has_only_bridge =
        !edge_types.is_empty() && edge_types.iter().all(|t| *t == EdgeType::AnchorBridge);

    if has_dex {
        match mean_ask_depth(legs) {
            Some(depth) => (depth / 1000.0).min(1.0),
            None => 0.0,
        }
    } else if has_only_hub {
        0.2
    } else if has_only_bridge {
        0.3
    } else {
        0.0
    }
}

fn reliability_subscore(legs: &[LegDetail]) -> f64 {
    let healths: Vec<f64> = legs
        .iter()
        .filter_map(|l| match &l.kind {
            EdgeKind::AnchorBridge(attrs) => Some(attrs.anchor_health),
            _ => None,
        })
        .collect();
    if healths.is_empty() {
        1.0
    } else {
        healths.iter().sum::<f64>() / healths.len() as f64
    }
}

fn hops_subscore(hops: usize) -> f64 {
    (1.0 - (hops.saturating_sub(1)) as f64 * 0.25).max(0.0)
}

fn weight_subscore(total_weight: f64) -> f64 {
    (1.0 - total_weight / 5.0).max(0.0)
}

fn post_enrichment_score(
    candidate: &Candidate,
    receive_amount: Amount,
    best_receive_amount: Amount,
) -> ScoreBreakdown {
    let weight = weight_subscore(candidate.total_weight);
    let hops = hops_subscore(candidate.legs.len());
    let liquidity = liquidity_subscore(&candidate.legs);
    let reliability = reliability_subscore(&candidate.legs);
    let amount = if best_receive_amount.is_positive() {
        (receive_amount.as_f64() / best_receive_amount.as_f64()).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let composite =
        (0.40 * amount + 0.15 * weight + 0.15 * hops + 0.15 * liquidity + 0.15 * reliability)
            .clamp(0.0, 1.0);
    ScoreBreakdown {
        composite,
        amount,
        weight,
        hops,
        liquidity,
        reliability,
    }
}

/// Whether a candidate's legs are entirely DEX and/or XLM-Hub (no anchor
/// bridge legs): the "pure market route" category from the enrichment spec.
fn is_pure_market(legs: &[LegDetail]) -> bool {
    legs.iter()
        .all(|l| matches!(l.edge_type, EdgeType::Dex | EdgeType::XlmHub))
}

/// Split legs into alternating market and bridge segments, each a
/// contiguous run of the same category.
fn segment_legs(legs: &[LegDetail]) -> Vec<(bool, Vec<&LegDetail>)> {
    let mut segments: Vec<(bool, Vec<&LegDetail>)> = Vec::new();
    for leg in legs {
        let is_market = matches!(leg.edge_type, EdgeType::Dex | EdgeType::XlmHub);
        match segments.last_mut() {
            Some((last_is_market, group)) if *last_is_market == is_market => group.push(leg),
            _ => segments.push((is_market, vec![leg])),
        }
    }
    segments
}

async fn enrich_candidate(
    horizon: &dyn HorizonGateway,
    timeout: Duration,
    candidate: &mut Candidate,
    send_amount: Amount,
) {
    if is_pure_market(&candidate.legs) {
        let dest = candidate.path.last().cloned().unwrap();
        let query = tokio::time::timeout(
            timeout,
            horizon.find_strict_send_paths(&candidate.path[0], send_amount, &[dest]),
        )
        .await;
        if let Ok(Ok(records)) = query {
            let intermediates: Vec<AssetKey> =
                candidate.path[1..candidate.path.len() - 1].to_vec();
            for record in records {
                let record_intermediates: Vec<AssetKey> =
                    record.path.iter().map(|p| p.as_key()).collect();
                if record_intermediates == intermediates {
                    candidate.horizon_receive = Some(record.destination_amount);
                    candidate.price_source = PriceSource::Horizon;
                    return;
                }
            }
        }
        return;
    }

    // Mixed route: price each market segment via its own strict-send
    // query and apply bridge-fee deductions for each bridge segment.
    let mut running = send_amount;
    let mut cursor = 0usize;
    let mut segmented_ok = true;

    for (is_market, group) in segment_legs(&candidate.legs) {
        let span = group.len();
        let segment_nodes = &candidate.path[cursor..=cursor + span];
        cursor += span;

        if is_market {
            let dest = segment_nodes.last().cloned().unwrap();
            let result = tokio::time::timeout(
                timeout,
                horizon.find_strict_send_paths(&segment_nodes[0], running, &[dest]),
            )
            .await;
            match result {
                Ok(Ok(records)) if !records.is_empty() => {
                    running = records
                        .iter()
                        .map(|r| r.destination_amount)
                        .max_by(|a, b| a.cmp(b))
                        .unwrap();
                }
                _ => {
                    segmented_ok = false;
                    break;
                }
            }
        } else {
            for leg in group {
                if let EdgeKind::AnchorBridge(attrs) = &leg.kind {
                    let after_fixed =
                        Amount::from_f64((running.as_f64() - attrs.fee_fixed).max(0.0));
                    running = Amount::from_f64(
                        after_fixed.as_f64() * (1.0 - attrs.fee_percent / 100.0),
                    );
                }
            }
        }
    }

    if segmented_ok {
        candidate.horizon_receive = Some(running);
        candidate.price_source = PriceSource::Horizon;
    }
}

/// Apply fallback estimation for routes that couldn't be segment-validated,
/// using the best validated pure-market route as a reference.
fn apply_fallback_estimate(
    candidates: &mut [Candidate],
    base_weight: Option<f64>,
    best_validated_receive: Option<Amount>,
) {
    for candidate in candidates.iter_mut() {
        if candidate.horizon_receive.is_some() {
            continue;
        }
        let Some(best_receive) = best_validated_receive else {
            continue;
        };
        let Some(base_weight) = base_weight else {
            continue;
        };
        let mut estimate = best_receive.as_f64();
        for leg in &candidate.legs {
            if let EdgeKind::AnchorBridge(attrs) = &leg.kind {
                estimate = (estimate - attrs.fee_fixed).max(0.0);
                estimate *= 1.0 - attrs.fee_percent / 100.0;
            }
        }
        let penalty = 1.0 / (1.0 + (candidate.total_weight - base_weight) * 0.3);
        candidate.horizon_receive = Some(Amount::from_f64((estimate * penalty).max(0.0)));
        candidate.price_source = PriceSource::Estimated;
    }
}

fn apply_unverified_estimate(candidates: &mut [Candidate], best_enriched: Option<Amount>) {
    for candidate in candidates.iter_mut() {
        if candidate.horizon_receive.is_some() {
            continue;
        }
        // No Horizon-validated reference exists anywhere in this candidate
        // set (every enrichment attempt failed) — fall back to the
        // candidate's own graph-weight estimate rather than a borrowed
        // reference, still tagged `Unverified` since nothing here was
        // confirmed against Horizon.
        let Some(best) = best_enriched else {
            candidate.horizon_receive = Some(candidate.estimated_receive);
            candidate.price_source = PriceSource::Unverified;
            continue;
        };
        let weight_ratio = if best.is_positive() {
            candidate.estimated_receive.as_f64() / best.as_f64()
        } else {
            1.0
        };
        let penalty = 0.85 * (1.0 / (1.0 + (weight_ratio - 1.0).max(0.0) * 0.5));
        candidate.horizon_receive = Some(Amount::from_f64(
            (best.as_f64() * penalty).max(0.0),
        ));
        candidate.price_source = PriceSource::Unverified;
    }
}

/// Wait for the graph to reach a usable version, polling up to
/// `grace_period`. Returns `Err(NoRoute)` if it never becomes ready.
async fn wait_for_ready_graph(
    graph: &RouteGraph,
    grace_period: Duration,
) -> Result<std::sync::Arc<GraphInner>, EngineError> {
    let deadline = Instant::now() + grace_period;
    loop {
        let snapshot = graph.snapshot().await;
        if snapshot.version > 0 {
            return Ok(snapshot);
        }
        if Instant::now() >= deadline {
            return Err(EngineError::NoRoute(
                "graph has not completed an initial build".into(),
            ));
        }
        sleep(Duration::from_millis(200)).await;
    }
}

/// Resolve a query into ranked route manifests, recording query volume,
/// latency, and error metrics around the resolve itself.
pub async fn find_routes(
    graph: &RouteGraph,
    horizon: &dyn HorizonGateway,
    config: &ResolverConfig,
    query: &RouteQuery,
) -> Result<ResolveResponse, EngineError> {
    let mode = match query.mode {
        QueryMode::Send => "send",
        QueryMode::Receive => "receive",
    };
    let started = Instant::now();

    let result = find_routes_inner(graph, horizon, config, query).await;

    let seconds = started.elapsed().as_secs_f64();
    match &result {
        Ok(response) => {
            let outcome = if response.routes.is_empty() {
                "no_route"
            } else {
                "ok"
            };
            crate::metrics::record_query(mode, outcome, seconds);
        }
        Err(err) => {
            crate::metrics::record_query(mode, "error", seconds);
            crate::metrics::record_error(error_code(err));
        }
    }
    result
}

fn error_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::BadRequest(_) => "bad_request",
        EngineError::NotFound(_) => "not_found",
        EngineError::NoRoute(_) => "no_route",
        EngineError::UpstreamUnavailable(_) => "upstream_unavailable",
        EngineError::BuildInProgress => "build_in_progress",
        EngineError::Internal(_) => "internal",
    }
}

/// Resolve a query into ranked route manifests. `amount_input` is the raw
/// input string, used only to build the cache key.
async fn find_routes_inner(
    graph: &RouteGraph,
    horizon: &dyn HorizonGateway,
    config: &ResolverConfig,
    query: &RouteQuery,
) -> Result<ResolveResponse, EngineError> {
    let started = Instant::now();

    if query.source == query.destination {
        return Err(EngineError::BadRequest(
            "source and destination must differ".into(),
        ));
    }
    if !query.amount.is_positive() {
        return Err(EngineError::BadRequest("amount must be positive".into()));
    }

    let snapshot = wait_for_ready_graph(graph, config.build_ready_grace_period).await?;

    if !snapshot.has_node(&query.source) || !snapshot.has_node(&query.destination) {
        return Err(EngineError::NoRoute(
            "no active trading relationships".into(),
        ));
    }

    let max_hops = query.max_hops.unwrap_or(config.default_max_hops);
    let max_routes = query.max_routes.unwrap_or(config.default_max_routes);

    let found_paths = k_shortest_paths(&snapshot, &query.source, &query.destination, max_routes, max_hops);

    let (mut candidates, strategy) = if found_paths.is_empty() {
        let fallback = horizon_fallback(horizon, config, query, &snapshot).await?;
        if fallback.is_empty() {
            return Err(EngineError::NoRoute(
                "no graph path and no Horizon fallback path found".into(),
            ));
        }
        (fallback, Strategy::HorizonFallback)
    } else {
        let mut candidates = Vec::new();
        for found in found_paths {
            let Some(legs) = walk_legs(&snapshot, &found.nodes) else {
                continue;
            };
            let estimated_receive = estimate_without_horizon(&legs, query.amount);
            candidates.push(Candidate {
                path: found.nodes,
                legs,
                total_weight: found.total_weight,
                estimated_receive,
                horizon_receive: None,
                price_source: PriceSource::Estimated,
            });
        }
        (candidates, Strategy::Graph)
    };

    if strategy == Strategy::Graph {
        for candidate in candidates.iter_mut() {
            enrich_candidate(horizon, config.strict_send_timeout, candidate, query.amount).await;
        }

        let best_pure_market = candidates
            .iter()
            .filter(|c| is_pure_market(&c.legs) && c.price_source == PriceSource::Horizon)
            .filter_map(|c| c.horizon_receive.map(|r| (r, c.total_weight)))
            .max_by(|a, b| a.0.cmp(&b.0));
        let base_weight = best_pure_market.map(|(_, w)| w);
        let best_validated_receive = best_pure_market.map(|(r, _)| r);

        apply_fallback_estimate(&mut candidates, base_weight, best_validated_receive);

        let best_enriched = candidates
            .iter()
            .filter_map(|c| c.horizon_receive)
            .max_by(|a, b| a.cmp(b));
        apply_unverified_estimate(&mut candidates, best_enriched);
    }

    let best_receive_amount = candidates
        .iter()
        .map(|c| c.horizon_receive.unwrap_or(c.estimated_receive))
        .max_by(|a, b| a.cmp(b))
        .unwrap_or(Amount::ZERO);

    let mut manifests: Vec<RouteManifest> = candidates
        .into_iter()
        .map(|candidate| {
            let receive_amount = candidate.horizon_receive.unwrap_or(candidate.estimated_receive);
            let score = if strategy == Strategy::Graph {
                post_enrichment_score(&candidate, receive_amount, best_receive_amount)
            } else {
                ScoreBreakdown {
                    composite: 0.8,
                    amount: 0.0,
                    weight: 0.0,
                    hops: 0.0,
                    liquidity: 0.0,
                    reliability: 0.0,
                }
            };
            let edge_types: Vec<EdgeType> = {
                let mut seen = Vec::new();
                for leg in &candidate.legs {
                    if !seen.contains(&leg.edge_type) {
                        seen.push(leg.edge_type);
                    }
                }
                seen
            };
            RouteManifest {
                id: route_id(&candidate.path, query.amount, query.mode),
                source: query.source.clone(),
                destination: query.destination.clone(),
                send_amount: query.amount.to_string(),
                receive_amount: receive_amount.to_string(),
                hops: candidate.legs.len(),
                path: candidate.path,
                legs: candidate.legs,
                total_weight: candidate.total_weight,
                edge_types,
                score,
                graph_version: snapshot.version,
                computed_at: Utc::now(),
                ttl_seconds: 30,
                price_source: candidate.price_source,
            }
        })
        .collect();

    manifests.sort_by(|a, b| b.score.composite.total_cmp(&a.score.composite));
    manifests.truncate(max_routes);

    let compute_time_ms = started.elapsed().as_millis();
    let stats = snapshot.stats();

    Ok(ResolveResponse {
        meta: ResolveMeta {
            source: query.source.clone(),
            destination: query.destination.clone(),
            amount: query.amount.to_string(),
            mode: query.mode,
            route_count: manifests.len(),
            strategy,
            graph_version: snapshot.version,
            node_count: stats.node_count,
            edge_count: stats.edge_count,
            compute_time_ms,
            cached: false,
            cache_source: None,
        },
        routes: manifests,
    })
}

async fn horizon_fallback(
    horizon: &dyn HorizonGateway,
    config: &ResolverConfig,
    query: &RouteQuery,
    snapshot: &GraphInner,
) -> Result<Vec<Candidate>, EngineError> {
    let _ = snapshot;
    let result = tokio::time::timeout(
        config.strict_send_timeout,
        horizon.find_strict_send_paths(&query.source, query.amount, &[query.destination.clone()]),
    )
    .await;

    let records = match result {
        Ok(Ok(records)) => records,
        _ => return Ok(vec![]),
    };

    let max_routes = query.max_routes.unwrap_or(config.default_max_routes);
    let mut candidates = Vec::new();
    for record in records.into_iter().take(max_routes) {
        let mut path = vec![query.source.clone()];
        path.extend(record.path.iter().map(|p| p.as_key()));
        path.push(query.destination.clone());
        candidates.push(Candidate {
            path,
            legs: vec![],
            total_weight: 0.0,
            estimated_receive: record.destination_amount,
            horizon_receive: Some(record.destination_amount),
            price_source: PriceSource::Horizon,
        });
    }
    Ok(candidates)
}
