//! Prometheus metrics for the route engine.
//!
//! Exposed on `/metrics` for scraping; `/health` is served from the same
//! listener (§5, §9: "exposing /health and /metrics only — not the routing
//! query surface itself").

#![allow(dead_code)]

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

lazy_static! {
    // Query volume
    pub static ref QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "route_engine_queries_total",
        "Total number of route resolution queries",
        &["mode", "outcome"]
    ).unwrap();

    pub static ref QUERY_LATENCY: HistogramVec = register_histogram_vec!(
        "route_engine_query_latency_seconds",
        "End-to-end time to resolve a route query",
        &["mode"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    // Cache
    pub static ref CACHE_LOOKUPS: CounterVec = register_counter_vec!(
        "route_engine_cache_lookups_total",
        "Route cache lookups by layer and result",
        &["layer", "result"]
    ).unwrap();

    pub static ref CACHE_ENTRIES: GaugeVec = register_gauge_vec!(
        "route_engine_cache_entries",
        "Entries currently held by a cache layer",
        &["layer"]
    ).unwrap();

    // Graph build
    pub static ref BUILDS_TOTAL: CounterVec = register_counter_vec!(
        "route_engine_builds_total",
        "Graph builds by kind and outcome",
        &["kind", "outcome"]
    ).unwrap();

    pub static ref BUILD_DURATION: HistogramVec = register_histogram_vec!(
        "route_engine_build_duration_seconds",
        "Time taken by a graph build",
        &["kind"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).unwrap();

    pub static ref GRAPH_VERSION: Gauge = register_gauge!(
        "route_engine_graph_version",
        "Current route graph version"
    ).unwrap();

    pub static ref GRAPH_NODES: Gauge = register_gauge!(
        "route_engine_graph_nodes",
        "Node count in the current route graph"
    ).unwrap();

    pub static ref GRAPH_EDGES: GaugeVec = register_gauge_vec!(
        "route_engine_graph_edges",
        "Edge count in the current route graph, by edge type",
        &["edge_type"]
    ).unwrap();

    // Errors
    pub static ref ERRORS: CounterVec = register_counter_vec!(
        "route_engine_errors_total",
        "Total number of errors",
        &["code"]
    ).unwrap();

    // Health
    pub static ref UP: Gauge = register_gauge!(
        "route_engine_up",
        "Whether the route engine process is up"
    ).unwrap();
}

/// Maximum concurrent connections to the metrics server.
const METRICS_MAX_CONNECTIONS: usize = 128;

/// Read timeout for incoming connections.
const METRICS_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the metrics HTTP server. Serves only `/metrics` and `/health`.
pub async fn start_metrics_server(addr: SocketAddr) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics server started");

    UP.set(1.0);

    let semaphore = Arc::new(Semaphore::new(METRICS_MAX_CONNECTIONS));

    loop {
        let (mut socket, _) = listener.accept().await?;
        let sem = semaphore.clone();

        tokio::spawn(async move {
            let _permit = match sem.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            let mut buf = [0u8; 4096];
            let n = match tokio::time::timeout(METRICS_READ_TIMEOUT, socket.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => n,
                _ => return,
            };

            let (method, path) = match parse_metrics_request(&buf[..n]) {
                Some(mp) => mp,
                None => {
                    let _ = socket
                        .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                        .await;
                    return;
                }
            };

            match (method.as_str(), path.as_str()) {
                ("GET", "/metrics") | ("GET", "/") => {
                    let encoder = TextEncoder::new();
                    let metric_families = prometheus::gather();
                    let mut buffer = Vec::new();
                    let _ = encoder.encode(&metric_families, &mut buffer);

                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n",
                        buffer.len()
                    );

                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.write_all(&buffer).await;
                }
                ("GET", "/health") => {
                    let response =
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK";
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                _ => {
                    let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            }
        });
    }
}

/// Parse HTTP method and path from raw request bytes.
fn parse_metrics_request(buf: &[u8]) -> Option<(String, String)> {
    let request = std::str::from_utf8(buf).ok()?;
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    Some((method, path))
}

/// Record a resolved query: `mode` is `"send"`/`"receive"`, `outcome` is
/// `"ok"`/`"no_route"`/`"error"`.
pub fn record_query(mode: &str, outcome: &str, seconds: f64) {
    QUERIES_TOTAL.with_label_values(&[mode, outcome]).inc();
    QUERY_LATENCY.with_label_values(&[mode]).observe(seconds);
}

/// Record a cache lookup: `layer` is `"memory"`/`"persistent"`, `result` is
/// `"hit"`/`"miss"`.
pub fn record_cache_lookup(layer: &str, result: &str) {
    CACHE_LOOKUPS.with_label_values(&[layer, result]).inc();
}

pub fn set_cache_entries(layer: &str, count: usize) {
    CACHE_ENTRIES.with_label_values(&[layer]).set(count as f64);
}

/// Record a completed build: `kind` is `"full"`/`"light"`, `outcome` is
/// `"ok"`/`"skipped"`/`"error"`.
pub fn record_build(kind: &str, outcome: &str, seconds: f64) {
    BUILDS_TOTAL.with_label_values(&[kind, outcome]).inc();
    if outcome == "ok" {
        BUILD_DURATION.with_label_values(&[kind]).observe(seconds);
    }
}

pub fn set_graph_stats(version: u64, node_count: usize, edges_by_type: &[(&str, usize)]) {
    GRAPH_VERSION.set(version as f64);
    GRAPH_NODES.set(node_count as f64);
    for (edge_type, count) in edges_by_type {
        GRAPH_EDGES.with_label_values(&[edge_type]).set(*count as f64);
    }
}

pub fn record_error(code: &str) {
    ERRORS.with_label_values(&[code]).inc();
}
