//! Single core entry point: the cache-aware query surface that sits in
//! front of the resolver. Not exposed over HTTP (out of scope); callers
//! invoke [`handle_query`] directly, the way the teacher's watchers call
//! into their chain clients in-process.

use crate::cache::{CacheLookup, CacheSource, RouteCache};
use crate::errors::EngineError;
use crate::gateway::HorizonGateway;
use crate::graph::RouteGraph;
use crate::resolver::{self, ResolveResponse, ResolverConfig, RouteQuery};
use crate::types::{AssetKey, Amount, QueryMode};

/// Raw, string-shaped query input matching the wire contract.
pub struct QueryInput {
    pub source_code: String,
    pub source_issuer: Option<String>,
    pub dest_code: String,
    pub dest_issuer: Option<String>,
    pub amount: String,
    pub mode: QueryMode,
    pub max_hops: Option<u8>,
    pub max_routes: Option<usize>,
    pub no_cache: bool,
}

fn cache_source_label(source: CacheSource) -> &'static str {
    match source {
        CacheSource::Memory => "memory",
        CacheSource::Persistent => "persistent",
    }
}

/// Resolve a query, consulting the route cache before falling back to a
/// live resolve. A cache hit is stamped with `meta.cached`/`meta.cache_source`
/// before it's handed back; a miss is written into both cache layers once
/// computed so the next identical query within the cache window is free.
pub async fn handle_query(
    graph: &RouteGraph,
    horizon: &dyn HorizonGateway,
    cache: &RouteCache,
    resolver_config: &ResolverConfig,
    input: QueryInput,
) -> Result<ResolveResponse, EngineError> {
    let source = AssetKey::new(&input.source_code, input.source_issuer.as_deref());
    let destination = AssetKey::new(&input.dest_code, input.dest_issuer.as_deref());
    let amount = Amount::parse(&input.amount)
        .map_err(|e| EngineError::BadRequest(format!("invalid amount: {e}")))?;

    let query = RouteQuery {
        source,
        destination,
        amount,
        mode: input.mode,
        max_hops: input.max_hops,
        max_routes: input.max_routes,
        no_cache: input.no_cache,
    };

    let graph_version = graph.version().await;
    let cache_key = query.cache_key(&input.amount);

    if !query.no_cache {
        if let CacheLookup::Hit(mut response, source) = cache.get(&cache_key, graph_version).await {
            response.meta.cached = true;
            response.meta.cache_source = Some(cache_source_label(source).to_string());
            return Ok(response);
        }
    }

    let snapshot_before = graph.version().await;
    let response = resolver::find_routes(graph, horizon, resolver_config, &query).await?;

    if !query.no_cache {
        cache
            .put(
                &cache_key,
                &query.source.to_string(),
                &query.destination.to_string(),
                &input.amount,
                &response,
                snapshot_before.max(response.meta.graph_version),
            )
            .await;
    }

    Ok(response)
}
