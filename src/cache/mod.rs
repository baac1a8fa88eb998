#![allow(dead_code)]

//! Two-tier route cache: a fast in-memory LRU in front of a Postgres-backed
//! persistent layer, used to skip pathfinding and Horizon round-trips for
//! repeated queries between scheduled graph rebuilds.

pub mod memory;
pub mod persistent;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

pub use memory::MemoryCache;
pub use persistent::PersistentCache;

use crate::metrics;
use crate::resolver::ResolveResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Persistent,
}

pub enum CacheLookup {
    Hit(ResolveResponse, CacheSource),
    Miss,
}

pub struct RouteCache {
    memory: Mutex<MemoryCache>,
    persistent: PersistentCache,
}

impl RouteCache {
    pub fn new(
        pool: PgPool,
        memory_capacity: usize,
        memory_ttl: Duration,
        persistent_ttl: Duration,
    ) -> Self {
        Self {
            memory: Mutex::new(MemoryCache::new(memory_capacity, memory_ttl)),
            persistent: PersistentCache::new(pool, persistent_ttl),
        }
    }

    /// Look up `key` against the memory layer first, then the persistent
    /// layer. A persistent hit is promoted into the memory layer pinned to
    /// `graph_version` so the next lookup for the same key is a memory hit.
    pub async fn get(&self, key: &str, graph_version: u64) -> CacheLookup {
        if let Some(response) = self.memory.lock().await.get(key, graph_version) {
            metrics::record_cache_lookup("memory", "hit");
            return CacheLookup::Hit(response, CacheSource::Memory);
        }
        metrics::record_cache_lookup("memory", "miss");

        match self.persistent.get(key).await {
            Ok(Some(response)) => {
                metrics::record_cache_lookup("persistent", "hit");
                self.memory
                    .lock()
                    .await
                    .put(key.to_string(), response.clone(), graph_version);
                metrics::set_cache_entries("memory", self.memory.lock().await.len());
                CacheLookup::Hit(response, CacheSource::Persistent)
            }
            Ok(None) => {
                metrics::record_cache_lookup("persistent", "miss");
                CacheLookup::Miss
            }
            Err(e) => {
                warn!(error = %e, "route_cache persistent lookup failed, treating as miss");
                metrics::record_cache_lookup("persistent", "miss");
                CacheLookup::Miss
            }
        }
    }

    /// Write a freshly computed response into both layers.
    pub async fn put(
        &self,
        key: &str,
        source_asset: &str,
        dest_asset: &str,
        source_amount: &str,
        response: &ResolveResponse,
        graph_version: u64,
    ) {
        self.memory
            .lock()
            .await
            .put(key.to_string(), response.clone(), graph_version);
        metrics::set_cache_entries("memory", self.memory.lock().await.len());

        if let Err(e) = self
            .persistent
            .put(key, source_asset, dest_asset, source_amount, response)
            .await
        {
            warn!(error = %e, "route_cache persistent write failed");
        }
    }

    /// Drop every entry in both layers. Called whenever a full rebuild
    /// bumps the graph version, since every cached route was computed
    /// against an older snapshot.
    pub async fn invalidate_all(&self) {
        self.memory.lock().await.clear();
        metrics::set_cache_entries("memory", 0);
        if let Err(e) = self.persistent.clear().await {
            warn!(error = %e, "failed to clear persistent route_cache on invalidation");
        }
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Spawn the background sweep loop that deletes expired persistent rows
    /// on a fixed interval, stopping when `shutdown` fires.
    pub fn spawn_sweep_task(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: mpsc::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; consume it so the sweep runs on
            // `interval`, not at startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("route_cache sweep task stopping");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.persistent.sweep_expired().await;
                    }
                }
            }
        })
    }
}
