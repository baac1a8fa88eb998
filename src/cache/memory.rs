//! In-memory cache layer: capacity-bounded, TTL'd, and pinned to the graph
//! version each entry was computed against (layer 1 of the two-tier route
//! cache). Modeled on the bounded-capacity pattern used for pending-tx
//! tracking elsewhere in this codebase's ancestry, extended with a real
//! least-recently-used eviction order since a stale-but-popular key should
//! survive capacity pressure longer than one nobody has touched.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::resolver::ResolveResponse;

struct MemoryEntry {
    response: ResolveResponse,
    graph_version: u64,
    inserted_at: Instant,
    last_used: Instant,
}

pub struct MemoryCache {
    entries: HashMap<String, MemoryEntry>,
    capacity: usize,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            ttl,
        }
    }

    /// A hit requires the entry to exist, be within its TTL, and be pinned
    /// to `current_version`. Anything else is a miss, and a present but
    /// stale or expired entry is evicted immediately.
    pub fn get(&mut self, key: &str, current_version: u64) -> Option<ResolveResponse> {
        let fresh = match self.entries.get(key) {
            Some(entry) => {
                entry.inserted_at.elapsed() < self.ttl && entry.graph_version == current_version
            }
            None => return None,
        };
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key).expect("checked above");
        entry.last_used = Instant::now();
        Some(entry.response.clone())
    }

    pub fn put(&mut self, key: String, response: ResolveResponse, graph_version: u64) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
        while self.entries.len() >= self.capacity {
            let Some(lru_key) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.entries.remove(&lru_key);
        }
        self.entries.insert(
            key,
            MemoryEntry {
                response,
                graph_version,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    /// Drop every entry, regardless of TTL or version. Called on graph
    /// version bumps.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveMeta;
    use crate::types::{AssetKey, QueryMode, Strategy};

    fn sample_response() -> ResolveResponse {
        ResolveResponse {
            routes: vec![],
            meta: ResolveMeta {
                source: AssetKey::new("XLM", None),
                destination: AssetKey::new("USDC", None),
                amount: "100".into(),
                mode: QueryMode::Send,
                route_count: 0,
                strategy: Strategy::Graph,
                graph_version: 1,
                node_count: 0,
                edge_count: 0,
                compute_time_ms: 0,
                cached: false,
                cache_source: None,
            },
        }
    }

    #[test]
    fn hit_requires_matching_version() {
        let mut cache = MemoryCache::new(10, Duration::from_secs(30));
        cache.put("k1".into(), sample_response(), 1);
        assert!(cache.get("k1", 1).is_some());
        assert!(cache.get("k1", 2).is_none());
        // stale entry was evicted by the failed lookup
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let mut cache = MemoryCache::new(10, Duration::from_millis(1));
        cache.put("k1".into(), sample_response(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1", 1).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut cache = MemoryCache::new(2, Duration::from_secs(30));
        cache.put("a".into(), sample_response(), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.put("b".into(), sample_response(), 1);
        std::thread::sleep(Duration::from_millis(2));
        // touch "a" so "b" becomes the least recently used
        assert!(cache.get("a", 1).is_some());
        std::thread::sleep(Duration::from_millis(2));
        cache.put("c".into(), sample_response(), 1);
        assert!(cache.get("b", 1).is_none());
        assert!(cache.get("a", 1).is_some());
        assert!(cache.get("c", 1).is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = MemoryCache::new(10, Duration::from_secs(30));
        cache.put("a".into(), sample_response(), 1);
        cache.put("b".into(), sample_response(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
