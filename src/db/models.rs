#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One row of the persistent `route_cache` table (§4.6, §6). `routes_json`
/// is the opaque serialized `ResolveResponse`; only the cache owns this
/// table.
#[derive(Debug, Clone, FromRow)]
pub struct RouteCacheRow {
    pub cache_key: String,
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: String,
    pub routes_json: String,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Fields needed to insert or replace a cache row.
#[derive(Debug, Clone)]
pub struct NewRouteCacheRow {
    pub cache_key: String,
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: String,
    pub routes_json: String,
    pub expires_at: DateTime<Utc>,
}
