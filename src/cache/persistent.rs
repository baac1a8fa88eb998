//! Persistent cache layer: Postgres-backed, longer TTL than the in-memory
//! layer, consulted only on a memory miss (layer 2 of the two-tier route
//! cache).

use std::time::Duration;

use chrono::Utc;
use eyre::{Result, WrapErr};
use sqlx::PgPool;
use tracing::warn;

use crate::db::{self, NewRouteCacheRow};
use crate::resolver::ResolveResponse;

pub struct PersistentCache {
    pool: PgPool,
    ttl: Duration,
}

impl PersistentCache {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// `None` both when the key is absent and when the stored row has
    /// already expired — the caller doesn't need to tell the two apart.
    pub async fn get(&self, key: &str) -> Result<Option<ResolveResponse>> {
        let Some(row) = db::get_cache_row(&self.pool, key).await? else {
            return Ok(None);
        };
        if row.expires_at <= Utc::now() {
            return Ok(None);
        }
        let response = serde_json::from_str(&row.routes_json)
            .wrap_err("corrupt route_cache row failed to deserialize")?;
        Ok(Some(response))
    }

    pub async fn put(
        &self,
        key: &str,
        source_asset: &str,
        dest_asset: &str,
        source_amount: &str,
        response: &ResolveResponse,
    ) -> Result<()> {
        let routes_json =
            serde_json::to_string(response).wrap_err("failed to serialize route response")?;
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::seconds(120));
        let row = NewRouteCacheRow {
            cache_key: key.to_string(),
            source_asset: source_asset.to_string(),
            dest_asset: dest_asset.to_string(),
            source_amount: source_amount.to_string(),
            routes_json,
            expires_at: Utc::now() + ttl,
        };
        db::upsert_cache_row(&self.pool, &row).await
    }

    pub async fn clear(&self) -> Result<()> {
        db::clear_cache(&self.pool).await
    }

    /// Delete rows past their expiry. The caller is expected to run this
    /// on a fixed schedule; a failure here is logged and swallowed since a
    /// missed sweep just means stale rows linger one cycle longer.
    pub async fn sweep_expired(&self) {
        match db::sweep_expired(&self.pool).await {
            Ok(deleted) if deleted > 0 => {
                tracing::debug!(deleted, "swept expired route_cache rows");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "route_cache sweep failed"),
        }
    }
}
