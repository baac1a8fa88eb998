#![allow(dead_code)]

//! Persistent layer: one table, `route_cache`, owned exclusively by the
//! cache's persistent tier (§4.6, §6).

use chrono::Utc;
use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod models;

pub use models::*;

/// Create a database connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

/// Look up one cache row by key, regardless of expiry — the caller decides
/// what to do with a stale row.
pub async fn get_cache_row(pool: &PgPool, cache_key: &str) -> Result<Option<RouteCacheRow>> {
    let row = sqlx::query_as::<_, RouteCacheRow>(
        r#"SELECT cache_key, source_asset, dest_asset, source_amount, routes_json,
                  computed_at, expires_at
           FROM route_cache WHERE cache_key = $1"#,
    )
    .bind(cache_key)
    .fetch_optional(pool)
    .await
    .wrap_err("Failed to read route_cache row")?;

    Ok(row)
}

/// Upsert a cache row, resetting `computed_at` to now.
pub async fn upsert_cache_row(pool: &PgPool, row: &NewRouteCacheRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_cache (cache_key, source_asset, dest_asset, source_amount,
            routes_json, computed_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6)
        ON CONFLICT (cache_key) DO UPDATE SET
            source_asset = EXCLUDED.source_asset,
            dest_asset = EXCLUDED.dest_asset,
            source_amount = EXCLUDED.source_amount,
            routes_json = EXCLUDED.routes_json,
            computed_at = NOW(),
            expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(&row.cache_key)
    .bind(&row.source_asset)
    .bind(&row.dest_asset)
    .bind(&row.source_amount)
    .bind(&row.routes_json)
    .bind(row.expires_at)
    .execute(pool)
    .await
    .wrap_err("Failed to upsert route_cache row")?;

    Ok(())
}

/// Delete every row — used on graph rebuild to invalidate the persistent
/// tier alongside the in-memory one.
pub async fn clear_cache(pool: &PgPool) -> Result<()> {
    sqlx::query("DELETE FROM route_cache")
        .execute(pool)
        .await
        .wrap_err("Failed to clear route_cache")?;
    Ok(())
}

/// Delete rows past their expiry. Run periodically by the cache's sweep
/// task.
pub async fn sweep_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM route_cache WHERE expires_at <= $1")
        .bind(Utc::now())
        .execute(pool)
        .await
        .wrap_err("Failed to sweep expired route_cache rows")?;
    Ok(result.rows_affected())
}
