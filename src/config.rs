#![allow(dead_code)]

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Root configuration for the route engine.
#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub horizon: HorizonConfig,
    pub graph: GraphConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub resolver: ResolverConfig,
    /// Informational only; never used for signing or submission.
    pub network_passphrase: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("horizon", &self.horizon)
            .field("graph", &self.graph)
            .field("cache", &self.cache)
            .field("scheduler", &self.scheduler)
            .field("resolver", &self.resolver)
            .field("network_passphrase", &self.network_passphrase)
            .finish()
    }
}

/// Database configuration for the persistent route-cache layer.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Custom Debug that redacts the database URL (may contain credentials).
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HorizonConfig {
    pub base_url: String,
    pub orderbook_timeout: Duration,
    pub strict_send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub max_hops: u8,
    pub orderbook_min_depth: f64,
    pub skip_dex_discovery: bool,
    pub orderbook_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub memory_capacity: usize,
    pub memory_ttl: Duration,
    pub persistent_ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub initial_build_delay: Duration,
    pub light_refresh_interval: Duration,
    pub full_rebuild_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_routes_per_dest: usize,
    pub max_routes_global: usize,
    pub build_ready_grace_period: Duration,
}

impl Config {
    /// Build the resolver's own config shape, pulling `max_hops` from
    /// `graph` and the STRICT_SEND bound from `horizon` since both live in
    /// differently-shaped config sections than the resolver itself uses.
    pub fn resolver_config(&self) -> crate::resolver::ResolverConfig {
        crate::resolver::ResolverConfig {
            default_max_hops: self.graph.max_hops,
            default_max_routes: self.resolver.max_routes_per_dest,
            build_ready_grace_period: self.resolver.build_ready_grace_period,
            strict_send_timeout: self.horizon.strict_send_timeout,
        }
    }
}

fn default_max_hops() -> u8 {
    4
}

fn default_max_routes_per_dest() -> usize {
    5
}

fn default_max_routes_global() -> usize {
    20
}

fn default_orderbook_min_depth() -> f64 {
    0.01
}

fn default_orderbook_concurrency() -> usize {
    3
}

fn default_memory_capacity() -> usize {
    500
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads a `.env` file if present, then reads from the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific `.env` file path.
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| eyre!("DATABASE_URL environment variable is required"))?,
        };

        let horizon = HorizonConfig {
            base_url: env::var("HORIZON_BASE_URL")
                .unwrap_or_else(|_| "https://horizon.stellar.org".to_string()),
            orderbook_timeout: Duration::from_secs(
                env::var("HORIZON_ORDERBOOK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8),
            ),
            strict_send_timeout: Duration::from_secs(
                env::var("HORIZON_STRICT_SEND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        };

        let graph = GraphConfig {
            max_hops: env::var("MAX_HOPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_hops),
            orderbook_min_depth: env::var("ORDERBOOK_MIN_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_orderbook_min_depth),
            skip_dex_discovery: env::var("SKIP_DEX_DISCOVERY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            orderbook_concurrency: env::var("ORDERBOOK_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_orderbook_concurrency),
        };

        let cache = CacheConfig {
            memory_capacity: env::var("CACHE_MEMORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_memory_capacity),
            memory_ttl: Duration::from_secs(
                env::var("CACHE_MEMORY_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            persistent_ttl: Duration::from_secs(
                env::var("CACHE_PERSISTENT_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
            sweep_interval: Duration::from_secs(
                env::var("CACHE_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        };

        let scheduler = SchedulerConfig {
            initial_build_delay: Duration::from_secs(
                env::var("SCHEDULER_INITIAL_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
            ),
            light_refresh_interval: Duration::from_secs(
                env::var("SCHEDULER_LIGHT_REFRESH_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5 * 60),
            ),
            full_rebuild_interval: Duration::from_secs(
                env::var("SCHEDULER_FULL_REBUILD_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30 * 60),
            ),
        };

        let resolver = ResolverConfig {
            max_routes_per_dest: env::var("MAX_ROUTES_PER_DEST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_routes_per_dest),
            max_routes_global: env::var("MAX_ROUTES_GLOBAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_routes_global),
            build_ready_grace_period: Duration::from_secs(
                env::var("BUILD_READY_GRACE_PERIOD_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(40),
            ),
        };

        let network_passphrase = env::var("NETWORK_PASSPHRASE")
            .unwrap_or_else(|_| "Public Global Stellar Network ; September 2015".to_string());

        let config = Config {
            database,
            horizon,
            graph,
            cache,
            scheduler,
            resolver,
            network_passphrase,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(eyre!("database.url cannot be empty"));
        }
        if self.horizon.base_url.is_empty() {
            return Err(eyre!("horizon.base_url cannot be empty"));
        }
        if self.graph.max_hops == 0 {
            return Err(eyre!("graph.max_hops must be at least 1"));
        }
        if self.resolver.max_routes_per_dest == 0 {
            return Err(eyre!("resolver.max_routes_per_dest must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            "DATABASE_URL",
            "HORIZON_BASE_URL",
            "MAX_HOPS",
            "MAX_ROUTES_GLOBAL",
            "CACHE_MEMORY_CAPACITY",
        ] {
            // SAFETY: tests run single-threaded within this module via cargo's
            // default test harness process isolation is not guaranteed across
            // modules, but these vars are unique to this suite.
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn load_from_env_requires_database_url() {
        clear_env();
        let result = Config::load_from_env();
        assert!(result.is_err());
    }

    #[test]
    fn load_from_env_applies_defaults() {
        clear_env();
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/test");
        }
        let config = Config::load_from_env().unwrap();
        assert_eq!(config.graph.max_hops, 4);
        assert_eq!(config.resolver.max_routes_global, 20);
        assert_eq!(config.cache.memory_capacity, 500);
        clear_env();
    }

    #[test]
    fn load_from_env_rejects_zero_max_hops() {
        clear_env();
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/test");
            env::set_var("MAX_HOPS", "0");
        }
        assert!(Config::load_from_env().is_err());
        clear_env();
    }
}
