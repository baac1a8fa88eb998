#![allow(dead_code)]

//! Read views onto the asset and anchor catalogs. Both are external
//! collaborators per the spec (the crawler and the unified registry live
//! outside this core); here they are trait contracts with an in-memory
//! implementation for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;

use crate::types::{AssetKey, AssetSource};

/// One asset as known to the asset registry.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub key: AssetKey,
    pub domain: Option<String>,
    pub display_name: Option<String>,
    pub verified: bool,
    pub num_accounts: u64,
    pub source: AssetSource,
}

impl AssetRecord {
    pub fn new(key: AssetKey) -> Self {
        Self {
            key,
            domain: None,
            display_name: None,
            verified: false,
            num_accounts: 0,
            source: AssetSource::Network,
        }
    }
}

#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// All assets routable by this engine.
    async fn routable_assets(&self) -> Result<Vec<AssetRecord>>;

    /// Resolve a single asset, if known to the registry (whether or not it
    /// is currently routable).
    async fn resolve(&self, key: &AssetKey) -> Result<Option<AssetRecord>>;
}

/// One asset's bridge capability as declared by a specific anchor.
#[derive(Debug, Clone)]
pub struct AnchorAssetCapability {
    pub key: AssetKey,
    pub active: bool,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    /// Fixed fee, in units of the bridged asset.
    pub fee_fixed: f64,
    /// Percentage fee, e.g. `1.0` for 1%.
    pub fee_percent: f64,
}

#[derive(Debug, Clone)]
pub struct AnchorRecord {
    pub domain: String,
    pub active: bool,
    /// Health score in `[0, 1]`.
    pub health: f64,
    pub assets: Vec<AnchorAssetCapability>,
}

#[async_trait]
pub trait AnchorRegistry: Send + Sync {
    /// All anchors currently marked active, with their bridgeable assets.
    async fn active_anchors(&self) -> Result<Vec<AnchorRecord>>;
}

/// A fixed in-memory asset registry, useful for tests and for seeding local
/// runs from a static snapshot.
pub struct InMemoryAssetRegistry {
    assets: HashMap<AssetKey, AssetRecord>,
}

impl InMemoryAssetRegistry {
    pub fn new(assets: Vec<AssetRecord>) -> Self {
        Self {
            assets: assets.into_iter().map(|a| (a.key.clone(), a)).collect(),
        }
    }
}

#[async_trait]
impl AssetRegistry for InMemoryAssetRegistry {
    async fn routable_assets(&self) -> Result<Vec<AssetRecord>> {
        Ok(self.assets.values().cloned().collect())
    }

    async fn resolve(&self, key: &AssetKey) -> Result<Option<AssetRecord>> {
        Ok(self.assets.get(key).cloned())
    }
}

/// A fixed in-memory anchor registry, useful for tests and local runs.
pub struct InMemoryAnchorRegistry {
    anchors: Vec<AnchorRecord>,
}

impl InMemoryAnchorRegistry {
    pub fn new(anchors: Vec<AnchorRecord>) -> Self {
        Self { anchors }
    }
}

#[async_trait]
impl AnchorRegistry for InMemoryAnchorRegistry {
    async fn active_anchors(&self) -> Result<Vec<AnchorRecord>> {
        Ok(self
            .anchors
            .iter()
            .filter(|a| a.active)
            .cloned()
            .collect())
    }
}
