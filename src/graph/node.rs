#![allow(dead_code)]

//! Graph node: one routable asset plus its outgoing adjacency.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{AssetKey, AssetSource};

use super::edge::Edge;

/// A patch of attributes to merge into an existing node, or to seed a new
/// one. `None` fields leave the existing value untouched on merge.
#[derive(Debug, Clone, Default)]
pub struct NodeAttrs {
    pub code: Option<String>,
    pub issuer: Option<Option<String>>,
    pub domain: Option<Option<String>>,
    pub display_name: Option<Option<String>>,
    pub native: Option<bool>,
    pub verified: Option<bool>,
    pub source: Option<AssetSource>,
    pub num_accounts: Option<u64>,
    pub deposit_enabled: Option<bool>,
    pub withdraw_enabled: Option<bool>,
    pub anchor_domain: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub key: AssetKey,
    pub code: String,
    pub issuer: Option<String>,
    pub domain: Option<String>,
    pub display_name: Option<String>,
    pub native: bool,
    pub verified: bool,
    pub source: AssetSource,
    pub num_accounts: u64,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    pub anchor_domain: Option<String>,
    #[serde(skip)]
    pub edges: HashMap<AssetKey, Vec<Edge>>,
}

impl Node {
    pub fn new(key: AssetKey, attrs: NodeAttrs) -> Self {
        let native = key.is_native();
        let code = attrs.code.unwrap_or_else(|| key.code().to_string());
        let issuer = attrs
            .issuer
            .unwrap_or_else(|| key.issuer().map(|s| s.to_string()));
        Self {
            key,
            code,
            issuer,
            domain: attrs.domain.flatten(),
            display_name: attrs.display_name.flatten(),
            native: attrs.native.unwrap_or(native),
            verified: attrs.verified.unwrap_or(false),
            source: attrs.source.unwrap_or(AssetSource::Network),
            num_accounts: attrs.num_accounts.unwrap_or(0),
            deposit_enabled: attrs.deposit_enabled.unwrap_or(false),
            withdraw_enabled: attrs.withdraw_enabled.unwrap_or(false),
            anchor_domain: attrs.anchor_domain.flatten(),
            edges: HashMap::new(),
        }
    }

    /// Merge non-null attributes from `attrs` without touching adjacency.
    pub fn merge(&mut self, attrs: NodeAttrs) {
        if let Some(v) = attrs.code {
            self.code = v;
        }
        if let Some(v) = attrs.issuer {
            self.issuer = v;
        }
        if let Some(v) = attrs.domain {
            self.domain = v;
        }
        if let Some(v) = attrs.display_name {
            self.display_name = v;
        }
        if let Some(v) = attrs.native {
            self.native = v;
        }
        if let Some(v) = attrs.verified {
            self.verified = v;
        }
        if let Some(v) = attrs.source {
            self.source = v;
        }
        if let Some(v) = attrs.num_accounts {
            self.num_accounts = v;
        }
        if let Some(v) = attrs.deposit_enabled {
            self.deposit_enabled = v;
        }
        if let Some(v) = attrs.withdraw_enabled {
            self.withdraw_enabled = v;
        }
        if let Some(v) = attrs.anchor_domain {
            self.anchor_domain = v;
        }
    }

    /// All edges leaving this node, across every target.
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flatten()
    }

    /// Edges to a specific target, if any.
    pub fn edges_to(&self, target: &AssetKey) -> &[Edge] {
        self.edges.get(target).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The lowest-weight edge to a specific target (best-edge-per-pair
    /// rule used by the pathfinder).
    pub fn best_edge_to(&self, target: &AssetKey) -> Option<&Edge> {
        self.edges_to(target)
            .iter()
            .min_by(|a, b| a.weight.total_cmp(&b.weight))
    }
}
