#![allow(dead_code)]

//! Edge types: DEX, anchor bridge and XLM-hub, each carrying its own detail
//! block as a tagged variant rather than a flat mostly-null record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AssetKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Dex,
    AnchorBridge,
    XlmHub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexAttrs {
    pub top_bid: f64,
    pub top_ask: f64,
    pub spread: f64,
    pub bid_depth: f64,
    pub ask_depth: f64,
    pub bid_count: u32,
    pub ask_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorBridgeAttrs {
    pub anchor_domain: String,
    pub anchor_health: f64,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    pub fee_fixed: f64,
    pub fee_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XlmHubAttrs {
    pub origin_asset_code: String,
    pub origin_domain: Option<String>,
    pub estimated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EdgeKind {
    Dex(DexAttrs),
    AnchorBridge(AnchorBridgeAttrs),
    XlmHub(XlmHubAttrs),
}

impl EdgeKind {
    pub fn edge_type(&self) -> EdgeType {
        match self {
            EdgeKind::Dex(_) => EdgeType::Dex,
            EdgeKind::AnchorBridge(_) => EdgeType::AnchorBridge,
            EdgeKind::XlmHub(_) => EdgeType::XlmHub,
        }
    }
}

/// A directed, weighted edge from an implicit source node to `to`.
///
/// Lower `weight` is better; weight is always non-negative (enforced by the
/// discovery weight formulas, which all clamp at a floor).
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub to: AssetKey,
    pub kind: EdgeKind,
    pub weight: f64,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(to: AssetKey, kind: EdgeKind, weight: f64) -> Self {
        Self {
            to,
            kind,
            weight,
            updated_at: Utc::now(),
        }
    }

    pub fn edge_type(&self) -> EdgeType {
        self.kind.edge_type()
    }

    pub fn anchor_domain(&self) -> Option<&str> {
        match &self.kind {
            EdgeKind::AnchorBridge(a) => Some(&a.anchor_domain),
            _ => None,
        }
    }
}
