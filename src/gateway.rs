#![allow(dead_code)]

//! Horizon gateway: orderbook queries and strict-send path queries,
//! each bound by a per-call timeout. Modeled on the teacher's direct
//! `reqwest::Client` + `serde::Deserialize` JSON-RPC calls
//! (`operator/src/confirmation/evm.rs`) rather than a generic RPC
//! abstraction crate.

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::Client;
use serde::Deserialize;

use crate::types::{Amount, AssetKey};

#[derive(Debug, Clone)]
pub struct OrderbookLevel {
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
}

impl Orderbook {
    pub fn top_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn top_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn bid_depth(&self) -> f64 {
        self.bids.iter().map(|l| l.amount).sum()
    }

    pub fn ask_depth(&self) -> f64 {
        self.asks.iter().map(|l| l.amount).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PathAsset {
    pub asset_type: String,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
}

impl PathAsset {
    pub fn as_key(&self) -> AssetKey {
        if self.asset_type == "native" {
            AssetKey::native()
        } else {
            AssetKey::new(
                self.asset_code.as_deref().unwrap_or("UNKNOWN"),
                self.asset_issuer.as_deref(),
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrictSendPathRecord {
    pub destination_amount: Amount,
    pub path: Vec<PathAsset>,
}

/// Outbound dependency contract for the on-ledger Horizon API: orderbook
/// queries and strict-send path queries.
#[async_trait]
pub trait HorizonGateway: Send + Sync {
    async fn get_orderbook(
        &self,
        selling: &AssetKey,
        buying: &AssetKey,
        depth_limit: u32,
    ) -> Result<Orderbook>;

    async fn find_strict_send_paths(
        &self,
        source: &AssetKey,
        source_amount: Amount,
        destinations: &[AssetKey],
    ) -> Result<Vec<StrictSendPathRecord>>;
}

/// Live Horizon client over HTTP.
pub struct HorizonHttpGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HorizonHttpGateway {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    fn asset_query_params(key: &AssetKey, prefix: &str) -> Vec<(String, String)> {
        if key.is_native() {
            vec![(format!("{prefix}_asset_type"), "native".to_string())]
        } else {
            vec![
                (
                    format!("{prefix}_asset_type"),
                    "credit_alphanum12".to_string(),
                ),
                (
                    format!("{prefix}_asset_code"),
                    key.code().to_string(),
                ),
                (
                    format!("{prefix}_asset_issuer"),
                    key.issuer().unwrap_or_default().to_string(),
                ),
            ]
        }
    }
}

#[derive(Debug, Deserialize)]
struct HorizonOrderbookLevelWire {
    price: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct HorizonOrderbookWire {
    bids: Vec<HorizonOrderbookLevelWire>,
    asks: Vec<HorizonOrderbookLevelWire>,
}

#[derive(Debug, Deserialize)]
struct HorizonPathAssetWire {
    asset_type: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HorizonPathRecordWire {
    destination_amount: String,
    path: Vec<HorizonPathAssetWire>,
}

#[derive(Debug, Deserialize)]
struct HorizonPathsWire {
    #[serde(rename = "_embedded")]
    embedded: HorizonEmbeddedWire<HorizonPathRecordWire>,
}

#[derive(Debug, Deserialize)]
struct HorizonEmbeddedWire<T> {
    records: Vec<T>,
}

#[async_trait]
impl HorizonGateway for HorizonHttpGateway {
    async fn get_orderbook(
        &self,
        selling: &AssetKey,
        buying: &AssetKey,
        depth_limit: u32,
    ) -> Result<Orderbook> {
        let mut params = Self::asset_query_params(selling, "selling");
        params.extend(Self::asset_query_params(buying, "buying"));
        params.push(("limit".to_string(), depth_limit.to_string()));

        let wire: HorizonOrderbookWire = self
            .client
            .get(format!("{}/order_book", self.base_url))
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .wrap_err("orderbook request failed")?
            .error_for_status()
            .wrap_err("orderbook returned an error status")?
            .json()
            .await
            .wrap_err("orderbook response was not valid JSON")?;

        let convert = |levels: Vec<HorizonOrderbookLevelWire>| -> Result<Vec<OrderbookLevel>> {
            levels
                .into_iter()
                .map(|l| {
                    Ok(OrderbookLevel {
                        price: l.price.parse().wrap_err("invalid orderbook price")?,
                        amount: l.amount.parse().wrap_err("invalid orderbook amount")?,
                    })
                })
                .collect()
        };

        Ok(Orderbook {
            bids: convert(wire.bids)?,
            asks: convert(wire.asks)?,
        })
    }

    async fn find_strict_send_paths(
        &self,
        source: &AssetKey,
        source_amount: Amount,
        destinations: &[AssetKey],
    ) -> Result<Vec<StrictSendPathRecord>> {
        if destinations.is_empty() {
            return Ok(vec![]);
        }
        let mut params = Self::asset_query_params(source, "source");
        params.push(("source_amount".to_string(), source_amount.to_string()));
        let dest_assets = destinations
            .iter()
            .map(|d| {
                if d.is_native() {
                    "native".to_string()
                } else {
                    format!("{}:{}", d.code(), d.issuer().unwrap_or_default())
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("destination_assets".to_string(), dest_assets));

        let wire: HorizonPathsWire = self
            .client
            .get(format!("{}/paths/strict-send", self.base_url))
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .wrap_err("strict-send path request failed")?
            .error_for_status()
            .wrap_err("strict-send path returned an error status")?
            .json()
            .await
            .wrap_err("strict-send path response was not valid JSON")?;

        wire.embedded
            .records
            .into_iter()
            .map(|r| {
                Ok(StrictSendPathRecord {
                    destination_amount: Amount::parse(&r.destination_amount)
                        .wrap_err("invalid destination_amount")?,
                    path: r
                        .path
                        .into_iter()
                        .map(|p| PathAsset {
                            asset_type: p.asset_type,
                            asset_code: p.asset_code,
                            asset_issuer: p.asset_issuer,
                        })
                        .collect(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_asset_native_maps_to_native_key() {
        let asset = PathAsset {
            asset_type: "native".into(),
            asset_code: None,
            asset_issuer: None,
        };
        assert!(asset.as_key().is_native());
    }

    #[test]
    fn path_asset_credit_maps_to_issued_key() {
        let asset = PathAsset {
            asset_type: "credit_alphanum4".into(),
            asset_code: Some("USDC".into()),
            asset_issuer: Some("GABC".into()),
        };
        let key = asset.as_key();
        assert_eq!(key.code(), "USDC");
        assert_eq!(key.issuer(), Some("GABC"));
    }

    #[test]
    fn orderbook_depth_sums_levels() {
        let ob = Orderbook {
            bids: vec![
                OrderbookLevel {
                    price: 0.25,
                    amount: 100.0,
                },
                OrderbookLevel {
                    price: 0.24,
                    amount: 50.0,
                },
            ],
            asks: vec![],
        };
        assert_eq!(ob.bid_depth(), 150.0);
        assert_eq!(ob.top_bid(), Some(0.25));
        assert_eq!(ob.top_ask(), None);
    }
}
