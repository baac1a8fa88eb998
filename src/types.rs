#![allow(dead_code)]

//! Core domain types shared across the route engine: asset identity, the
//! fixed-point amount representation, and the wire-shape types returned by
//! the resolver.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional digits carried by [`Amount`] at every boundary. Chosen to
/// match the external decimal-string contract in the spec ("emit
/// seven-fractional-digit decimal strings at the output boundary").
const AMOUNT_SCALE: i128 = 10_000_000;

/// A fixed-point, non-negative payment amount.
///
/// Stored as an `i128` scaled by [`AMOUNT_SCALE`] so that fee multiplications
/// and bridge deductions never drift the way repeated `f64` arithmetic
/// would. Parsed from and rendered back to decimal strings at every
/// external boundary (wire contract, cache key, persisted row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Parse a decimal string such as `"100"`, `"100.5"`, `"0.0000001"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(eyre!("amount string is empty"));
        }
        if s.starts_with('-') {
            return Err(eyre!("amount must be non-negative: {s}"));
        }
        let mut parts = s.splitn(2, '.');
        let int_part = parts.next().unwrap_or("0");
        let frac_part = parts.next().unwrap_or("");
        if frac_part.len() > 7 {
            return Err(eyre!("amount has too many fractional digits: {s}"));
        }
        let int_val: i128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| eyre!("invalid integer part in amount: {s}"))?
        };
        let mut frac_val: i128 = 0;
        if !frac_part.is_empty() {
            let padded = format!("{:0<7}", frac_part);
            frac_val = padded
                .parse()
                .map_err(|_| eyre!("invalid fractional part in amount: {s}"))?;
        }
        Ok(Amount(int_val * AMOUNT_SCALE + frac_val))
    }

    pub fn from_f64(v: f64) -> Self {
        let scaled = (v.max(0.0) * AMOUNT_SCALE as f64).round() as i128;
        Amount(scaled)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiply by a ratio, flooring at zero. Used for spread/fee math.
    pub fn mul_ratio(&self, ratio: f64) -> Amount {
        if ratio <= 0.0 {
            return Amount::ZERO;
        }
        Amount::from_f64(self.as_f64() * ratio)
    }

    /// Subtract a fixed amount, flooring at zero.
    pub fn saturating_sub(&self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int_part = self.0 / AMOUNT_SCALE;
        let frac_part = self.0 % AMOUNT_SCALE;
        write!(f, "{}.{:07}", int_part, frac_part)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// The canonical asset identity: `CODE:ISSUER` or `CODE:native`.
///
/// Two keys are equal iff both parts match byte-for-byte after the code is
/// case-normalized to uppercase; the issuer (or the literal `native`) is
/// compared as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    code: String,
    issuer: Issuer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Issuer {
    Native,
    Account(String),
}

impl AssetKey {
    pub fn new(code: &str, issuer: Option<&str>) -> Self {
        let code = code.trim().to_ascii_uppercase();
        match issuer {
            None => Self {
                code,
                issuer: Issuer::Native,
            },
            Some(i) if i.eq_ignore_ascii_case("native") => Self {
                code,
                issuer: Issuer::Native,
            },
            Some(i) => Self {
                code,
                issuer: Issuer::Account(i.to_string()),
            },
        }
    }

    pub fn native() -> Self {
        Self::new("XLM", None)
    }

    pub fn is_native(&self) -> bool {
        matches!(self.issuer, Issuer::Native)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn issuer(&self) -> Option<&str> {
        match &self.issuer {
            Issuer::Native => None,
            Issuer::Account(i) => Some(i),
        }
    }

    /// Parse the canonical `CODE:ISSUER` or `CODE:native` string form.
    pub fn parse(s: &str) -> Result<Self> {
        let (code, issuer) = s
            .split_once(':')
            .ok_or_else(|| eyre!("malformed asset key (expected CODE:ISSUER): {s}"))?;
        if code.is_empty() {
            return Err(eyre!("asset key has empty code: {s}"));
        }
        Ok(Self::new(code, Some(issuer)))
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Issuer::Native => write!(f, "{}:native", self.code),
            Issuer::Account(i) => write!(f, "{}:{}", self.code, i),
        }
    }
}

/// Query mode: whether `amount` names the amount sent or the amount to
/// receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Send,
    Receive,
}

impl Default for QueryMode {
    fn default() -> Self {
        QueryMode::Send
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMode::Send => write!(f, "send"),
            QueryMode::Receive => write!(f, "receive"),
        }
    }
}

/// Tags the provenance of a route's receive-amount figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Horizon,
    Estimated,
    Graph,
    Unverified,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Horizon => write!(f, "horizon"),
            PriceSource::Estimated => write!(f, "estimated"),
            PriceSource::Graph => write!(f, "graph"),
            PriceSource::Unverified => write!(f, "unverified"),
        }
    }
}

/// Overall resolution strategy used to satisfy a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Graph,
    HorizonFallback,
}

/// Source tag for how a node or asset entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    Network,
    Anchor,
    Synthetic,
}
