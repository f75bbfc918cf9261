use common::types::{Asset, ExchangeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod state;
pub mod summary;

pub use state::ConversionGraph;
pub use summary::{AssetConnectivity, GraphSummary};

/// Exchange label carried by synthetic bridge edges.
pub const BRIDGE_EXCHANGE: &str = "bridge";

/// Reasons an edge is rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdgeError {
    #[error("Edge endpoint asset is empty")]
    EmptyAsset,
    #[error("Edge from {0} to itself")]
    SelfLoop(Asset),
    #[error("Edge rate must be positive and finite, got {0}")]
    InvalidRate(f64),
    #[error("Fee rate must be in [0, 1), got {0}")]
    InvalidFee(f64),
    #[error("Spread must be in [0, 1), got {0}")]
    InvalidSpread(f64),
}

/// One directional, fee-and-spread-adjusted conversion on one exchange.
///
/// Fields are private so the derived `effective_rate` and `cost` can never
/// drift from the inputs they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EdgeRecord", into = "EdgeRecord")]
pub struct Edge {
    from_asset: Asset,
    to_asset: Asset,
    pair_id: String,
    exchange: ExchangeId,
    rate: f64,
    fee_rate: f64,
    spread: f64,
    volume_24h: f64,
    effective_rate: f64,
    cost: f64,
}

impl Edge {
    /// Validates and builds an edge. `rate` is units of `to` per unit of `from`.
    pub fn new(
        from: Asset,
        to: Asset,
        pair_id: impl Into<String>,
        exchange: ExchangeId,
        rate: f64,
        fee_rate: f64,
        spread: f64,
    ) -> Result<Self, EdgeError> {
        if from.as_str().is_empty() || to.as_str().is_empty() {
            return Err(EdgeError::EmptyAsset);
        }
        if from == to {
            return Err(EdgeError::SelfLoop(from));
        }
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(EdgeError::InvalidRate(rate));
        }
        if !(0.0..1.0).contains(&fee_rate) {
            return Err(EdgeError::InvalidFee(fee_rate));
        }
        if !(0.0..1.0).contains(&spread) {
            return Err(EdgeError::InvalidSpread(spread));
        }

        let effective_rate = rate * (1.0 - fee_rate) * (1.0 - spread / 2.0);
        let cost = if effective_rate > 0.0 && effective_rate.is_finite() {
            -effective_rate.ln()
        } else {
            f64::INFINITY
        };

        Ok(Self {
            from_asset: from,
            to_asset: to,
            pair_id: pair_id.into(),
            exchange,
            rate,
            fee_rate,
            spread,
            volume_24h: 0.0,
            effective_rate,
            cost,
        })
    }

    /// Synthetic near-identity edge that is not backed by a real market.
    pub fn bridge(from: Asset, to: Asset, rate: f64, fee_rate: f64, spread: f64) -> Result<Self, EdgeError> {
        let pair_id = format!("{}-{}", from, to);
        Self::new(from, to, pair_id, ExchangeId::from(BRIDGE_EXCHANGE), rate, fee_rate, spread)
    }

    pub fn with_volume(mut self, volume_24h: f64) -> Self {
        self.volume_24h = if volume_24h.is_finite() { volume_24h.max(0.0) } else { 0.0 };
        self
    }

    pub fn from_asset(&self) -> &Asset {
        &self.from_asset
    }

    pub fn to_asset(&self) -> &Asset {
        &self.to_asset
    }

    pub fn pair_id(&self) -> &str {
        &self.pair_id
    }

    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    pub fn volume_24h(&self) -> f64 {
        self.volume_24h
    }

    /// `rate * (1 - fee) * (1 - spread / 2)`.
    pub fn effective_rate(&self) -> f64 {
        self.effective_rate
    }

    /// `-ln(effective_rate)`; negative whenever the edge multiplies value.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn is_traversable(&self) -> bool {
        self.cost.is_finite()
    }

    pub fn is_bridge(&self) -> bool {
        self.exchange.0 == BRIDGE_EXCHANGE
    }
}

/// On-disk shape of an edge in the cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: Asset,
    pub to: Asset,
    pub pair: String,
    pub exchange: ExchangeId,
    pub rate: f64,
    pub fee: f64,
    pub spread: f64,
    #[serde(default)]
    pub volume: f64,
}

impl TryFrom<EdgeRecord> for Edge {
    type Error = EdgeError;

    fn try_from(record: EdgeRecord) -> Result<Self, Self::Error> {
        Ok(Edge::new(
            record.from,
            record.to,
            record.pair,
            record.exchange,
            record.rate,
            record.fee,
            record.spread,
        )?
        .with_volume(record.volume))
    }
}

impl From<Edge> for EdgeRecord {
    fn from(edge: Edge) -> Self {
        EdgeRecord {
            from: edge.from_asset,
            to: edge.to_asset,
            pair: edge.pair_id,
            exchange: edge.exchange,
            rate: edge.rate,
            fee: edge.fee_rate,
            spread: edge.spread,
            volume: edge.volume_24h,
        }
    }
}
