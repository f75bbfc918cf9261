use crate::aliases::canonical_symbol;
use crate::errors::CommonError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Represents a quantity of an asset, typically using a high-precision decimal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(pub Decimal);

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a financial asset, identified by a symbol string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(pub String);

impl Asset {
    /// Builds the canonical asset for a raw venue symbol, resolving known aliases
    /// (`XBT` -> `BTC`, `ZUSD` -> `USD`, ...).
    pub fn canonical(symbol: &str) -> Self {
        Asset(canonical_symbol(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Asset(s.to_uppercase())
    }
}

impl FromStr for Asset {
    type Err = CommonError;

    /// Parses and canonicalizes a symbol, rejecting empty or whitespace-only input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(CommonError::InvalidSymbol(s.to_string()));
        }
        Ok(Asset::canonical(trimmed))
    }
}

/// Represents a unique identifier for an exchange.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExchangeId(pub String);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId(s.to_string())
    }
}

/// Trading status of a listed pair, as reported by its venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    Online,
    /// Dark-pool / off-book market.
    Dark,
    Delisted,
    /// Listed but not currently accepting orders (cancel-only, post-only, break...).
    Halted,
}

impl PairStatus {
    pub fn is_tradeable(&self) -> bool {
        matches!(self, PairStatus::Online)
    }
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairStatus::Online => "online",
            PairStatus::Dark => "dark",
            PairStatus::Delisted => "delisted",
            PairStatus::Halted => "halted",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PairStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" | "trading" => Ok(PairStatus::Online),
            "dark" => Ok(PairStatus::Dark),
            "delisted" => Ok(PairStatus::Delisted),
            "halted" | "break" | "cancel_only" | "post_only" | "limit_only" | "reduce_only" => {
                Ok(PairStatus::Halted)
            }
            other => Err(CommonError::ParseError(format!("unknown pair status {other:?}"))),
        }
    }
}

/// One entry of an exchange's pair listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairListing {
    /// Venue-specific market identifier, e.g. `XXBTZUSD` or `BTCUSDT`.
    pub pair_id: String,
    pub base: Asset,
    pub quote: Asset,
    pub status: PairStatus,
}

impl PairListing {
    pub fn new(pair_id: impl Into<String>, base: Asset, quote: Asset, status: PairStatus) -> Self {
        Self {
            pair_id: pair_id.into(),
            base,
            quote,
            status,
        }
    }
}

/// Ticker data for one market: quote asset per unit of base asset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticker {
    pub last_price: f64,
    /// 24h traded volume, in base units.
    pub volume: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

impl Ticker {
    pub fn new(last_price: f64, volume: f64) -> Self {
        Self {
            last_price,
            volume,
            bid: None,
            ask: None,
        }
    }

    pub fn with_book(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Fractional bid/ask spread relative to the mid price, if the book top is usable.
    pub fn spread(&self) -> Option<f64> {
        let (bid, ask) = (self.bid?, self.ask?);
        if !(bid > 0.0 && ask >= bid && ask.is_finite()) {
            return None;
        }
        let mid = (bid + ask) / 2.0;
        let spread = (ask - bid) / mid;
        (spread < 1.0).then_some(spread)
    }
}

/// Everything the graph builder needs from one exchange, already fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    pub exchange: ExchangeId,
    /// Taker fee fraction applied to every market of the venue.
    pub fee_rate: f64,
    pub pairs: Vec<PairListing>,
    /// Keyed by `PairListing::pair_id`.
    pub tickers: HashMap<String, Ticker>,
}
