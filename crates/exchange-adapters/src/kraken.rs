use crate::{get_json, http_client, parse_number};
use anyhow::{bail, Result};
use async_trait::async_trait;
use common::aliases::{canonical_symbol, is_alias};
use common::types::{Asset, PairListing, PairStatus, Ticker};
use exchange_adapter_trait::ExchangeAdapter;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const DEFAULT_BASE_URL: &str = "https://api.kraken.com";
const DEFAULT_TAKER_FEE: f64 = 0.0026;
/// Kraken suffixes dark-pool markets with `.d`.
const DARK_POOL_SUFFIX: &str = ".d";

// --- Data Structures for Deserialization ---

#[derive(Deserialize, Debug)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Deserialize, Debug)]
struct KrakenPair {
    base: String,
    quote: String,
    #[serde(default)]
    status: Option<String>,
}

/// `a`/`b` are `[price, whole lot volume, lot volume]`, `c` is `[price, lot
/// volume]`, `v` is `[today, last 24 hours]`.
#[derive(Deserialize, Debug)]
struct KrakenTicker {
    a: Vec<String>,
    b: Vec<String>,
    c: Vec<String>,
    v: Vec<String>,
}

// --- Adapter Implementation ---

pub struct KrakenAdapter {
    client: reqwest::Client,
    base_url: String,
    fee_rate: f64,
}

impl KrakenAdapter {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fee_rate: DEFAULT_TAKER_FEE,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }
}

impl Default for KrakenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    fn id(&self) -> &str {
        "kraken"
    }

    fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    async fn fetch_pairs(&self) -> Result<Vec<PairListing>> {
        let url = format!("{}/0/public/AssetPairs", self.base_url);
        let response: KrakenResponse<HashMap<String, KrakenPair>> =
            get_json(&self.client, &url).await?;
        let pairs = into_result(response)?;
        let listings = listings_from_pairs(pairs);
        log::debug!("kraken: {} pairs listed", listings.len());
        Ok(listings)
    }

    async fn fetch_tickers(&self, pairs: &[PairListing]) -> Result<HashMap<String, Ticker>> {
        let url = format!("{}/0/public/Ticker", self.base_url);
        let response: KrakenResponse<HashMap<String, KrakenTicker>> =
            get_json(&self.client, &url).await?;
        let wanted: HashSet<&str> = pairs.iter().map(|p| p.pair_id.as_str()).collect();
        let tickers = tickers_from_payload(into_result(response)?)
            .into_iter()
            .filter(|(id, _)| wanted.contains(id.as_str()))
            .collect();
        Ok(tickers)
    }
}

fn into_result<T>(response: KrakenResponse<T>) -> Result<T> {
    if !response.error.is_empty() {
        bail!("kraken API error: {}", response.error.join(", "));
    }
    match response.result {
        Some(result) => Ok(result),
        None => bail!("kraken API response carried no result"),
    }
}

/// Legacy Kraken codes with an `X` (crypto) or `Z` (fiat) prefix that are not
/// already in the shared alias table. Newer listings such as `ZETA` or `XCN`
/// keep their letters.
const LEGACY_PREFIXED: &[&str] = &["XMLN", "XREP", "XXTZ", "XICN", "XNMC", "XDAO", "XXVN", "ZKRW"];

/// Maps a Kraken asset code onto the canonical symbol.
pub fn kraken_asset(raw: &str) -> Asset {
    let upper = raw.trim().to_uppercase();
    if is_alias(&upper) {
        return Asset(canonical_symbol(&upper));
    }
    if LEGACY_PREFIXED.contains(&upper.as_str()) {
        return Asset(canonical_symbol(&upper[1..]));
    }
    Asset(canonical_symbol(&upper))
}

fn pair_status(pair_id: &str, status: Option<&str>) -> PairStatus {
    if pair_id.ends_with(DARK_POOL_SUFFIX) {
        return PairStatus::Dark;
    }
    match status {
        None => PairStatus::Online,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::trace!("kraken: unknown status {raw:?} on {pair_id}, treating as halted");
            PairStatus::Halted
        }),
    }
}

fn listings_from_pairs(pairs: HashMap<String, KrakenPair>) -> Vec<PairListing> {
    let mut listings: Vec<PairListing> = pairs
        .into_iter()
        .map(|(pair_id, pair)| {
            let status = pair_status(&pair_id, pair.status.as_deref());
            PairListing::new(
                pair_id,
                kraken_asset(&pair.base),
                kraken_asset(&pair.quote),
                status,
            )
        })
        .collect();
    listings.sort_by(|a, b| a.pair_id.cmp(&b.pair_id));
    listings
}

fn tickers_from_payload(payload: HashMap<String, KrakenTicker>) -> HashMap<String, Ticker> {
    payload
        .into_iter()
        .filter_map(|(pair_id, raw)| {
            let last_price = raw.c.first().and_then(|p| parse_number(p))?;
            let volume = raw.v.get(1).and_then(|v| parse_number(v)).unwrap_or(0.0);
            let ticker = Ticker {
                last_price,
                volume,
                bid: raw.b.first().and_then(|p| parse_number(p)),
                ask: raw.a.first().and_then(|p| parse_number(p)),
            };
            Some((pair_id, ticker))
        })
        .collect()
}

/// Parses a raw `AssetPairs` response body.
pub fn parse_asset_pairs(body: &str) -> Result<Vec<PairListing>> {
    let response: KrakenResponse<HashMap<String, KrakenPair>> = serde_json::from_str(body)?;
    Ok(listings_from_pairs(into_result(response)?))
}

/// Parses a raw `Ticker` response body.
pub fn parse_tickers(body: &str) -> Result<HashMap<String, Ticker>> {
    let response: KrakenResponse<HashMap<String, KrakenTicker>> = serde_json::from_str(body)?;
    Ok(tickers_from_payload(into_result(response)?))
}
