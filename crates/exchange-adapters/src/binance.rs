use crate::{get_json, http_client, parse_number};
use anyhow::Result;
use async_trait::async_trait;
use common::types::{Asset, PairListing, PairStatus, Ticker};
use exchange_adapter_trait::ExchangeAdapter;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const DEFAULT_TAKER_FEE: f64 = 0.001;

#[derive(Deserialize, Debug)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    volume: String,
    #[serde(default)]
    bid_price: Option<String>,
    #[serde(default)]
    ask_price: Option<String>,
}

pub struct BinanceAdapter {
    client: reqwest::Client,
    base_url: String,
    fee_rate: f64,
}

impl BinanceAdapter {
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

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn id(&self) -> &str {
        "binance"
    }

    fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    async fn fetch_pairs(&self) -> Result<Vec<PairListing>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: ExchangeInfo = get_json(&self.client, &url).await?;
        let listings = listings_from_info(info);
        log::debug!("binance: {} symbols listed", listings.len());
        Ok(listings)
    }

    async fn fetch_tickers(&self, pairs: &[PairListing]) -> Result<HashMap<String, Ticker>> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let raw: Vec<Ticker24h> = get_json(&self.client, &url).await?;
        let wanted: HashSet<&str> = pairs.iter().map(|p| p.pair_id.as_str()).collect();
        Ok(tickers_from_payload(raw)
            .into_iter()
            .filter(|(id, _)| wanted.contains(id.as_str()))
            .collect())
    }
}

/// Anything other than `TRADING` (`BREAK`, `HALT`, `END_OF_DAY`, ...) cannot be
/// traded right now.
fn symbol_status(status: &str) -> PairStatus {
    if status.eq_ignore_ascii_case("TRADING") {
        PairStatus::Online
    } else {
        PairStatus::Halted
    }
}

fn listings_from_info(info: ExchangeInfo) -> Vec<PairListing> {
    info.symbols
        .into_iter()
        .map(|s| {
            PairListing::new(
                s.symbol,
                Asset::canonical(&s.base_asset),
                Asset::canonical(&s.quote_asset),
                symbol_status(&s.status),
            )
        })
        .collect()
}

fn tickers_from_payload(raw: Vec<Ticker24h>) -> HashMap<String, Ticker> {
    raw.into_iter()
        .filter_map(|t| {
            let last_price = parse_number(&t.last_price)?;
            let ticker = Ticker {
                last_price,
                volume: parse_number(&t.volume).unwrap_or(0.0),
                bid: t.bid_price.as_deref().and_then(parse_number),
                ask: t.ask_price.as_deref().and_then(parse_number),
            };
            Some((t.symbol, ticker))
        })
        .collect()
}

/// Parses a raw `exchangeInfo` response body.
pub fn parse_exchange_info(body: &str) -> Result<Vec<PairListing>> {
    let info: ExchangeInfo = serde_json::from_str(body)?;
    Ok(listings_from_info(info))
}

/// Parses a raw `ticker/24hr` response body.
pub fn parse_tickers(body: &str) -> Result<HashMap<String, Ticker>> {
    let raw: Vec<Ticker24h> = serde_json::from_str(body)?;
    Ok(tickers_from_payload(raw))
}
