//! Exchange collaborators for the navigator: REST adapters for live venues and
//! an in-memory adapter for data that was already fetched elsewhere.

pub mod binance;
pub mod kraken;
pub mod static_adapter;

pub use binance::BinanceAdapter;
pub use kraken::KrakenAdapter;
pub use static_adapter::StaticAdapter;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request ceiling for venue REST calls.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// GETs `url` and deserializes the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned an error status"))?;
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read body of {url}"))?;
    serde_json::from_str(&body).with_context(|| format!("Failed to deserialize body of {url}"))
}

/// Parses a venue number that may be sent as a JSON string.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
