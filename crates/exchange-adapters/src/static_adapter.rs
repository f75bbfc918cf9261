use anyhow::{bail, Result};
use async_trait::async_trait;
use common::types::{ExchangeSnapshot, PairListing, Ticker};
use dashmap::DashMap;
use exchange_adapter_trait::ExchangeAdapter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Serves pair listings and tickers that were loaded by someone else.
///
/// Used when a caller already paid the network cost (a position manager that
/// polls tickers on its own schedule) and in tests. Tickers can be updated in
/// place between graph rebuilds.
#[derive(Default)]
pub struct StaticAdapter {
    id: String,
    fee_rate: f64,
    pairs: Arc<DashMap<String, PairListing>>,
    tickers: Arc<DashMap<String, Ticker>>,
    unavailable: AtomicBool,
}

impl StaticAdapter {
    pub fn new(id: impl Into<String>, fee_rate: f64) -> Self {
        Self {
            id: id.into(),
            fee_rate,
            ..Default::default()
        }
    }

    pub fn from_snapshot(snapshot: ExchangeSnapshot) -> Self {
        let adapter = Self::new(snapshot.exchange.0, snapshot.fee_rate);
        for pair in snapshot.pairs {
            if let Some(ticker) = snapshot.tickers.get(&pair.pair_id) {
                adapter.tickers.insert(pair.pair_id.clone(), *ticker);
            }
            adapter.pairs.insert(pair.pair_id.clone(), pair);
        }
        adapter
    }

    pub fn insert_pair(&self, pair: PairListing, ticker: Ticker) {
        self.tickers.insert(pair.pair_id.clone(), ticker);
        self.pairs.insert(pair.pair_id.clone(), pair);
    }

    pub fn update_ticker(&self, pair_id: &str, ticker: Ticker) {
        self.tickers.insert(pair_id.to_string(), ticker);
    }

    /// Simulates an unreachable venue: every fetch fails until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("{} is unavailable", self.id);
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeAdapter for StaticAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    async fn fetch_pairs(&self) -> Result<Vec<PairListing>> {
        self.ensure_available()?;
        let mut pairs: Vec<PairListing> = self.pairs.iter().map(|p| p.value().clone()).collect();
        pairs.sort_by(|a, b| a.pair_id.cmp(&b.pair_id));
        Ok(pairs)
    }

    async fn fetch_tickers(&self, pairs: &[PairListing]) -> Result<HashMap<String, Ticker>> {
        self.ensure_available()?;
        Ok(pairs
            .iter()
            .filter_map(|p| {
                self.tickers
                    .get(&p.pair_id)
                    .map(|t| (p.pair_id.clone(), *t.value()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Asset, ExchangeId, PairStatus};

    fn listing(id: &str, base: &str, quote: &str) -> PairListing {
        PairListing::new(id, Asset::from(base), Asset::from(quote), PairStatus::Online)
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let adapter = StaticAdapter::new("venue", 0.001);
        adapter.insert_pair(listing("BTCUSD", "BTC", "USD"), Ticker::new(50_000.0, 10.0));
        adapter.insert_pair(listing("ETHBTC", "ETH", "BTC"), Ticker::new(0.06, 100.0));

        let snapshot = adapter.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.exchange, ExchangeId::from("venue"));
        assert_eq!(snapshot.pairs.len(), 2);
        assert_eq!(snapshot.pairs[0].pair_id, "BTCUSD");

        let rebuilt = StaticAdapter::from_snapshot(snapshot.clone());
        assert_eq!(rebuilt.fetch_snapshot().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_update_ticker_and_unavailable() {
        let adapter = StaticAdapter::new("venue", 0.001);
        adapter.insert_pair(listing("BTCUSD", "BTC", "USD"), Ticker::new(50_000.0, 10.0));
        adapter.update_ticker("BTCUSD", Ticker::new(51_000.0, 11.0));

        let tickers = adapter
            .fetch_tickers(&adapter.fetch_pairs().await.unwrap())
            .await
            .unwrap();
        assert_eq!(tickers["BTCUSD"].last_price, 51_000.0);

        adapter.set_unavailable(true);
        assert!(adapter.fetch_pairs().await.is_err());
        adapter.set_unavailable(false);
        assert!(adapter.fetch_pairs().await.is_ok());
    }
}
