use anyhow::Result;
use async_trait::async_trait;
use common::types::{ExchangeId, ExchangeSnapshot, PairListing, Ticker};
use std::collections::HashMap;

/// A source of pair listings and ticker snapshots for one exchange.
///
/// Implementations coerce the venue payload into the fixed input schema at the
/// boundary: assets are canonical, dark/delisted markers are mapped onto
/// [`common::PairStatus`], tickers are keyed by the listing's `pair_id`.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Returns the unique identifier for the adapter.
    fn id(&self) -> &str;

    /// Taker fee fraction charged by the venue.
    fn fee_rate(&self) -> f64;

    /// Fetches every market listed on the venue, tradeable or not.
    async fn fetch_pairs(&self) -> Result<Vec<PairListing>>;

    /// Fetches last price and volume for the given markets.
    async fn fetch_tickers(&self, pairs: &[PairListing]) -> Result<HashMap<String, Ticker>>;

    /// Fetches pairs then tickers and bundles them for the graph builder.
    async fn fetch_snapshot(&self) -> Result<ExchangeSnapshot> {
        let pairs = self.fetch_pairs().await?;
        let tickers = self.fetch_tickers(&pairs).await?;
        Ok(ExchangeSnapshot {
            exchange: ExchangeId::from(self.id()),
            fee_rate: self.fee_rate(),
            pairs,
            tickers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Asset, PairStatus};

    struct OnePairAdapter;

    #[async_trait]
    impl ExchangeAdapter for OnePairAdapter {
        fn id(&self) -> &str {
            "one-pair"
        }

        fn fee_rate(&self) -> f64 {
            0.002
        }

        async fn fetch_pairs(&self) -> Result<Vec<PairListing>> {
            Ok(vec![PairListing::new(
                "BTCUSD",
                Asset::from("BTC"),
                Asset::from("USD"),
                PairStatus::Online,
            )])
        }

        async fn fetch_tickers(&self, pairs: &[PairListing]) -> Result<HashMap<String, Ticker>> {
            Ok(pairs
                .iter()
                .map(|p| (p.pair_id.clone(), Ticker::new(50_000.0, 12.0)))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_default_fetch_snapshot_bundles_pairs_and_tickers() {
        let snapshot = OnePairAdapter.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.exchange, ExchangeId::from("one-pair"));
        assert_eq!(snapshot.fee_rate, 0.002);
        assert_eq!(snapshot.pairs.len(), 1);
        assert_eq!(snapshot.tickers["BTCUSD"].last_price, 50_000.0);
    }
}
