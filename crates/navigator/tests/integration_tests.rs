//! Integration tests for the navigator: builds over adapters, lifecycle and
//! cache fallback, and query behaviour on known fixtures.

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::types::{Asset, ExchangeId, ExchangeSnapshot, PairListing, PairStatus, Quantity, Ticker};
use exchange_adapter_trait::ExchangeAdapter;
use exchange_adapters::StaticAdapter;
use navigator::{ConversionGraph, Edge, GraphSource, Navigator, NavigatorConfig, NavigatorError, PathFinder};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Default)]
pub struct UnreachableAdapter;

#[async_trait]
impl ExchangeAdapter for UnreachableAdapter {
    fn id(&self) -> &str {
        "unreachable"
    }

    fn fee_rate(&self) -> f64 {
        0.002
    }

    async fn fetch_pairs(&self) -> Result<Vec<PairListing>> {
        bail!("dns error: no such host")
    }

    async fn fetch_tickers(&self, _pairs: &[PairListing]) -> Result<HashMap<String, Ticker>> {
        bail!("dns error: no such host")
    }
}

fn listing(id: &str, base: &str, quote: &str) -> PairListing {
    PairListing::new(id, Asset::from(base), Asset::from(quote), PairStatus::Online)
}

fn kraken() -> StaticAdapter {
    let adapter = StaticAdapter::new("kraken", 0.0026);
    adapter.insert_pair(listing("XXBTZUSD", "BTC", "USD"), Ticker::new(50_000.0, 120.0));
    adapter.insert_pair(listing("XETHZUSD", "ETH", "USD"), Ticker::new(3_000.0, 900.0));
    adapter.insert_pair(listing("USDTZUSD", "USDT", "USD"), Ticker::new(1.0, 1e6));
    adapter
}

fn binance() -> StaticAdapter {
    let adapter = StaticAdapter::new("binance", 0.001);
    adapter.insert_pair(
        listing("BTCUSDT", "BTC", "USDT"),
        Ticker::new(50_020.0, 800.0).with_book(50_015.0, 50_025.0),
    );
    adapter.insert_pair(listing("ETHBTC", "ETH", "BTC"), Ticker::new(0.0601, 500.0));
    adapter.insert_pair(listing("SOLUSDC", "SOL", "USDC"), Ticker::new(150.0, 10_000.0));
    adapter
}

fn config(dir: &TempDir) -> NavigatorConfig {
    NavigatorConfig {
        cache_path: dir.path().join("graph.json"),
        ..Default::default()
    }
}

fn arc(adapter: impl ExchangeAdapter + 'static) -> Arc<dyn ExchangeAdapter> {
    Arc::new(adapter)
}

#[test]
fn test_two_hop_route_beats_worse_direct_route() {
    let usd = Asset::from("USD");
    let btc = Asset::from("BTC");
    let eth = Asset::from("ETH");
    let venue = ExchangeId::from("venue");
    let graph = ConversionGraph::from_edges(vec![
        Edge::new(usd.clone(), btc.clone(), "BTCUSD", venue.clone(), 0.00002, 0.001, 0.001).unwrap(),
        Edge::new(btc.clone(), eth.clone(), "ETHBTC", venue.clone(), 15.0, 0.001, 0.001).unwrap(),
        Edge::new(usd.clone(), eth.clone(), "ETHUSD", venue, 0.0003, 0.0025, 0.002).unwrap(),
    ]);

    let path = PathFinder::new(&graph).find_path(&usd, &eth, 3).unwrap();
    assert_eq!(path.num_hops(), 2);
    assert_eq!(path.assets(), vec![usd, btc, eth]);
    assert!(path.total_rate() > 0.0003 * 0.9975 * 0.999);
}

#[test]
fn test_negative_cost_edges_are_routed_exactly() {
    // Every BTC -> fiat edge has a large negative cost. The best BTC -> EUR
    // route goes through USD and USDT; a clamped cost model would tie them.
    let btc = Asset::from("BTC");
    let venue = ExchangeId::from("venue");
    let edge = |from: &str, to: &str, rate: f64| {
        Edge::new(Asset::from(from), Asset::from(to), "P", venue.clone(), rate, 0.001, 0.0).unwrap()
    };
    let graph = ConversionGraph::from_edges(vec![
        edge("BTC", "EUR", 45_000.0),
        edge("BTC", "USD", 50_000.0),
        edge("USD", "EUR", 0.92),
        edge("EUR", "USD", 1.0 / 0.93),
    ]);
    for e in graph.edges().filter(|e| e.from_asset() == &btc) {
        assert!(e.cost() < 0.0);
    }

    let path = PathFinder::new(&graph).find_path(&btc, &Asset::from("EUR"), 4).unwrap();
    assert_eq!(path.num_hops(), 2);
    assert!((path.total_rate() - 50_000.0 * 0.92 * 0.999 * 0.999).abs() < 1e-6);
}

#[tokio::test]
async fn test_open_builds_then_reuses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let adapters = vec![arc(kraken()), arc(binance())];

    let navigator = Navigator::new(config(&dir));
    let source = navigator.open(&adapters).await.unwrap();
    let GraphSource::Built(report) = &source else {
        panic!("expected a fresh build, got {source:?}");
    };
    assert_eq!(report.pairs_loaded[&ExchangeId::from("kraken")], 3);
    assert_eq!(report.pairs_loaded[&ExchangeId::from("binance")], 3);
    assert!(report.failures.is_empty());
    assert!(dir.path().join("graph.json").exists());

    let second = Navigator::new(config(&dir));
    assert!(matches!(second.open(&adapters).await.unwrap(), GraphSource::Cache { .. }));
    assert_eq!(
        second.snapshot().graph.edge_count(),
        navigator.snapshot().graph.edge_count()
    );
}

#[tokio::test]
async fn test_partial_failure_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let down = kraken();
    down.set_unavailable(true);
    let adapters = vec![arc(down), arc(binance()), arc(UnreachableAdapter)];

    let navigator = Navigator::new(config(&dir));
    let GraphSource::Built(report) = navigator.refresh(&adapters).await.unwrap() else {
        panic!("expected a build");
    };
    assert_eq!(report.successful_exchanges(), 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[&ExchangeId::from("unreachable")].contains("dns error"));

    let path = navigator.find_path("SOL", "ETH", 5).unwrap().unwrap();
    assert_eq!(path.exchanges_used().len(), 2);
}

#[tokio::test]
async fn test_refresh_falls_back_to_cache_when_every_exchange_fails() {
    let dir = tempfile::tempdir().unwrap();
    let kraken = Arc::new(kraken());
    let binance = Arc::new(binance());
    let adapters: Vec<Arc<dyn ExchangeAdapter>> = vec![kraken.clone(), binance.clone()];

    let navigator = Navigator::new(config(&dir));
    navigator.refresh(&adapters).await.unwrap();

    kraken.set_unavailable(true);
    binance.set_unavailable(true);
    let fresh = Navigator::new(config(&dir));
    assert!(matches!(fresh.refresh(&adapters).await.unwrap(), GraphSource::Cache { .. }));
    assert!(fresh.find_path("USD", "ETH", 5).unwrap().is_some());

    let no_cache_dir = tempfile::tempdir().unwrap();
    let cold = Navigator::new(config(&no_cache_dir));
    let err = cold.refresh(&adapters).await.unwrap_err();
    assert!(matches!(err, NavigatorError::NoExchangesAvailable { attempted: 2 }));
}

#[tokio::test]
async fn test_corrupt_cache_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("graph.json"),
        r#"{"timestamp":"2030-01-01T00:00:00Z","assets":[],"prices":{},"edges":[]}"#,
    )
    .unwrap();
    let navigator = Navigator::new(config(&dir));
    let source = navigator.open(&[arc(kraken())]).await.unwrap();
    assert!(matches!(source, GraphSource::Built(_)));
    assert!(!navigator.is_empty());
}

#[tokio::test]
async fn test_ticker_updates_reach_the_next_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let venue = Arc::new(binance());
    let adapters: Vec<Arc<dyn ExchangeAdapter>> = vec![venue.clone()];
    let navigator = Navigator::new(config(&dir));
    navigator.refresh(&adapters).await.unwrap();
    let before = navigator.find_path("BTC", "USDT", 1).unwrap().unwrap();

    venue.update_ticker("BTCUSDT", Ticker::new(60_000.0, 800.0));
    navigator.refresh(&adapters).await.unwrap();
    let after = navigator.find_path("BTC", "USDT", 1).unwrap().unwrap();
    assert!(after.total_rate() > before.total_rate());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queries_stay_consistent_during_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots: Vec<ExchangeSnapshot> = vec![
        kraken().fetch_snapshot().await.unwrap(),
        binance().fetch_snapshot().await.unwrap(),
    ];
    let navigator = Arc::new(Navigator::new(config(&dir)));
    navigator.populate_from_snapshots(&snapshots).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let navigator = Arc::clone(&navigator);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let path = navigator.find_path("USD", "SOL", 5).unwrap().unwrap();
                    assert_eq!(path.destination(), &Asset::from("SOL"));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for _ in 0..20 {
        navigator.populate_from_snapshots(&snapshots).unwrap();
        tokio::task::yield_now().await;
    }
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_best_opportunity_over_live_build() {
    let dir = tempfile::tempdir().unwrap();
    let navigator = Navigator::new(config(&dir));
    navigator.refresh(&[arc(kraken()), arc(binance())]).await.unwrap();

    let best = navigator
        .find_best_opportunity("ETH", Quantity(dec!(10)), None)
        .unwrap()
        .unwrap();
    // Ten ETH is worth about 30k USD whichever target wins.
    let value = best.expected_value_usd;
    assert!(value > dec!(29000) && value < dec!(31000), "{value}");
    assert!((best.confidence - 0.9_f64.powi(best.best_path.num_hops() as i32)).abs() < 1e-12);
}
