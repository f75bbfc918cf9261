//! Turns per-exchange pair listings and tickers into a `ConversionGraph`.
//!
//! Two ingestion modes share one code path: `load_all` fetches snapshots from
//! exchange adapters and then calls `build`, while callers that already hold
//! the data call `build` directly.

use crate::config::NavigatorConfig;
use crate::errors::NavigatorError;
use crate::graph::{ConversionGraph, Edge};
use common::types::{Asset, ExchangeId, ExchangeSnapshot, PairListing, Ticker};
use exchange_adapter_trait::ExchangeAdapter;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Rounds of price propagation through non-dollar pairs (`ETH/BTC` ...).
const PRICE_PROPAGATION_ROUNDS: usize = 4;

/// What one build ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// Pairs turned into edges, per exchange that was reached.
    pub pairs_loaded: BTreeMap<ExchangeId, usize>,
    /// Exchanges that could not be reached, with the reason.
    pub failures: BTreeMap<ExchangeId, String>,
    /// Listed pairs left out: not tradeable, unpriced, or invalid.
    pub skipped_pairs: usize,
    pub bridge_edges: usize,
}

impl BuildReport {
    pub fn successful_exchanges(&self) -> usize {
        self.pairs_loaded.len()
    }

    pub fn total_pairs(&self) -> usize {
        self.pairs_loaded.values().sum()
    }
}

/// A freshly built graph with the USD prices derived alongside it.
#[derive(Debug, Clone, Default)]
pub struct BuiltGraph {
    pub graph: ConversionGraph,
    pub prices: BTreeMap<Asset, f64>,
    pub report: BuildReport,
}

pub struct GraphBuilder {
    config: NavigatorConfig,
}

impl GraphBuilder {
    pub fn new(config: NavigatorConfig) -> Self {
        Self { config }
    }

    /// Fetches every exchange concurrently. Each fetch is bounded by the
    /// configured timeout, and a failing exchange never holds up the others.
    pub async fn fetch_snapshots(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> (Vec<ExchangeSnapshot>, BTreeMap<ExchangeId, String>) {
        let timeout = self.config.fetch_timeout;
        let fetches = adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let id = ExchangeId::from(adapter.id());
                let result = tokio::time::timeout(timeout, adapter.fetch_snapshot()).await;
                (id, result)
            }
        });

        let mut snapshots = Vec::new();
        let mut failures = BTreeMap::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(Ok(snapshot)) => snapshots.push(snapshot),
                Ok(Err(e)) => {
                    log::warn!("Failed to load {}: {:#}", id, e);
                    failures.insert(id, format!("{e:#}"));
                }
                Err(_) => {
                    log::warn!("Timed out loading {} after {:?}", id, timeout);
                    failures.insert(id, format!("timed out after {timeout:?}"));
                }
            }
        }
        (snapshots, failures)
    }

    /// Network mode. Fails only when no exchange at all could be fetched.
    pub async fn load_all(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> Result<BuiltGraph, NavigatorError> {
        let (snapshots, failures) = self.fetch_snapshots(adapters).await;
        if snapshots.is_empty() {
            return Err(NavigatorError::NoExchangesAvailable {
                attempted: adapters.len(),
            });
        }
        let mut built = self.build(&snapshots);
        built.report.failures = failures;
        Ok(built)
    }

    /// Pass-in mode: builds from snapshots the caller already holds.
    pub fn build(&self, snapshots: &[ExchangeSnapshot]) -> BuiltGraph {
        let mut graph = ConversionGraph::new();
        let mut report = BuildReport::default();

        for snapshot in snapshots {
            let loaded = self.add_exchange(&mut graph, snapshot, &mut report.skipped_pairs);
            log::info!("{}: loaded {} pairs", snapshot.exchange, loaded);
            *report.pairs_loaded.entry(snapshot.exchange.clone()).or_insert(0) += loaded;
        }

        report.bridge_edges = self.add_stablecoin_bridges(&mut graph);
        let prices = self.derive_prices(snapshots);

        log::info!(
            "Graph built: {} assets, {} edges ({} bridges), {} priced assets",
            graph.asset_count(),
            graph.edge_count(),
            report.bridge_edges,
            prices.len()
        );
        BuiltGraph {
            graph,
            prices,
            report,
        }
    }

    fn add_exchange(
        &self,
        graph: &mut ConversionGraph,
        snapshot: &ExchangeSnapshot,
        skipped: &mut usize,
    ) -> usize {
        let mut loaded = 0;
        for pair in &snapshot.pairs {
            if !pair.status.is_tradeable() {
                log::trace!("{}: skipping {} ({})", snapshot.exchange, pair.pair_id, pair.status);
                *skipped += 1;
                continue;
            }
            let Some(ticker) = snapshot.tickers.get(&pair.pair_id) else {
                log::trace!("{}: no ticker for {}", snapshot.exchange, pair.pair_id);
                *skipped += 1;
                continue;
            };
            match self.pair_edges(snapshot, pair, ticker) {
                Ok((forward, reverse)) => {
                    graph.add_edge(forward);
                    graph.add_edge(reverse);
                    loaded += 1;
                }
                Err(e) => {
                    log::debug!("{}: skipping {}: {}", snapshot.exchange, pair.pair_id, e);
                    *skipped += 1;
                }
            }
        }
        loaded
    }

    /// base -> quote at the quoted price, quote -> base at its reciprocal.
    fn pair_edges(
        &self,
        snapshot: &ExchangeSnapshot,
        pair: &PairListing,
        ticker: &Ticker,
    ) -> Result<(Edge, Edge), NavigatorError> {
        let base = Asset::canonical(pair.base.as_str());
        let quote = Asset::canonical(pair.quote.as_str());
        let rate = ticker.last_price;
        let spread = ticker.spread().unwrap_or(self.config.default_spread);

        let forward = Edge::new(
            base.clone(),
            quote.clone(),
            pair.pair_id.clone(),
            snapshot.exchange.clone(),
            rate,
            snapshot.fee_rate,
            spread,
        )?
        .with_volume(ticker.volume);
        let reverse = Edge::new(
            quote,
            base,
            pair.pair_id.clone(),
            snapshot.exchange.clone(),
            1.0 / rate,
            snapshot.fee_rate,
            spread,
        )?
        .with_volume(ticker.volume * rate);
        Ok((forward, reverse))
    }

    /// Near-identity edges, both ways, between every two stablecoins present.
    fn add_stablecoin_bridges(&self, graph: &mut ConversionGraph) -> usize {
        let present: BTreeSet<&Asset> = self
            .config
            .stablecoins
            .iter()
            .filter(|s| graph.contains_asset(s))
            .collect();

        let mut added = 0;
        for from in &present {
            for to in &present {
                if from == to {
                    continue;
                }
                match Edge::bridge(
                    (*from).clone(),
                    (*to).clone(),
                    self.config.stablecoin_bridge_rate,
                    0.0,
                    self.config.stablecoin_bridge_spread,
                ) {
                    Ok(edge) => {
                        graph.add_edge(edge);
                        added += 1;
                    }
                    Err(e) => log::warn!("Cannot bridge {} -> {}: {}", from, to, e),
                }
            }
        }
        if added > 0 {
            log::debug!("Added {} stablecoin bridge edges across {} stablecoins", added, present.len());
        }
        added
    }

    /// USD price per asset, from pairs quoted in dollars first, then spread
    /// through the remaining pairs. Unlisted-but-priced pairs count too: a
    /// halted market still tells what an asset is worth.
    fn derive_prices(&self, snapshots: &[ExchangeSnapshot]) -> BTreeMap<Asset, f64> {
        let quotes: Vec<(Asset, Asset, f64, f64)> = snapshots
            .iter()
            .flat_map(|s| {
                s.pairs.iter().filter_map(|p| {
                    let ticker = s.tickers.get(&p.pair_id)?;
                    let price = ticker.last_price;
                    (price > 0.0 && price.is_finite()).then(|| {
                        (
                            Asset::canonical(p.base.as_str()),
                            Asset::canonical(p.quote.as_str()),
                            price,
                            ticker.volume,
                        )
                    })
                })
            })
            .collect();

        let mut prices: BTreeMap<Asset, f64> = BTreeMap::new();
        // Highest-volume dollar market wins.
        let mut direct: HashMap<Asset, (f64, f64)> = HashMap::new();
        for (base, quote, price, volume) in &quotes {
            for asset in [base, quote] {
                if self.config.is_dollar(asset) {
                    prices.insert(asset.clone(), 1.0);
                }
            }
            let candidate = match (self.config.is_dollar(base), self.config.is_dollar(quote)) {
                (false, true) => Some((base, *price, volume * price)),
                (true, false) => Some((quote, 1.0 / price, *volume)),
                _ => None,
            };
            if let Some((asset, usd, weight)) = candidate {
                let entry = direct.entry(asset.clone()).or_insert((usd, weight));
                if weight > entry.1 {
                    *entry = (usd, weight);
                }
            }
        }
        prices.extend(direct.into_iter().map(|(asset, (usd, _))| (asset, usd)));

        for _ in 0..PRICE_PROPAGATION_ROUNDS {
            let mut learned = Vec::new();
            for (base, quote, price, _) in &quotes {
                match (prices.get(base), prices.get(quote)) {
                    (None, Some(q)) => learned.push((base.clone(), price * q)),
                    (Some(b), None) => learned.push((quote.clone(), b / price)),
                    _ => {}
                }
            }
            if learned.is_empty() {
                break;
            }
            for (asset, usd) in learned {
                if usd.is_finite() && usd > 0.0 {
                    prices.entry(asset).or_insert(usd);
                }
            }
        }
        prices
    }
}
