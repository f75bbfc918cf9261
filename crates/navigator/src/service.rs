use crate::arbitrage::find_arbitrage;
use crate::bellman_ford::PathFinder;
use crate::builder::{BuildReport, BuiltGraph, GraphBuilder};
use crate::cache::{CacheError, GraphCache, GraphRecord, PathCache, PathKey};
use crate::config::NavigatorConfig;
use crate::enumerator::find_all_paths;
use crate::errors::NavigatorError;
use crate::graph::{AssetConnectivity, ConversionGraph, Edge, GraphSummary};
use crate::opportunity::{select_best, Opportunity};
use crate::path::Path;
use chrono::{DateTime, Utc};
use common::types::{Asset, ExchangeSnapshot, Quantity};
use dashmap::DashMap;
use exchange_adapter_trait::ExchangeAdapter;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// The graph queries run against. Replaced wholesale on rebuild, never
/// mutated in place while shared.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub graph: ConversionGraph,
    pub prices: BTreeMap<Asset, f64>,
    pub built_at: DateTime<Utc>,
    /// Bumped on every install; path cache entries are tied to it.
    pub generation: u64,
}

/// Where the live graph came from after `open` or `refresh`.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSource {
    Built(BuildReport),
    Cache { age: Duration },
}

/// One conversion graph plus its caches, owned by the host application and
/// shared by reference (or `Arc`) with every caller.
pub struct Navigator {
    config: NavigatorConfig,
    builder: GraphBuilder,
    state: RwLock<Arc<GraphState>>,
    path_cache: PathCache,
    graph_cache: GraphCache,
    /// Assets a dynamic bridge failed for.
    bridge_failures: DashMap<Asset, ()>,
}

impl Navigator {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            builder: GraphBuilder::new(config.clone()),
            state: RwLock::new(Arc::new(GraphState::default())),
            path_cache: PathCache::new(config.path_cache_ttl),
            graph_cache: GraphCache::new(config.cache_path.clone()),
            bridge_failures: DashMap::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(NavigatorConfig::default())
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// The current graph. Holding the `Arc` keeps a consistent view even if
    /// a rebuild swaps in a new graph meanwhile.
    pub fn snapshot(&self) -> Arc<GraphState> {
        Arc::clone(&self.state.read())
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().graph.is_empty()
    }

    // --- Lifecycle ---

    /// Starts from a fresh cache if there is one, otherwise from the exchanges.
    pub async fn open(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> Result<GraphSource, NavigatorError> {
        match self.load_fresh_cache() {
            Ok(age) => Ok(GraphSource::Cache { age }),
            Err(e) => {
                log::info!("Graph cache unusable ({}), building from exchanges", e);
                self.refresh(adapters).await
            }
        }
    }

    /// Rebuilds from the exchanges, falling back to the cache on disk (of any
    /// age) when no exchange could be loaded.
    pub async fn refresh(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> Result<GraphSource, NavigatorError> {
        match self.rebuild(adapters).await {
            Ok(report) => Ok(GraphSource::Built(report)),
            Err(e @ (NavigatorError::NoExchangesAvailable { .. } | NavigatorError::EmptyGraph)) => {
                log::warn!("{}; falling back to graph cache", e);
                match self.load_cache() {
                    Ok(age) => Ok(GraphSource::Cache { age }),
                    Err(cache_err) => {
                        log::warn!("Graph cache fallback failed: {}", cache_err);
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Network-mode build; installs the result and writes the cache.
    pub async fn rebuild(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
    ) -> Result<BuildReport, NavigatorError> {
        let built = self.builder.load_all(adapters).await?;
        self.commit(built)
    }

    /// Pass-in mode: builds from data the caller already fetched.
    pub fn populate_from_snapshots(
        &self,
        snapshots: &[ExchangeSnapshot],
    ) -> Result<BuildReport, NavigatorError> {
        if snapshots.is_empty() {
            return Err(NavigatorError::NoExchangesAvailable { attempted: 0 });
        }
        let built = self.builder.build(snapshots);
        self.commit(built)
    }

    fn commit(&self, built: BuiltGraph) -> Result<BuildReport, NavigatorError> {
        if built.graph.edge_count() == 0 {
            return Err(NavigatorError::EmptyGraph);
        }
        let built_at = Utc::now();
        let record = GraphRecord::capture(&built.graph, &built.prices, built_at);
        if let Err(e) = self.graph_cache.save(&record) {
            log::warn!("Failed to save graph cache: {}", e);
        }
        self.install(built.graph, built.prices, built_at);
        Ok(built.report)
    }

    fn install(&self, graph: ConversionGraph, prices: BTreeMap<Asset, f64>, built_at: DateTime<Utc>) {
        {
            let mut guard = self.state.write();
            let generation = guard.generation + 1;
            *guard = Arc::new(GraphState {
                graph,
                prices,
                built_at,
                generation,
            });
        }
        self.path_cache.clear();
    }

    /// Installs the cached graph regardless of age. Returns the record's age.
    pub fn load_cache(&self) -> Result<Duration, CacheError> {
        let record = self.graph_cache.load()?;
        Ok(self.install_record(record))
    }

    /// Installs the cached graph only if it is younger than the graph TTL.
    pub fn load_fresh_cache(&self) -> Result<Duration, CacheError> {
        let record = self.graph_cache.load_fresh(self.config.graph_cache_ttl)?;
        Ok(self.install_record(record))
    }

    fn install_record(&self, record: GraphRecord) -> Duration {
        let age = record.age();
        let graph = record.to_graph();
        log::info!(
            "Loaded graph cache from {} ({} assets, {} edges, {:?} old)",
            self.graph_cache.path().display(),
            graph.asset_count(),
            graph.edge_count(),
            age
        );
        self.install(graph, record.prices, record.timestamp);
        age
    }

    pub fn save_cache(&self) -> Result<(), CacheError> {
        let state = self.snapshot();
        self.graph_cache
            .save(&GraphRecord::capture(&state.graph, &state.prices, state.built_at))
    }

    pub fn save_path_cache(&self, file: impl AsRef<std::path::Path>) -> Result<usize, CacheError> {
        self.path_cache.save(file)
    }

    /// Loads persisted path results against the current graph.
    pub fn load_path_cache(&self, file: impl AsRef<std::path::Path>) -> Result<usize, CacheError> {
        self.path_cache.load(file, self.snapshot().generation)
    }

    /// Merges externally sourced USD prices into the current graph state.
    pub fn update_prices(&self, prices: impl IntoIterator<Item = (Asset, f64)>) {
        let mut guard = self.state.write();
        let mut next = (**guard).clone();
        next.prices
            .extend(prices.into_iter().filter(|(_, p)| p.is_finite() && *p > 0.0));
        *guard = Arc::new(next);
    }

    pub fn price(&self, asset: &Asset) -> Option<f64> {
        self.snapshot().prices.get(asset).copied()
    }

    // --- Queries ---

    /// Best route using at most `max_hops` edges. `Ok(None)` when both assets
    /// are known but not connected.
    pub fn find_path(
        &self,
        source: &str,
        destination: &str,
        max_hops: usize,
    ) -> Result<Option<Path>, NavigatorError> {
        let source = self.resolve(source)?;
        let destination = self.resolve(destination)?;
        Ok(self.cached_path(&source, &destination, max_hops))
    }

    pub fn find_all_paths(
        &self,
        source: &str,
        destination: &str,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<Path>, NavigatorError> {
        let source = self.resolve(source)?;
        let destination = self.resolve(destination)?;
        let state = self.snapshot();
        Ok(find_all_paths(&state.graph, &source, &destination, max_hops, max_paths))
    }

    pub fn find_arbitrage(
        &self,
        start: &str,
        min_profit_pct: f64,
        max_hops: usize,
    ) -> Result<Vec<Path>, NavigatorError> {
        let start = self.resolve(start)?;
        let state = self.snapshot();
        Ok(find_arbitrage(
            &state.graph,
            &start,
            min_profit_pct,
            max_hops,
            self.config.arbitrage_max_candidates,
        ))
    }

    /// The most valuable (in USD) conversion of `have_amount` into one of
    /// `want_assets`, or the configured targets when none are given. Targets
    /// that are unknown, unreachable or unpriced are skipped.
    pub fn find_best_opportunity(
        &self,
        have: &str,
        have_amount: Quantity,
        want_assets: Option<&[&str]>,
    ) -> Result<Option<Opportunity>, NavigatorError> {
        let have = self.resolve(have)?;
        let mut targets: Vec<Asset> = match want_assets {
            Some(symbols) => symbols
                .iter()
                .map(|s| s.parse::<Asset>())
                .collect::<Result<_, _>>()?,
            None => self.config.opportunity_targets.clone(),
        };
        let mut seen = HashSet::new();
        targets.retain(|t| t != &have && seen.insert(t.clone()));

        let mut candidates = Vec::new();
        for want in targets {
            if let Err(e) = self.ensure_asset(&want) {
                log::debug!("Skipping {}: {}", want, e);
                continue;
            }
            let Some(path) = self.cached_path(&have, &want, self.config.default_max_hops) else {
                continue;
            };
            let Some(price) = self.price(&want) else {
                log::debug!("Skipping {}: no USD price", want);
                continue;
            };
            if let Some(opportunity) = Opportunity::project(have_amount, path, price) {
                candidates.push(opportunity);
            }
        }
        Ok(select_best(candidates))
    }

    pub fn graph_summary(&self) -> GraphSummary {
        GraphSummary::of(&self.snapshot().graph)
    }

    pub fn asset_connectivity(&self, asset: &str) -> Result<AssetConnectivity, NavigatorError> {
        let asset: Asset = asset.parse()?;
        AssetConnectivity::of(&self.snapshot().graph, &asset)
            .ok_or(NavigatorError::AssetNotFound(asset))
    }

    fn cached_path(&self, source: &Asset, destination: &Asset, max_hops: usize) -> Option<Path> {
        let state = self.snapshot();
        let key = PathKey::new(source.clone(), destination.clone(), max_hops);
        if let Some(path) = self.path_cache.get(&key, state.generation) {
            log::debug!("Path cache hit: {} -> {} ({} hops max)", source, destination, max_hops);
            return Some(path);
        }
        let path = PathFinder::new(&state.graph).find_path(source, destination, max_hops)?;
        self.path_cache.insert(key, path.clone(), state.generation);
        Some(path)
    }

    // --- Asset resolution ---

    fn resolve(&self, symbol: &str) -> Result<Asset, NavigatorError> {
        let asset: Asset = symbol.parse()?;
        self.ensure_asset(&asset)?;
        Ok(asset)
    }

    /// Makes sure `asset` is in the graph, bridging it to the configured
    /// stablecoin when missing. A failed bridge is not retried; a successful
    /// one is redone after a rebuild drops it.
    fn ensure_asset(&self, asset: &Asset) -> Result<(), NavigatorError> {
        if self.snapshot().graph.contains_asset(asset) {
            return Ok(());
        }
        if self.bridge_failures.contains_key(asset) {
            return Err(NavigatorError::AssetNotFound(asset.clone()));
        }
        match self.bridge_asset(asset) {
            Ok(()) => Ok(()),
            Err(reason) => {
                if self.bridge_failures.insert(asset.clone(), ()).is_none() {
                    log::warn!("Cannot bridge unknown asset {}: {}", asset, reason);
                }
                Err(NavigatorError::AssetNotFound(asset.clone()))
            }
        }
    }

    /// Adds `asset <-> bridge stablecoin` edges priced from the USD map.
    /// Copy-on-write: the live graph is cloned, extended and swapped in.
    fn bridge_asset(&self, asset: &Asset) -> Result<(), String> {
        let stable = &self.config.bridge_stablecoin;
        let mut guard = self.state.write();
        if guard.graph.contains_asset(asset) {
            return Ok(());
        }
        if !guard.graph.contains_asset(stable) {
            return Err(format!("bridge stablecoin {stable} is not in the graph"));
        }
        let usd = guard
            .prices
            .get(asset)
            .copied()
            .ok_or_else(|| "no USD price".to_string())?;
        let stable_usd = guard.prices.get(stable).copied().unwrap_or(1.0);
        let rate = usd / stable_usd;

        let fee = self.config.dynamic_bridge_fee;
        let spread = self.config.dynamic_bridge_spread;
        let out = Edge::bridge(asset.clone(), stable.clone(), rate, fee, spread)
            .map_err(|e| e.to_string())?;
        let back = Edge::bridge(stable.clone(), asset.clone(), 1.0 / rate, fee, spread)
            .map_err(|e| e.to_string())?;

        let mut next = (**guard).clone();
        next.graph.add_edge(out);
        next.graph.add_edge(back);
        *guard = Arc::new(next);
        log::warn!("Dynamically bridged {} to {} at {}", asset, stable, rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{ExchangeId, PairListing, PairStatus, Ticker};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn snapshot(exchange: &str, fee: f64, pairs: &[(&str, &str, f64, PairStatus)]) -> ExchangeSnapshot {
        let mut snap = ExchangeSnapshot {
            exchange: ExchangeId::from(exchange),
            fee_rate: fee,
            ..Default::default()
        };
        for (base, quote, price, status) in pairs {
            let id = format!("{base}{quote}");
            snap.tickers.insert(id.clone(), Ticker::new(*price, 100.0));
            snap.pairs.push(PairListing::new(id, Asset::from(*base), Asset::from(*quote), *status));
        }
        snap
    }

    fn market() -> Vec<ExchangeSnapshot> {
        use PairStatus::*;
        vec![
            snapshot(
                "kraken",
                0.0026,
                &[
                    ("XBT", "USD", 50_000.0, Online),
                    ("ETH", "XBT", 0.06, Online),
                    ("USDT", "USD", 1.0, Online),
                    ("DOGE", "USD", 0.1, Delisted),
                ],
            ),
            snapshot(
                "binance",
                0.001,
                &[
                    ("BTC", "USDT", 50_050.0, Online),
                    ("ETH", "USDT", 3_010.0, Online),
                    ("SOL", "USDC", 150.0, Online),
                ],
            ),
        ]
    }

    fn navigator() -> (Navigator, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = NavigatorConfig {
            cache_path: dir.path().join("graph.json"),
            ..Default::default()
        };
        let navigator = Navigator::new(config);
        navigator.populate_from_snapshots(&market()).unwrap();
        (navigator, dir)
    }

    #[test]
    fn test_find_path_canonicalizes_and_caches() {
        let (navigator, _dir) = navigator();
        let first = navigator.find_path("usd", "xbt", 5).unwrap().unwrap();
        assert_eq!(first.source(), &Asset::from("USD"));
        assert_eq!(first.destination(), &Asset::from("BTC"));
        assert_eq!(navigator.path_cache.len(), 1);

        let second = navigator.find_path("USD", "BTC", 5).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(navigator.path_cache.len(), 1);

        navigator.find_path("USD", "BTC", 2).unwrap();
        assert_eq!(navigator.path_cache.len(), 2);
    }

    #[test]
    fn test_no_path_is_distinct_from_unknown_asset() {
        let (navigator, _dir) = navigator();
        // SOL only trades against USDC, and USDC is bridged to USDT, so it is
        // reachable; a zero hop budget is not.
        assert!(navigator.find_path("BTC", "SOL", 5).unwrap().is_some());
        assert!(navigator.find_path("BTC", "SOL", 0).unwrap().is_none());

        let err = navigator.find_path("BTC", "NOPE", 5).unwrap_err();
        assert!(matches!(err, NavigatorError::AssetNotFound(a) if a == Asset::from("NOPE")));

        assert!(matches!(
            navigator.find_path("", "BTC", 5),
            Err(NavigatorError::Common(_))
        ));
    }

    #[test]
    fn test_dynamic_bridge_for_priced_asset() {
        let (navigator, _dir) = navigator();
        // DOGE is delisted but priced from its last trade.
        assert_eq!(navigator.price(&Asset::from("DOGE")), Some(0.1));
        assert!(!navigator.snapshot().graph.contains_asset(&Asset::from("DOGE")));

        let path = navigator.find_path("DOGE", "BTC", 5).unwrap().unwrap();
        assert_eq!(path.edges()[0].to_asset(), &Asset::from("USDT"));
        assert!(path.edges()[0].is_bridge());
        assert!(navigator.snapshot().graph.contains_asset(&Asset::from("DOGE")));
    }

    #[test]
    fn test_dynamic_bridge_survives_rebuild() {
        let (navigator, _dir) = navigator();
        assert!(navigator.find_path("DOGE", "BTC", 5).unwrap().is_some());

        navigator.populate_from_snapshots(&market()).unwrap();
        assert!(!navigator.snapshot().graph.contains_asset(&Asset::from("DOGE")));

        let path = navigator.find_path("DOGE", "BTC", 5).unwrap().unwrap();
        assert!(path.edges()[0].is_bridge());
        assert!(!navigator.bridge_failures.contains_key(&Asset::from("DOGE")));
    }

    #[test]
    fn test_unknown_asset_bridge_attempted_once() {
        let (navigator, _dir) = navigator();
        assert!(navigator.find_path("NOPE", "BTC", 5).is_err());
        assert!(navigator.bridge_failures.contains_key(&Asset::from("NOPE")));

        // A price arriving later does not trigger a second attempt.
        navigator.update_prices([(Asset::from("NOPE"), 2.0)]);
        assert!(matches!(
            navigator.find_path("NOPE", "BTC", 5),
            Err(NavigatorError::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_rebuild_swaps_graph_and_clears_path_cache() {
        let (navigator, _dir) = navigator();
        let before = navigator.snapshot();
        navigator.find_path("USD", "ETH", 5).unwrap();
        assert_eq!(navigator.path_cache.len(), 1);

        navigator.populate_from_snapshots(&market()[1..]).unwrap();
        assert!(navigator.path_cache.is_empty());
        let after = navigator.snapshot();
        assert!(after.generation > before.generation);
        // The old view is still whole for whoever holds it.
        assert!(before.graph.contains_asset(&Asset::from("USD")));
        assert!(!after.graph.contains_asset(&Asset::from("USD")));
    }

    #[test]
    fn test_empty_input_keeps_current_graph() {
        let (navigator, _dir) = navigator();
        let count = navigator.snapshot().graph.edge_count();
        assert!(matches!(
            navigator.populate_from_snapshots(&[]),
            Err(NavigatorError::NoExchangesAvailable { attempted: 0 })
        ));
        let dead = snapshot("kraken", 0.0026, &[("BTC", "USD", 50_000.0, PairStatus::Dark)]);
        assert!(matches!(
            navigator.populate_from_snapshots(&[dead]),
            Err(NavigatorError::EmptyGraph)
        ));
        assert_eq!(navigator.snapshot().graph.edge_count(), count);
    }

    #[test]
    fn test_build_writes_cache_and_fresh_instance_loads_it() {
        let (navigator, dir) = navigator();
        let config = NavigatorConfig {
            cache_path: dir.path().join("graph.json"),
            ..Default::default()
        };
        let restored = Navigator::new(config);
        assert!(restored.is_empty());
        restored.load_fresh_cache().unwrap();

        let a = navigator.snapshot();
        let b = restored.snapshot();
        assert_eq!(a.graph.assets(), b.graph.assets());
        assert_eq!(a.graph.edge_count(), b.graph.edge_count());
        assert_eq!(a.prices, b.prices);

        let p = navigator.find_path("USD", "ETH", 5).unwrap().unwrap();
        let q = restored.find_path("USD", "ETH", 5).unwrap().unwrap();
        assert!((p.total_rate() - q.total_rate()).abs() < 1e-12);
    }

    #[test]
    fn test_arbitrage_and_enumeration() {
        let (navigator, _dir) = navigator();
        let paths = navigator.find_all_paths("USD", "ETH", 4, 5).unwrap();
        assert!(!paths.is_empty() && paths.len() <= 5);
        for pair in paths.windows(2) {
            assert!(pair[0].total_rate() >= pair[1].total_rate());
        }
        // Fees on every leg and consistent prices: nothing to arbitrage.
        assert!(navigator.find_arbitrage("USD", 0.1, 4).unwrap().is_empty());
    }

    #[test]
    fn test_best_opportunity() {
        let (navigator, _dir) = navigator();
        let best = navigator
            .find_best_opportunity("BTC", Quantity(dec!(1)), None)
            .unwrap()
            .unwrap();
        assert_eq!(best.have_asset, Asset::from("BTC"));
        assert_ne!(best.want_asset, Asset::from("BTC"));
        assert!(best.expected_value_usd > dec!(40000));
        assert!(best.confidence > 0.0 && best.confidence <= 0.9);

        let only_eth = navigator
            .find_best_opportunity("BTC", Quantity(dec!(1)), Some(&["eth", "NOPE"][..]))
            .unwrap()
            .unwrap();
        assert_eq!(only_eth.want_asset, Asset::from("ETH"));

        assert!(navigator
            .find_best_opportunity("BTC", Quantity(dec!(1)), Some(&["BTC"][..]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_introspection() {
        let (navigator, _dir) = navigator();
        let summary = navigator.graph_summary();
        assert_eq!(summary.asset_count, navigator.snapshot().graph.asset_count());
        assert!(summary.bridge_edge_count >= 2);

        let usdt = navigator.asset_connectivity("usdt").unwrap();
        assert!(usdt.neighbors.contains(&Asset::from("USDC")));
        assert!(matches!(
            navigator.asset_connectivity("NOPE"),
            Err(NavigatorError::AssetNotFound(_))
        ));
    }
}
