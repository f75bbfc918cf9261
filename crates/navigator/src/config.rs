use common::types::Asset;
use std::path::PathBuf;
use std::time::Duration;

/// Tuning knobs for graph construction, caching and query defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorConfig {
    /// Assets linked to each other by synthetic near-identity bridges.
    pub stablecoins: Vec<Asset>,
    /// Stablecoin used to bridge assets that are missing from the graph.
    pub bridge_stablecoin: Asset,
    pub stablecoin_bridge_rate: f64,
    pub stablecoin_bridge_spread: f64,
    pub dynamic_bridge_fee: f64,
    pub dynamic_bridge_spread: f64,
    /// Spread applied when a ticker carries no usable bid/ask.
    pub default_spread: f64,
    pub path_cache_ttl: Duration,
    pub graph_cache_ttl: Duration,
    pub cache_path: PathBuf,
    /// Per-exchange deadline for a network fetch.
    pub fetch_timeout: Duration,
    /// Assets considered when no explicit want list is given.
    pub opportunity_targets: Vec<Asset>,
    pub default_max_hops: usize,
    pub enumerate_max_hops: usize,
    pub enumerate_max_paths: usize,
    pub arbitrage_min_profit_pct: f64,
    pub arbitrage_max_hops: usize,
    /// Cycles ranked per arbitrage scan before the profit filter.
    pub arbitrage_max_candidates: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        let assets = |symbols: &[&str]| symbols.iter().map(|s| Asset::from(*s)).collect();
        Self {
            stablecoins: assets(&["USDT", "USDC", "DAI", "BUSD", "TUSD", "USDP", "PYUSD"]),
            bridge_stablecoin: Asset::from("USDT"),
            stablecoin_bridge_rate: 0.999,
            stablecoin_bridge_spread: 0.0001,
            dynamic_bridge_fee: 0.001,
            dynamic_bridge_spread: 0.001,
            default_spread: 0.001,
            path_cache_ttl: Duration::from_secs(30),
            graph_cache_ttl: Duration::from_secs(300),
            cache_path: PathBuf::from("navigator_cache.json"),
            fetch_timeout: Duration::from_secs(10),
            opportunity_targets: assets(&["BTC", "ETH", "USDT", "USDC", "USD", "SOL", "EUR"]),
            default_max_hops: 5,
            enumerate_max_hops: 4,
            enumerate_max_paths: 5,
            arbitrage_min_profit_pct: 0.1,
            arbitrage_max_hops: 4,
            arbitrage_max_candidates: 50,
        }
    }
}

impl NavigatorConfig {
    pub fn is_stablecoin(&self, asset: &Asset) -> bool {
        self.stablecoins.contains(asset)
    }

    /// Stablecoins plus USD itself: assets priced at one dollar.
    pub fn is_dollar(&self, asset: &Asset) -> bool {
        asset.as_str() == "USD" || self.is_stablecoin(asset)
    }
}
