use common::types::Asset;
use exchange_adapter_trait::ExchangeAdapter;
use exchange_adapters::{BinanceAdapter, KrakenAdapter};
use navigator::NavigatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// The top-level configuration struct that maps directly to the YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub navigator: NavigatorSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub name: String,
    /// Overrides the venue's default taker fee.
    #[serde(default)]
    pub fee_rate: Option<f64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Venues with a REST adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Kraken,
    Binance,
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kraken" => Ok(ExchangeKind::Kraken),
            "binance" => Ok(ExchangeKind::Binance),
            other => Err(ConfigError::ValidationError(format!("Unknown exchange '{other}'"))),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Kraken => write!(f, "kraken"),
            ExchangeKind::Binance => write!(f, "binance"),
        }
    }
}

/// YAML face of `NavigatorConfig`: durations in seconds, assets as strings.
/// Every field is optional and falls back to the navigator defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigatorSettings {
    pub stablecoins: Vec<String>,
    pub bridge_stablecoin: String,
    pub stablecoin_bridge_rate: f64,
    pub stablecoin_bridge_spread: f64,
    pub dynamic_bridge_fee: f64,
    pub dynamic_bridge_spread: f64,
    pub default_spread: f64,
    pub path_cache_ttl_secs: u64,
    pub graph_cache_ttl_secs: u64,
    pub cache_path: PathBuf,
    pub fetch_timeout_secs: u64,
    pub opportunity_targets: Vec<String>,
    pub default_max_hops: usize,
    pub enumerate_max_hops: usize,
    pub enumerate_max_paths: usize,
    pub arbitrage_min_profit_pct: f64,
    pub arbitrage_max_hops: usize,
    pub arbitrage_max_candidates: usize,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        let defaults = NavigatorConfig::default();
        let symbols = |assets: &[Asset]| assets.iter().map(|a| a.0.clone()).collect();
        Self {
            stablecoins: symbols(&defaults.stablecoins),
            bridge_stablecoin: defaults.bridge_stablecoin.0,
            stablecoin_bridge_rate: defaults.stablecoin_bridge_rate,
            stablecoin_bridge_spread: defaults.stablecoin_bridge_spread,
            dynamic_bridge_fee: defaults.dynamic_bridge_fee,
            dynamic_bridge_spread: defaults.dynamic_bridge_spread,
            default_spread: defaults.default_spread,
            path_cache_ttl_secs: defaults.path_cache_ttl.as_secs(),
            graph_cache_ttl_secs: defaults.graph_cache_ttl.as_secs(),
            cache_path: defaults.cache_path,
            fetch_timeout_secs: defaults.fetch_timeout.as_secs(),
            opportunity_targets: symbols(&defaults.opportunity_targets),
            default_max_hops: defaults.default_max_hops,
            enumerate_max_hops: defaults.enumerate_max_hops,
            enumerate_max_paths: defaults.enumerate_max_paths,
            arbitrage_min_profit_pct: defaults.arbitrage_min_profit_pct,
            arbitrage_max_hops: defaults.arbitrage_max_hops,
            arbitrage_max_candidates: defaults.arbitrage_max_candidates,
        }
    }
}

fn parse_assets(field: &str, symbols: &[String]) -> Result<Vec<Asset>, ConfigError> {
    symbols
        .iter()
        .map(|s| {
            s.parse::<Asset>()
                .map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
        })
        .collect()
}

fn fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must be in [0, 1), got {value}"
        )))
    }
}

impl NavigatorSettings {
    pub fn to_navigator_config(&self) -> Result<NavigatorConfig, ConfigError> {
        Ok(NavigatorConfig {
            stablecoins: parse_assets("stablecoins", &self.stablecoins)?,
            bridge_stablecoin: self
                .bridge_stablecoin
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("bridge_stablecoin: {e}")))?,
            stablecoin_bridge_rate: self.stablecoin_bridge_rate,
            stablecoin_bridge_spread: self.stablecoin_bridge_spread,
            dynamic_bridge_fee: self.dynamic_bridge_fee,
            dynamic_bridge_spread: self.dynamic_bridge_spread,
            default_spread: self.default_spread,
            path_cache_ttl: Duration::from_secs(self.path_cache_ttl_secs),
            graph_cache_ttl: Duration::from_secs(self.graph_cache_ttl_secs),
            cache_path: self.cache_path.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            opportunity_targets: parse_assets("opportunity_targets", &self.opportunity_targets)?,
            default_max_hops: self.default_max_hops,
            enumerate_max_hops: self.enumerate_max_hops,
            enumerate_max_paths: self.enumerate_max_paths,
            arbitrage_min_profit_pct: self.arbitrage_min_profit_pct,
            arbitrage_max_hops: self.arbitrage_max_hops,
            arbitrage_max_candidates: self.arbitrage_max_candidates,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let config = self.to_navigator_config()?;

        if !config.is_stablecoin(&config.bridge_stablecoin) {
            return Err(ConfigError::ValidationError(format!(
                "Bridge stablecoin {} is not in the stablecoin list",
                config.bridge_stablecoin
            )));
        }
        if !(self.stablecoin_bridge_rate > 0.0 && self.stablecoin_bridge_rate <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "stablecoin_bridge_rate must be in (0, 1], got {}",
                self.stablecoin_bridge_rate
            )));
        }
        fraction("stablecoin_bridge_spread", self.stablecoin_bridge_spread)?;
        fraction("dynamic_bridge_fee", self.dynamic_bridge_fee)?;
        fraction("dynamic_bridge_spread", self.dynamic_bridge_spread)?;
        fraction("default_spread", self.default_spread)?;

        if self.path_cache_ttl_secs == 0 || self.graph_cache_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Cache TTLs must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }
        if self.default_max_hops == 0
            || self.enumerate_max_hops == 0
            || self.arbitrage_max_hops == 0
        {
            return Err(ConfigError::ValidationError(
                "Hop limits must be greater than 0".to_string(),
            ));
        }
        if self.enumerate_max_paths == 0 || self.arbitrage_max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "Path counts must be greater than 0".to_string(),
            ));
        }
        if self.arbitrage_min_profit_pct < 0.0 {
            return Err(ConfigError::ValidationError(
                "Minimum profit percentage cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Get exchange configuration by name
    pub fn get_exchange_config(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|ex| ex.name.eq_ignore_ascii_case(name))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::ValidationError(
                "No exchanges configured".to_string(),
            ));
        }
        if !self.exchanges.iter().any(|ex| ex.enabled) {
            return Err(ConfigError::ValidationError(
                "Every configured exchange is disabled".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for ex in &self.exchanges {
            if ex.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Exchange name cannot be empty".to_string(),
                ));
            }
            ex.name.parse::<ExchangeKind>()?;
            if !seen.insert(ex.name.to_ascii_lowercase()) {
                return Err(ConfigError::ValidationError(format!(
                    "Exchange '{}' is configured twice",
                    ex.name
                )));
            }
            if let Some(fee) = ex.fee_rate {
                fraction(&format!("Fee rate for exchange '{}'", ex.name), fee)?;
            }
            if ex.base_url.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::ValidationError(format!(
                    "Base URL for exchange '{}' cannot be empty",
                    ex.name
                )));
            }
        }

        self.navigator.validate()
    }

    pub fn navigator_config(&self) -> Result<NavigatorConfig, ConfigError> {
        self.navigator.to_navigator_config()
    }

    /// One adapter per enabled exchange, in configuration order.
    pub fn build_adapters(&self) -> Result<Vec<Arc<dyn ExchangeAdapter>>, ConfigError> {
        let mut adapters: Vec<Arc<dyn ExchangeAdapter>> = Vec::new();
        for ex in self.exchanges.iter().filter(|ex| ex.enabled) {
            let adapter: Arc<dyn ExchangeAdapter> = match ex.name.parse::<ExchangeKind>()? {
                ExchangeKind::Kraken => {
                    let mut adapter = match &ex.base_url {
                        Some(url) => KrakenAdapter::with_base_url(url.as_str()),
                        None => KrakenAdapter::new(),
                    };
                    if let Some(fee) = ex.fee_rate {
                        adapter = adapter.with_fee_rate(fee);
                    }
                    Arc::new(adapter)
                }
                ExchangeKind::Binance => {
                    let mut adapter = match &ex.base_url {
                        Some(url) => BinanceAdapter::with_base_url(url.as_str()),
                        None => BinanceAdapter::new(),
                    };
                    if let Some(fee) = ex.fee_rate {
                        adapter = adapter.with_fee_rate(fee);
                    }
                    Arc::new(adapter)
                }
            };
            adapters.push(adapter);
        }
        Ok(adapters)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchanges: vec![
                ExchangeConfig {
                    name: ExchangeKind::Kraken.to_string(),
                    fee_rate: None,
                    base_url: None,
                    enabled: true,
                },
                ExchangeConfig {
                    name: ExchangeKind::Binance.to_string(),
                    fee_rate: None,
                    base_url: None,
                    enabled: true,
                },
            ],
            navigator: NavigatorSettings::default(),
        }
    }
}

pub async fn load_config_from_path(path: &str) -> Result<AppConfig, anyhow::Error> {
    let config_str = tokio::fs::read_to_string(path).await?;
    let config: AppConfig = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
