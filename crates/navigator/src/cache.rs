//! Durable graph snapshots and the in-memory path result cache.

use crate::graph::{ConversionGraph, Edge};
use crate::path::Path;
use chrono::{DateTime, Utc};
use common::types::Asset;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Every variant is a cache miss to callers; none is fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed cache record: {0}")]
    Malformed(serde_json::Error),
    #[error("Cache record has no {0}")]
    Empty(&'static str),
    #[error("Cache record is inconsistent: {0}")]
    Inconsistent(String),
    #[error("Cache record is {age:?} old, older than {ttl:?}")]
    Stale { age: Duration, ttl: Duration },
    #[error("Failed to serialize cache record: {0}")]
    Serialize(serde_json::Error),
}

/// `{timestamp, assets, prices, edges}` as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub timestamp: DateTime<Utc>,
    pub assets: Vec<Asset>,
    pub prices: BTreeMap<Asset, f64>,
    pub edges: Vec<Edge>,
}

impl GraphRecord {
    pub fn capture(
        graph: &ConversionGraph,
        prices: &BTreeMap<Asset, f64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            assets: graph.assets(),
            prices: prices.clone(),
            edges: graph.edges().cloned().collect(),
        }
    }

    /// An empty asset set or edge list is never a usable graph.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.assets.is_empty() {
            return Err(CacheError::Empty("assets"));
        }
        if self.edges.is_empty() {
            return Err(CacheError::Empty("edges"));
        }
        let assets: BTreeSet<&Asset> = self.assets.iter().collect();
        if let Some(edge) = self
            .edges
            .iter()
            .find(|e| !assets.contains(e.from_asset()) || !assets.contains(e.to_asset()))
        {
            return Err(CacheError::Inconsistent(format!(
                "edge {} -> {} references an unlisted asset",
                edge.from_asset(),
                edge.to_asset()
            )));
        }
        Ok(())
    }

    /// Time since the record was written. Clock skew into the future counts as zero.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }

    pub fn to_graph(&self) -> ConversionGraph {
        let mut graph = ConversionGraph::new();
        for asset in &self.assets {
            graph.add_asset(asset);
        }
        for edge in &self.edges {
            graph.add_edge(edge.clone());
        }
        graph
    }
}

/// Graph snapshot file.
#[derive(Debug, Clone)]
pub struct GraphCache {
    path: PathBuf,
}

impl GraphCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn save(&self, record: &GraphRecord) -> Result<(), CacheError> {
        record.validate()?;
        let bytes = serde_json::to_vec_pretty(record).map_err(CacheError::Serialize)?;
        write_atomically(&self.path, &bytes)?;
        log::info!(
            "Saved graph cache to {} ({} assets, {} edges)",
            self.path.display(),
            record.assets.len(),
            record.edges.len()
        );
        Ok(())
    }

    /// Reads and validates the record, whatever its age.
    pub fn load(&self) -> Result<GraphRecord, CacheError> {
        let bytes = fs::read(&self.path)?;
        let record: GraphRecord = serde_json::from_slice(&bytes).map_err(CacheError::Malformed)?;
        record.validate()?;
        Ok(record)
    }

    /// Like `load`, but a record older than `ttl` is `Stale`.
    pub fn load_fresh(&self, ttl: Duration) -> Result<GraphRecord, CacheError> {
        let record = self.load()?;
        let age = record.age();
        if age > ttl {
            return Err(CacheError::Stale { age, ttl });
        }
        Ok(record)
    }
}

/// Writes through a sibling temp file so readers never see a torn record.
fn write_atomically(path: &std::path::Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Path cache key. The hop budget is part of the query, so part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathKey {
    pub source: Asset,
    pub destination: Asset,
    pub max_hops: usize,
}

impl PathKey {
    pub fn new(source: Asset, destination: Asset, max_hops: usize) -> Self {
        Self {
            source,
            destination,
            max_hops,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPath {
    path: Path,
    /// Graph generation the path was computed on.
    generation: u64,
    stored: Instant,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PathRecordEntry {
    #[serde(flatten)]
    key: PathKey,
    stored_at: DateTime<Utc>,
    path: Path,
}

#[derive(Debug, Serialize, Deserialize)]
struct PathCacheRecord {
    timestamp: DateTime<Utc>,
    entries: Vec<PathRecordEntry>,
}

/// Concurrent TTL cache of successful path searches.
#[derive(Debug)]
pub struct PathCache {
    entries: DashMap<PathKey, CachedPath>,
    ttl: Duration,
}

impl PathCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// A hit must be younger than the TTL and computed on `generation`.
    pub fn get(&self, key: &PathKey, generation: u64) -> Option<Path> {
        {
            let entry = self.entries.get(key)?;
            if entry.generation == generation && entry.stored.elapsed() < self.ttl {
                return Some(entry.path.clone());
            }
        }
        self.entries
            .remove_if(key, |_, e| e.generation != generation || e.stored.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, key: PathKey, path: Path, generation: u64) {
        self.entries.insert(
            key,
            CachedPath {
                path,
                generation,
                stored: Instant::now(),
                stored_at: Utc::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persists unexpired entries as a timestamped JSON record.
    pub fn save(&self, file: impl AsRef<std::path::Path>) -> Result<usize, CacheError> {
        let entries: Vec<PathRecordEntry> = self
            .entries
            .iter()
            .filter(|e| e.stored.elapsed() < self.ttl)
            .map(|e| PathRecordEntry {
                key: e.key().clone(),
                stored_at: e.stored_at,
                path: e.path.clone(),
            })
            .collect();
        let record = PathCacheRecord {
            timestamp: Utc::now(),
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(CacheError::Serialize)?;
        write_atomically(file.as_ref(), &bytes)?;
        Ok(record.entries.len())
    }

    /// Loads entries still within the TTL, tagging them with `generation`.
    /// Returns how many were kept.
    pub fn load(&self, file: impl AsRef<std::path::Path>, generation: u64) -> Result<usize, CacheError> {
        let bytes = fs::read(file.as_ref())?;
        let record: PathCacheRecord =
            serde_json::from_slice(&bytes).map_err(CacheError::Malformed)?;

        let mut kept = 0;
        for entry in record.entries {
            let Ok(age) = (Utc::now() - entry.stored_at).to_std() else {
                continue;
            };
            if age >= self.ttl {
                continue;
            }
            let Some(stored) = Instant::now().checked_sub(age) else {
                continue;
            };
            self.entries.insert(
                entry.key,
                CachedPath {
                    path: entry.path,
                    generation,
                    stored,
                    stored_at: entry.stored_at,
                },
            );
            kept += 1;
        }
        log::debug!("Loaded {} cached path results", kept);
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ExchangeId;
    use std::thread::sleep;
    use tempfile::tempdir;

    fn edge(from: &str, to: &str, rate: f64) -> Edge {
        Edge::new(
            Asset::from(from),
            Asset::from(to),
            format!("{from}{to}"),
            ExchangeId::from("kraken"),
            rate,
            0.0026,
            0.001,
        )
        .unwrap()
        .with_volume(42.0)
    }

    fn graph() -> ConversionGraph {
        ConversionGraph::from_edges(vec![
            edge("BTC", "USD", 50_000.0),
            edge("USD", "BTC", 1.0 / 50_000.0),
            edge("ETH", "BTC", 0.06),
            edge("BTC", "ETH", 1.0 / 0.06),
        ])
    }

    fn prices() -> BTreeMap<Asset, f64> {
        BTreeMap::from([
            (Asset::from("USD"), 1.0),
            (Asset::from("BTC"), 50_000.0),
            (Asset::from("ETH"), 3_000.0),
        ])
    }

    #[test]
    fn test_graph_round_trip() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("graph.json"));
        let original = graph();
        cache
            .save(&GraphRecord::capture(&original, &prices(), Utc::now()))
            .unwrap();

        let record = GraphCache::new(dir.path().join("graph.json")).load().unwrap();
        let restored = record.to_graph();
        assert_eq!(restored.assets(), original.assets());
        assert_eq!(restored.edge_count(), original.edge_count());
        for (a, b) in original.edges().zip(restored.edges()) {
            assert_eq!(a.from_asset(), b.from_asset());
            assert!((a.rate() - b.rate()).abs() <= a.rate() * 1e-12);
            assert!((a.effective_rate() - b.effective_rate()).abs() <= a.effective_rate() * 1e-12);
        }
        assert_eq!(record.prices, prices());
    }

    #[test]
    fn test_record_layout() {
        let record = GraphRecord::capture(&graph(), &prices(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["timestamp"].is_string());
        assert_eq!(json["assets"][0], "BTC");
        assert_eq!(json["prices"]["BTC"], 50_000.0);
        let first = &json["edges"][0];
        for field in ["from", "to", "pair", "exchange", "rate", "fee", "spread"] {
            assert!(!first[field].is_null(), "missing {field}");
        }
    }

    #[test]
    fn test_missing_malformed_and_empty_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let cache = GraphCache::new(&path);
        assert!(matches!(cache.load(), Err(CacheError::Io(_))));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Malformed(_))));

        fs::write(
            &path,
            r#"{"timestamp":"2024-01-01T00:00:00Z","assets":[],"prices":{},"edges":[]}"#,
        )
        .unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Empty("assets"))));

        fs::write(
            &path,
            r#"{"timestamp":"2024-01-01T00:00:00Z","assets":["BTC"],"prices":{},"edges":[]}"#,
        )
        .unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Empty("edges"))));

        fs::write(
            &path,
            r#"{"timestamp":"2024-01-01T00:00:00Z","assets":["BTC","USD"],"prices":{},
                "edges":[{"from":"BTC","to":"USD","pair":"X","exchange":"k","rate":-1.0,"fee":0.0,"spread":0.0}]}"#,
        )
        .unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Malformed(_))));

        fs::write(
            &path,
            r#"{"timestamp":"2024-01-01T00:00:00Z","assets":["BTC"],"prices":{},
                "edges":[{"from":"BTC","to":"USD","pair":"X","exchange":"k","rate":1.0,"fee":0.0,"spread":0.0}]}"#,
        )
        .unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Inconsistent(_))));
    }

    #[test]
    fn test_empty_graph_is_not_saved() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("graph.json"));
        let record = GraphRecord::capture(&ConversionGraph::new(), &BTreeMap::new(), Utc::now());
        assert!(matches!(cache.save(&record), Err(CacheError::Empty(_))));
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_stale_record() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("nested").join("graph.json"));
        let old = Utc::now() - chrono::Duration::minutes(10);
        cache.save(&GraphRecord::capture(&graph(), &prices(), old)).unwrap();

        assert!(cache.load().is_ok());
        assert!(matches!(
            cache.load_fresh(Duration::from_secs(300)),
            Err(CacheError::Stale { .. })
        ));
        assert!(cache.load_fresh(Duration::from_secs(3600)).is_ok());
    }

    fn sample_path() -> Path {
        Path::new(Asset::from("USD"), vec![edge("USD", "BTC", 1.0 / 50_000.0)]).unwrap()
    }

    #[test]
    fn test_path_cache_hits_and_generations() {
        let cache = PathCache::new(Duration::from_secs(30));
        let key = PathKey::new(Asset::from("USD"), Asset::from("BTC"), 5);
        assert!(cache.get(&key, 1).is_none());

        cache.insert(key.clone(), sample_path(), 1);
        assert_eq!(cache.get(&key, 1), Some(sample_path()));
        // Same assets, different hop budget: different query.
        assert!(cache.get(&PathKey::new(Asset::from("USD"), Asset::from("BTC"), 2), 1).is_none());
        // Computed on an older graph.
        assert!(cache.get(&key, 2).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_path_cache_expiry() {
        let cache = PathCache::new(Duration::from_millis(20));
        let key = PathKey::new(Asset::from("USD"), Asset::from("BTC"), 5);
        cache.insert(key.clone(), sample_path(), 0);
        sleep(Duration::from_millis(40));
        assert!(cache.get(&key, 0).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_path_cache_persistence() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("paths.json");
        let cache = PathCache::new(Duration::from_secs(30));
        let key = PathKey::new(Asset::from("USD"), Asset::from("BTC"), 5);
        cache.insert(key.clone(), sample_path(), 3);
        assert_eq!(cache.save(&file).unwrap(), 1);

        let restored = PathCache::new(Duration::from_secs(30));
        assert_eq!(restored.load(&file, 7).unwrap(), 1);
        assert_eq!(restored.get(&key, 7), Some(sample_path()));

        let short = PathCache::new(Duration::from_millis(1));
        sleep(Duration::from_millis(5));
        assert_eq!(short.load(&file, 7).unwrap(), 0);
    }
}
