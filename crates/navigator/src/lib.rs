//! # Conversion Navigator Crate
//!
//! Builds a weighted directed graph of tradeable asset pairs across several
//! exchanges and answers routing questions over it: the best multi-hop
//! conversion between two assets, ranked alternatives, profitable cycles and
//! the most valuable use of a held amount.
//!
//! All queries go through a [`Navigator`] instance owned by the host
//! application. Exchange data comes in through
//! [`exchange_adapter_trait::ExchangeAdapter`] implementations or as
//! pre-fetched [`common::types::ExchangeSnapshot`]s.

pub mod arbitrage;
pub mod bellman_ford;
pub mod builder;
pub mod cache;
pub mod config;
pub mod enumerator;
pub mod errors;
pub mod graph;
pub mod opportunity;
pub mod path;
pub mod prelude;
pub mod service;

pub use bellman_ford::PathFinder;
pub use builder::{BuildReport, BuiltGraph, GraphBuilder};
pub use cache::{CacheError, GraphCache, GraphRecord, PathCache, PathKey};
pub use config::NavigatorConfig;
pub use errors::NavigatorError;
pub use graph::{AssetConnectivity, ConversionGraph, Edge, EdgeError, GraphSummary};
pub use opportunity::Opportunity;
pub use path::Path;
pub use service::{GraphSource, GraphState, Navigator};
