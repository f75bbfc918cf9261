use crate::cache::CacheError;
use crate::graph::EdgeError;
use common::errors::CommonError;
use common::types::Asset;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error(transparent)]
    Common(#[from] CommonError),

    /// The asset is not in the graph and no bridge could be synthesized for it.
    #[error("Asset not found: {0}")]
    AssetNotFound(Asset),

    #[error("Invalid edge: {0}")]
    InvalidEdge(#[from] EdgeError),

    #[error("Broken path: {0}")]
    BrokenPath(String),

    /// Every exchange fetch failed; callers fall back to the cache.
    #[error("No exchange could be loaded ({attempted} attempted)")]
    NoExchangesAvailable { attempted: usize },

    /// The build produced no usable edge; the current graph is kept.
    #[error("Build produced an empty graph")]
    EmptyGraph,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}
