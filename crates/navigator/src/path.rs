use crate::errors::NavigatorError;
use crate::graph::Edge;
use common::types::{Asset, ExchangeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An ordered chain of edges from `source` to `destination`.
///
/// A zero-hop path means "already at the destination" and only exists when
/// source and destination are the same asset; "no path" is `None` at the
/// query surface, never an empty `Path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    source: Asset,
    edges: Vec<Edge>,
}

impl Path {
    /// Builds a path, checking that consecutive edges touch.
    pub fn new(source: Asset, edges: Vec<Edge>) -> Result<Self, NavigatorError> {
        let mut at = &source;
        for (hop, edge) in edges.iter().enumerate() {
            if edge.from_asset() != at {
                return Err(NavigatorError::BrokenPath(format!(
                    "hop {hop} leaves {} but the route is at {at}",
                    edge.from_asset()
                )));
            }
            at = edge.to_asset();
        }
        Ok(Self { source, edges })
    }

    pub fn empty(asset: Asset) -> Self {
        Self {
            source: asset,
            edges: Vec::new(),
        }
    }

    pub fn source(&self) -> &Asset {
        &self.source
    }

    pub fn destination(&self) -> &Asset {
        self.edges.last().map_or(&self.source, |e| e.to_asset())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn num_hops(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn is_cycle(&self) -> bool {
        !self.edges.is_empty() && self.source() == self.destination()
    }

    /// Product of every hop's effective rate.
    pub fn total_rate(&self) -> f64 {
        self.edges.iter().map(Edge::effective_rate).product()
    }

    /// Sum of every hop's fee fraction.
    pub fn total_fees(&self) -> f64 {
        self.edges.iter().map(Edge::fee_rate).sum()
    }

    /// Sum of edge costs, `-ln(total_rate)`.
    pub fn total_cost(&self) -> f64 {
        self.edges.iter().map(Edge::cost).sum()
    }

    /// Percentage gained (or lost, if negative) converting along the path.
    pub fn profit_pct(&self) -> f64 {
        (self.total_rate() - 1.0) * 100.0
    }

    pub fn exchanges_used(&self) -> BTreeSet<ExchangeId> {
        self.edges.iter().map(|e| e.exchange().clone()).collect()
    }

    /// Every asset visited, source first.
    pub fn assets(&self) -> Vec<Asset> {
        std::iter::once(self.source.clone())
            .chain(self.edges.iter().map(|e| e.to_asset().clone()))
            .collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for edge in &self.edges {
            write!(f, " -[{}]-> {}", edge.exchange(), edge.to_asset())?;
        }
        Ok(())
    }
}
