use crate::graph::ConversionGraph;
use common::types::{Asset, ExchangeId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How many assets `GraphSummary::most_connected` lists.
pub const TOP_CONNECTED: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub asset_count: usize,
    pub edge_count: usize,
    pub bridge_edge_count: usize,
    /// Market edges per venue; bridge edges are counted separately.
    pub edges_per_exchange: BTreeMap<ExchangeId, usize>,
    /// `(asset, outgoing edge count)`, busiest first.
    pub most_connected: Vec<(Asset, usize)>,
}

impl GraphSummary {
    pub fn of(graph: &ConversionGraph) -> Self {
        let mut edges_per_exchange = BTreeMap::new();
        let mut bridge_edge_count = 0;
        let mut degree: BTreeMap<&Asset, usize> = BTreeMap::new();

        for edge in graph.edges() {
            if edge.is_bridge() {
                bridge_edge_count += 1;
            } else {
                *edges_per_exchange.entry(edge.exchange().clone()).or_insert(0) += 1;
            }
            *degree.entry(edge.from_asset()).or_insert(0) += 1;
        }

        let mut most_connected: Vec<(Asset, usize)> =
            degree.into_iter().map(|(a, n)| (a.clone(), n)).collect();
        // Stable sort keeps ties in alphabetical order.
        most_connected.sort_by(|a, b| b.1.cmp(&a.1));
        most_connected.truncate(TOP_CONNECTED);

        Self {
            asset_count: graph.asset_count(),
            edge_count: graph.edge_count(),
            bridge_edge_count,
            edges_per_exchange,
            most_connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetConnectivity {
    pub asset: Asset,
    pub outgoing: usize,
    pub incoming: usize,
    /// Assets reachable in one hop.
    pub neighbors: BTreeSet<Asset>,
    pub exchanges: BTreeSet<ExchangeId>,
}

impl AssetConnectivity {
    /// `None` when the asset is not in the graph.
    pub fn of(graph: &ConversionGraph, asset: &Asset) -> Option<Self> {
        if !graph.contains_asset(asset) {
            return None;
        }
        let outgoing = graph.outgoing(asset);
        let incoming = graph.incoming(asset);
        let neighbors = outgoing.iter().map(|e| e.to_asset().clone()).collect();
        let exchanges = outgoing
            .iter()
            .chain(incoming.iter())
            .map(|e| e.exchange().clone())
            .collect();
        Some(Self {
            asset: asset.clone(),
            outgoing: outgoing.len(),
            incoming: incoming.len(),
            neighbors,
            exchanges,
        })
    }
}
