use crate::graph::Edge;
use common::types::Asset;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// Directed multigraph of conversions: one node per canonical asset, one
/// edge per market direction. Parallel edges between the same two assets
/// (different exchanges) are kept side by side.
#[derive(Clone, Debug, Default)]
pub struct ConversionGraph {
    graph: DiGraph<Asset, Edge>,
    nodes: HashMap<Asset, NodeIndex>,
}

impl ConversionGraph {
    /// Creates a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Registers an asset with no edges yet. Returns its node.
    pub fn add_asset(&mut self, asset: &Asset) -> NodeIndex {
        self.get_or_create_node(asset)
    }

    /// Inserts an edge, registering both endpoint assets.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        let source = self.get_or_create_node(edge.from_asset());
        let target = self.get_or_create_node(edge.to_asset());
        self.graph.add_edge(source, target, edge)
    }

    pub fn contains_asset(&self, asset: &Asset) -> bool {
        self.nodes.contains_key(asset)
    }

    /// All known assets, sorted.
    pub fn assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.nodes.keys().cloned().collect();
        assets.sort();
        assets
    }

    pub fn asset_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn outgoing(&self, asset: &Asset) -> Vec<&Edge> {
        self.edges_directed(asset, Direction::Outgoing)
    }

    pub fn incoming(&self, asset: &Asset) -> Vec<&Edge> {
        self.edges_directed(asset, Direction::Incoming)
    }

    fn edges_directed(&self, asset: &Asset, direction: Direction) -> Vec<&Edge> {
        let Some(&node) = self.nodes.get(asset) else {
            return Vec::new();
        };
        let mut edges: Vec<(EdgeIndex, &Edge)> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, e)| e).collect()
    }

    pub(crate) fn node(&self, asset: &Asset) -> Option<NodeIndex> {
        self.nodes.get(asset).copied()
    }

    /// `(edge id, target node, edge)` for every traversable edge leaving `node`.
    pub(crate) fn successors(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, NodeIndex, &Edge)> {
        self.graph
            .edges(node)
            .filter(|e| e.weight().is_traversable())
            .map(|e| (e.id(), e.target(), e.weight()))
    }

    pub(crate) fn edge(&self, id: EdgeIndex) -> Option<&Edge> {
        self.graph.edge_weight(id)
    }

    pub(crate) fn resolve_edges(&self, ids: &[EdgeIndex]) -> Option<Vec<Edge>> {
        ids.iter().map(|id| self.edge(*id).cloned()).collect()
    }

    fn get_or_create_node(&mut self, asset: &Asset) -> NodeIndex {
        if let Some(&node) = self.nodes.get(asset) {
            node
        } else {
            let node = self.graph.add_node(asset.clone());
            self.nodes.insert(asset.clone(), node);
            node
        }
    }
}
