//! Hop-bounded shortest path search in log space.
//!
//! Edge weights are `-ln(effective_rate)` and go negative whenever a
//! conversion multiplies value (BTC -> USD), so a label-setting search is not
//! sound here. Instead each round extends every frontier route by one edge,
//! for at most `max_hops` rounds, keeping the cheapest route per asset and
//! round. Routes carry the assets they already passed through and never
//! re-enter one, so the result is always a simple path.

use crate::graph::ConversionGraph;
use crate::path::Path;
use common::types::Asset;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::HashMap;

/// Relative slack used when comparing accumulated costs.
const COST_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
struct Label {
    cost: f64,
    edges: Vec<EdgeIndex>,
    /// Assets on the route so far, with the cost at which each was reached.
    visited: HashMap<NodeIndex, f64>,
}

impl Label {
    fn start(node: NodeIndex) -> Self {
        Self {
            cost: 0.0,
            edges: Vec::new(),
            visited: HashMap::from([(node, 0.0)]),
        }
    }

    fn extend(&self, edge: EdgeIndex, target: NodeIndex, cost: f64) -> Self {
        let mut next = self.clone();
        next.cost = cost;
        next.edges.push(edge);
        next.visited.insert(target, cost);
        next
    }
}

/// Outcome of one search, with the counters the navigator logs.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub path: Option<Path>,
    /// Extensions refused because they would re-enter an asset more cheaply
    /// than the route first reached it: a negative cycle on that route.
    pub negative_cycles: usize,
    pub rounds: usize,
}

pub struct PathFinder<'a> {
    graph: &'a ConversionGraph,
}

impl<'a> PathFinder<'a> {
    pub fn new(graph: &'a ConversionGraph) -> Self {
        Self { graph }
    }

    /// Cheapest route from `source` to `destination` using at most
    /// `max_hops` edges, or `None`.
    pub fn find_path(&self, source: &Asset, destination: &Asset, max_hops: usize) -> Option<Path> {
        self.search(source, destination, max_hops).path
    }

    pub fn search(&self, source: &Asset, destination: &Asset, max_hops: usize) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let (Some(start), Some(goal)) = (self.graph.node(source), self.graph.node(destination))
        else {
            return outcome;
        };
        if start == goal {
            outcome.path = Some(Path::empty(source.clone()));
            return outcome;
        }

        let mut frontier: HashMap<NodeIndex, Label> = HashMap::from([(start, Label::start(start))]);
        let mut best: Option<Label> = None;

        for _ in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            outcome.rounds += 1;
            let mut next: HashMap<NodeIndex, Label> = HashMap::new();

            for (&node, label) in &frontier {
                for (edge_id, target, edge) in self.graph.successors(node) {
                    let cost = label.cost + edge.cost();

                    if let Some(&reached_at) = label.visited.get(&target) {
                        if cost < reached_at - COST_EPSILON * reached_at.abs().max(1.0) {
                            outcome.negative_cycles += 1;
                        }
                        continue;
                    }

                    let hops = label.edges.len() + 1;
                    if target == goal {
                        if best.as_ref().map_or(true, |b| is_cheaper(cost, hops, b)) {
                            best = Some(label.extend(edge_id, target, cost));
                        }
                        // Nothing useful lies beyond the destination: routes
                        // may not come back to it.
                        continue;
                    }

                    match next.get(&target) {
                        Some(current) if !is_cheaper(cost, hops, current) => {}
                        _ => {
                            next.insert(target, label.extend(edge_id, target, cost));
                        }
                    }
                }
            }
            frontier = next;
        }

        if outcome.negative_cycles > 0 {
            log::debug!(
                "{} -> {}: skipped {} negative-cycle extensions",
                source,
                destination,
                outcome.negative_cycles
            );
        }

        outcome.path = best.and_then(|label| {
            let edges = self.graph.resolve_edges(&label.edges)?;
            Path::new(source.clone(), edges).ok()
        });
        outcome
    }
}

/// Strictly cheaper, with ties broken toward fewer hops.
fn is_cheaper(cost: f64, hops: usize, current: &Label) -> bool {
    let slack = COST_EPSILON * current.cost.abs().max(1.0);
    cost < current.cost - slack || ((cost - current.cost).abs() <= slack && hops < current.edges.len())
}
