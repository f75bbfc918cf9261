//! Bounded breadth-first enumeration of alternative routes.

use crate::graph::ConversionGraph;
use crate::path::Path;
use common::types::Asset;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{HashSet, VecDeque};

/// Candidates collected per requested path before ranking.
pub const OVERCOLLECT_FACTOR: usize = 2;

struct Branch {
    node: NodeIndex,
    edges: Vec<EdgeIndex>,
    visited: HashSet<NodeIndex>,
}

/// Up to `max_paths` distinct routes of one to `max_hops` edges, best
/// `total_rate` first.
///
/// An asset may appear on many branches but only once per branch. When
/// `source == destination` the branches are cycles: the source is the one
/// asset a branch may come back to, and only as its final hop.
pub fn find_all_paths(
    graph: &ConversionGraph,
    source: &Asset,
    destination: &Asset,
    max_hops: usize,
    max_paths: usize,
) -> Vec<Path> {
    find_paths_where(graph, source, destination, max_hops, max_paths, |_| true)
}

/// Like [`find_all_paths`], keeping only routes `accept` admits. Rejected
/// routes do not count toward the candidate limit.
pub fn find_paths_where<F>(
    graph: &ConversionGraph,
    source: &Asset,
    destination: &Asset,
    max_hops: usize,
    max_paths: usize,
    accept: F,
) -> Vec<Path>
where
    F: Fn(&Path) -> bool,
{
    let (Some(start), Some(goal)) = (graph.node(source), graph.node(destination)) else {
        return Vec::new();
    };
    if max_paths == 0 || max_hops == 0 {
        return Vec::new();
    }

    let limit = max_paths.saturating_mul(OVERCOLLECT_FACTOR);
    let mut candidates: Vec<Path> = Vec::new();
    let mut rejected = 0usize;
    let mut queue = VecDeque::from([Branch {
        node: start,
        edges: Vec::new(),
        visited: HashSet::from([start]),
    }]);

    'search: while let Some(branch) = queue.pop_front() {
        if branch.edges.len() >= max_hops {
            continue;
        }
        for (edge_id, target, _) in graph.successors(branch.node) {
            if target == goal {
                let mut ids = branch.edges.clone();
                ids.push(edge_id);
                let path = graph
                    .resolve_edges(&ids)
                    .and_then(|edges| Path::new(source.clone(), edges).ok());
                match path {
                    Some(path) if accept(&path) => {
                        candidates.push(path);
                        if candidates.len() >= limit {
                            break 'search;
                        }
                    }
                    _ => rejected += 1,
                }
                continue;
            }
            if branch.visited.contains(&target) {
                continue;
            }
            let mut edges = branch.edges.clone();
            edges.push(edge_id);
            let mut visited = branch.visited.clone();
            visited.insert(target);
            queue.push_back(Branch {
                node: target,
                edges,
                visited,
            });
        }
    }

    let collected = candidates.len();
    let mut paths = candidates;
    paths.sort_by(|a, b| b.total_rate().total_cmp(&a.total_rate()));
    paths.truncate(max_paths);
    log::trace!(
        "{} -> {}: {} candidates ({} rejected), kept {}",
        source,
        destination,
        collected,
        rejected,
        paths.len()
    );
    paths
}
