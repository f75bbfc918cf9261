//! Circular arbitrage: routes from an asset back to itself that end up with
//! more than they started with.

use crate::enumerator::find_paths_where;
use crate::graph::ConversionGraph;
use crate::path::Path;
use common::types::Asset;

/// Profitable cycles through `start`, best yield first.
///
/// A cycle qualifies when `total_rate > 1 + min_profit_pct / 100`;
/// `max_candidates` bounds how many qualifying cycles are returned.
pub fn find_arbitrage(
    graph: &ConversionGraph,
    start: &Asset,
    min_profit_pct: f64,
    max_hops: usize,
    max_candidates: usize,
) -> Vec<Path> {
    let threshold = 1.0 + min_profit_pct / 100.0;
    let cycles = find_paths_where(graph, start, start, max_hops, max_candidates, |path| {
        path.is_cycle() && path.total_rate() > threshold
    });

    for cycle in &cycles {
        log::info!("Arbitrage {:.4}%: {}", cycle.profit_pct(), cycle);
    }
    cycles
}
