//! Per-node relationship weight sums.

use std::sync::Arc;

use tracing::debug;

use crate::algo::partition::range_partitions;
use crate::error::Result;
use crate::graph::GraphView;
use crate::primitives::concurrency::{
    run_with_concurrency, RunParams, TerminationFlag, WorkerPool,
};
use crate::primitives::huge::atomic::HugeAtomicDoubleArray;

/// Sums each node's positive outgoing relationship weights, one task per
/// node range.
///
/// Weights at or below zero contribute nothing, mirroring how weighted rank
/// distribution skips them. Nodes without relationships sum to zero.
pub fn weighted_degrees<G>(
    graph: &G,
    concurrency: usize,
    pool: Option<&WorkerPool>,
    termination: &TerminationFlag,
) -> Result<HugeAtomicDoubleArray>
where
    G: GraphView + 'static,
{
    let node_count = graph.node_count();
    let concurrency = concurrency.max(1);
    let sums = Arc::new(HugeAtomicDoubleArray::new(node_count as usize));

    let tasks: Vec<_> = range_partitions(node_count, concurrency)
        .into_iter()
        .map(|(start, len)| {
            let graph = graph.concurrent_copy();
            let sums = Arc::clone(&sums);
            let termination = termination.clone();
            move || {
                for node in start..start + len {
                    termination.check()?;
                    let mut sum = 0.0;
                    graph.for_each_relationship_with_property(node, 0.0, |_, _, weight| {
                        if weight > 0.0 {
                            sum += weight;
                        }
                        true
                    });
                    sums.set(node as usize, sum);
                }
                Ok(())
            }
        })
        .collect();

    let mut params = RunParams::new(concurrency, tasks).termination(termination.clone());
    if let Some(pool) = pool {
        params = params.pool(pool);
    }
    run_with_concurrency(params)?;

    let Ok(sums) = Arc::try_unwrap(sums) else {
        unreachable!("weight sums still shared after batch settled")
    };
    debug!(nodes = node_count, "degrees.weighted.computed");
    Ok(sums)
}
