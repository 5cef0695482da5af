//! Triangle enumeration and counting over sorted adjacency runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::algo::partition::range_partitions;
use crate::error::{BasaltError, Result};
use crate::graph::{Graph, GraphView};
use crate::primitives::concurrency::{
    run_with_concurrency, RunParams, TerminationFlag, WorkerPool,
};
use crate::primitives::huge::atomic::HugeAtomicLongArray;
use crate::storage::{AdjacencyCursor, AdjacencyList, AdjacencyOffsets};

/// Merge-join intersection over one graph's sorted adjacency runs.
///
/// Emits triangles `(root, b, c)` with `root < b < c`, so enumerating every
/// root reports each triangle exactly once. Three reusable cursors serve the
/// whole enumeration; the hot loop allocates nothing.
pub struct TriangleIntersect<'g> {
    list: &'g AdjacencyList,
    offsets: &'g AdjacencyOffsets,
    max_degree: Option<usize>,
}

impl<'g> TriangleIntersect<'g> {
    /// Fails with [`BasaltError::Config`] when the graph's topology is
    /// composite; intersection needs one globally sorted run per node.
    pub fn new(graph: &'g Graph, max_degree: Option<usize>) -> Result<Self> {
        let (list, offsets) = graph.single_topology()?;
        Ok(TriangleIntersect {
            list,
            offsets,
            max_degree,
        })
    }

    fn over_limit(&self, node: u64) -> bool {
        match (self.max_degree, self.offsets.get(node)) {
            (Some(limit), Some(offset)) => self.list.degree(offset) > limit,
            _ => false,
        }
    }

    /// Emits every triangle whose lowest corner is `root`.
    pub fn intersect_all(&self, root: u64, consumer: &mut impl FnMut(u64, u64, u64)) {
        let Some(offset) = self.offsets.get(root) else {
            return;
        };
        if self.over_limit(root) {
            return;
        }

        let mut neighbors = self.list.cursor(offset);
        let mut lead = self.list.raw_cursor();
        let mut follow = self.list.raw_cursor();

        // starting strictly above the root skips self-loops and triangles
        // already reported from a lower corner
        let mut candidate = neighbors.skip_until(root);
        while let Some(node_b) = candidate {
            if !self.over_limit(node_b) {
                if let Some(offset_b) = self.offsets.get(node_b) {
                    follow.init(offset_b);
                    lead.copy_from(&neighbors);
                    self.merge_join(root, node_b, &mut lead, &mut follow, consumer);
                }
            }
            // skip_until also swallows parallel duplicates of node_b
            candidate = neighbors.skip_until(node_b);
        }
    }

    /// Reports values common to both cursors, strictly above `node_b`.
    fn merge_join(
        &self,
        root: u64,
        node_b: u64,
        lead: &mut AdjacencyCursor<'_>,
        follow: &mut AdjacencyCursor<'_>,
        consumer: &mut impl FnMut(u64, u64, u64),
    ) {
        let mut from_root = lead.skip_until(node_b);
        let mut from_b = follow.skip_until(node_b);
        while let (Some(c_root), Some(c_b)) = (from_root, from_b) {
            match c_root.cmp(&c_b) {
                std::cmp::Ordering::Less => from_root = lead.advance(c_b),
                std::cmp::Ordering::Greater => from_b = follow.advance(c_root),
                std::cmp::Ordering::Equal => {
                    if !self.over_limit(c_root) {
                        consumer(root, node_b, c_root);
                    }
                    from_root = lead.skip_until(c_root);
                    from_b = follow.skip_until(c_root);
                }
            }
        }
    }
}

/// Options for [`triangle_count`].
#[derive(Clone, Debug, Default)]
pub struct TriangleCountConfig {
    /// Nodes with degree above this take no part in any triangle.
    pub max_degree: Option<usize>,
    /// Fan-out across node ranges; 0 is rejected.
    pub concurrency: usize,
}

impl TriangleCountConfig {
    pub fn new() -> Self {
        TriangleCountConfig {
            max_degree: None,
            concurrency: 1,
        }
    }

    pub fn max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = Some(max_degree);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Outcome of one [`triangle_count`] run.
#[derive(Debug)]
pub struct TriangleCountResult {
    /// Distinct triangles in the graph.
    pub total: u64,
    /// Triangles each node takes part in.
    pub local: HugeAtomicLongArray,
}

/// Counts triangles by intersecting every root's neighborhood, one task per
/// node range. Expects an undirected import, every edge stored in both
/// directions.
pub fn triangle_count(
    graph: &Graph,
    config: TriangleCountConfig,
    pool: Option<&WorkerPool>,
    termination: &TerminationFlag,
) -> Result<TriangleCountResult> {
    graph.single_topology()?;
    if config.concurrency == 0 {
        return Err(BasaltError::Config(
            "triangle count concurrency must be at least 1".into(),
        ));
    }
    let node_count = graph.node_count();
    let local = Arc::new(HugeAtomicLongArray::new(node_count as usize));
    let total = Arc::new(AtomicU64::new(0));

    let tasks: Vec<_> = range_partitions(node_count, config.concurrency)
        .into_iter()
        .map(|(start, len)| {
            let graph = graph.concurrent_copy();
            let local = Arc::clone(&local);
            let total = Arc::clone(&total);
            let termination = termination.clone();
            let max_degree = config.max_degree;
            move || {
                let intersect = TriangleIntersect::new(&graph, max_degree)?;
                for root in start..start + len {
                    termination.check()?;
                    intersect.intersect_all(root, &mut |a, b, c| {
                        local.add(a as usize, 1);
                        local.add(b as usize, 1);
                        local.add(c as usize, 1);
                        total.fetch_add(1, Ordering::Relaxed);
                    });
                }
                Ok(())
            }
        })
        .collect();

    let mut params = RunParams::new(config.concurrency, tasks).termination(termination.clone());
    if let Some(pool) = pool {
        params = params.pool(pool);
    }
    run_with_concurrency(params)?;

    let Ok(local) = Arc::try_unwrap(local) else {
        unreachable!("local counts still shared after batch settled")
    };
    let total = total.load(Ordering::Relaxed);
    info!(triangles = total, nodes = node_count, "triangles.count.finished");
    Ok(TriangleCountResult { total, local })
}
