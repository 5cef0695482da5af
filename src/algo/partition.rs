//! Workload partitioning over the node space.

use crate::graph::GraphView;

/// Contiguous mapped-id range with its cumulative degree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegreePartition {
    /// First node in the range.
    pub start: u64,
    /// Number of nodes in the range.
    pub len: u64,
    /// Sum of degrees over the range.
    pub degree: u64,
}

impl DegreePartition {
    /// One past the last node in the range.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    pub fn contains(&self, node: u64) -> bool {
        node >= self.start && node < self.end()
    }
}

/// Splits `[0, node_count)` into at most `parts` contiguous ranges of
/// near-equal node count, returned as `(start, len)` pairs.
pub fn range_partitions(node_count: u64, parts: usize) -> Vec<(u64, u64)> {
    if node_count == 0 || parts == 0 {
        return Vec::new();
    }
    let parts = (parts as u64).min(node_count);
    let base = node_count / parts;
    let remainder = node_count % parts;
    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = 0;
    for index in 0..parts {
        let len = base + u64::from(index < remainder);
        ranges.push((start, len));
        start += len;
    }
    ranges
}

/// Tiles `[0, node_count)` into partitions of roughly equal cumulative
/// degree, then merges adjacent partitions until at most `concurrency`
/// remain. Partitions chain without gaps and cover every node exactly once.
pub fn degree_partitions<G: GraphView>(graph: &G, concurrency: usize) -> Vec<DegreePartition> {
    let node_count = graph.node_count();
    if node_count == 0 || concurrency == 0 {
        return Vec::new();
    }
    let target = (graph.relationship_count() / concurrency as u64).max(1);
    let mut partitions = Vec::new();
    let mut start = 0u64;
    let mut len = 0u64;
    let mut degree = 0u64;
    for node in 0..node_count {
        len += 1;
        degree += graph.degree(node) as u64;
        if degree >= target {
            partitions.push(DegreePartition { start, len, degree });
            start = node + 1;
            len = 0;
            degree = 0;
        }
    }
    if len > 0 {
        partitions.push(DegreePartition { start, len, degree });
    }
    merge_to_limit(&mut partitions, concurrency);
    partitions
}

/// Repeatedly folds the adjacent pair with the smallest combined degree.
fn merge_to_limit(partitions: &mut Vec<DegreePartition>, limit: usize) {
    while partitions.len() > limit {
        let mut best = 0;
        let mut best_degree = u64::MAX;
        for index in 0..partitions.len() - 1 {
            let combined = partitions[index].degree + partitions[index + 1].degree;
            if combined < best_degree {
                best = index;
                best_degree = combined;
            }
        }
        let absorbed = partitions.remove(best + 1);
        partitions[best].len += absorbed.len;
        partitions[best].degree += absorbed.degree;
    }
}
