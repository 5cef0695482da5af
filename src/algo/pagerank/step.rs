//! Per-partition compute state for the rank iteration.

use std::sync::Arc;

use crate::algo::partition::DegreePartition;
use crate::graph::GraphView;
use crate::primitives::huge::atomic::HugeAtomicDoubleArray;

/// One partition's slice of the computation.
///
/// A step owns its nodes' rank and delta, an outgoing score buffer per
/// destination step, and an incoming buffer per source step. Steps never
/// write into each other; the coordinator moves buffers between them at the
/// phase barrier, so every buffer has exactly one writer at any time.
pub(crate) struct ComputeStep {
    partition: DegreePartition,
    damping: f64,
    tolerance: f64,
    /// Start node of every partition, for routing targets to their owner.
    starts: Arc<Vec<u64>>,
    /// Current rank per local node.
    rank: Vec<f64>,
    /// Rank gained last iteration per local node.
    delta: Vec<f64>,
    /// Outgoing scores, one buffer per destination step.
    pub(crate) scores_out: Vec<Vec<f64>>,
    /// Incoming scores, one own-length buffer per source step.
    pub(crate) scores_in: Vec<Vec<f64>>,
    /// Per-node weight sums when distributing by relationship weight.
    weights: Option<Arc<HugeAtomicDoubleArray>>,
    stable: bool,
    delta_squares: f64,
}

impl ComputeStep {
    pub(crate) fn new(
        partition: DegreePartition,
        all: &[DegreePartition],
        damping: f64,
        tolerance: f64,
        weights: Option<Arc<HugeAtomicDoubleArray>>,
        starts: Arc<Vec<u64>>,
    ) -> Self {
        let len = partition.len as usize;
        ComputeStep {
            scores_out: all.iter().map(|p| vec![0.0; p.len as usize]).collect(),
            scores_in: all.iter().map(|_| vec![0.0; len]).collect(),
            rank: vec![0.0; len],
            delta: vec![0.0; len],
            partition,
            damping,
            tolerance,
            starts,
            weights,
            stable: false,
            delta_squares: 0.0,
        }
    }

    pub(crate) fn partition(&self) -> &DegreePartition {
        &self.partition
    }

    pub(crate) fn ranks(&self) -> &[f64] {
        &self.rank
    }

    pub(crate) fn stable(&self) -> bool {
        self.stable
    }

    pub(crate) fn delta_squares(&self) -> f64 {
        self.delta_squares
    }

    /// Seeds every local node with `value` and primes the first CALC.
    pub(crate) fn init_uniform(&mut self, value: f64) {
        self.rank.fill(value);
        self.delta.fill(value);
    }

    /// Seeds only `sources` (global ids); every other node starts at zero.
    pub(crate) fn init_sources(&mut self, sources: &[u64], value: f64) {
        self.rank.fill(0.0);
        self.delta.fill(0.0);
        for &node in sources {
            if self.partition.contains(node) {
                let local = (node - self.partition.start) as usize;
                self.rank[local] = value;
                self.delta[local] = value;
            }
        }
    }

    /// CALC: distributes each local node's damped delta over its targets,
    /// writing into the destination steps' buffers. Nodes whose delta
    /// drained to zero and dangling nodes distribute nothing.
    pub(crate) fn calc<G: GraphView>(&mut self, graph: &G) {
        let starts = &self.starts;
        let scores_out = &mut self.scores_out;
        for local in 0..self.rank.len() {
            let delta = self.delta[local];
            if delta <= 0.0 {
                continue;
            }
            let node = self.partition.start + local as u64;
            let degree = graph.degree(node);
            if degree == 0 {
                continue;
            }
            match &self.weights {
                None => {
                    let share = self.damping * delta / degree as f64;
                    graph.for_each_relationship(node, |_, target| {
                        route(starts, scores_out, target, share);
                        true
                    });
                }
                Some(weights) => {
                    let total = weights.get(node as usize);
                    if total <= 0.0 {
                        continue;
                    }
                    let damped = self.damping * delta;
                    graph.for_each_relationship_with_property(node, 0.0, |_, target, weight| {
                        if weight > 0.0 {
                            route(starts, scores_out, target, damped * weight / total);
                        }
                        true
                    });
                }
            }
        }
    }

    /// SYNC: folds incoming buffers into rank and delta, zeroing each
    /// buffer so its return trip starts clean, then refreshes the local
    /// convergence signal and squared-delta sum.
    pub(crate) fn sync(&mut self) {
        let mut stable = true;
        let mut squares = 0.0;
        for local in 0..self.rank.len() {
            let mut sum = 0.0;
            for incoming in self.scores_in.iter_mut() {
                sum += incoming[local];
                incoming[local] = 0.0;
            }
            self.rank[local] += sum;
            self.delta[local] = sum;
            squares += sum * sum;
            if sum > self.tolerance {
                stable = false;
            }
        }
        self.stable = stable;
        self.delta_squares = squares;
    }

    /// Swaps this step's own outgoing buffer with its own incoming slot;
    /// cross-step buffers are exchanged by the coordinator.
    pub(crate) fn swap_local(&mut self, index: usize) {
        std::mem::swap(&mut self.scores_out[index], &mut self.scores_in[index]);
    }
}

/// Adds `share` to `target`'s slot in its owning step's outgoing buffer.
#[inline]
fn route(starts: &[u64], scores_out: &mut [Vec<f64>], target: u64, share: f64) {
    let dest = match starts.binary_search(&target) {
        Ok(index) => index,
        Err(index) => index - 1,
    };
    scores_out[dest][(target - starts[dest]) as usize] += share;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::primitives::concurrency::TerminationFlag;
    use crate::storage::{IdMap, ImportOptions, RelationshipsBuilder};

    fn two_partition_steps() -> Vec<ComputeStep> {
        let partitions = vec![
            DegreePartition {
                start: 0,
                len: 2,
                degree: 2,
            },
            DegreePartition {
                start: 2,
                len: 2,
                degree: 2,
            },
        ];
        let starts = Arc::new(vec![0, 2]);
        let mut steps = Vec::new();
        for partition in &partitions {
            let mut step = ComputeStep::new(
                partition.clone(),
                &partitions,
                0.85,
                1e-7,
                None,
                Arc::clone(&starts),
            );
            step.init_uniform(0.25);
            steps.push(step);
        }
        steps
    }

    #[test]
    fn calc_routes_shares_to_owning_steps() {
        // 0 -> 2, 1 -> 3 crosses partitions; 2 -> 0 crosses back
        let builder = RelationshipsBuilder::new(4, ImportOptions::new()).unwrap();
        builder.add(0, 2, &[]);
        builder.add(1, 3, &[]);
        builder.add(2, 0, &[]);
        let built = builder.build(None, &TerminationFlag::new()).unwrap();
        let graph = Graph::from_import(Arc::new(IdMap::identity(4)), built);

        let mut steps = two_partition_steps();
        steps[0].calc(&graph);
        steps[1].calc(&graph);

        let share = 0.85 * 0.25;
        // step 0 sent to step 1's nodes 2 and 3
        assert_eq!(steps[0].scores_out[1], vec![share, share]);
        assert_eq!(steps[0].scores_out[0], vec![0.0, 0.0]);
        // step 1 sent node 2's share back to node 0
        assert_eq!(steps[1].scores_out[0], vec![share, 0.0]);
    }

    #[test]
    fn sync_accumulates_and_zeroes_buffers() {
        let mut steps = two_partition_steps();
        steps[0].scores_in[0] = vec![0.1, 0.0];
        steps[0].scores_in[1] = vec![0.2, 0.0];
        steps[0].sync();

        assert!((steps[0].ranks()[0] - 0.55).abs() < 1e-12);
        assert_eq!(steps[0].ranks()[1], 0.25);
        assert_eq!(steps[0].scores_in[0], vec![0.0, 0.0]);
        assert_eq!(steps[0].scores_in[1], vec![0.0, 0.0]);
        assert!(!steps[0].stable());
        assert!((steps[0].delta_squares() - 0.09).abs() < 1e-12);
    }

    #[test]
    fn sync_reports_stability_when_deltas_are_tiny() {
        let mut steps = two_partition_steps();
        steps[1].sync();
        assert!(steps[1].stable());
    }
}
