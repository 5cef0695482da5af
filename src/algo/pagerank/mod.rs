//! Damped, optionally personalized and weighted rank iteration.
//!
//! The node space is cut into degree-balanced partitions, one compute step
//! per partition. Every iteration runs three phases with a hard barrier
//! between them: CALC distributes each node's damped delta over its
//! targets into per-destination buffers, the coordinator hands every
//! buffer to its destination step, and SYNC folds the received scores
//! into rank. A node whose delta fell to the tolerance stops pushing;
//! the run converges once every node has.

mod step;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::algo::degrees::weighted_degrees;
use crate::algo::partition::{degree_partitions, DegreePartition};
use crate::error::{BasaltError, Result};
use crate::graph::GraphView;
use crate::metrics::{default_metrics, CoreMetrics};
use crate::primitives::concurrency::{run_with_concurrency, RunParams, TerminationFlag, WorkerPool};
use crate::primitives::huge::HugeDoubleArray;
use crate::types::NodeId;

use self::step::ComputeStep;

/// Options for [`PageRank`].
#[derive(Clone)]
pub struct PageRankConfig {
    /// Probability of following a relationship rather than teleporting.
    pub damping_factor: f64,
    /// Per-node delta at or below which a node counts as settled.
    pub tolerance: f64,
    /// Upper bound on iterations.
    pub max_iterations: usize,
    /// Partition fan-out and in-flight task cap.
    pub concurrency: usize,
    /// When non-empty, only these original ids receive seed rank.
    pub source_nodes: Vec<NodeId>,
    /// Distribute shares proportional to relationship weight instead of
    /// uniformly over the degree.
    pub weighted: bool,
    /// Upper bound in bytes for the per-step rank state. Admission halves
    /// the concurrency until the run fits, then gives up with
    /// [`BasaltError::MemoryExhausted`].
    pub memory_budget: Option<u64>,
    /// Sink for iteration counters.
    pub metrics: Arc<dyn CoreMetrics>,
}

impl std::fmt::Debug for PageRankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRankConfig")
            .field("damping_factor", &self.damping_factor)
            .field("tolerance", &self.tolerance)
            .field("max_iterations", &self.max_iterations)
            .field("concurrency", &self.concurrency)
            .field("source_nodes", &self.source_nodes)
            .field("weighted", &self.weighted)
            .field("memory_budget", &self.memory_budget)
            .finish_non_exhaustive()
    }
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRankConfig {
    pub fn new() -> Self {
        PageRankConfig {
            damping_factor: 0.85,
            tolerance: 1e-7,
            max_iterations: 20,
            concurrency: 4,
            source_nodes: Vec::new(),
            weighted: false,
            memory_budget: None,
            metrics: default_metrics(),
        }
    }

    /// Sets the damping factor, strictly between 0 and 1.
    pub fn damping_factor(mut self, damping_factor: f64) -> Self {
        self.damping_factor = damping_factor;
        self
    }

    /// Sets the per-node convergence tolerance.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the iteration cap.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the partition fan-out.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Restricts seeding to `sources` (original ids).
    pub fn source_nodes(mut self, sources: Vec<NodeId>) -> Self {
        self.source_nodes = sources;
        self
    }

    /// Distributes shares by relationship weight.
    pub fn weighted(mut self, weighted: bool) -> Self {
        self.weighted = weighted;
        self
    }

    /// Caps the bytes the per-step rank state may take.
    pub fn memory_budget(mut self, budget: u64) -> Self {
        self.memory_budget = Some(budget);
        self
    }

    /// Replaces the metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn CoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return Err(BasaltError::Config(format!(
                "damping factor must lie strictly between 0 and 1, got {}",
                self.damping_factor
            )));
        }
        if self.tolerance <= 0.0 {
            return Err(BasaltError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(BasaltError::Config(
                "max iterations must be at least 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(BasaltError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Final ranks plus run metadata.
#[derive(Debug)]
pub struct PageRankResult {
    /// Rank per mapped node id.
    pub scores: HugeDoubleArray,
    /// Iterations actually run.
    pub iterations: usize,
    /// Whether every node settled before the iteration cap.
    pub converged: bool,
    /// L2 norm of the last iteration's deltas, floored at 1.
    pub delta_norm: f64,
}

impl PageRankResult {
    /// Rank of a mapped node id.
    pub fn score(&self, mapped: u64) -> f64 {
        self.scores.get(mapped as usize)
    }

    /// Rank looked up by original id.
    pub fn score_for<G: GraphView>(&self, graph: &G, original: NodeId) -> Option<f64> {
        graph.to_mapped(original).map(|mapped| self.score(mapped))
    }
}

/// The rank computation itself. Construct with a validated config, then
/// [`run`](PageRank::run) it against any graph view.
#[derive(Debug)]
pub struct PageRank {
    config: PageRankConfig,
}

impl PageRank {
    pub fn new(config: PageRankConfig) -> Result<Self> {
        config.validate()?;
        Ok(PageRank { config })
    }

    /// Runs the iteration to convergence or the iteration cap.
    pub fn run<G>(
        &self,
        graph: &G,
        pool: Option<&WorkerPool>,
        termination: &TerminationFlag,
    ) -> Result<PageRankResult>
    where
        G: GraphView + 'static,
    {
        let node_count = graph.node_count();
        if node_count == 0 {
            return Ok(PageRankResult {
                scores: HugeDoubleArray::new(0),
                iterations: 0,
                converged: true,
                delta_norm: 0.0,
            });
        }
        if self.config.weighted && !graph.has_relationship_properties() {
            return Err(BasaltError::Config(
                "weighted rank needs relationship properties".into(),
            ));
        }
        let sources = self.resolve_sources(graph)?;
        let (concurrency, partitions) = self.admit(graph)?;

        let weights = if self.config.weighted {
            Some(Arc::new(weighted_degrees(
                graph,
                concurrency,
                pool,
                termination,
            )?))
        } else {
            None
        };

        let starts: Arc<Vec<u64>> = Arc::new(partitions.iter().map(|p| p.start).collect());
        let seed = if sources.is_empty() {
            (1.0 - self.config.damping_factor) / node_count as f64
        } else {
            (1.0 - self.config.damping_factor) / sources.len() as f64
        };
        let steps: Vec<Arc<Mutex<ComputeStep>>> = partitions
            .iter()
            .map(|partition| {
                let mut step = ComputeStep::new(
                    partition.clone(),
                    &partitions,
                    self.config.damping_factor,
                    self.config.tolerance,
                    weights.clone(),
                    Arc::clone(&starts),
                );
                if sources.is_empty() {
                    step.init_uniform(seed);
                } else {
                    step.init_sources(&sources, seed);
                }
                Arc::new(Mutex::new(step))
            })
            .collect();
        // one independent view per step, so reads stay thread-confined
        let views: Vec<Arc<G>> = steps
            .iter()
            .map(|_| Arc::new(graph.concurrent_copy()))
            .collect();

        let mut iterations = 0;
        let mut converged = false;
        let mut delta_norm = 0.0;
        while iterations < self.config.max_iterations {
            termination.check()?;
            iterations += 1;

            let calc_tasks: Vec<_> = steps
                .iter()
                .zip(&views)
                .map(|(step, view)| {
                    let step = Arc::clone(step);
                    let view = Arc::clone(view);
                    move || {
                        step.lock().calc(view.as_ref());
                        Ok(())
                    }
                })
                .collect();
            self.run_phase(concurrency, calc_tasks, pool, termination)?;

            transpose(&steps);

            let sync_tasks: Vec<_> = steps
                .iter()
                .map(|step| {
                    let step = Arc::clone(step);
                    move || {
                        step.lock().sync();
                        Ok(())
                    }
                })
                .collect();
            self.run_phase(concurrency, sync_tasks, pool, termination)?;

            let squares: f64 = steps.iter().map(|step| step.lock().delta_squares()).sum();
            delta_norm = squares.sqrt().max(1.0);
            let stable = steps.iter().all(|step| step.lock().stable());

            self.config.metrics.record_iterations(1);
            debug!(
                iteration = iterations,
                norm = delta_norm,
                stable,
                "pagerank.iteration"
            );
            if stable {
                converged = true;
                break;
            }
        }

        let mut scores = HugeDoubleArray::new(node_count as usize);
        for step in &steps {
            let step = step.lock();
            let start = step.partition().start as usize;
            for (local, &rank) in step.ranks().iter().enumerate() {
                scores.set(start + local, rank);
            }
        }
        info!(
            iterations,
            converged,
            nodes = node_count,
            "pagerank.finished"
        );
        Ok(PageRankResult {
            scores,
            iterations,
            converged,
            delta_norm,
        })
    }

    /// Maps configured source ids to mapped ids, rejecting unknown ones.
    fn resolve_sources<G: GraphView>(&self, graph: &G) -> Result<Vec<u64>> {
        self.config
            .source_nodes
            .iter()
            .map(|&original| {
                graph
                    .to_mapped(original)
                    .ok_or_else(|| BasaltError::Config(format!("source node {original} not in graph")))
            })
            .collect()
    }

    /// Picks the widest fan-out whose rank state fits the memory budget.
    fn admit<G: GraphView>(&self, graph: &G) -> Result<(usize, Vec<DegreePartition>)> {
        let mut concurrency = self.config.concurrency;
        loop {
            let partitions = degree_partitions(graph, concurrency);
            let required = rank_state_bytes(&partitions);
            let Some(budget) = self.config.memory_budget else {
                return Ok((concurrency, partitions));
            };
            if required <= budget {
                return Ok((concurrency, partitions));
            }
            if concurrency == 1 {
                return Err(BasaltError::MemoryExhausted { required, budget });
            }
            concurrency = (concurrency / 2).max(1);
            debug!(required, budget, concurrency, "pagerank.budget.throttled");
        }
    }

    fn run_phase<T>(
        &self,
        concurrency: usize,
        tasks: Vec<T>,
        pool: Option<&WorkerPool>,
        termination: &TerminationFlag,
    ) -> Result<()>
    where
        T: FnOnce() -> Result<()> + Send + 'static,
    {
        let mut params = RunParams::new(concurrency, tasks)
            .termination(termination.clone())
            .metrics(Arc::clone(&self.config.metrics));
        if let Some(pool) = pool {
            params = params.pool(pool);
        }
        run_with_concurrency(params)
    }
}

/// Hands every outgoing buffer to its destination step and takes that
/// step's drained buffer back in exchange. Runs on the coordinator between
/// the CALC and SYNC barriers, when no task holds a step lock.
fn transpose(steps: &[Arc<Mutex<ComputeStep>>]) {
    for i in 0..steps.len() {
        for j in 0..steps.len() {
            if i == j {
                steps[i].lock().swap_local(i);
            } else {
                let mut source = steps[i].lock();
                let mut dest = steps[j].lock();
                std::mem::swap(&mut source.scores_out[j], &mut dest.scores_in[i]);
            }
        }
    }
}

/// Bytes the per-step rank, delta, and score buffers will take.
fn rank_state_bytes(partitions: &[DegreePartition]) -> u64 {
    let node_count: u64 = partitions.iter().map(|p| p.len).sum();
    let steps = partitions.len() as u64;
    8 * (2 * node_count + 2 * steps * node_count)
}
