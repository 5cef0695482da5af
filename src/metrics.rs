//! Counter hooks for import and algorithm execution.
//!
//! The sink is deliberately minimal: callers that want visibility hand a
//! [`CounterMetrics`] (or their own impl) to the relevant options struct,
//! everyone else gets the no-op sink from [`default_metrics`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sink for operational counters emitted by builders and engines.
pub trait CoreMetrics: Send + Sync {
    /// Relationships appended during import, post-aggregation.
    fn record_relationships(&self, count: u64);
    /// Compressed adjacency and property bytes written.
    fn record_adjacency_bytes(&self, bytes: u64);
    /// Byte pages allocated by the import arenas.
    fn record_pages(&self, count: u64);
    /// PageRank iterations completed.
    fn record_iterations(&self, count: u64);
    /// Parallel tasks run to completion by the task runner.
    fn record_tasks(&self, count: u64);
}

/// Discards every observation.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl CoreMetrics for NoopMetrics {
    fn record_relationships(&self, _count: u64) {}
    fn record_adjacency_bytes(&self, _bytes: u64) {}
    fn record_pages(&self, _count: u64) {}
    fn record_iterations(&self, _count: u64) {}
    fn record_tasks(&self, _count: u64) {}
}

/// Accumulates observations into relaxed atomic counters.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    relationships: AtomicU64,
    adjacency_bytes: AtomicU64,
    pages: AtomicU64,
    iterations: AtomicU64,
    tasks: AtomicU64,
}

impl CounterMetrics {
    /// Creates a zeroed counter sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationships appended during import, post-aggregation.
    pub fn relationships(&self) -> u64 {
        self.relationships.load(Ordering::Relaxed)
    }

    /// Compressed adjacency and property bytes written.
    pub fn adjacency_bytes(&self) -> u64 {
        self.adjacency_bytes.load(Ordering::Relaxed)
    }

    /// Byte pages allocated by the import arenas.
    pub fn pages(&self) -> u64 {
        self.pages.load(Ordering::Relaxed)
    }

    /// PageRank iterations completed.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Parallel tasks run to completion by the task runner.
    pub fn tasks(&self) -> u64 {
        self.tasks.load(Ordering::Relaxed)
    }
}

impl CoreMetrics for CounterMetrics {
    fn record_relationships(&self, count: u64) {
        self.relationships.fetch_add(count, Ordering::Relaxed);
    }

    fn record_adjacency_bytes(&self, bytes: u64) {
        self.adjacency_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_pages(&self, count: u64) {
        self.pages.fetch_add(count, Ordering::Relaxed);
    }

    fn record_iterations(&self, count: u64) {
        self.iterations.fetch_add(count, Ordering::Relaxed);
    }

    fn record_tasks(&self, count: u64) {
        self.tasks.fetch_add(count, Ordering::Relaxed);
    }
}

/// Default sink used when callers do not supply their own.
pub fn default_metrics() -> Arc<dyn CoreMetrics> {
    Arc::new(NoopMetrics)
}
