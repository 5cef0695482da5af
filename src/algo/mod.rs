//! Graph algorithms over frozen views.
//!
//! Every algorithm takes a [`GraphView`](crate::graph::GraphView), an
//! optional shared worker pool, and a termination flag, and fans its work
//! out over node partitions through the bounded-concurrency runner.

mod degrees;
mod pagerank;
mod partition;
mod triangles;

/// Per-node sums of positive relationship weights.
pub use degrees::weighted_degrees;

/// Rank iteration with damping, personalization, and weights.
pub use pagerank::{PageRank, PageRankConfig, PageRankResult};

/// Node ranges balanced by count or by degree.
pub use partition::{degree_partitions, range_partitions, DegreePartition};

/// Triangle enumeration and counting.
pub use triangles::{triangle_count, TriangleCountConfig, TriangleCountResult, TriangleIntersect};
