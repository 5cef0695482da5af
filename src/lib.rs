//! In-memory graph store and algorithms for analytics workloads.
//!
//! Relationships stream in through the page-parallel [`storage`] import
//! builder, land in delta-encoded compressed adjacency pages, and are read
//! back through cheap reusable cursors. [`graph`] wraps the frozen storage
//! in shareable views, and [`algo`] runs partition-parallel computations
//! such as rank iteration and triangle counting on top of them.
//!
//! ```
//! use std::sync::Arc;
//!
//! use basalt::algo::{PageRank, PageRankConfig};
//! use basalt::graph::{Graph, GraphView};
//! use basalt::primitives::concurrency::TerminationFlag;
//! use basalt::storage::{IdMap, ImportOptions, RelationshipsBuilder};
//!
//! # fn main() -> basalt::error::Result<()> {
//! let builder = RelationshipsBuilder::new(3, ImportOptions::new())?;
//! builder.add(0, 1, &[]);
//! builder.add(1, 2, &[]);
//! builder.add(2, 0, &[]);
//! let built = builder.build(None, &TerminationFlag::new())?;
//! let graph = Graph::from_import(Arc::new(IdMap::identity(3)), built);
//!
//! let rank = PageRank::new(PageRankConfig::new().max_iterations(100))?;
//! let result = rank.run(&graph, None, &TerminationFlag::new())?;
//! assert_eq!(result.scores.size(), graph.node_count() as usize);
//! # Ok(())
//! # }
//! ```

pub mod algo;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod primitives;
pub mod storage;
pub mod types;
