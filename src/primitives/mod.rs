//! Low-level primitives for building the graph core.
//!
//! Includes paged numeric arrays, byte-level codecs, and the
//! bounded-concurrency task runner.

/// Byte-level encodings for adjacency and property storage.
///
/// Fixed-width little-endian words, variable-length integers, and
/// sorted-delta compression.
pub mod codec;

/// Concurrency primitives.
///
/// The shared worker pool, the bounded-concurrency admission layer, and the
/// cooperative termination flag.
pub mod concurrency;

/// Paged numeric arrays.
///
/// Flat u64/f64 arrays (plain and atomic) that switch between a single
/// backing allocation and fixed-size pages as they grow.
pub mod huge;
