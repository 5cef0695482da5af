//! Compressed in-memory graph storage.
//!
//! Relationships are imported through a page-parallel builder into
//! delta-encoded, vlong-compressed adjacency pages, located per node through
//! an offset index and read back through reusable cursors.

mod adjacency;
mod builder;
mod cursor;
mod idmap;
mod pages;
mod properties;

/// Compressed adjacency runs and their per-node offset index.
pub use adjacency::{AdjacencyList, AdjacencyOffsets};

/// Parallel relationship import.
pub use builder::{BuiltRelationships, ImportOptions, ImportStats, RelationshipsBuilder};

/// Streaming readers over compressed runs.
pub use cursor::{AdjacencyCursor, PropertyCursor};

/// Mapping between original and dense internal node ids.
pub use idmap::{IdMap, IdMapBuilder};

/// Relationship and node property stores.
pub use properties::{NodePropertyStore, RelationshipProperties};
