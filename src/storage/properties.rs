//! Relationship and node property storage.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::primitives::huge::HugeDoubleArray;
use crate::storage::adjacency::AdjacencyOffsets;
use crate::storage::cursor::PropertyCursor;
use crate::storage::pages::BytePages;

/// One column of relationship property values.
///
/// Values sit in their own byte pages, one run per source node, aligned
/// position-for-position with the targets of the adjacency run for that
/// node.
#[derive(Debug)]
pub struct RelationshipProperties {
    pages: BytePages,
    offsets: AdjacencyOffsets,
}

impl RelationshipProperties {
    pub(crate) fn new(pages: BytePages, offsets: AdjacencyOffsets) -> Self {
        RelationshipProperties { pages, offsets }
    }

    /// Cursor over `node`'s property run, or `None` when the node has no
    /// relationships in this column.
    pub fn cursor(&self, node: u64) -> Option<PropertyCursor<'_>> {
        self.offsets
            .get(node)
            .map(|offset| PropertyCursor::at(&self.pages, offset))
    }

    /// Total property bytes, including page padding.
    pub fn byte_size(&self) -> usize {
        self.pages.byte_size() + self.offsets.byte_size()
    }
}

/// Named per-node property arrays.
#[derive(Debug, Default)]
pub struct NodePropertyStore {
    values: FxHashMap<String, Arc<HugeDoubleArray>>,
}

impl NodePropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `values` under `name`, replacing any previous array.
    pub fn insert(&mut self, name: impl Into<String>, values: HugeDoubleArray) {
        self.values.insert(name.into(), Arc::new(values));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<HugeDoubleArray>> {
        self.values.get(name)
    }

    /// Value of `name` for `node`, or `fallback` when the property is
    /// missing.
    pub fn value(&self, name: &str, node: u64, fallback: f64) -> f64 {
        self.values
            .get(name)
            .map_or(fallback, |array| array.get(node as usize))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
