//! Mapping between original node ids and the dense internal id space.

use rustc_hash::FxHashMap;

use crate::primitives::huge::HugeLongArray;
use crate::types::NodeId;

/// Assigns dense mapped ids to original ids in first-seen order.
#[derive(Debug, Default)]
pub struct IdMapBuilder {
    to_original: Vec<u64>,
    to_mapped: FxHashMap<u64, u64>,
}

impl IdMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        IdMapBuilder {
            to_original: Vec::with_capacity(capacity),
            to_mapped: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Returns the mapped id for `original`, assigning the next dense id on
    /// first sight.
    pub fn add(&mut self, original: NodeId) -> u64 {
        match self.to_mapped.entry(original.0) {
            std::collections::hash_map::Entry::Occupied(slot) => *slot.get(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let mapped = self.to_original.len() as u64;
                slot.insert(mapped);
                self.to_original.push(original.0);
                mapped
            }
        }
    }

    pub fn node_count(&self) -> u64 {
        self.to_original.len() as u64
    }

    pub fn build(self) -> IdMap {
        let IdMapBuilder {
            to_original,
            to_mapped,
        } = self;
        let mut forward = HugeLongArray::new(to_original.len());
        forward.set_all(|index| to_original[index]);
        IdMap {
            to_original: forward,
            to_mapped,
        }
    }
}

/// Frozen bijection between original and mapped ids.
///
/// Mapped ids are dense in `[0, node_count)`, so adjacency offsets and
/// algorithm state index by them directly.
#[derive(Debug)]
pub struct IdMap {
    to_original: HugeLongArray,
    to_mapped: FxHashMap<u64, u64>,
}

impl IdMap {
    /// Identity mapping over `[0, node_count)`, for inputs that are already
    /// dense.
    pub fn identity(node_count: u64) -> Self {
        let mut builder = IdMapBuilder::with_capacity(node_count as usize);
        for id in 0..node_count {
            builder.add(NodeId(id));
        }
        builder.build()
    }

    pub fn node_count(&self) -> u64 {
        self.to_original.size() as u64
    }

    /// Mapped id of `original`, or `None` for ids never imported.
    pub fn to_mapped(&self, original: NodeId) -> Option<u64> {
        self.to_mapped.get(&original.0).copied()
    }

    /// Original id behind a mapped id.
    pub fn to_original(&self, mapped: u64) -> NodeId {
        NodeId(self.to_original.get(mapped as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_dense_ids_in_first_seen_order() {
        let mut builder = IdMapBuilder::new();
        assert_eq!(builder.add(NodeId(900)), 0);
        assert_eq!(builder.add(NodeId(17)), 1);
        assert_eq!(builder.add(NodeId(900)), 0);
        assert_eq!(builder.add(NodeId(3)), 2);
        let map = builder.build();
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.to_mapped(NodeId(17)), Some(1));
        assert_eq!(map.to_mapped(NodeId(4)), None);
        assert_eq!(map.to_original(2), NodeId(3));
    }

    #[test]
    fn identity_maps_ids_to_themselves() {
        let map = IdMap::identity(5);
        assert_eq!(map.to_mapped(NodeId(4)), Some(4));
        assert_eq!(map.to_original(4), NodeId(4));
        assert_eq!(map.to_mapped(NodeId(5)), None);
    }
}
