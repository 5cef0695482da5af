//! Compressed adjacency storage and the per-node offset index.

use crate::primitives::codec::fixed;
use crate::primitives::huge::atomic::HugeAtomicLongArray;
use crate::storage::cursor::AdjacencyCursor;
use crate::storage::pages::BytePages;

/// Compressed adjacency runs for one relationship type.
///
/// Each run starts with a 4-byte little-endian degree header followed by the
/// delta-encoded, vlong-compressed target ids. Runs are located through
/// [`AdjacencyOffsets`].
#[derive(Debug)]
pub struct AdjacencyList {
    pages: BytePages,
}

impl AdjacencyList {
    pub(crate) fn new(pages: BytePages) -> Self {
        AdjacencyList { pages }
    }

    /// Degree stored in the run header at `offset`.
    #[inline]
    pub fn degree(&self, offset: u64) -> usize {
        let (page, pos) = self.pages.page_for(offset);
        fixed::get_u32_le(page, pos) as usize
    }

    /// Cursor positioned at the start of the run at `offset`.
    pub fn cursor(&self, offset: u64) -> AdjacencyCursor<'_> {
        let mut cursor = self.raw_cursor();
        cursor.init(offset);
        cursor
    }

    /// Detached cursor for reuse; call [`AdjacencyCursor::init`] before
    /// reading from it.
    pub fn raw_cursor(&self) -> AdjacencyCursor<'_> {
        AdjacencyCursor::detached(&self.pages)
    }

    /// Total compressed bytes, including page padding.
    pub fn byte_size(&self) -> usize {
        self.pages.byte_size()
    }

    pub(crate) fn pages(&self) -> &BytePages {
        &self.pages
    }
}

/// Per-node byte offsets into an adjacency or property list.
///
/// Slots hold `offset + 1` so that zero means "no run"; the bias keeps byte
/// offset 0 (page 0, position 0) addressable. Slots are atomic because
/// import flush tasks record disjoint nodes concurrently.
#[derive(Debug)]
pub struct AdjacencyOffsets {
    slots: HugeAtomicLongArray,
}

impl AdjacencyOffsets {
    pub(crate) fn new(node_count: usize) -> Self {
        AdjacencyOffsets {
            slots: HugeAtomicLongArray::new(node_count),
        }
    }

    /// Byte offset of `node`'s run, or `None` for nodes without one.
    #[inline]
    pub fn get(&self, node: u64) -> Option<u64> {
        match self.slots.get(node as usize) {
            0 => None,
            biased => Some(biased - 1),
        }
    }

    pub(crate) fn set(&self, node: u64, offset: u64) {
        self.slots.set(node as usize, offset + 1);
    }

    /// Number of addressable nodes.
    pub fn size(&self) -> usize {
        self.slots.size()
    }

    pub(crate) fn byte_size(&self) -> usize {
        self.slots.size_of()
    }
}
