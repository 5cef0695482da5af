//! Byte-page arena backing compressed adjacency and property storage.
//!
//! During import, every flush thread owns a [`LocalAllocator`] that fills one
//! page at a time; page slots are reserved from the shared [`PageArena`] so
//! byte offsets handed out while filling stay valid after the page is
//! installed. Runs never straddle a page: a run larger than the standard
//! page size gets a dedicated, exactly-sized page at a page-aligned offset.
//! After the build the arena freezes into [`BytePages`], which readers share
//! without locks.

use parking_lot::Mutex;

/// Shift that extracts the page index from a byte offset.
pub(crate) const BYTE_PAGE_SHIFT: u32 = 18;
/// Bytes per standard page.
pub(crate) const BYTE_PAGE_SIZE: usize = 1 << BYTE_PAGE_SHIFT;
/// Mask that extracts the in-page position from a byte offset.
pub(crate) const BYTE_PAGE_MASK: u64 = (BYTE_PAGE_SIZE as u64) - 1;

#[inline]
pub(crate) fn byte_offset(page: usize, pos: usize) -> u64 {
    ((page as u64) << BYTE_PAGE_SHIFT) | pos as u64
}

/// Growable set of byte pages shared by concurrent local allocators.
#[derive(Debug, Default)]
pub(crate) struct PageArena {
    slots: Mutex<Vec<Option<Box<[u8]>>>>,
}

impl PageArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserves the next page index; the page itself arrives via
    /// [`PageArena::install`].
    fn reserve(&self) -> usize {
        let mut slots = self.slots.lock();
        slots.push(None);
        slots.len() - 1
    }

    fn install(&self, slot: usize, page: Box<[u8]>) {
        self.slots.lock()[slot] = Some(page);
    }

    pub(crate) fn page_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Freezes the arena. Panics when an allocator reserved a slot and never
    /// installed its page.
    pub(crate) fn freeze(self) -> BytePages {
        let pages = self
            .slots
            .into_inner()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(page) => page,
                None => panic!("page slot {index} reserved but never installed"),
            })
            .collect();
        BytePages { pages }
    }
}

/// Per-thread bump allocator over a [`PageArena`].
///
/// Holds the page it is currently filling; the page is installed into its
/// reserved slot when full and when the allocator drops.
pub(crate) struct LocalAllocator<'a> {
    arena: &'a PageArena,
    current: Option<(usize, Box<[u8]>)>,
    top: usize,
}

impl<'a> LocalAllocator<'a> {
    pub(crate) fn new(arena: &'a PageArena) -> Self {
        LocalAllocator {
            arena,
            current: None,
            top: 0,
        }
    }

    /// Copies `bytes` into the arena and returns the run's byte offset.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> u64 {
        if bytes.len() > BYTE_PAGE_SIZE {
            return self.append_oversized(bytes);
        }
        if self.current.is_none() || self.top + bytes.len() > BYTE_PAGE_SIZE {
            self.flush_current();
            let slot = self.arena.reserve();
            self.current = Some((slot, vec![0u8; BYTE_PAGE_SIZE].into_boxed_slice()));
            self.top = 0;
        }
        let Some((slot, page)) = self.current.as_mut() else {
            unreachable!("allocator page just ensured");
        };
        page[self.top..self.top + bytes.len()].copy_from_slice(bytes);
        let offset = byte_offset(*slot, self.top);
        self.top += bytes.len();
        offset
    }

    /// Runs larger than a page get their own exactly-sized page; the run
    /// starts page-aligned so offset decomposition stays shift/mask.
    fn append_oversized(&mut self, bytes: &[u8]) -> u64 {
        let slot = self.arena.reserve();
        self.arena.install(slot, bytes.to_vec().into_boxed_slice());
        byte_offset(slot, 0)
    }

    fn flush_current(&mut self) {
        if let Some((slot, page)) = self.current.take() {
            self.arena.install(slot, page);
        }
    }
}

impl Drop for LocalAllocator<'_> {
    fn drop(&mut self) {
        self.flush_current();
    }
}

/// Frozen byte pages shared read-only across graph views.
#[derive(Debug)]
pub struct BytePages {
    pages: Vec<Box<[u8]>>,
}

impl BytePages {
    /// Page slice and in-page position of the run starting at `offset`.
    #[inline]
    pub(crate) fn page_for(&self, offset: u64) -> (&[u8], usize) {
        let page = &self.pages[(offset >> BYTE_PAGE_SHIFT) as usize];
        (page.as_ref(), (offset & BYTE_PAGE_MASK) as usize)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn byte_size(&self) -> usize {
        self.pages.iter().map(|page| page.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn from_pages(pages: Vec<Box<[u8]>>) -> Self {
        BytePages { pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_within_one_page_are_contiguous() {
        let arena = PageArena::new();
        {
            let mut alloc = LocalAllocator::new(&arena);
            assert_eq!(alloc.append(&[1, 2, 3]), 0);
            assert_eq!(alloc.append(&[4, 5]), 3);
        }
        let pages = arena.freeze();
        let (page, pos) = pages.page_for(0);
        assert_eq!(pos, 0);
        assert_eq!(&page[0..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn full_page_rolls_over_to_a_fresh_page() {
        let arena = PageArena::new();
        let big = vec![7u8; BYTE_PAGE_SIZE - 2];
        {
            let mut alloc = LocalAllocator::new(&arena);
            assert_eq!(alloc.append(&big), 0);
            let offset = alloc.append(&[9, 9, 9]);
            assert_eq!(offset >> BYTE_PAGE_SHIFT, 1);
            assert_eq!(offset & BYTE_PAGE_MASK, 0);
        }
        let pages = arena.freeze();
        assert_eq!(pages.page_count(), 2);
    }

    #[test]
    fn oversized_runs_get_dedicated_pages() {
        let arena = PageArena::new();
        let huge = vec![3u8; BYTE_PAGE_SIZE + 100];
        let offset;
        {
            let mut alloc = LocalAllocator::new(&arena);
            alloc.append(&[1]);
            offset = alloc.append(&huge);
            alloc.append(&[2]);
        }
        assert_eq!(offset & BYTE_PAGE_MASK, 0);
        let pages = arena.freeze();
        let (page, pos) = pages.page_for(offset);
        assert_eq!(pos, 0);
        assert_eq!(page.len(), BYTE_PAGE_SIZE + 100);
    }

    #[test]
    fn concurrent_allocators_interleave_without_clobbering() {
        use std::sync::Arc;
        let arena = Arc::new(PageArena::new());
        let handles: Vec<_> = (0u8..4)
            .map(|tag| {
                let arena = Arc::clone(&arena);
                std::thread::spawn(move || {
                    let mut alloc = LocalAllocator::new(&arena);
                    (0..100)
                        .map(|_| (tag, alloc.append(&[tag; 32])))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<(u8, u64)> = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let arena = Arc::try_unwrap(arena).expect("allocators done");
        let pages = arena.freeze();
        for (tag, offset) in all {
            let (page, pos) = pages.page_for(offset);
            assert_eq!(&page[pos..pos + 32], &[tag; 32][..]);
        }
    }
}
