//! Paged numeric arrays that scale past comfortable single-allocation sizes.
//!
//! A [`HugeArray`] is a flat, fixed-size array of `u64` or `f64` slots.
//! Small arrays live in one boxed slice; arrays past [`MAX_SINGLE_LEN`] are
//! split into fixed-size pages addressed by shift/mask index arithmetic.
//! Both representations expose identical behavior, including zero-filled
//! slots and cross-representation [`HugeArray::copy_to`].
//!
//! Backing storage is dropped eagerly through [`HugeArray::release`] rather
//! than at some distant end of scope; touching a released array panics.

pub mod atomic;

/// Shift that extracts the page index from an element index.
pub const PAGE_SHIFT: u32 = 14;
/// Number of elements per page.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
/// Mask that extracts the in-page index from an element index.
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Largest logical size served by a single backing allocation.
pub const MAX_SINGLE_LEN: usize = 1 << 28;

#[inline]
pub(crate) fn page_index(index: usize) -> usize {
    index >> PAGE_SHIFT
}

#[inline]
pub(crate) fn index_in_page(index: usize) -> usize {
    index & PAGE_MASK
}

#[inline]
pub(crate) fn page_count(size: usize) -> usize {
    (size + PAGE_SIZE - 1) >> PAGE_SHIFT
}

/// Element type storable in a [`HugeArray`].
pub trait HugeValue: Copy + Default + Send + Sync + 'static {}

impl HugeValue for u64 {}
impl HugeValue for f64 {}

/// Flat array of `u64` slots, paged when large.
pub type HugeLongArray = HugeArray<u64>;
/// Flat array of `f64` slots, paged when large.
pub type HugeDoubleArray = HugeArray<f64>;

/// Fixed-size numeric array with transparent paging.
///
/// Size is immutable after allocation; slots are mutable. Out-of-range
/// indexes and use after [`release`](HugeArray::release) panic.
#[derive(Debug)]
pub struct HugeArray<T> {
    size: usize,
    repr: Repr<T>,
}

#[derive(Debug)]
enum Repr<T> {
    Single(Box<[T]>),
    Paged(Vec<Box<[T]>>),
    Released,
}

impl<T: HugeValue> HugeArray<T> {
    /// Allocates a zero-filled array of `size` slots, choosing the backing
    /// representation by size.
    pub fn new(size: usize) -> Self {
        if size <= MAX_SINGLE_LEN {
            HugeArray {
                size,
                repr: Repr::Single(vec![T::default(); size].into_boxed_slice()),
            }
        } else {
            Self::paged(size)
        }
    }

    /// Allocates a zero-filled paged array regardless of size.
    ///
    /// Behaves identically to [`HugeArray::new`]; exists so the paged
    /// representation can be exercised without allocating past the
    /// single-allocation threshold.
    pub fn paged(size: usize) -> Self {
        let pages = page_count(size);
        let mut backing = Vec::with_capacity(pages);
        for page in 0..pages {
            let len = if page + 1 == pages && index_in_page(size) != 0 {
                index_in_page(size)
            } else {
                PAGE_SIZE
            };
            backing.push(vec![T::default(); len].into_boxed_slice());
        }
        HugeArray {
            size,
            repr: Repr::Paged(backing),
        }
    }

    /// Number of logical slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes held by the backing storage; 0 after release.
    pub fn size_of(&self) -> usize {
        match &self.repr {
            Repr::Single(slots) => slots.len() * std::mem::size_of::<T>(),
            Repr::Paged(pages) => pages
                .iter()
                .map(|page| page.len() * std::mem::size_of::<T>())
                .sum(),
            Repr::Released => 0,
        }
    }

    /// Reads the slot at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match &self.repr {
            Repr::Single(slots) => slots[index],
            Repr::Paged(pages) => pages[page_index(index)][index_in_page(index)],
            Repr::Released => released(),
        }
    }

    /// Writes `value` into the slot at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        match &mut self.repr {
            Repr::Single(slots) => slots[index] = value,
            Repr::Paged(pages) => pages[page_index(index)][index_in_page(index)] = value,
            Repr::Released => released(),
        }
    }

    /// Writes `value` into every slot.
    pub fn fill(&mut self, value: T) {
        match &mut self.repr {
            Repr::Single(slots) => slots.fill(value),
            Repr::Paged(pages) => {
                for page in pages {
                    page.fill(value);
                }
            }
            Repr::Released => released(),
        }
    }

    /// Writes `generator(index)` into every slot, in index order.
    pub fn set_all(&mut self, mut generator: impl FnMut(usize) -> T) {
        match &mut self.repr {
            Repr::Single(slots) => {
                for (index, slot) in slots.iter_mut().enumerate() {
                    *slot = generator(index);
                }
            }
            Repr::Paged(pages) => {
                let mut index = 0;
                for page in pages {
                    for slot in page.iter_mut() {
                        *slot = generator(index);
                        index += 1;
                    }
                }
            }
            Repr::Released => released(),
        }
    }

    /// Copies the first `length` slots into `dest` and zero-fills every
    /// `dest` slot past `length`. Works across representations.
    pub fn copy_to(&self, dest: &mut HugeArray<T>, length: usize) {
        assert!(
            length <= self.size,
            "copy length {length} exceeds source size {}",
            self.size
        );
        assert!(
            length <= dest.size,
            "copy length {length} exceeds destination size {}",
            dest.size
        );
        let mut copied = 0;
        while copied < length {
            let run = self.slice_from(copied);
            let take = run.len().min(length - copied);
            dest.write_slice(copied, &run[..take]);
            copied += take;
        }
        dest.zero_from(length);
    }

    /// Drops the backing storage and returns the bytes freed.
    ///
    /// Any later access panics; callers own the discipline of not touching a
    /// released array.
    pub fn release(&mut self) -> usize {
        let freed = self.size_of();
        self.repr = Repr::Released;
        freed
    }

    /// Longest contiguous slice starting at `index`.
    fn slice_from(&self, index: usize) -> &[T] {
        match &self.repr {
            Repr::Single(slots) => &slots[index..],
            Repr::Paged(pages) => &pages[page_index(index)][index_in_page(index)..],
            Repr::Released => released(),
        }
    }

    fn slice_from_mut(&mut self, index: usize) -> &mut [T] {
        match &mut self.repr {
            Repr::Single(slots) => &mut slots[index..],
            Repr::Paged(pages) => &mut pages[page_index(index)][index_in_page(index)..],
            Repr::Released => released(),
        }
    }

    fn write_slice(&mut self, index: usize, values: &[T]) {
        let mut written = 0;
        while written < values.len() {
            let run = self.slice_from_mut(index + written);
            let take = run.len().min(values.len() - written);
            run[..take].copy_from_slice(&values[written..written + take]);
            written += take;
        }
    }

    fn zero_from(&mut self, from: usize) {
        let mut index = from;
        while index < self.size {
            let run = self.slice_from_mut(index);
            let len = run.len();
            run.fill(T::default());
            index += len;
        }
    }
}

#[cold]
fn released() -> ! {
    panic!("huge array accessed after release")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_reprs(size: usize) -> [HugeLongArray; 2] {
        [HugeLongArray::new(size), HugeLongArray::paged(size)]
    }

    #[test]
    fn new_slots_read_zero() {
        for array in both_reprs(3 * PAGE_SIZE + 17) {
            assert_eq!(array.size(), 3 * PAGE_SIZE + 17);
            assert_eq!(array.get(0), 0);
            assert_eq!(array.get(PAGE_SIZE), 0);
            assert_eq!(array.get(3 * PAGE_SIZE + 16), 0);
        }
    }

    #[test]
    fn set_get_roundtrip_across_page_boundaries() {
        for mut array in both_reprs(2 * PAGE_SIZE + 5) {
            let probes = [
                0,
                1,
                PAGE_SIZE - 1,
                PAGE_SIZE,
                PAGE_SIZE + 1,
                2 * PAGE_SIZE + 4,
            ];
            for (value, &index) in probes.iter().enumerate() {
                array.set(index, value as u64 + 100);
            }
            for (value, &index) in probes.iter().enumerate() {
                assert_eq!(array.get(index), value as u64 + 100);
            }
        }
    }

    #[test]
    fn representations_agree_with_flat_model() {
        let size = PAGE_SIZE + PAGE_SIZE / 2;
        let mut model = vec![0u64; size];
        let mut single = HugeLongArray::new(size);
        let mut paged = HugeLongArray::paged(size);
        for step in 0..1000usize {
            let index = step * 37 % size;
            let value = step as u64 * 13;
            model[index] = value;
            single.set(index, value);
            paged.set(index, value);
        }
        for (index, &expected) in model.iter().enumerate() {
            assert_eq!(single.get(index), expected);
            assert_eq!(paged.get(index), expected);
        }
    }

    #[test]
    fn fill_and_set_all_cover_every_slot() {
        for mut array in both_reprs(PAGE_SIZE + 3) {
            array.fill(7);
            assert_eq!(array.get(0), 7);
            assert_eq!(array.get(PAGE_SIZE + 2), 7);
            array.set_all(|index| index as u64 * 2);
            assert_eq!(array.get(0), 0);
            assert_eq!(array.get(PAGE_SIZE), PAGE_SIZE as u64 * 2);
            assert_eq!(array.get(PAGE_SIZE + 2), (PAGE_SIZE as u64 + 2) * 2);
        }
    }

    #[test]
    fn copy_to_crosses_representations_and_zero_pads() {
        let size = PAGE_SIZE + 10;
        let mut source = HugeLongArray::paged(size);
        source.set_all(|index| index as u64 + 1);
        let mut dest = HugeLongArray::new(size);
        dest.fill(u64::MAX);
        source.copy_to(&mut dest, PAGE_SIZE + 2);
        assert_eq!(dest.get(0), 1);
        assert_eq!(dest.get(PAGE_SIZE + 1), PAGE_SIZE as u64 + 2);
        for index in PAGE_SIZE + 2..size {
            assert_eq!(dest.get(index), 0, "slot {index} not zero-padded");
        }
    }

    #[test]
    fn release_reports_bytes_and_blocks_access() {
        let mut array = HugeLongArray::new(100);
        let freed = array.release();
        assert_eq!(freed, 100 * std::mem::size_of::<u64>());
        assert_eq!(array.size_of(), 0);
    }

    #[test]
    #[should_panic(expected = "after release")]
    fn get_after_release_panics() {
        let mut array = HugeLongArray::new(4);
        array.release();
        array.get(0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        let array = HugeDoubleArray::new(4);
        array.get(4);
    }

    #[test]
    fn double_arrays_store_doubles() {
        let mut array = HugeDoubleArray::paged(PAGE_SIZE + 1);
        array.set(PAGE_SIZE, 0.25);
        assert_eq!(array.get(PAGE_SIZE), 0.25);
        assert_eq!(array.get(0), 0.0);
    }

    #[test]
    fn last_page_is_trimmed_to_size() {
        let array = HugeLongArray::paged(PAGE_SIZE + 1);
        assert_eq!(
            array.size_of(),
            (PAGE_SIZE + 1) * std::mem::size_of::<u64>()
        );
    }
}
