//! Atomic huge arrays for concurrent accumulation.
//!
//! Same paging scheme as the plain arrays, but every slot is an `AtomicU64`
//! so concurrent writers can accumulate without locks. The double variant
//! stores IEEE-754 bit patterns and loops over compare-exchange for
//! read-modify-write updates. Guarantees are per slot only; there is no
//! cross-slot atomicity.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{index_in_page, page_count, page_index, MAX_SINGLE_LEN, PAGE_SIZE};

/// Fixed-size array of atomically accessed `u64` slots.
#[derive(Debug)]
pub struct HugeAtomicLongArray {
    size: usize,
    repr: Repr,
}

#[derive(Debug)]
enum Repr {
    Single(Box<[AtomicU64]>),
    Paged(Vec<Box<[AtomicU64]>>),
    Released,
}

fn zeroed(len: usize) -> Box<[AtomicU64]> {
    (0..len).map(|_| AtomicU64::new(0)).collect()
}

impl HugeAtomicLongArray {
    /// Allocates a zero-filled array of `size` slots.
    pub fn new(size: usize) -> Self {
        if size <= MAX_SINGLE_LEN {
            HugeAtomicLongArray {
                size,
                repr: Repr::Single(zeroed(size)),
            }
        } else {
            Self::paged(size)
        }
    }

    /// Allocates a zero-filled paged array regardless of size.
    pub fn paged(size: usize) -> Self {
        let pages = page_count(size);
        let mut backing = Vec::with_capacity(pages);
        for page in 0..pages {
            let len = if page + 1 == pages && index_in_page(size) != 0 {
                index_in_page(size)
            } else {
                PAGE_SIZE
            };
            backing.push(zeroed(len));
        }
        HugeAtomicLongArray {
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
            Repr::Single(slots) => slots.len() * std::mem::size_of::<AtomicU64>(),
            Repr::Paged(pages) => pages
                .iter()
                .map(|page| page.len() * std::mem::size_of::<AtomicU64>())
                .sum(),
            Repr::Released => 0,
        }
    }

    #[inline]
    fn cell(&self, index: usize) -> &AtomicU64 {
        match &self.repr {
            Repr::Single(slots) => &slots[index],
            Repr::Paged(pages) => &pages[page_index(index)][index_in_page(index)],
            Repr::Released => super::released(),
        }
    }

    /// Reads the slot at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        self.cell(index).load(Ordering::Relaxed)
    }

    /// Writes `value` into the slot at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: u64) {
        self.cell(index).store(value, Ordering::Relaxed);
    }

    /// Adds `delta` to the slot at `index`, returning the previous value.
    #[inline]
    pub fn add(&self, index: usize, delta: u64) -> u64 {
        self.cell(index).fetch_add(delta, Ordering::AcqRel)
    }

    /// Installs `update` iff the slot still holds `expect`.
    pub fn compare_and_set(&self, index: usize, expect: u64, update: u64) -> bool {
        self.cell(index)
            .compare_exchange(expect, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Applies `f` to the slot at `index` under a compare-exchange retry
    /// loop. `f` must be pure: it runs again whenever the slot changed
    /// underneath the update.
    pub fn update(&self, index: usize, f: impl Fn(u64) -> u64) {
        let cell = self.cell(index);
        let mut current = cell.load(Ordering::Acquire);
        loop {
            match cell.compare_exchange_weak(
                current,
                f(current),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Drops the backing storage and returns the bytes freed.
    pub fn release(&mut self) -> usize {
        let freed = self.size_of();
        self.repr = Repr::Released;
        freed
    }
}

/// Fixed-size array of atomically accessed `f64` slots.
///
/// Values are stored as bit patterns in a [`HugeAtomicLongArray`];
/// [`compare_and_set`](HugeAtomicDoubleArray::compare_and_set) therefore
/// compares bitwise, so `-0.0` and `0.0` are distinct and `NaN` compares
/// equal to itself.
#[derive(Debug)]
pub struct HugeAtomicDoubleArray {
    bits: HugeAtomicLongArray,
}

impl HugeAtomicDoubleArray {
    /// Allocates a zero-filled array of `size` slots.
    pub fn new(size: usize) -> Self {
        HugeAtomicDoubleArray {
            bits: HugeAtomicLongArray::new(size),
        }
    }

    /// Allocates a zero-filled paged array regardless of size.
    pub fn paged(size: usize) -> Self {
        HugeAtomicDoubleArray {
            bits: HugeAtomicLongArray::paged(size),
        }
    }

    /// Number of logical slots.
    pub fn size(&self) -> usize {
        self.bits.size()
    }

    /// Bytes held by the backing storage; 0 after release.
    pub fn size_of(&self) -> usize {
        self.bits.size_of()
    }

    /// Reads the slot at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        f64::from_bits(self.bits.get(index))
    }

    /// Writes `value` into the slot at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: f64) {
        self.bits.set(index, value.to_bits());
    }

    /// Installs `update` iff the slot still holds exactly `expect`'s bits.
    pub fn compare_and_set(&self, index: usize, expect: f64, update: f64) -> bool {
        self.bits
            .compare_and_set(index, expect.to_bits(), update.to_bits())
    }

    /// Applies `f` to the slot at `index` under a compare-exchange retry
    /// loop. `f` must be pure.
    pub fn update(&self, index: usize, f: impl Fn(f64) -> f64) {
        self.bits
            .update(index, |bits| f(f64::from_bits(bits)).to_bits());
    }

    /// Adds `delta` to the slot at `index`.
    pub fn add(&self, index: usize, delta: f64) {
        self.update(index, |value| value + delta);
    }

    /// Drops the backing storage and returns the bytes freed.
    pub fn release(&mut self) -> usize {
        self.bits.release()
    }
}
