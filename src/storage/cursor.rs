//! Cursors over compressed adjacency and property runs.

use crate::primitives::codec::{delta, fixed, CHUNK_SIZE};
use crate::storage::pages::BytePages;

/// Streaming reader over one compressed adjacency run.
///
/// Decodes targets in chunks of [`CHUNK_SIZE`] values into a fixed buffer.
/// A cursor is built once per thread and re-pointed at runs via
/// [`AdjacencyCursor::init`], so the hot iteration path allocates nothing.
pub struct AdjacencyCursor<'a> {
    pages: &'a BytePages,
    bytes: &'a [u8],
    byte_pos: usize,
    chunk: [u64; CHUNK_SIZE],
    chunk_pos: usize,
    chunk_len: usize,
    /// Targets not yet decoded into the chunk buffer.
    pending: usize,
    /// Delta base chaining the next chunk to the last decoded value.
    last: u64,
}

impl<'a> AdjacencyCursor<'a> {
    /// Cursor not yet pointed at any run; every read returns `None` until
    /// [`AdjacencyCursor::init`] is called.
    pub(crate) fn detached(pages: &'a BytePages) -> Self {
        AdjacencyCursor {
            pages,
            bytes: &[],
            byte_pos: 0,
            chunk: [0; CHUNK_SIZE],
            chunk_pos: 0,
            chunk_len: 0,
            pending: 0,
            last: 0,
        }
    }

    /// Points the cursor at the run starting at `offset`, resetting all
    /// iteration state.
    pub fn init(&mut self, offset: u64) {
        let (page, pos) = self.pages.page_for(offset);
        let degree = fixed::get_u32_le(page, pos) as usize;
        self.bytes = page;
        self.byte_pos = pos + 4;
        self.chunk_pos = 0;
        self.chunk_len = 0;
        self.pending = degree;
        self.last = 0;
    }

    /// Adopts `other`'s exact position; both cursors must come from the same
    /// adjacency list.
    pub fn copy_from(&mut self, other: &Self) {
        self.bytes = other.bytes;
        self.byte_pos = other.byte_pos;
        self.chunk = other.chunk;
        self.chunk_pos = other.chunk_pos;
        self.chunk_len = other.chunk_len;
        self.pending = other.pending;
        self.last = other.last;
    }

    /// Values left to consume, decoded or not.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.chunk_len - self.chunk_pos + self.pending
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.remaining() > 0
    }

    fn load_chunk(&mut self) {
        let take = self.pending.min(CHUNK_SIZE);
        self.byte_pos =
            delta::decode_chunk(self.last, self.bytes, self.byte_pos, take, &mut self.chunk);
        self.chunk_pos = 0;
        self.chunk_len = take;
        self.pending -= take;
        self.last = self.chunk[take - 1];
    }

    /// True when the current chunk is exhausted and nothing is left to
    /// decode.
    #[inline]
    fn ensure_chunk(&mut self) -> bool {
        if self.chunk_pos == self.chunk_len {
            if self.pending == 0 {
                return true;
            }
            self.load_chunk();
        }
        false
    }

    /// Next target id in ascending order.
    #[inline]
    pub fn next(&mut self) -> Option<u64> {
        if self.ensure_chunk() {
            return None;
        }
        let value = self.chunk[self.chunk_pos];
        self.chunk_pos += 1;
        Some(value)
    }

    /// Next target without consuming it. Takes `&mut self` because peeking
    /// may decode the next chunk.
    #[inline]
    pub fn peek(&mut self) -> Option<u64> {
        if self.ensure_chunk() {
            return None;
        }
        Some(self.chunk[self.chunk_pos])
    }

    /// Consumes values until one strictly greater than `target` and returns
    /// it. Chunks whose maximum is still `<= target` are skipped whole.
    pub fn skip_until(&mut self, target: u64) -> Option<u64> {
        loop {
            if self.ensure_chunk() {
                return None;
            }
            if self.chunk[self.chunk_len - 1] <= target {
                self.chunk_pos = self.chunk_len;
                continue;
            }
            let within = &self.chunk[self.chunk_pos..self.chunk_len];
            self.chunk_pos += within.partition_point(|&value| value <= target);
            let value = self.chunk[self.chunk_pos];
            self.chunk_pos += 1;
            return Some(value);
        }
    }

    /// Consumes values until one greater than or equal to `target` and
    /// returns it.
    pub fn advance(&mut self, target: u64) -> Option<u64> {
        loop {
            if self.ensure_chunk() {
                return None;
            }
            if self.chunk[self.chunk_len - 1] < target {
                self.chunk_pos = self.chunk_len;
                continue;
            }
            let within = &self.chunk[self.chunk_pos..self.chunk_len];
            self.chunk_pos += within.partition_point(|&value| value < target);
            let value = self.chunk[self.chunk_pos];
            self.chunk_pos += 1;
            return Some(value);
        }
    }
}

/// Streaming reader over one property run.
///
/// A run is a 4-byte little-endian count followed by `count` values stored
/// as 8-byte IEEE-754 bit patterns, aligned position-for-position with the
/// targets of the matching adjacency run.
pub struct PropertyCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> PropertyCursor<'a> {
    pub(crate) fn at(pages: &'a BytePages, offset: u64) -> Self {
        let (page, pos) = pages.page_for(offset);
        let count = fixed::get_u32_le(page, pos) as usize;
        PropertyCursor {
            bytes: page,
            pos: pos + 4,
            remaining: count,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    /// Next property value in target order.
    #[inline]
    pub fn next_value(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        let bits = fixed::get_u64_le(self.bytes, self.pos);
        self.pos += 8;
        self.remaining -= 1;
        Some(f64::from_bits(bits))
    }
}
