//! Byte-level encodings for adjacency and property storage.
//!
//! Three flavors: fixed-width little-endian words (`fixed`), 7-bit
//! variable-length unsigned integers (`vlong`), and sorted-delta compression
//! over vlongs (`delta`). All routines are pure and stateless. Inputs that
//! violate an encoding contract panic; these sit on decode hot paths and do
//! not return errors.

/// Number of targets decoded per call by [`delta::decode_chunk`].
pub const CHUNK_SIZE: usize = 64;

/// Fixed-width little-endian words, used for degree headers and property
/// bit patterns.
pub mod fixed {
    /// Writes `value` as four little-endian bytes at `dst[pos..pos + 4]`.
    #[inline]
    pub fn put_u32_le(dst: &mut [u8], pos: usize, value: u32) {
        dst[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads four little-endian bytes from `src[pos..pos + 4]`.
    #[inline]
    pub fn get_u32_le(src: &[u8], pos: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&src[pos..pos + 4]);
        u32::from_le_bytes(word)
    }

    /// Writes `value` as eight little-endian bytes at `dst[pos..pos + 8]`.
    #[inline]
    pub fn put_u64_le(dst: &mut [u8], pos: usize, value: u64) {
        dst[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads eight little-endian bytes from `src[pos..pos + 8]`.
    #[inline]
    pub fn get_u64_le(src: &[u8], pos: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&src[pos..pos + 8]);
        u64::from_le_bytes(word)
    }
}

/// Variable-length unsigned integers: 7 data bits per byte, high bit set on
/// every byte except the last.
pub mod vlong {
    /// Bytes needed to encode `value`.
    #[inline]
    pub fn encoded_len(value: u64) -> usize {
        let bits = (64 - value.leading_zeros() as usize).max(1);
        (bits + 6) / 7
    }

    /// Appends `value` to `out`.
    #[inline]
    pub fn encode(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    /// Decodes one value at `*pos`, advancing `*pos` past the consumed
    /// bytes. Panics on truncated input or a value overflowing `u64`.
    #[inline]
    pub fn decode(src: &[u8], pos: &mut usize) -> u64 {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            assert!(*pos < src.len(), "vlong truncated at byte {}", *pos);
            assert!(shift < 64, "vlong overflows u64");
            let byte = src[*pos];
            *pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return value;
            }
            shift += 7;
        }
    }
}

/// Sorted-delta compression: ascending values stored as vlong gaps.
pub mod delta {
    use super::{vlong, CHUNK_SIZE};

    /// Rewrites sorted ascending `values` as gaps in place. The first value
    /// stays relative to base 0. Panics when the input is not sorted.
    pub fn encode_in_place(values: &mut [u64]) {
        let mut previous = 0u64;
        for value in values.iter_mut() {
            let current = *value;
            assert!(current >= previous, "delta encoding requires sorted input");
            *value = current - previous;
            previous = current;
        }
    }

    /// Delta-encodes sorted ascending `values` and appends the vlong gaps
    /// to `out` in one pass. Panics when the input is not sorted.
    pub fn compress(values: &[u64], out: &mut Vec<u8>) {
        let mut previous = 0u64;
        for &value in values {
            assert!(value >= previous, "delta compression requires sorted input");
            vlong::encode(value - previous, out);
            previous = value;
        }
    }

    /// Decodes `count` (≤ 64) delta-vlongs from `bytes` starting at
    /// `offset`, writing absolute values cumulative from `base` into
    /// `out[..count]`. Returns the byte offset just past the consumed
    /// bytes; chain longer runs by passing the previous chunk's last value
    /// as the next `base`.
    pub fn decode_chunk(
        base: u64,
        bytes: &[u8],
        offset: usize,
        count: usize,
        out: &mut [u64; CHUNK_SIZE],
    ) -> usize {
        assert!(count <= CHUNK_SIZE, "chunk of {count} exceeds {CHUNK_SIZE}");
        let mut pos = offset;
        let mut last = base;
        for slot in out.iter_mut().take(count) {
            last += vlong::decode(bytes, &mut pos);
            *slot = last;
        }
        pos
    }
}
