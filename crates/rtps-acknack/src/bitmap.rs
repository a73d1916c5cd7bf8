// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SequenceNumberSet / FragmentNumberSet bitmap codec.
//!
//! Shared representation of "base + N bits, bit i set means unit base+i is
//! missing" used by ACKNACK (sample granularity) and NACKFRAG (fragment
//! granularity). Bit order is MSB-first within each 32-bit word per
//! RTPS v2.5 Sec.9.4.5.

/// Maximum number of bitmap bits (RTPS limit, multiple of 32).
pub const MAX_BITMAP_BITS: u32 = 256;
/// Bits per bitmap word.
pub const WORD_BITS: u32 = 32;
/// Backing words for a maximum-size bitmap.
pub const BITMAP_WORDS: usize = (MAX_BITMAP_BITS / WORD_BITS) as usize;

const _: () = assert!(MAX_BITMAP_BITS % 32 == 0);

/// Number of words needed to carry `bits` bitmap bits.
#[must_use]
pub fn word_count_for_bits(bits: u32) -> usize {
    bits.div_ceil(WORD_BITS) as usize
}

#[inline]
fn set_bit(words: &mut [u32; BITMAP_WORDS], idx: u32) {
    // MSB-first ordering per RTPS spec Sec.8.3.5.5
    words[(idx / WORD_BITS) as usize] |= 1u32 << (31 - idx % WORD_BITS);
}

#[inline]
fn test_bit(words: &[u32; BITMAP_WORDS], idx: u32) -> bool {
    words[(idx / WORD_BITS) as usize] & (1u32 << (31 - idx % WORD_BITS)) != 0
}

#[inline]
fn clear_from(words: &mut [u32; BITMAP_WORDS], num_bits: u32) {
    // Zero everything at and beyond `num_bits` so truncated sets encode cleanly.
    for idx in num_bits..MAX_BITMAP_BITS {
        words[(idx / WORD_BITS) as usize] &= !(1u32 << (31 - idx % WORD_BITS));
    }
}

/// Sample-level missing-set: `base + i` is missing when bit `i` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNumberSet {
    base: u64,
    num_bits: u32,
    bits: [u32; BITMAP_WORDS],
}

impl SequenceNumberSet {
    /// Empty set ("nothing missing") anchored at `base`.
    #[must_use]
    pub fn empty(base: u64) -> Self {
        Self {
            base,
            num_bits: 0,
            bits: [0; BITMAP_WORDS],
        }
    }

    /// Set anchored at `base` covering `num_bits` bits, all clear.
    ///
    /// `num_bits` is clamped to [`MAX_BITMAP_BITS`].
    #[must_use]
    pub fn with_bits(base: u64, num_bits: u32) -> Self {
        Self {
            base,
            num_bits: num_bits.min(MAX_BITMAP_BITS),
            bits: [0; BITMAP_WORDS],
        }
    }

    /// Base sequence number.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of valid bitmap bits. Zero means nothing missing (pure ACK).
    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Mark `base + offset` as missing. Out-of-range offsets are ignored.
    pub fn set(&mut self, offset: u32) {
        if offset < self.num_bits {
            set_bit(&mut self.bits, offset);
        }
    }

    /// Whether `base + offset` is marked missing.
    #[must_use]
    pub fn is_set(&self, offset: u32) -> bool {
        offset < self.num_bits && test_bit(&self.bits, offset)
    }

    /// Cut the set short at `num_bits` bits, clearing the tail.
    pub fn truncate(&mut self, num_bits: u32) {
        if num_bits < self.num_bits {
            self.num_bits = num_bits;
            clear_from(&mut self.bits, num_bits);
        }
    }

    /// Words actually transmitted for this set.
    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count_for_bits(self.num_bits)
    }

    /// Bitmap word for encoding.
    #[must_use]
    pub fn bitmap_word(&self, idx: usize) -> u32 {
        self.bits[idx]
    }

    /// Serialized size on the wire: base (8) + numBits (4) + words.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 4 + self.word_count() * 4
    }
}

/// Fragment-level missing-set within one sample. The base is 0-based
/// internally; the wire format is 1-based (add one on encode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNumberSet {
    base: u32,
    num_bits: u32,
    bits: [u32; BITMAP_WORDS],
}

impl FragmentNumberSet {
    /// Set anchored at `base` covering `num_bits` bits, all clear.
    #[must_use]
    pub fn with_bits(base: u32, num_bits: u32) -> Self {
        Self {
            base,
            num_bits: num_bits.min(MAX_BITMAP_BITS),
            bits: [0; BITMAP_WORDS],
        }
    }

    /// Base fragment number (0-based).
    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of valid bitmap bits.
    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Mark `base + offset` as missing. Out-of-range offsets are ignored.
    pub fn set(&mut self, offset: u32) {
        if offset < self.num_bits {
            set_bit(&mut self.bits, offset);
        }
    }

    /// Whether `base + offset` is marked missing.
    #[must_use]
    pub fn is_set(&self, offset: u32) -> bool {
        offset < self.num_bits && test_bit(&self.bits, offset)
    }

    /// Words actually transmitted for this set.
    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count_for_bits(self.num_bits)
    }

    /// Bitmap word for encoding.
    #[must_use]
    pub fn bitmap_word(&self, idx: usize) -> u32 {
        self.bits[idx]
    }

    /// Serialized size on the wire: base (4) + numBits (4) + words.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        4 + 4 + self.word_count() * 4
    }
}
