// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ACKNACK / NACKFRAG / INFO_TS submessage encoders (RTPS v2.5 Sec.8.3.7).
//!
//! The count field of ACKNACK and NACKFRAG sits at a variable byte offset
//! immediately after the bitmap words; its position is always computed from
//! the actual bit count, never assumed fixed.

use crate::bitmap::{word_count_for_bits, FragmentNumberSet, SequenceNumberSet, MAX_BITMAP_BITS};
use crate::types::EntityId;

/// ACKNACK submessage id.
pub const SUBMSG_ACKNACK: u8 = 0x06;
/// INFO_TS submessage id.
pub const SUBMSG_INFO_TS: u8 = 0x09;
/// NACK_FRAG submessage id.
pub const SUBMSG_NACK_FRAG: u8 = 0x12;

/// Endianness flag: little-endian.
pub const FLAG_ENDIANNESS_LE: u8 = 0x01;
/// ACKNACK Final flag: no response required.
pub const FLAG_ACKNACK_FINAL: u8 = 0x02;

/// Total ACKNACK submessage size for a given bitmap bit count:
/// header(4) + entity ids(8) + base(8) + numBits(4) + words + count(4).
#[must_use]
pub fn acknack_size(num_bits: u32) -> usize {
    4 + 8 + 8 + 4 + word_count_for_bits(num_bits) * 4 + 4
}

/// Total NACKFRAG submessage size for a given bitmap bit count:
/// header(4) + entity ids(8) + writerSN(8) + base(4) + numBits(4) + words + count(4).
#[must_use]
pub fn nackfrag_size(num_bits: u32) -> usize {
    4 + 8 + 8 + 4 + 4 + word_count_for_bits(num_bits) * 4 + 4
}

/// Upper bound on an ACKNACK submessage.
pub const ACKNACK_SIZE_MAX: usize = 4 + 8 + 8 + 4 + (MAX_BITMAP_BITS as usize / 8) + 4;
/// Upper bound on a NACKFRAG submessage.
pub const NACKFRAG_SIZE_MAX: usize = 4 + 8 + 8 + 4 + 4 + (MAX_BITMAP_BITS as usize / 8) + 4;
/// INFO_TS submessage size (timestamp present).
pub const INFO_TS_SIZE: usize = 12;

/// Encode an ACKNACK submessage.
///
/// The Final flag signals that no response is required; this engine always
/// sets it — responses are solicited through separate mechanisms.
#[must_use]
pub fn encode_acknack(
    reader_id: EntityId,
    writer_id: EntityId,
    set: &SequenceNumberSet,
    count: u32,
) -> Vec<u8> {
    let submsg_len = acknack_size(set.num_bits()) - 4;
    let mut buf = Vec::with_capacity(4 + submsg_len);

    buf.push(SUBMSG_ACKNACK);
    buf.push(FLAG_ENDIANNESS_LE | FLAG_ACKNACK_FINAL);
    buf.extend_from_slice(&(submsg_len as u16).to_le_bytes());

    buf.extend_from_slice(&reader_id);
    buf.extend_from_slice(&writer_id);

    // SequenceNumber_t: high(i32) + low(u32)
    buf.extend_from_slice(&((set.base() >> 32) as i32).to_le_bytes());
    buf.extend_from_slice(&(set.base() as u32).to_le_bytes());

    buf.extend_from_slice(&set.num_bits().to_le_bytes());
    for w in 0..set.word_count() {
        buf.extend_from_slice(&set.bitmap_word(w).to_le_bytes());
    }

    // count lands right after the bitmap words
    buf.extend_from_slice(&count.to_le_bytes());

    debug_assert_eq!(buf.len(), 4 + submsg_len);
    buf
}

/// Encode a NACKFRAG submessage for one sample.
///
/// The internal fragment bitmap is 0-based; the wire base is 1-based.
#[must_use]
pub fn encode_nackfrag(
    reader_id: EntityId,
    writer_id: EntityId,
    writer_sn: u64,
    set: &FragmentNumberSet,
    count: u32,
) -> Vec<u8> {
    debug_assert!(set.num_bits() > 0 && set.num_bits() <= MAX_BITMAP_BITS);
    let submsg_len = nackfrag_size(set.num_bits()) - 4;
    let mut buf = Vec::with_capacity(4 + submsg_len);

    buf.push(SUBMSG_NACK_FRAG);
    buf.push(FLAG_ENDIANNESS_LE);
    buf.extend_from_slice(&(submsg_len as u16).to_le_bytes());

    buf.extend_from_slice(&reader_id);
    buf.extend_from_slice(&writer_id);

    buf.extend_from_slice(&((writer_sn >> 32) as i32).to_le_bytes());
    buf.extend_from_slice(&(writer_sn as u32).to_le_bytes());

    buf.extend_from_slice(&(set.base() + 1).to_le_bytes());
    buf.extend_from_slice(&set.num_bits().to_le_bytes());
    for w in 0..set.word_count() {
        buf.extend_from_slice(&set.bitmap_word(w).to_le_bytes());
    }

    buf.extend_from_slice(&count.to_le_bytes());

    debug_assert_eq!(buf.len(), 4 + submsg_len);
    buf
}

/// Encode an INFO_TS submessage from nanoseconds since the UNIX epoch
/// (RTPS Time_t: seconds + 2^-32 fraction).
#[must_use]
pub fn encode_info_ts(nanos_since_epoch: u64) -> Vec<u8> {
    let seconds = (nanos_since_epoch / 1_000_000_000).min(u64::from(u32::MAX)) as u32;
    let remainder = nanos_since_epoch % 1_000_000_000;
    let fraction = ((remainder << 32) / 1_000_000_000) as u32;

    let mut buf = Vec::with_capacity(INFO_TS_SIZE);
    buf.push(SUBMSG_INFO_TS);
    buf.push(FLAG_ENDIANNESS_LE);
    buf.extend_from_slice(&8u16.to_le_bytes());
    buf.extend_from_slice(&seconds.to_le_bytes());
    buf.extend_from_slice(&fraction.to_le_bytes());
    buf
}
