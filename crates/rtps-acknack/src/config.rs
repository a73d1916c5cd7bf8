// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliability configuration consumed by the acknowledgment engine.
//!
//! Loaded externally (QoS/XML layer); this module only defines the shape,
//! the defaults, and the validation rules.

use std::fmt;
use std::time::Duration;

use crate::bitmap::MAX_BITMAP_BITS;

/// Default delay before answering a heartbeat with a pure ACK.
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(10);
/// Default rate limit between repeat NACKs for unchanged gaps.
pub const DEFAULT_NACK_DELAY: Duration = Duration::from_millis(100);
/// Default safety-net reschedule after sending a NACK, so a lost or ignored
/// NACK is eventually retried without waiting for another heartbeat.
pub const DEFAULT_AUTO_RESCHED_NACK_DELAY: Duration = Duration::from_secs(1);

/// Engine configuration knobs.
///
/// `seqset_max_bits` / `fragset_max_bits` bound the ACKNACK and NACKFRAG
/// bitmaps; both must be a non-zero multiple of 32 and at most
/// [`MAX_BITMAP_BITS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReliabilityConfig {
    /// Minimum interval between gratuitous pure ACKs.
    pub ack_delay: Duration,
    /// Minimum interval between NACKs repeating unchanged information.
    pub nack_delay: Duration,
    /// Timer re-arm after any NACK, in case the retransmit never comes.
    pub auto_resched_nack_delay: Duration,
    /// Acknowledge only what has been delivered locally, not merely received.
    pub late_ack_mode: bool,
    /// Attach an INFO_TS echoing the heartbeat source time, for round-trip
    /// latency measurement.
    pub meas_hb_to_ack_latency: bool,
    /// Maximum bits in a sample-level (ACKNACK) bitmap.
    pub seqset_max_bits: u32,
    /// Maximum bits in a fragment-level (NACKFRAG) bitmap.
    pub fragset_max_bits: u32,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            ack_delay: DEFAULT_ACK_DELAY,
            nack_delay: DEFAULT_NACK_DELAY,
            auto_resched_nack_delay: DEFAULT_AUTO_RESCHED_NACK_DELAY,
            late_ack_mode: false,
            meas_hb_to_ack_latency: false,
            seqset_max_bits: MAX_BITMAP_BITS,
            fragset_max_bits: MAX_BITMAP_BITS,
        }
    }
}

impl ReliabilityConfig {
    /// Validate bitmap bounds: non-zero multiples of 32, within the RTPS cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, bits) in [
            ("seqset_max_bits", self.seqset_max_bits),
            ("fragset_max_bits", self.fragset_max_bits),
        ] {
            if bits == 0 || bits % 32 != 0 {
                return Err(ConfigError::BitmapBitsNotMultipleOf32 { name, bits });
            }
            if bits > MAX_BITMAP_BITS {
                return Err(ConfigError::BitmapBitsTooLarge { name, bits });
            }
        }
        Ok(())
    }
}

/// Errors raised by [`ReliabilityConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Bitmap bound is zero or not a multiple of 32.
    BitmapBitsNotMultipleOf32 { name: &'static str, bits: u32 },
    /// Bitmap bound exceeds the RTPS maximum.
    BitmapBitsTooLarge { name: &'static str, bits: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitmapBitsNotMultipleOf32 { name, bits } => {
                write!(f, "{name} = {bits}: must be a non-zero multiple of 32")
            }
            Self::BitmapBitsTooLarge { name, bits } => {
                write!(f, "{name} = {bits}: exceeds maximum of {MAX_BITMAP_BITS}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
