// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-thread delivery-position estimator.
//!
//! The reorder buffer's next expected sequence number (`next_seq`) is owned
//! by the receive thread; the sequence number actually handed to readers is
//! advanced by the delivery-queue draining thread. In late-ack mode the ACK
//! must track the latter. Instead of locking a shared 64-bit counter, the
//! delivery thread publishes only the low 32 bits through a single atomic
//! word and the receive thread reconstructs the full value against its own
//! `next_seq`.
//!
//! With `n = next_seq`, `nd = next_deliv_seq`, `H`/`L` the word halves:
//!
//! ```text
//! H(nd) <= H(n) <= H(nd)+1          { n >= nd, lag << 2^32 }
//! H(n) = H(nd)    =>  L(n) >= L(nd)
//! H(n) = H(nd)+1  =>  L(n) <  L(nd)
//! ```
//!
//! so `nd = (H(n) << 32 | L(nd)) - (2^32 if that exceeds n else 0)`.
//!
//! Precondition (not enforced): the true lag `next_seq - next_deliv_seq`
//! stays below 2^32 — bounded by outstanding buffered samples. The estimate
//! may be stale (under-reporting delivery progress), which only delays an
//! acknowledgment and never loses unacknowledged data.

use std::sync::atomic::{AtomicU32, Ordering};

/// Published low word of the next-to-deliver sequence number.
///
/// Shared between the delivery thread (writer) and the protocol thread
/// (reader); this is the only cross-thread mutable state in the engine.
#[derive(Debug)]
pub struct DeliveryPosition {
    low_word: AtomicU32,
}

impl DeliveryPosition {
    /// Start at sequence 1 (RTPS sequences are 1-based).
    #[must_use]
    pub fn new() -> Self {
        Self {
            low_word: AtomicU32::new(1),
        }
    }

    /// Publish the next sequence number to be delivered. Delivery thread only.
    pub fn publish(&self, next_deliv_seq: u64) {
        self.low_word
            .store(next_deliv_seq as u32, Ordering::Relaxed);
    }

    /// Reconstruct the 64-bit delivery position from the published low word
    /// and the receive thread's `next_seq`.
    #[must_use]
    pub fn reconstruct(&self, next_seq: u64) -> u64 {
        let lw = u64::from(self.low_word.load(Ordering::Relaxed));
        let mut next_deliv_seq = (next_seq & !u64::from(u32::MAX)) | lw;
        if next_deliv_seq > next_seq {
            // low word wrapped relative to next_seq's high half
            next_deliv_seq -= 1u64 << 32;
        }
        debug_assert!(next_deliv_seq > 0 && next_deliv_seq <= next_seq);
        next_deliv_seq
    }
}

impl Default for DeliveryPosition {
    fn default() -> Self {
        Self::new()
    }
}
