// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gap scanner: renders the sample-level missing bitmap for a pairing and
//! resolves its leading edge against the defragmenter.
//!
//! The sample bitmap comes from the reorder buffer (private or shared,
//! depending on sync/filter state). The scan then walks the bitmap left to
//! right and asks the defragmenter about the first missing sample it still
//! knows: a fully reassembled sample turns the remainder into an implicit
//! ACK boundary, a partially reassembled one additionally yields a
//! fragment-level NACK. Only that first qualifying sample is ever
//! fragment-scanned per invocation, which bounds the cost and matches the
//! order in which samples become deliverable.

use crate::bitmap::{FragmentNumberSet, SequenceNumberSet};
use crate::config::ReliabilityConfig;
use crate::proxy::{FragmentNackmap, ReaderWriterMatch, RemoteWriterProxy, ReorderBuffer};

/// Fragment-level NACK for one specific sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NackFrag {
    /// Sample whose fragments are missing.
    pub seq: u64,
    /// Missing-fragment bitmap (0-based; 1-based on the wire).
    pub set: FragmentNumberSet,
}

/// Result of one gap scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Truncated sample bitmap; may be empty.
    pub acknack: SequenceNumberSet,
    /// Fragment NACK for the sample right after the bitmap, if any.
    pub nackfrag: Option<NackFrag>,
}

impl ScanResult {
    /// False means the scan found nothing missing (pure ACK).
    #[must_use]
    pub fn anything_missing(&self) -> bool {
        self.acknack.num_bits() > 0 || self.nackfrag.is_some()
    }
}

/// Pick the bitmap source for a pairing: private reorder buffer while out of
/// sync or content-filtered, the writer's shared one otherwise. In late-ack
/// mode the shared base is the delivery-position estimate and `notail`
/// follows delivery-queue fullness, so samples merely queued for local
/// delivery are not nacked.
fn acknack_source<'a>(
    pwr: &'a RemoteWriterProxy,
    rwn: &'a ReaderWriterMatch,
    cfg: &ReliabilityConfig,
) -> (&'a dyn ReorderBuffer, u64, bool) {
    if rwn.is_out_of_sync() || rwn.filtered {
        if let Some(reorder) = rwn.private_reorder.as_deref() {
            return (reorder, reorder.next_seq(), false);
        }
        debug_assert!(false, "out-of-sync/filtered pairing without private reorder buffer");
    }
    let reorder = pwr.reorder.as_ref();
    if !cfg.late_ack_mode {
        (reorder, reorder.next_seq(), false)
    } else {
        (reorder, pwr.next_deliv_seq(), pwr.dqueue.is_full())
    }
}

/// Run a gap scan for `rwn` against `pwr`.
pub fn scan(
    pwr: &RemoteWriterProxy,
    rwn: &ReaderWriterMatch,
    cfg: &ReliabilityConfig,
) -> ScanResult {
    let (reorder, base, notail) = acknack_source(pwr, rwn, cfg);
    let last_seq = if rwn.filtered {
        rwn.filtered_last_seq
    } else {
        pwr.last_seq
    };

    let mut acknack = reorder.nackmap(base, last_seq, cfg.seqset_max_bits, notail);
    if acknack.num_bits() == 0 {
        return ScanResult {
            acknack,
            nackfrag: None,
        };
    }

    // Cut the bitmap off at the first missing sample the defragmenter still
    // knows about; attach a NACKFRAG when its fragments are missing.
    let bitmap_base = acknack.base();
    for i in 0..acknack.num_bits() {
        if !acknack.is_set(i) {
            continue;
        }
        let seq = bitmap_base + u64::from(i);
        let fragnum = (seq == pwr.last_seq).then_some(pwr.last_fragnum);
        match pwr.defrag.nackmap(seq, fragnum, cfg.fragset_max_bits) {
            FragmentNackmap::UnknownSample => {}
            FragmentNackmap::AllAdvertisedFragmentsKnown => {
                // Cut the NACK short (an ACK if this was the first sample),
                // no NACKFRAG.
                acknack.truncate(i);
                return ScanResult {
                    acknack,
                    nackfrag: None,
                };
            }
            FragmentNackmap::FragmentsMissing(set) => {
                debug_assert!(set.num_bits() > 0);
                acknack.truncate(i);
                return ScanResult {
                    acknack,
                    nackfrag: Some(NackFrag { seq, set }),
                };
            }
        }
    }

    ScanResult {
        acknack,
        nackfrag: None,
    }
}
