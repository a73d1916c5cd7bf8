// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Acknowledgment decision state machine.
//!
//! Consumes a gap-scan result plus per-pairing history and two timing
//! predicates, and picks exactly one of five outcomes. The rule ordering
//! balances responsiveness (new loss reported immediately), protocol
//! correctness (directed heartbeats always answered), liveness under
//! repeated loss of the NACK itself (nack-delay retry), and bandwidth
//! (duplicate reports and gratuitous ACKs suppressed).

use crate::config::ReliabilityConfig;
use crate::proxy::{NackSummary, ReaderWriterMatch, RemoteWriterProxy};
use crate::scanner::{scan, NackFrag, ScanResult};

/// The five acknowledgment outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckNackAction {
    /// Nothing missing; send a pure ACK.
    Ack,
    /// Missing samples (and possibly fragments); send ACKNACK, and NACKFRAG
    /// when a fragment gap was found.
    Nack,
    /// Only a fragment gap, and the writer did not ask for an ACK: send just
    /// the NACKFRAG submessage.
    NackFragOnly,
    /// A pure ACK the writer did not solicit (or no progress and the
    /// ack-delay has not elapsed): send nothing.
    SuppressedAck,
    /// The NACK overlaps the previous one and the nack-delay has not
    /// elapsed: degrade to a pure ACK and let the ACK gate decide.
    SuppressedNack,
}

/// Why the state machine picked its outcome. Purely observational (logging
/// and diagnostics); never branched upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckNackReason {
    NothingMissing,
    NewInformation,
    DirectedHeartbeat,
    NackDelayElapsed,
    OverlapSuppressed,
}

/// Decision output: outcome, working bitmaps and the not-yet-committed
/// summary of the would-be NACK range.
#[derive(Debug)]
pub struct AckNackDecision {
    pub action: AckNackAction,
    pub reason: AckNackReason,
    /// Value to record in the pairing if a message goes out.
    pub nack_sent_on_nackdelay: bool,
    /// Working sample bitmap (cleared for a suppressed NACK).
    pub acknack: crate::bitmap::SequenceNumberSet,
    /// Working fragment NACK (cleared for a suppressed NACK).
    pub nackfrag: Option<NackFrag>,
    /// Working summary, committed to history only on a successful send.
    pub summary: NackSummary,
}

/// Run the gap scan and the decision rules for one pairing.
pub fn get_acknack_info(
    pwr: &RemoteWriterProxy,
    rwn: &ReaderWriterMatch,
    cfg: &ReliabilityConfig,
    ackdelay_passed: bool,
    nackdelay_passed: bool,
) -> AckNackDecision {
    let ScanResult {
        mut acknack,
        mut nackfrag,
    } = scan(pwr, rwn, cfg);

    let mut nack_sent_on_nackdelay = rwn.nack_sent_on_nackdelay;
    let summary;
    let mut action;
    let reason;

    if acknack.num_bits() == 0 && nackfrag.is_none() {
        summary = NackSummary {
            seq_base: acknack.base(),
            seq_end_p1: 0,
            frag_base: 0,
            frag_end_p1: 0,
        };
        action = AckNackAction::Ack;
        reason = AckNackReason::NothingMissing;
    } else {
        let seq_base = acknack.base();
        debug_assert!(seq_base >= 1);
        let seq_end_p1 = seq_base + u64::from(acknack.num_bits());
        let (frag_base, frag_end_p1) = match &nackfrag {
            Some(nf) => (nf.set.base(), nf.set.base() + nf.set.num_bits()),
            None => (0, 0),
        };
        summary = NackSummary {
            seq_base,
            seq_end_p1,
            frag_base,
            frag_end_p1,
        };

        if seq_base > rwn.last_nack.seq_end_p1
            || (seq_base == rwn.last_nack.seq_end_p1 && frag_base >= rwn.last_nack.frag_end_p1)
        {
            // Genuinely new information relative to the previous NACK.
            nack_sent_on_nackdelay = false;
            action = AckNackAction::Nack;
            reason = AckNackReason::NewInformation;
        } else if rwn.directed_heartbeat && (!rwn.nack_sent_on_nackdelay || nackdelay_passed) {
            // Directed heartbeats demand a response even without news.
            nack_sent_on_nackdelay = false;
            action = AckNackAction::Nack;
            reason = AckNackReason::DirectedHeartbeat;
        } else if nackdelay_passed {
            // Periodic re-assertion so a lost NACK is eventually retried.
            nack_sent_on_nackdelay = true;
            action = AckNackAction::Nack;
            reason = AckNackReason::NackDelayElapsed;
        } else {
            // Overlap with the previous NACK and no delay elapsed: clear the
            // working data and pretend nothing is missing.
            acknack.truncate(0);
            nackfrag = None;
            action = AckNackAction::SuppressedNack;
            reason = AckNackReason::OverlapSuppressed;
        }
    }

    if matches!(action, AckNackAction::Ack | AckNackAction::SuppressedNack) {
        // Both end up as a pure ACK; send only when the writer asked and
        // either there is progress or enough time has passed.
        if !(rwn.heartbeat_since_ack && rwn.ack_requested) {
            action = AckNackAction::SuppressedAck;
        } else if !(summary.seq_base > rwn.last_nack.seq_base || ackdelay_passed) {
            action = AckNackAction::SuppressedAck;
        }
    } else if acknack.num_bits() == 0 && nackfrag.is_some() && !rwn.ack_requested {
        // Pure fragment gap and the writer has not asked for an ACKNACK
        // since the last one: skip the sample-level submessage.
        action = AckNackAction::NackFragOnly;
    }

    AckNackDecision {
        action,
        reason,
        nack_sent_on_nackdelay,
        acknack,
        nackfrag,
        summary,
    }
}
