// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote-writer and reader-writer pairing state.
//!
//! `RemoteWriterProxy` is the local shadow of a remote writer (created on
//! discovery, destroyed on writer loss); `ReaderWriterMatch` holds the
//! per-(local reader, remote writer) acknowledgment history. Both live on
//! the single protocol thread; the only cross-thread state is the
//! [`DeliveryPosition`] low word.

use std::sync::Arc;

use crate::bitmap::{FragmentNumberSet, SequenceNumberSet};
use crate::delivery::DeliveryPosition;
use crate::types::{Guid, MonotonicTime};

// ============================================================================
// Collaborator interfaces
// ============================================================================

/// Sample-level reorder buffer (external collaborator).
pub trait ReorderBuffer {
    /// Next contiguous expected sequence number.
    fn next_seq(&self) -> u64;

    /// Render the missing-sample bitmap anchored at `base`, covering samples
    /// up to `last_seq`, capped at `max_bits` bits. The returned set's base
    /// equals `base`; `num_bits() == 0` means nothing missing. A true
    /// `notail` suppresses marking trailing unknown-status samples as
    /// missing (they may merely be queued for local delivery).
    fn nackmap(&self, base: u64, last_seq: u64, max_bits: u32, notail: bool) -> SequenceNumberSet;
}

/// Fragment-level state of one sample as known to the defragmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNackmap {
    /// Defragmenter holds no state for this sample; nothing finer to report.
    UnknownSample,
    /// Every advertised fragment is present; the sample is effectively
    /// complete locally even if not yet delivered.
    AllAdvertisedFragmentsKnown,
    /// Fragments genuinely missing; bitmap of the gaps (0-based).
    FragmentsMissing(FragmentNumberSet),
}

/// Sample defragmenter (external collaborator).
pub trait Defragmenter {
    /// Fragment gaps for `seq`. `last_fragnum` is the highest fragment
    /// number known for the writer's current in-progress sample, or `None`
    /// when the advertised fragment count must be used instead.
    fn nackmap(&self, seq: u64, last_fragnum: Option<u32>, max_bits: u32) -> FragmentNackmap;
}

/// Fullness probe of the delivery queue feeding the reader's delivery
/// thread (external collaborator).
pub trait DeliveryQueueProbe {
    fn is_full(&self) -> bool;
}

// ============================================================================
// NackSummary
// ============================================================================

/// Half-open range description of the last sent negative acknowledgment in
/// (sample, fragment) space: samples `[seq_base, seq_end_p1)` plus, when
/// `frag_end_p1 > 0`, fragments `[frag_base, frag_end_p1)` of the first
/// sample past the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NackSummary {
    pub seq_base: u64,
    pub seq_end_p1: u64,
    pub frag_base: u32,
    pub frag_end_p1: u32,
}

// ============================================================================
// RemoteWriterProxy
// ============================================================================

/// Local shadow of a remote writer.
pub struct RemoteWriterProxy {
    guid: Guid,
    /// Highest sequence number for which all data has been received.
    pub last_seq: u64,
    /// Highest fragment number received for the sample `last_seq`.
    pub last_fragnum: u32,
    /// Shared in-sync reorder buffer.
    pub reorder: Box<dyn ReorderBuffer>,
    /// Defragmenter for partially received samples.
    pub defrag: Box<dyn Defragmenter>,
    /// Delivery queue fullness, consulted in late-ack mode.
    pub dqueue: Box<dyn DeliveryQueueProbe>,
    /// Published low word of the delivery position (shared with the
    /// delivery thread).
    deliv: Arc<DeliveryPosition>,
    /// Monotonic NACKFRAG counter, bumped when a fragment NACK is sent.
    pub nackfrag_count: u32,
    /// Peer participant runs with security enabled; emission then looks up
    /// the local participant for the crypto context.
    pub secure_peer: bool,
}

impl RemoteWriterProxy {
    pub fn new(
        guid: Guid,
        reorder: Box<dyn ReorderBuffer>,
        defrag: Box<dyn Defragmenter>,
        dqueue: Box<dyn DeliveryQueueProbe>,
    ) -> Self {
        Self {
            guid,
            last_seq: 0,
            last_fragnum: 0,
            reorder,
            defrag,
            dqueue,
            deliv: Arc::new(DeliveryPosition::new()),
            nackfrag_count: 0,
            secure_peer: false,
        }
    }

    #[must_use]
    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    /// Handle for the delivery thread to publish its progress.
    #[must_use]
    pub fn delivery_position(&self) -> Arc<DeliveryPosition> {
        Arc::clone(&self.deliv)
    }

    /// Sequence number up to which samples have actually been delivered,
    /// reconstructed from the published low word (see [`DeliveryPosition`]).
    #[must_use]
    pub fn next_deliv_seq(&self) -> u64 {
        self.deliv.reconstruct(self.reorder.next_seq())
    }
}

// ============================================================================
// ReaderWriterMatch
// ============================================================================

/// Catch-up state of a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Tracking the writer's shared reorder buffer.
    InSync,
    /// Catching up on historical data through a private reorder buffer.
    OutOfSync,
}

/// State for one (local reader, remote writer) pairing.
pub struct ReaderWriterMatch {
    reader_guid: Guid,
    /// Catch-up state; transitions OutOfSync -> InSync externally once
    /// historical data has been recovered.
    pub sync: SyncState,
    /// Private reorder buffer, present while out of sync or content-filtered.
    pub private_reorder: Option<Box<dyn ReorderBuffer>>,
    /// Reader has a content filter; gaps are tracked privately.
    pub filtered: bool,
    /// Highest fully-received relevant sequence number, filtered pairings only.
    pub filtered_last_seq: u64,
    /// ACKNACK sequence counter, strictly increasing on the wire.
    pub count: u32,
    /// Writer solicited an acknowledgment (heartbeat without FINAL).
    pub ack_requested: bool,
    /// A heartbeat arrived since the last ACK we sent.
    pub heartbeat_since_ack: bool,
    /// A HEARTBEAT_FRAG arrived since the last ACK we sent.
    pub heartbeatfrag_since_ack: bool,
    /// The last heartbeat was addressed to this reader specifically.
    pub directed_heartbeat: bool,
    /// The previous NACK went out only because the nack-delay elapsed.
    pub nack_sent_on_nackdelay: bool,
    /// Time the last ACK was sent.
    pub t_last_ack: MonotonicTime,
    /// Time the last NACK was sent.
    pub t_last_nack: MonotonicTime,
    /// Source timestamp of the pending heartbeat (nanoseconds since epoch),
    /// echoed once in an INFO_TS when latency measurement is on.
    pub hb_timestamp: Option<u64>,
    /// Range of the last sent negative acknowledgment.
    pub last_nack: NackSummary,
}

impl ReaderWriterMatch {
    /// Pairing that is already in sync with the writer's shared buffer.
    pub fn new_in_sync(reader_guid: Guid, now: MonotonicTime) -> Self {
        Self {
            reader_guid,
            sync: SyncState::InSync,
            private_reorder: None,
            filtered: false,
            filtered_last_seq: 0,
            count: 0,
            ack_requested: false,
            heartbeat_since_ack: false,
            heartbeatfrag_since_ack: false,
            directed_heartbeat: false,
            nack_sent_on_nackdelay: false,
            t_last_ack: now,
            t_last_nack: now,
            hb_timestamp: None,
            last_nack: NackSummary::default(),
        }
    }

    /// Pairing still catching up on historical data through `reorder`.
    pub fn new_out_of_sync(
        reader_guid: Guid,
        reorder: Box<dyn ReorderBuffer>,
        now: MonotonicTime,
    ) -> Self {
        let mut rwn = Self::new_in_sync(reader_guid, now);
        rwn.sync = SyncState::OutOfSync;
        rwn.private_reorder = Some(reorder);
        rwn
    }

    /// Content-filtered pairing; gaps stay private for its lifetime.
    pub fn new_filtered(
        reader_guid: Guid,
        reorder: Box<dyn ReorderBuffer>,
        now: MonotonicTime,
    ) -> Self {
        let mut rwn = Self::new_in_sync(reader_guid, now);
        rwn.filtered = true;
        rwn.private_reorder = Some(reorder);
        rwn
    }

    #[must_use]
    pub fn reader_guid(&self) -> &Guid {
        &self.reader_guid
    }

    #[must_use]
    pub fn is_out_of_sync(&self) -> bool {
        self.sync == SyncState::OutOfSync
    }

    /// Historical catch-up finished: drop the private reorder buffer unless
    /// a content filter still needs it.
    pub fn complete_sync(&mut self) {
        self.sync = SyncState::InSync;
        if !self.filtered {
            self.private_reorder = None;
        }
    }

    /// Record a heartbeat observation (called by heartbeat processing,
    /// external to this engine; the flags are cleared on emission).
    pub fn note_heartbeat(&mut self, ack_requested: bool, directed: bool) {
        self.heartbeat_since_ack = true;
        if ack_requested {
            self.ack_requested = true;
        }
        if directed {
            self.directed_heartbeat = true;
        }
    }

    /// Record a HEARTBEAT_FRAG observation.
    pub fn note_heartbeat_frag(&mut self) {
        self.heartbeatfrag_since_ack = true;
    }

    /// Stash the heartbeat's source timestamp for latency measurement.
    /// At most one latency sample per heartbeat: cleared when attached.
    pub fn set_hb_timestamp(&mut self, nanos_since_epoch: u64) {
        self.hb_timestamp = Some(nanos_since_epoch);
    }
}
