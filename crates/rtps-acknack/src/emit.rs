// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Acknowledgment emission and event rescheduling.
//!
//! [`AckNackEngine`] turns a decision into an outgoing control message:
//! allocate a message from the pool, optionally prepend an INFO_TS echoing
//! the heartbeat source time, append ACKNACK and NACKFRAG submessages
//! (through the security plugin when the peer participant is secured),
//! commit the acknowledgment history, and re-arm the timer. Commitment is
//! ordered so that a failed allocation or a fully encrypted-away message
//! degrades to "wait for the next heartbeat" rather than to a livelock.

use std::sync::Arc;

use log::{debug, trace};

use crate::config::ReliabilityConfig;
use crate::decision::{get_acknack_info, AckNackAction};
use crate::messages::{
    encode_acknack, encode_info_ts, encode_nackfrag, ACKNACK_SIZE_MAX, INFO_TS_SIZE,
    NACKFRAG_SIZE_MAX,
};
use crate::proxy::{ReaderWriterMatch, RemoteWriterProxy};
use crate::sched::{EventId, EventScheduler};
use crate::types::{Guid, MonotonicTime, ParticipantKey};

/// Worst-case control message: INFO_TS + maximal ACKNACK + maximal NACKFRAG.
pub const CONTROL_MESSAGE_SIZE_MAX: usize = INFO_TS_SIZE + ACKNACK_SIZE_MAX + NACKFRAG_SIZE_MAX;

// ============================================================================
// Outgoing message and collaborator interfaces
// ============================================================================

/// An outgoing control message addressed to one remote writer, built up from
/// encoded submessages.
#[derive(Debug)]
pub struct ControlMessage {
    dst_reader: Guid,
    buf: Vec<u8>,
}

impl ControlMessage {
    #[must_use]
    pub fn new(dst_reader: Guid, capacity: usize) -> Self {
        Self {
            dst_reader,
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Local reader on whose behalf the message is sent (routing key).
    #[must_use]
    pub fn dst_reader(&self) -> &Guid {
        &self.dst_reader
    }

    pub fn append_submsg(&mut self, submsg: &[u8]) {
        self.buf.extend_from_slice(submsg);
    }

    /// Bytes accumulated so far.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Serialized submessage payload, ready for the transport path.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf
    }
}

/// Control message allocator. `None` models transient pool exhaustion; the
/// caller drops the attempt and relies on the next heartbeat.
pub trait MessagePool: Send + Sync {
    fn new_control_message(
        &self,
        dst_reader: &Guid,
        participant: Option<ParticipantKey>,
        max_size: usize,
    ) -> Option<ControlMessage>;
}

/// Unbounded heap allocator, the default pool.
#[derive(Debug, Default)]
pub struct HeapMessagePool;

impl MessagePool for HeapMessagePool {
    fn new_control_message(
        &self,
        dst_reader: &Guid,
        _participant: Option<ParticipantKey>,
        max_size: usize,
    ) -> Option<ControlMessage> {
        Some(ControlMessage::new(*dst_reader, max_size))
    }
}

/// Submessage protection seam. An empty return value means the submessage
/// could not be protected and is dropped from the outgoing message.
pub trait SecurityPlugin: Send + Sync {
    fn encode_datareader_submsg(
        &self,
        submsg: Vec<u8>,
        reader: &Guid,
        participant: Option<ParticipantKey>,
    ) -> Vec<u8>;
}

/// Pass-through plugin for unsecured peers.
#[derive(Debug, Default)]
pub struct NullSecurity;

impl SecurityPlugin for NullSecurity {
    fn encode_datareader_submsg(
        &self,
        submsg: Vec<u8>,
        _reader: &Guid,
        _participant: Option<ParticipantKey>,
    ) -> Vec<u8> {
        submsg
    }
}

/// Lookup of the local participant owning a reader, needed for the crypto
/// context when the peer runs with security enabled.
pub trait EntityIndex: Send + Sync {
    fn reader_participant(&self, reader: &Guid) -> Option<ParticipantKey>;
}

/// Index that knows no participants, the default for unsecured deployments.
#[derive(Debug, Default)]
pub struct EmptyEntityIndex;

impl EntityIndex for EmptyEntityIndex {
    fn reader_participant(&self, _reader: &Guid) -> Option<ParticipantKey> {
        None
    }
}

// ============================================================================
// AckNackEngine
// ============================================================================

/// Reader-side acknowledgment engine for one domain participant.
pub struct AckNackEngine {
    config: ReliabilityConfig,
    scheduler: Arc<dyn EventScheduler>,
    pool: Arc<dyn MessagePool>,
    security: Arc<dyn SecurityPlugin>,
    entities: Arc<dyn EntityIndex>,
}

impl AckNackEngine {
    pub fn new(config: ReliabilityConfig, scheduler: Arc<dyn EventScheduler>) -> Self {
        Self {
            config,
            scheduler,
            pool: Arc::new(HeapMessagePool),
            security: Arc::new(NullSecurity),
            entities: Arc::new(EmptyEntityIndex),
        }
    }

    #[must_use]
    pub fn with_pool(mut self, pool: Arc<dyn MessagePool>) -> Self {
        self.pool = pool;
        self
    }

    #[must_use]
    pub fn with_security(mut self, security: Arc<dyn SecurityPlugin>) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn with_entity_index(mut self, entities: Arc<dyn EntityIndex>) -> Self {
        self.entities = entities;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    fn delays_passed(&self, rwn: &ReaderWriterMatch, now: MonotonicTime) -> (bool, bool) {
        let ackdelay_passed = now >= rwn.t_last_ack + self.config.ack_delay;
        let nackdelay_passed = now >= rwn.t_last_nack + self.config.nack_delay;
        (ackdelay_passed, nackdelay_passed)
    }

    /// Arm the acknowledgment event if the pairing would respond right now.
    ///
    /// This runs a full decision rather than a cheap approximation so that a
    /// heartbeat which would only produce a suppressed outcome does not wake
    /// the timer at all. A suppressed NACK still arms the event at the
    /// nack-delay boundary when `avoid_suppressed_nack` is set, so the
    /// retransmit request is not lost.
    pub fn sched_acknack_if_needed(
        &self,
        ev: EventId,
        pwr: &RemoteWriterProxy,
        rwn: &ReaderWriterMatch,
        now: MonotonicTime,
        avoid_suppressed_nack: bool,
    ) {
        let (ackdelay_passed, nackdelay_passed) = self.delays_passed(rwn, now);
        let decision = get_acknack_info(pwr, rwn, &self.config, ackdelay_passed, nackdelay_passed);
        match decision.action {
            AckNackAction::SuppressedAck => {}
            AckNackAction::SuppressedNack if avoid_suppressed_nack => {
                self.scheduler
                    .resched_if_earlier(ev, rwn.t_last_nack + self.config.nack_delay);
            }
            _ => {
                self.scheduler.resched_if_earlier(ev, now);
            }
        }
    }

    /// Build the control message for one pairing's acknowledgment event and
    /// re-arm the event as the outcome requires. Returns `None` when nothing
    /// must be sent (suppressed outcome, pool exhaustion, or everything
    /// dropped by submessage protection).
    pub fn make_and_resched_acknack(
        &self,
        ev: EventId,
        pwr: &mut RemoteWriterProxy,
        rwn: &mut ReaderWriterMatch,
        now: MonotonicTime,
        avoid_suppressed_nack: bool,
    ) -> Option<ControlMessage> {
        let (ackdelay_passed, nackdelay_passed) = self.delays_passed(rwn, now);
        let decision = get_acknack_info(pwr, rwn, &self.config, ackdelay_passed, nackdelay_passed);

        match decision.action {
            AckNackAction::SuppressedAck => {
                trace!("acknack {} -> {}: suppressed ack", rwn.reader_guid(), pwr.guid());
                return None;
            }
            AckNackAction::SuppressedNack if avoid_suppressed_nack => {
                // Keep the heartbeat flags so the nack-delay expiry can still
                // answer; just make sure the timer fires then.
                trace!(
                    "acknack {} -> {}: suppressed nack, retry after nack delay",
                    rwn.reader_guid(),
                    pwr.guid()
                );
                self.scheduler
                    .resched_if_earlier(ev, rwn.t_last_nack + self.config.nack_delay);
                return None;
            }
            _ => {}
        }

        // Past this point a response has been decided on. Resetting the
        // solicitation flags before attempting allocation means a failure
        // below leaves the pairing waiting for the next heartbeat instead of
        // retrying in a tight loop.
        rwn.directed_heartbeat = false;
        rwn.heartbeat_since_ack = false;
        rwn.heartbeatfrag_since_ack = false;
        rwn.nack_sent_on_nackdelay = decision.nack_sent_on_nackdelay;

        let participant = if pwr.secure_peer {
            self.entities.reader_participant(rwn.reader_guid())
        } else {
            None
        };

        let mut msg = match self.pool.new_control_message(
            rwn.reader_guid(),
            participant,
            CONTROL_MESSAGE_SIZE_MAX,
        ) {
            Some(msg) => msg,
            None => {
                debug!(
                    "acknack {} -> {}: out of control messages",
                    rwn.reader_guid(),
                    pwr.guid()
                );
                return None;
            }
        };

        if self.config.meas_hb_to_ack_latency {
            if let Some(ts) = rwn.hb_timestamp.take() {
                msg.append_submsg(&encode_info_ts(ts));
            }
        }
        let payload_mark = msg.size();

        if decision.action != AckNackAction::NackFragOnly {
            trace!(
                "acknack {} -> {}: #{}: base {}/{} bits",
                rwn.reader_guid(),
                pwr.guid(),
                rwn.count,
                decision.acknack.base(),
                decision.acknack.num_bits()
            );
            let submsg = encode_acknack(
                rwn.reader_guid().entity_id(),
                pwr.guid().entity_id(),
                &decision.acknack,
                rwn.count,
            );
            let submsg = self
                .security
                .encode_datareader_submsg(submsg, rwn.reader_guid(), participant);
            if !submsg.is_empty() {
                msg.append_submsg(&submsg);
            }
        }

        if let Some(nf) = &decision.nackfrag {
            trace!(
                "nackfrag {} -> {}: #{}: seq {} frag {}/{} bits",
                rwn.reader_guid(),
                pwr.guid(),
                pwr.nackfrag_count,
                nf.seq,
                nf.set.base() + 1,
                nf.set.num_bits()
            );
            let submsg = encode_nackfrag(
                rwn.reader_guid().entity_id(),
                pwr.guid().entity_id(),
                nf.seq,
                &nf.set,
                pwr.nackfrag_count,
            );
            let submsg = self
                .security
                .encode_datareader_submsg(submsg, rwn.reader_guid(), participant);
            if !submsg.is_empty() {
                msg.append_submsg(&submsg);
            }
        }

        if msg.size() == payload_mark {
            // Every submessage was dropped by protection; the counts were
            // never consumed on the wire, so nothing is committed.
            debug!(
                "acknack {} -> {}: dropped by submessage protection",
                rwn.reader_guid(),
                pwr.guid()
            );
            return None;
        }

        rwn.count += 1;
        match decision.action {
            AckNackAction::SuppressedAck => {
                debug_assert!(false, "suppressed ack cannot reach the send path");
            }
            AckNackAction::Ack => {
                rwn.ack_requested = false;
                rwn.t_last_ack = now;
                rwn.last_nack.seq_base = decision.summary.seq_base;
            }
            AckNackAction::Nack | AckNackAction::NackFragOnly => {
                if decision.summary.frag_end_p1 != 0 {
                    pwr.nackfrag_count += 1;
                }
                if decision.action != AckNackAction::NackFragOnly {
                    rwn.ack_requested = false;
                    rwn.t_last_ack = now;
                }
                rwn.last_nack = decision.summary;
                rwn.t_last_nack = now;
                // The NACK itself may get lost or be ignored; re-arm so the
                // request is repeated even without another heartbeat.
                self.scheduler
                    .resched_if_earlier(ev, now + self.config.auto_resched_nack_delay);
            }
            AckNackAction::SuppressedNack => {
                // Degraded to a pure ACK on the wire; remember when to retry
                // the real NACK.
                rwn.ack_requested = false;
                rwn.t_last_ack = now;
                rwn.last_nack.seq_base = decision.summary.seq_base;
                self.scheduler
                    .resched_if_earlier(ev, rwn.t_last_nack + self.config.nack_delay);
            }
        }

        trace!(
            "send acknack {} -> {} ({} bytes)",
            rwn.reader_guid(),
            pwr.guid(),
            msg.size()
        );
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::bitmap::FragmentNumberSet;
    use crate::messages::{SUBMSG_ACKNACK, SUBMSG_INFO_TS, SUBMSG_NACK_FRAG};
    use crate::proxy::{FragmentNackmap, NackSummary};
    use crate::sched::TimerQueue;
    use crate::testutil::{NeverFull, ScriptedDefrag, ScriptedReorder};

    struct RecordingScheduler {
        calls: Mutex<Vec<(EventId, MonotonicTime)>>,
    }

    impl RecordingScheduler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(EventId, MonotonicTime)> {
            self.calls.lock().clone()
        }
    }

    impl EventScheduler for RecordingScheduler {
        fn resched_if_earlier(&self, ev: EventId, t: MonotonicTime) -> bool {
            self.calls.lock().push((ev, t));
            true
        }
    }

    struct ExhaustedPool;

    impl MessagePool for ExhaustedPool {
        fn new_control_message(
            &self,
            _dst_reader: &Guid,
            _participant: Option<ParticipantKey>,
            _max_size: usize,
        ) -> Option<ControlMessage> {
            None
        }
    }

    struct DropAllSecurity;

    impl SecurityPlugin for DropAllSecurity {
        fn encode_datareader_submsg(
            &self,
            _submsg: Vec<u8>,
            _reader: &Guid,
            _participant: Option<ParticipantKey>,
        ) -> Vec<u8> {
            Vec::new()
        }
    }

    fn guid(seed: u8) -> Guid {
        Guid::from_bytes([seed; 16])
    }

    fn proxy_missing(next: u64, missing: Vec<u64>, last_seq: u64) -> RemoteWriterProxy {
        let mut pwr = RemoteWriterProxy::new(
            guid(0xA0),
            Box::new(ScriptedReorder::with_missing(next, missing)),
            Box::new(ScriptedDefrag::default()),
            Box::new(NeverFull),
        );
        pwr.last_seq = last_seq;
        pwr
    }

    fn proxy_frag_gap(next: u64, last_seq: u64) -> RemoteWriterProxy {
        let mut set = FragmentNumberSet::with_bits(2, 4);
        set.set(1);
        set.set(3);
        let mut pwr = RemoteWriterProxy::new(
            guid(0xA0),
            Box::new(ScriptedReorder::with_missing(next, vec![next])),
            Box::new(ScriptedDefrag::default().reply(next, FragmentNackmap::FragmentsMissing(set))),
            Box::new(NeverFull),
        );
        pwr.last_seq = last_seq;
        pwr
    }

    fn rwn_wanting_ack() -> ReaderWriterMatch {
        let mut rwn = ReaderWriterMatch::new_in_sync(guid(0xB0), MonotonicTime::ZERO);
        rwn.heartbeat_since_ack = true;
        rwn.ack_requested = true;
        rwn
    }

    fn engine_with(scheduler: Arc<dyn EventScheduler>) -> AckNackEngine {
        AckNackEngine::new(ReliabilityConfig::default(), scheduler)
    }

    fn far() -> MonotonicTime {
        // well past any configured delay
        MonotonicTime::ZERO + Duration::from_secs(10)
    }

    #[test]
    fn test_suppressed_ack_sends_nothing_and_changes_nothing() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(13, vec![], 12);
        // no heartbeat since the last ACK: nothing to answer
        let mut rwn = ReaderWriterMatch::new_in_sync(guid(0xB0), MonotonicTime::ZERO);

        let msg = engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false);
        assert!(msg.is_none());
        assert_eq!(rwn.count, 0);
        assert!(sched.calls().is_empty());
    }

    #[test]
    fn test_avoid_suppressed_nack_rescheds_without_commit() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10, 11], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.last_nack = NackSummary {
            seq_base: 9,
            seq_end_p1: 14,
            frag_base: 0,
            frag_end_p1: 0,
        };
        // within nack delay of the previous NACK
        rwn.t_last_nack = far();
        let now = far() + Duration::from_millis(1);

        let msg = engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, true);
        assert!(msg.is_none());
        // flags untouched: the nack-delay expiry must still see them
        assert!(rwn.heartbeat_since_ack);
        assert!(rwn.ack_requested);
        assert_eq!(rwn.count, 0);
        assert_eq!(
            sched.calls(),
            vec![(ev, rwn.t_last_nack + engine.config().nack_delay)]
        );
    }

    #[test]
    fn test_nack_commits_history_and_auto_rescheds() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10, 11, 12], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.directed_heartbeat = true;
        let now = far();

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, false)
            .unwrap();
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);

        assert_eq!(rwn.count, 1);
        assert!(!rwn.ack_requested);
        assert!(!rwn.heartbeat_since_ack);
        assert!(!rwn.directed_heartbeat);
        assert_eq!(rwn.t_last_ack, now);
        assert_eq!(rwn.t_last_nack, now);
        assert_eq!(
            rwn.last_nack,
            NackSummary {
                seq_base: 10,
                seq_end_p1: 13,
                frag_base: 0,
                frag_end_p1: 0
            }
        );
        // no fragment NACK went out
        assert_eq!(pwr.nackfrag_count, 0);
        assert_eq!(
            sched.calls(),
            vec![(ev, now + engine.config().auto_resched_nack_delay)]
        );
    }

    #[test]
    fn test_nackfrag_only_message_and_commit() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_frag_gap(10, 12);
        let mut rwn = ReaderWriterMatch::new_in_sync(guid(0xB0), MonotonicTime::ZERO);
        rwn.heartbeat_since_ack = true;
        rwn.ack_requested = false;
        let t_last_ack_before = rwn.t_last_ack;
        let now = far();

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, false)
            .unwrap();
        // no ACKNACK submessage, just the fragment NACK
        assert_eq!(msg.payload()[0], SUBMSG_NACK_FRAG);

        assert_eq!(rwn.count, 1);
        assert_eq!(pwr.nackfrag_count, 1);
        // the ACK side of the history is untouched
        assert_eq!(rwn.t_last_ack, t_last_ack_before);
        assert_eq!(rwn.t_last_nack, now);
        assert_eq!(rwn.last_nack.seq_base, 10);
        assert_eq!(rwn.last_nack.frag_base, 2);
        assert_eq!(rwn.last_nack.frag_end_p1, 6);
        assert_eq!(
            sched.calls(),
            vec![(ev, now + engine.config().auto_resched_nack_delay)]
        );
    }

    #[test]
    fn test_nack_with_fragment_gap_bumps_nackfrag_count() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_frag_gap(10, 12);
        let mut rwn = rwn_wanting_ack();
        let now = far();

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, false)
            .unwrap();
        // ACKNACK first, then the NACKFRAG
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);
        assert_eq!(rwn.count, 1);
        assert_eq!(pwr.nackfrag_count, 1);
    }

    #[test]
    fn test_pure_ack_commits_only_base() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(13, vec![], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.last_nack = NackSummary {
            seq_base: 9,
            seq_end_p1: 12,
            frag_base: 0,
            frag_end_p1: 0,
        };
        let now = far();

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, false)
            .unwrap();
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);
        assert_eq!(rwn.count, 1);
        assert!(!rwn.ack_requested);
        assert_eq!(rwn.t_last_ack, now);
        // only the base advances; the rest of the summary is kept
        assert_eq!(
            rwn.last_nack,
            NackSummary {
                seq_base: 13,
                seq_end_p1: 12,
                frag_base: 0,
                frag_end_p1: 0
            }
        );
        // an ACK never re-arms the timer
        assert!(sched.calls().is_empty());
    }

    #[test]
    fn test_suppressed_nack_without_avoid_sends_pure_ack() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10, 11], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.last_nack = NackSummary {
            seq_base: 9,
            seq_end_p1: 14,
            frag_base: 0,
            frag_end_p1: 0,
        };
        // nack delay has not elapsed, ack delay has
        rwn.t_last_nack = far();
        let now = far() + Duration::from_millis(20);

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, false)
            .unwrap();
        // degraded to a pure ACK: numBits is 0 at offset 20
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);
        assert_eq!(&msg.payload()[20..24], &[0, 0, 0, 0]);

        assert_eq!(rwn.count, 1);
        assert_eq!(rwn.last_nack.seq_base, 10);
        // end of the previous NACK range survives for the overlap test
        assert_eq!(rwn.last_nack.seq_end_p1, 14);
        assert_eq!(
            sched.calls(),
            vec![(ev, rwn.t_last_nack + engine.config().nack_delay)]
        );
    }

    #[test]
    fn test_pool_exhaustion_drops_message_after_flag_reset() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone()).with_pool(Arc::new(ExhaustedPool));
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10], 12);
        let mut rwn = rwn_wanting_ack();

        let msg = engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false);
        assert!(msg.is_none());
        // the response was committed to, so the flags are gone and the next
        // heartbeat has to re-trigger
        assert!(!rwn.heartbeat_since_ack);
        assert!(!rwn.ack_requested);
        assert_eq!(rwn.count, 0);
        assert!(sched.calls().is_empty());
    }

    #[test]
    fn test_security_dropping_everything_yields_none() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone()).with_security(Arc::new(DropAllSecurity));
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10], 12);
        let mut rwn = rwn_wanting_ack();

        let msg = engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false);
        assert!(msg.is_none());
        // nothing hit the wire: the count must not advance
        assert_eq!(rwn.count, 0);
        assert!(sched.calls().is_empty());
    }

    #[test]
    fn test_hb_timestamp_echoed_once() {
        let sched = RecordingScheduler::new();
        let config = ReliabilityConfig {
            meas_hb_to_ack_latency: true,
            ..ReliabilityConfig::default()
        };
        let engine = AckNackEngine::new(config, sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.set_hb_timestamp(123_456_789);

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false)
            .unwrap();
        assert_eq!(msg.payload()[0], SUBMSG_INFO_TS);
        assert_eq!(msg.payload()[INFO_TS_SIZE], SUBMSG_ACKNACK);
        assert!(rwn.hb_timestamp.is_none());

        // next response without a fresh heartbeat timestamp: no INFO_TS
        rwn.note_heartbeat(true, true);
        let msg = engine
            .make_and_resched_acknack(
                ev,
                &mut pwr,
                &mut rwn,
                far() + Duration::from_secs(2),
                false,
            )
            .unwrap();
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);
    }

    #[test]
    fn test_hb_timestamp_kept_when_measurement_off() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched);
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.set_hb_timestamp(123_456_789);

        let msg = engine
            .make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false)
            .unwrap();
        assert_eq!(msg.payload()[0], SUBMSG_ACKNACK);
        assert_eq!(rwn.hb_timestamp, Some(123_456_789));
    }

    #[test]
    fn test_secure_peer_looks_up_participant() {
        struct OneReaderIndex {
            reader: Guid,
        }
        impl EntityIndex for OneReaderIndex {
            fn reader_participant(&self, reader: &Guid) -> Option<ParticipantKey> {
                (*reader == self.reader).then(|| ParticipantKey::new(7))
            }
        }
        struct ParticipantAsserting;
        impl SecurityPlugin for ParticipantAsserting {
            fn encode_datareader_submsg(
                &self,
                submsg: Vec<u8>,
                _reader: &Guid,
                participant: Option<ParticipantKey>,
            ) -> Vec<u8> {
                assert_eq!(participant, Some(ParticipantKey::new(7)));
                submsg
            }
        }

        let sched = RecordingScheduler::new();
        let engine = engine_with(sched)
            .with_entity_index(Arc::new(OneReaderIndex { reader: guid(0xB0) }))
            .with_security(Arc::new(ParticipantAsserting));
        let queue = TimerQueue::new();
        let ev = queue.register();

        let mut pwr = proxy_missing(10, vec![10], 12);
        pwr.secure_peer = true;
        let mut rwn = rwn_wanting_ack();

        let msg = engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, far(), false);
        assert!(msg.is_some());
    }

    #[test]
    fn test_sched_if_needed_arms_immediately_for_response() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let pwr = proxy_missing(10, vec![10], 12);
        let rwn = rwn_wanting_ack();
        let now = far();

        engine.sched_acknack_if_needed(ev, &pwr, &rwn, now, false);
        assert_eq!(sched.calls(), vec![(ev, now)]);
    }

    #[test]
    fn test_sched_if_needed_skips_suppressed_ack() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let pwr = proxy_missing(13, vec![], 12);
        let rwn = ReaderWriterMatch::new_in_sync(guid(0xB0), MonotonicTime::ZERO);

        engine.sched_acknack_if_needed(ev, &pwr, &rwn, far(), false);
        assert!(sched.calls().is_empty());
    }

    #[test]
    fn test_sched_if_needed_defers_suppressed_nack() {
        let sched = RecordingScheduler::new();
        let engine = engine_with(sched.clone());
        let queue = TimerQueue::new();
        let ev = queue.register();

        let pwr = proxy_missing(10, vec![10, 11], 12);
        let mut rwn = rwn_wanting_ack();
        rwn.last_nack = NackSummary {
            seq_base: 9,
            seq_end_p1: 14,
            frag_base: 0,
            frag_end_p1: 0,
        };
        rwn.t_last_nack = far();
        let now = far() + Duration::from_millis(1);

        engine.sched_acknack_if_needed(ev, &pwr, &rwn, now, true);
        assert_eq!(
            sched.calls(),
            vec![(ev, rwn.t_last_nack + engine.config().nack_delay)]
        );
    }
}
