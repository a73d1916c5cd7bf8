// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rtps-acknack - Reader-side RTPS acknowledgment engine
//!
//! Decides when a reliable RTPS reader answers a writer's heartbeat, what
//! the answer contains (pure ACK, ACKNACK with a missing-sample bitmap,
//! NACKFRAG for partially received samples), and when an answer is
//! deliberately withheld to save bandwidth.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rtps_acknack::{AckNackEngine, ReliabilityConfig, TimerQueue};
//!
//! let timers = Arc::new(TimerQueue::new());
//! let engine = AckNackEngine::new(ReliabilityConfig::default(), timers.clone());
//! let ev = timers.register();
//! // on heartbeat: engine.sched_acknack_if_needed(ev, &pwr, &rwn, now, false);
//! // on timer expiry: engine.make_and_resched_acknack(ev, &mut pwr, &mut rwn, now, true);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! HEARTBEAT / HEARTBEAT_FRAG            timer expiry
//!        |                                   |
//!        v                                   v
//!  sched_acknack_if_needed        make_and_resched_acknack
//!        |                                   |
//!        +----------> get_acknack_info <-----+
//!                          |
//!            scan (reorder buffer + defragmenter)
//!                          |
//!            decision (5 outcomes, dedup, delays)
//!                          |
//!            emit (INFO_TS? + ACKNACK + NACKFRAG?)
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AckNackEngine`] | Builds control messages and re-arms acknowledgment events |
//! | [`RemoteWriterProxy`] | Local shadow of a remote writer |
//! | [`ReaderWriterMatch`] | Per-pairing acknowledgment history and heartbeat flags |
//! | [`ReliabilityConfig`] | Delays, bitmap bounds, late-ack and latency knobs |
//! | [`TimerQueue`] | Deadline-keyed scheduler, or bring your own via [`EventScheduler`] |
//!
//! ## See Also
//!
//! - [RTPS Specification](https://www.omg.org/spec/DDSI-RTPS/2.5/)

/// Sequence- and fragment-number bitmaps (RTPS bounded bitsets).
pub mod bitmap;
/// Reliability configuration and validation.
pub mod config;
/// The five-outcome acknowledgment decision state machine.
pub mod decision;
/// Cross-thread delivery-position estimator.
pub mod delivery;
/// Control-message emission and event rescheduling.
pub mod emit;
/// ACKNACK / NACKFRAG / INFO_TS submessage encoders.
pub mod messages;
/// Remote-writer and reader-writer pairing state, collaborator traits.
pub mod proxy;
/// Gap scanner over the reorder buffer and defragmenter.
pub mod scanner;
/// Acknowledgment event scheduling.
pub mod sched;
/// Identifier and time primitives.
pub mod types;

#[cfg(test)]
mod testutil;

pub use bitmap::{FragmentNumberSet, SequenceNumberSet, MAX_BITMAP_BITS};
pub use config::{ConfigError, ReliabilityConfig};
pub use decision::{get_acknack_info, AckNackAction, AckNackDecision, AckNackReason};
pub use delivery::DeliveryPosition;
pub use emit::{
    AckNackEngine, ControlMessage, EmptyEntityIndex, EntityIndex, HeapMessagePool, MessagePool,
    NullSecurity, SecurityPlugin, CONTROL_MESSAGE_SIZE_MAX,
};
pub use proxy::{
    Defragmenter, DeliveryQueueProbe, FragmentNackmap, NackSummary, ReaderWriterMatch,
    RemoteWriterProxy, ReorderBuffer, SyncState,
};
pub use scanner::{scan, NackFrag, ScanResult};
pub use sched::{EventId, EventScheduler, TimerQueue};
pub use types::{EntityId, Guid, GuidPrefix, MonotonicTime, ParticipantKey};
