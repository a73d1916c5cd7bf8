// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative event scheduling for acknowledgment retries.
//!
//! The engine only ever moves an event's deadline *earlier* — rescheduling
//! is idempotent, may be called redundantly, and never blocks. `TimerQueue`
//! is a small concrete implementation; embedders with their own event loop
//! implement [`EventScheduler`] instead.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::MonotonicTime;

/// Handle to a scheduled acknowledgment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// "Reschedule if earlier" seam consumed by the engine.
pub trait EventScheduler: Send + Sync {
    /// Move `ev`'s deadline to `t` if that is earlier than the current one
    /// (or if the event is currently disarmed). Returns whether the deadline
    /// changed. Must not block.
    fn resched_if_earlier(&self, ev: EventId, t: MonotonicTime) -> bool;
}

/// Deadline-keyed timer queue shared between the protocol thread and the
/// thread driving timer expiry.
#[derive(Debug, Default)]
pub struct TimerQueue {
    inner: Mutex<TimerQueueInner>,
}

#[derive(Debug, Default)]
struct TimerQueueInner {
    next_id: u64,
    // None = registered but disarmed
    deadlines: HashMap<EventId, Option<MonotonicTime>>,
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, initially disarmed event.
    pub fn register(&self) -> EventId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let ev = EventId(inner.next_id);
        inner.deadlines.insert(ev, None);
        ev
    }

    /// Forget an event entirely (pairing destroyed).
    pub fn deregister(&self, ev: EventId) {
        self.inner.lock().deadlines.remove(&ev);
    }

    /// Earliest armed deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<MonotonicTime> {
        self.inner.lock().deadlines.values().filter_map(|d| *d).min()
    }

    /// Drain and disarm every event whose deadline is at or before `now`.
    pub fn take_due(&self, now: MonotonicTime) -> Vec<EventId> {
        let mut inner = self.inner.lock();
        let mut due: Vec<EventId> = inner
            .deadlines
            .iter()
            .filter(|(_, d)| d.is_some_and(|t| t <= now))
            .map(|(ev, _)| *ev)
            .collect();
        due.sort_unstable_by_key(|ev| ev.0);
        for ev in &due {
            inner.deadlines.insert(*ev, None);
        }
        due
    }
}

impl EventScheduler for TimerQueue {
    fn resched_if_earlier(&self, ev: EventId, t: MonotonicTime) -> bool {
        let mut inner = self.inner.lock();
        match inner.deadlines.get_mut(&ev) {
            Some(slot) => match slot {
                Some(current) if *current <= t => false,
                _ => {
                    *slot = Some(t);
                    true
                }
            },
            // unknown event: pairing already destroyed, nothing to arm
            None => false,
        }
    }
}
