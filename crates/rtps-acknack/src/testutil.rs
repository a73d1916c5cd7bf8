// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted collaborator doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bitmap::SequenceNumberSet;
use crate::proxy::{Defragmenter, DeliveryQueueProbe, FragmentNackmap, ReorderBuffer};

/// Reorder buffer double driven by an explicit list of missing sequences.
pub struct ScriptedReorder {
    next: u64,
    missing: Vec<u64>,
    /// Samples at or beyond this sequence have unknown status and are only
    /// reported when `notail` is false.
    tail_unknown_from: u64,
}

impl ScriptedReorder {
    /// Fully contiguous buffer: next expected is `next`, nothing missing.
    pub fn contiguous(next: u64) -> Self {
        Self {
            next,
            missing: Vec::new(),
            tail_unknown_from: u64::MAX,
        }
    }

    pub fn with_missing(next: u64, missing: Vec<u64>) -> Self {
        Self {
            next,
            missing,
            tail_unknown_from: u64::MAX,
        }
    }

    pub fn tail_unknown_from(mut self, seq: u64) -> Self {
        self.tail_unknown_from = seq;
        self
    }
}

impl ReorderBuffer for ScriptedReorder {
    fn next_seq(&self) -> u64 {
        self.next
    }

    fn nackmap(&self, base: u64, last_seq: u64, max_bits: u32, notail: bool) -> SequenceNumberSet {
        if last_seq < base {
            return SequenceNumberSet::empty(base);
        }
        let window = (last_seq - base + 1).min(u64::from(max_bits)) as u32;
        let mut set = SequenceNumberSet::with_bits(base, window);
        let mut highest = None;
        for &seq in &self.missing {
            if seq < base || seq >= base + u64::from(window) {
                continue;
            }
            if notail && seq >= self.tail_unknown_from {
                continue;
            }
            let offset = (seq - base) as u32;
            set.set(offset);
            highest = Some(highest.map_or(offset, |h: u32| h.max(offset)));
        }
        match highest {
            Some(h) => {
                set.truncate(h + 1);
                set
            }
            None => SequenceNumberSet::empty(base),
        }
    }
}

/// Defragmenter double keyed by sequence number; unknown by default.
/// Records the queries it receives.
#[derive(Default)]
pub struct ScriptedDefrag {
    replies: HashMap<u64, FragmentNackmap>,
    queries: Rc<RefCell<Vec<(u64, Option<u32>)>>>,
}

impl ScriptedDefrag {
    pub fn reply(mut self, seq: u64, map: FragmentNackmap) -> Self {
        self.replies.insert(seq, map);
        self
    }

    /// Live handle to the recorded `(seq, last_fragnum)` queries; stays
    /// valid after the double moves into a proxy.
    pub fn queries_handle(&self) -> Rc<RefCell<Vec<(u64, Option<u32>)>>> {
        Rc::clone(&self.queries)
    }
}

impl Defragmenter for ScriptedDefrag {
    fn nackmap(&self, seq: u64, last_fragnum: Option<u32>, _max_bits: u32) -> FragmentNackmap {
        self.queries.borrow_mut().push((seq, last_fragnum));
        self.replies
            .get(&seq)
            .cloned()
            .unwrap_or(FragmentNackmap::UnknownSample)
    }
}

/// Delivery queue probe that never reports full.
pub struct NeverFull;

impl DeliveryQueueProbe for NeverFull {
    fn is_full(&self) -> bool {
        false
    }
}

/// Delivery queue probe that always reports full.
pub struct AlwaysFull;

impl DeliveryQueueProbe for AlwaysFull {
    fn is_full(&self) -> bool {
        true
    }
}
