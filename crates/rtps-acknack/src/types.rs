// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core identifier and time types shared across the acknowledgment engine.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// GUID prefix length (12 bytes).
pub const GUID_PREFIX_LEN: usize = 12;
/// Entity ID length (4 bytes).
pub const ENTITY_ID_LEN: usize = 4;

/// RTPS Entity ID (4 bytes).
pub type EntityId = [u8; ENTITY_ID_LEN];

/// Participant GUID prefix.
pub type GuidPrefix = [u8; GUID_PREFIX_LEN];

/// Full RTPS GUID: participant prefix + entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    prefix: GuidPrefix,
    entity_id: EntityId,
}

impl Guid {
    /// Create a GUID from its prefix and entity id parts.
    #[must_use]
    pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// Create a GUID from 16 raw bytes (prefix first, entity id last).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; GUID_PREFIX_LEN];
        let mut entity_id = [0u8; ENTITY_ID_LEN];
        prefix.copy_from_slice(&bytes[..GUID_PREFIX_LEN]);
        entity_id.copy_from_slice(&bytes[GUID_PREFIX_LEN..]);
        Self { prefix, entity_id }
    }

    /// Participant prefix part.
    #[must_use]
    pub fn prefix(&self) -> &GuidPrefix {
        &self.prefix
    }

    /// Entity id part (goes into ACKNACK/NACKFRAG submessages).
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.prefix {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ":")?;
        for b in &self.entity_id {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Opaque key identifying a local participant (security context lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantKey(u64);

impl ParticipantKey {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Monotonic point in time, nanosecond resolution.
///
/// A plain newtype rather than `std::time::Instant` so protocol state can be
/// driven deterministically in tests; embedders translate from their clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonotonicTime(u64);

impl MonotonicTime {
    /// Origin of the monotonic clock.
    pub const ZERO: MonotonicTime = MonotonicTime(0);

    /// Create from nanoseconds since the clock origin.
    #[must_use]
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the clock origin.
    #[must_use]
    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

impl Add<Duration> for MonotonicTime {
    type Output = MonotonicTime;

    fn add(self, rhs: Duration) -> MonotonicTime {
        MonotonicTime(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}
