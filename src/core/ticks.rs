// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Monotonic forwarder time.
//!
//! All table state is stamped in ticks, a process-wide monotonic unit with
//! `HZ` ticks per second. The clock is backed by `tokio::time::Instant`, so
//! a paused runtime drives the whole forwarder on virtual time.

use std::time::Duration;

use tokio::time::Instant;

pub type Ticks = u64;

/// Ticks per second.
pub const HZ: u64 = 1_000;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert nanoseconds to ticks, rounding up so any positive duration is
/// at least one tick.
pub fn ns_to_ticks(ns: u64) -> Ticks {
    if ns == 0 {
        return 0;
    }
    let ticks = (ns as u128 * HZ as u128).div_ceil(NANOS_PER_SEC as u128);
    ticks as Ticks
}

pub fn ms_to_ticks(ms: u64) -> Ticks {
    ns_to_ticks(ms.saturating_mul(1_000_000))
}

pub fn duration_to_ticks(d: Duration) -> Ticks {
    ns_to_ticks(d.as_nanos().try_into().unwrap_or(u64::MAX))
}

pub fn ticks_to_duration(t: Ticks) -> Duration {
    Duration::from_nanos(t.saturating_mul(NANOS_PER_SEC / HZ))
}

/// The dispatcher's tick source.
#[derive(Debug, Clone)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Ticks {
        duration_to_ticks(self.start.elapsed())
    }

    /// The instant at which the clock will read `ticks`, for timer arming.
    pub fn instant_at(&self, ticks: Ticks) -> Instant {
        self.start + ticks_to_duration(ticks)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
