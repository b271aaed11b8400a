//! Clock adapters.
//!
//! - [`MonotonicClock`] wraps `std::time::Instant`, anchored when the node
//!   starts.  Used by both binaries.
//! - [`ManualClock`] only moves when told to.  Used by tests and by
//!   anything that needs to replay a timeline deterministically.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::app::ports::ClockPort;
use crate::model::Millis;

/// Milliseconds since construction (monotonic).
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since construction.
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl ClockPort for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.start.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock.  Shareable across threads.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::Relaxed);
    }

    /// Move forward and return the new time.
    pub fn advance(&self, by: Millis) -> Millis {
        self.now.fetch_add(by, Ordering::Relaxed) + by
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::Relaxed)
    }
}
