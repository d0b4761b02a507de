//! Wall-clock sources.
//!
//! The engines never call the system clock themselves. They take `now` as an
//! argument, and the coordinator reads it from a [`TimeSource`]. Production uses
//! [`SystemTimeSource`]; tests and simulations use [`ManualTimeSource`] to model
//! suspended processes, skipped beats and clocks that jump backwards.

use crate::common::EpochMs;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Supplies the current wall-clock instant.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> EpochMs;

    /// Reads the clock once and wraps it as an immutable snapshot.
    fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            epoch_ms: self.now_ms(),
        }
    }
}

/// An instantaneous wall-clock reading. Recreated every tick, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockSnapshot {
    pub epoch_ms: EpochMs,
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> EpochMs {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<AtomicI64>,
}

impl ManualTimeSource {
    pub fn new(start: EpochMs) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, now: EpochMs) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock by `delta_ms`, which may be negative.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> EpochMs {
        self.now.load(Ordering::SeqCst)
    }
}
