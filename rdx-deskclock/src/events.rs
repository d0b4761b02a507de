//! Defines all public event types broadcast by the Deskclock engine.
//!
//! Each category has its own `broadcast` channel. Subscribers that only care
//! about the alarm never see stopwatch traffic, and a slow display consumer
//! lagging behind on frames cannot delay alarm delivery.

use crate::common::{EpochMs, HeartbeatId};
use crate::components::alarm::SilenceReason;
use crate::components::mode::Mode;

/// Events related to the lifecycle of the engine itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    /// Fired once when the clock heartbeat begins.
    EngineStarted { timestamp: EpochMs },
    /// Fired once when all heartbeats have been cancelled.
    EngineShutdown,
    HeartbeatStarted { id: HeartbeatId, label: &'static str },
    HeartbeatCancelled { label: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopwatchEvent {
    Started { elapsed_ms: i64 },
    Paused { elapsed_ms: i64 },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Started { remaining_ms: i64 },
    Paused { remaining_ms: i64 },
    Reset,
    /// The countdown reached zero. Emitted exactly once per run.
    Expired { at: EpochMs },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    /// The schedule was saved.
    Configured { enabled: bool, time: String },
    Fired { time: String, at: EpochMs },
    Silenced { reason: SilenceReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeEvent {
    pub mode: Mode,
    /// `true` when the auto-cycle heartbeat made the change.
    pub automatic: bool,
}
