//! Contains the building blocks of the time-keeping core.
//!
//! Each engine here is a plain state machine that takes `now` as an argument
//! and owns exactly one state value. None of them knows about tasks, locks or
//! storage. The `DeskClockEngine` drives them from heartbeats registered in
//! the [`heartbeat::HeartbeatRegistry`], persists what they report, and
//! broadcasts their transitions.

pub mod alarm;
pub mod heartbeat;
pub mod mode;
pub mod stopwatch;
pub mod timer;
