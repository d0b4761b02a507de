//! # Deskclock
//!
//! The time-keeping core of a personal desk clock: wall-clock display, a
//! stopwatch, a countdown timer, one daily alarm and five display modes.
//!
//! ## Core Concepts
//!
//! - **Heartbeats**: Independent, cancelable recurring callbacks (1 Hz clock,
//!   10 Hz stopwatch, 4 Hz countdown, 5 s auto-cycle) registered with the
//!   engine. Pausing or resetting an engine cancels its heartbeat before the
//!   call returns.
//! - **Absolute timestamps**: Elapsed and remaining time are always computed
//!   as `now - anchor`, so late, skipped or throttled heartbeats never drift
//!   the displayed value away from real elapsed time.
//! - **Best-effort persistence**: Values survive restarts through a small
//!   key/value contract. Storage failures are logged, never surfaced, and a
//!   running stopwatch or timer always comes back paused.
//! - **Event-Driven**: Transitions are broadcast as strongly-typed events
//!   (`TimerEvent::Expired`, `AlarmEvent::Fired`, ...) and every tick renders
//!   a `DisplayFrame` for whatever draws the screen.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use deskclock::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Build an engine on the system clock with an in-memory store.
//!     let engine = DeskClockEngine::with_system_clock(DeskClockConfig::default());
//!
//!     // 2. Subscribe to an event stream before starting the engine.
//!     let mut alarm_events = engine.subscribe_alarm_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = alarm_events.recv().await {
//!             println!("Alarm: {:?}", event);
//!         }
//!     });
//!
//!     // 3. Configure the alarm and start a five minute countdown.
//!     engine.alarm_save(true, "07:30").await?;
//!     engine.timer_start(5 * 60 * 1_000).await;
//!
//!     // 4. Run until Ctrl+C.
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Deskclock";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod store;
pub mod time;

/// A prelude module for easy importing of the most common Deskclock types.
pub mod prelude {
    pub use crate::common::{EpochMs, HeartbeatId};
    pub use crate::components::alarm::{AlarmConfig, AlarmPhase, SilenceReason};
    pub use crate::components::mode::Mode;
    pub use crate::components::stopwatch::StopwatchState;
    pub use crate::components::timer::TimerState;
    pub use crate::config::DeskClockConfig;
    pub use crate::display::{AmbientReading, DisplayFrame, ModeSnapshot, Overlay, Preferences};
    pub use crate::engine::DeskClockEngine;
    pub use crate::error::DeskClockError;
    pub use crate::events::{AlarmEvent, ModeEvent, StopwatchEvent, SystemEvent, TimerEvent};
    pub use crate::store::{JsonFileStore, MemoryStore, Store};
    pub use crate::time::{ManualTimeSource, SystemTimeSource, TimeSource};
}
