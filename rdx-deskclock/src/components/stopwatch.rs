//! Start/pause/reset elapsed-time accumulator.
//!
//! Elapsed time is always `now - anchor`. Resuming moves the anchor back by the
//! frozen amount instead of restarting from zero, so however late or sparse
//! the heartbeats are, the displayed value matches true wall-clock elapsed time.

use crate::common::{elapsed_between, EpochMs};
use crate::format::StopwatchParts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopwatchState {
    pub running: bool,
    /// Elapsed time frozen at the last pause.
    pub accumulated_ms: i64,
    /// Present exactly while running.
    pub start_epoch_ms: Option<EpochMs>,
}

/// Outcome of [`StopwatchEngine::start_pause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchTransition {
    Started { elapsed_ms: i64 },
    Paused { elapsed_ms: i64 },
}

#[derive(Debug, Clone, Default)]
pub struct StopwatchEngine {
    state: StopwatchState,
}

impl StopwatchEngine {
    /// Rebuilds the stopwatch from a persisted elapsed value. It never resumes running.
    pub fn restore(elapsed_ms: i64) -> Self {
        Self {
            state: StopwatchState {
                running: false,
                accumulated_ms: elapsed_ms.max(0),
                start_epoch_ms: None,
            },
        }
    }

    pub fn state(&self) -> StopwatchState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn elapsed_ms(&self, now: EpochMs) -> i64 {
        match self.state.start_epoch_ms {
            Some(start) if self.state.running => elapsed_between(start, now),
            _ => self.state.accumulated_ms,
        }
    }

    pub fn start_pause(&mut self, now: EpochMs) -> StopwatchTransition {
        if self.state.running {
            let elapsed_ms = self.elapsed_ms(now);
            self.state = StopwatchState {
                running: false,
                accumulated_ms: elapsed_ms,
                start_epoch_ms: None,
            };
            StopwatchTransition::Paused { elapsed_ms }
        } else {
            let elapsed_ms = self.state.accumulated_ms;
            self.state = StopwatchState {
                running: true,
                accumulated_ms: elapsed_ms,
                start_epoch_ms: Some(now.saturating_sub(elapsed_ms)),
            };
            StopwatchTransition::Started { elapsed_ms }
        }
    }

    pub fn reset(&mut self) {
        self.state = StopwatchState::default();
    }

    /// Heartbeat body. Returns the current elapsed value while running, else `None`.
    pub fn beat(&mut self, now: EpochMs) -> Option<i64> {
        if !self.state.running {
            return None;
        }
        Some(self.elapsed_ms(now))
    }

    pub fn parts(&self, now: EpochMs) -> StopwatchParts {
        StopwatchParts::from_ms(self.elapsed_ms(now))
    }
}
