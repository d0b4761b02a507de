//! Countdown-to-zero engine anchored on an absolute end timestamp.
//!
//! Remaining time is `end - now`, never decremented per beat. `base_ms` is the
//! last configured duration, offered back by `restart` and shown while idle.
//! Reaching zero ends the run and opens a short flash window for the overlay.

use crate::common::{elapsed_between, EpochMs};
use crate::format::CountdownParts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    pub running: bool,
    pub remaining_ms: i64,
    /// Present exactly while running.
    pub end_epoch_ms: Option<EpochMs>,
    pub base_ms: i64,
    /// End of the post-expiry overlay window, if one is pending.
    pub flash_until: Option<EpochMs>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTransition {
    Started { remaining_ms: i64 },
    Paused { remaining_ms: i64 },
    Expired { at: EpochMs },
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    state: TimerState,
    flash_ms: i64,
}

impl TimerEngine {
    pub fn new(flash_ms: i64) -> Self {
        Self {
            state: TimerState::default(),
            flash_ms: flash_ms.max(0),
        }
    }

    /// Rebuilds the timer from a persisted remaining value. It never resumes running.
    pub fn restore(remaining_ms: i64, flash_ms: i64) -> Self {
        let remaining_ms = remaining_ms.max(0);
        Self {
            state: TimerState {
                running: false,
                remaining_ms,
                end_epoch_ms: None,
                base_ms: remaining_ms,
                flash_until: None,
            },
            flash_ms: flash_ms.max(0),
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn remaining_ms(&self, now: EpochMs) -> i64 {
        match self.state.end_epoch_ms {
            Some(end) if self.state.running => elapsed_between(now, end),
            _ => self.state.remaining_ms,
        }
    }

    /// Starts a countdown of `duration_ms`.
    ///
    /// A non-positive duration is "nothing to start" and does nothing. While
    /// already running, the live remaining time is kept and the argument is
    /// ignored, so a repeated start never rewinds a countdown.
    pub fn start(&mut self, duration_ms: i64, now: EpochMs) -> Option<TimerTransition> {
        if duration_ms <= 0 {
            return None;
        }
        let effective = if self.state.running {
            self.remaining_ms(now)
        } else {
            self.state.base_ms = duration_ms;
            duration_ms
        };
        self.state.end_epoch_ms = Some(now.saturating_add(effective));
        self.state.remaining_ms = effective;
        self.state.running = true;
        self.state.flash_until = None;
        Some(TimerTransition::Started {
            remaining_ms: effective,
        })
    }

    /// Continues a paused countdown from where it stopped, or from the
    /// configured duration when nothing is left.
    pub fn resume(&mut self, now: EpochMs) -> Option<TimerTransition> {
        let duration = if self.state.remaining_ms > 0 {
            self.state.remaining_ms
        } else {
            self.state.base_ms
        };
        self.start(duration, now)
    }

    /// Starts over from the last configured duration.
    pub fn restart(&mut self, now: EpochMs) -> Option<TimerTransition> {
        let base = self.state.base_ms;
        self.reset();
        self.start(base, now)
    }

    pub fn pause(&mut self, now: EpochMs) -> Option<TimerTransition> {
        if !self.state.running {
            return None;
        }
        let remaining_ms = self.remaining_ms(now);
        self.state.remaining_ms = remaining_ms;
        self.state.base_ms = remaining_ms;
        self.state.end_epoch_ms = None;
        self.state.running = false;
        Some(TimerTransition::Paused { remaining_ms })
    }

    /// Zeroes the timer, including any pending expiry flash.
    pub fn reset(&mut self) {
        self.state = TimerState::default();
    }

    /// Heartbeat body. Returns `Expired` on the single beat that reaches zero.
    pub fn beat(&mut self, now: EpochMs) -> Option<TimerTransition> {
        if !self.state.running {
            return None;
        }
        self.state.remaining_ms = self.remaining_ms(now);
        if self.state.remaining_ms > 0 {
            return None;
        }
        self.state.running = false;
        self.state.end_epoch_ms = None;
        self.state.flash_until = Some(now.saturating_add(self.flash_ms));
        Some(TimerTransition::Expired { at: now })
    }

    pub fn is_flashing(&self, now: EpochMs) -> bool {
        self.state.flash_until.is_some_and(|until| now < until)
    }

    /// What the panel shows: live remaining time, or the configured duration
    /// when idle at zero.
    pub fn display_parts(&self, now: EpochMs) -> CountdownParts {
        let ms = if !self.state.running && self.state.remaining_ms == 0 {
            self.state.base_ms
        } else {
            self.remaining_ms(now)
        };
        CountdownParts::from_ms(ms)
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_duration_is_a_no_op() {
        let mut timer = TimerEngine::default();
        assert_eq!(timer.start(0, 1_000), None);
        assert_eq!(timer.start(-500, 1_000), None);
        assert_eq!(timer.state(), TimerState::default());
    }

    #[test]
    fn start_then_pause_keeps_duration_within_one_beat() {
        for duration in [1, 250, 999, 5_000, 90_000, 86_400_000] {
            let mut timer = TimerEngine::default();
            timer.start(duration, 10_000);
            let paused = timer.pause(10_000 + 250).unwrap();
            let TimerTransition::Paused { remaining_ms } = paused else {
                panic!("expected pause, got {paused:?}");
            };
            assert!(duration - remaining_ms <= 250, "{duration} -> {remaining_ms}");
            assert!(remaining_ms >= 0);
        }
    }

    #[test]
    fn pause_and_resume_continue_from_remaining() {
        let mut timer = TimerEngine::default();
        timer.start(5_000, 0);
        timer.beat(1_000);
        assert_eq!(timer.pause(2_000), Some(TimerTransition::Paused { remaining_ms: 3_000 }));
        assert_eq!(timer.state().base_ms, 3_000);

        // Wall time passing while paused is not consumed.
        assert_eq!(timer.resume(50_000), Some(TimerTransition::Started { remaining_ms: 3_000 }));
        assert_eq!(timer.state().end_epoch_ms, Some(53_000));
        assert_eq!(timer.remaining_ms(52_000), 1_000);
    }

    #[test]
    fn start_while_running_keeps_live_remaining() {
        let mut timer = TimerEngine::default();
        timer.start(10_000, 0);
        assert_eq!(
            timer.start(60_000, 4_000),
            Some(TimerTransition::Started { remaining_ms: 6_000 })
        );
        assert_eq!(timer.state().base_ms, 10_000);
        assert_eq!(timer.state().end_epoch_ms, Some(10_000));
    }

    #[test]
    fn expiry_fires_once_and_stops() {
        let mut timer = TimerEngine::new(5_000);
        timer.start(90_000, 0);
        let mut expiries = 0;
        // Skipped beats: only a handful arrive, one of them late.
        for now in [250, 30_000, 89_999, 91_700, 92_000, 95_000] {
            if let Some(TimerTransition::Expired { at }) = timer.beat(now) {
                expiries += 1;
                assert_eq!(at, 91_700);
            }
        }
        assert_eq!(expiries, 1);
        assert!(!timer.is_running());
        assert_eq!(timer.state().remaining_ms, 0);
        assert!(timer.is_flashing(96_699));
        assert!(!timer.is_flashing(96_700));
    }

    #[test]
    fn display_uses_ceiling_and_idle_fallback() {
        let mut timer = TimerEngine::default();
        timer.start(90_000, 0);
        assert_eq!(timer.display_parts(89_600).to_string(), "00:01");
        timer.beat(90_000);
        assert_eq!(timer.display_parts(90_000).to_string(), "01:30");
        timer.reset();
        assert_eq!(timer.display_parts(90_000).to_string(), "00:00");
    }

    #[test]
    fn reset_clears_flash_and_is_idempotent() {
        let mut timer = TimerEngine::default();
        timer.start(1_000, 0);
        timer.beat(1_000);
        assert!(timer.is_flashing(1_500));
        timer.reset();
        assert!(!timer.is_flashing(1_500));
        let once = timer.state();
        timer.reset();
        assert_eq!(timer.state(), once);
        assert_eq!(once, TimerState::default());
    }

    #[test]
    fn restart_reuses_configured_duration() {
        let mut timer = TimerEngine::default();
        timer.start(30_000, 0);
        timer.beat(30_000);
        assert_eq!(
            timer.restart(40_000),
            Some(TimerTransition::Started { remaining_ms: 30_000 })
        );
        assert_eq!(timer.remaining_ms(45_000), 25_000);
    }

    #[test]
    fn restore_never_resumes_running() {
        let timer = TimerEngine::restore(12_000, 5_000);
        assert!(!timer.is_running());
        assert_eq!(timer.state().base_ms, 12_000);
        assert_eq!(timer.display_parts(0).to_string(), "00:12");
        assert_eq!(TimerEngine::restore(-1, 5_000).state().remaining_ms, 0);
    }

    #[test]
    fn backward_clock_jump_never_goes_negative() {
        let mut timer = TimerEngine::default();
        timer.start(5_000, 10_000);
        assert_eq!(timer.remaining_ms(2_000), 13_000);
        assert_eq!(timer.beat(16_000), Some(TimerTransition::Expired { at: 16_000 }));
        assert_eq!(timer.remaining_ms(0), 0);
    }
}
