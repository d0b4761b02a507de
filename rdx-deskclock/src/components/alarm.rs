//! Single daily alarm compared at minute granularity on every clock tick.
//!
//! ```text
//!            enable                  HH:MM matches
//!   Idle ─────────────► Armed ──────────────────────► Ringing
//!    ▲                  ▲  ▲                            │
//!    │                  │  └─── stop() / deadline ──────┘
//!    └──── disable ─────┴───────────────────────────────┘
//! ```
//!
//! The clock ticks once a second, so a matching minute is observed about sixty
//! times. Only the first observation fires: the transition is gated on the
//! scheduler not already ringing. After an explicit `stop()`, the rest of that
//! minute is ignored too so the alarm does not ring again on the next tick.

use crate::common::EpochMs;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// The persisted alarm schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub enabled: bool,
    /// 24-hour `HH:MM`.
    pub time: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: "07:30".to_string(),
        }
    }
}

/// Normalizes a user-entered time to `HH:MM`, or `None` if it is not a valid time.
pub fn parse_alarm_time(input: &str) -> Option<String> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .ok()
        .map(|time| time.format("%H:%M").to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Idle,
    Armed,
    Ringing { since: EpochMs, deadline: EpochMs },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceReason {
    Stopped,
    TimedOut,
    Disabled,
}

impl std::fmt::Display for SilenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SilenceReason::Stopped => "stopped",
            SilenceReason::TimedOut => "timed out",
            SilenceReason::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmTransition {
    Fired { time: String, at: EpochMs },
    Silenced { reason: SilenceReason },
}

#[derive(Debug, Clone)]
pub struct AlarmScheduler {
    config: AlarmConfig,
    phase: AlarmPhase,
    ring_ms: i64,
    /// Minute index (`epoch_ms / 60_000`) in which the user last stopped the alarm.
    dismissed_minute: Option<i64>,
}

impl AlarmScheduler {
    pub fn new(config: AlarmConfig, ring_ms: i64) -> Self {
        let phase = if config.enabled {
            AlarmPhase::Armed
        } else {
            AlarmPhase::Idle
        };
        Self {
            config,
            phase,
            ring_ms: ring_ms.max(0),
            dismissed_minute: None,
        }
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self.phase, AlarmPhase::Ringing { .. })
    }

    /// Replaces the schedule. Disabling silences a ringing alarm at once;
    /// editing the time of an enabled alarm leaves a current ring alone.
    /// A dismissal survives re-saving the same time.
    pub fn configure(&mut self, config: AlarmConfig) -> Option<AlarmTransition> {
        let was_ringing = self.is_ringing();
        if !config.enabled || config.time != self.config.time {
            self.dismissed_minute = None;
        }
        self.config = config;
        if !self.config.enabled {
            self.phase = AlarmPhase::Idle;
            return was_ringing.then_some(AlarmTransition::Silenced {
                reason: SilenceReason::Disabled,
            });
        }
        if self.phase == AlarmPhase::Idle {
            self.phase = AlarmPhase::Armed;
        }
        None
    }

    /// Clock-tick body. `local_hhmm` is `now` rendered in the display zone.
    pub fn on_tick(&mut self, local_hhmm: &str, now: EpochMs) -> Option<AlarmTransition> {
        match self.phase {
            AlarmPhase::Idle => None,
            AlarmPhase::Ringing { deadline, .. } => {
                if now >= deadline {
                    self.phase = AlarmPhase::Armed;
                    Some(AlarmTransition::Silenced {
                        reason: SilenceReason::TimedOut,
                    })
                } else {
                    None
                }
            }
            AlarmPhase::Armed => {
                if local_hhmm != self.config.time
                    || self.dismissed_minute == Some(now.div_euclid(60_000))
                {
                    return None;
                }
                self.phase = AlarmPhase::Ringing {
                    since: now,
                    deadline: now.saturating_add(self.ring_ms),
                };
                Some(AlarmTransition::Fired {
                    time: self.config.time.clone(),
                    at: now,
                })
            }
        }
    }

    /// Deadline-job body. The job belongs to the current ring, so it silences
    /// without re-reading the clock.
    pub fn time_out(&mut self) -> Option<AlarmTransition> {
        if !self.is_ringing() {
            return None;
        }
        self.phase = AlarmPhase::Armed;
        Some(AlarmTransition::Silenced {
            reason: SilenceReason::TimedOut,
        })
    }

    pub fn stop(&mut self, now: EpochMs) -> Option<AlarmTransition> {
        if !self.is_ringing() {
            return None;
        }
        self.phase = AlarmPhase::Armed;
        self.dismissed_minute = Some(now.div_euclid(60_000));
        Some(AlarmTransition::Silenced {
            reason: SilenceReason::Stopped,
        })
    }
}
