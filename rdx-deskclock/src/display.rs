//! The read-only view handed to the rendering layer.
//!
//! A [`DisplayFrame`] carries one [`ModeSnapshot`] per mode, all computed from
//! the same `now`, plus which mode is active and whether an overlay should be
//! drawn over it. The renderer decides layout; the core only supplies text.

use crate::common::EpochMs;
use crate::components::alarm::AlarmScheduler;
use crate::components::mode::Mode;
use crate::components::stopwatch::StopwatchEngine;
use crate::components::timer::TimerEngine;
use crate::format::{self, DisplayZone};

/// User display preferences. Each field is persisted under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub is_24h: bool,
    pub is_celsius: bool,
    pub auto_mode_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            is_24h: true,
            is_celsius: true,
            auto_mode_enabled: false,
        }
    }
}

/// Latest values supplied by the external location/weather fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientReading {
    pub temperature_celsius: Option<f64>,
    pub location_status: String,
}

impl Default for AmbientReading {
    fn default() -> Self {
        Self {
            temperature_celsius: None,
            location_status: "Locating...".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSnapshot {
    pub mode_label: &'static str,
    pub primary_text: String,
    pub secondary_text: String,
}

/// Something drawn over whatever mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    AlarmRinging,
    TimerExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub tick: u64,
    pub now: EpochMs,
    pub active: Mode,
    /// Indexed by [`Mode::index`].
    pub panels: Vec<ModeSnapshot>,
    pub overlay: Option<Overlay>,
}

impl DisplayFrame {
    pub fn active_panel(&self) -> Option<&ModeSnapshot> {
        self.panels.get(self.active.index())
    }

    pub fn panel(&self, mode: Mode) -> Option<&ModeSnapshot> {
        self.panels.get(mode.index())
    }
}

/// Borrowed engine state needed to render one frame.
pub(crate) struct FrameContext<'a> {
    pub tick: u64,
    pub now: EpochMs,
    pub zone: DisplayZone,
    pub active: Mode,
    pub preferences: &'a Preferences,
    pub ambient: &'a AmbientReading,
    pub stopwatch: &'a StopwatchEngine,
    pub timer: &'a TimerEngine,
    pub alarm: &'a AlarmScheduler,
}

impl FrameContext<'_> {
    pub(crate) fn render(&self) -> DisplayFrame {
        let panels = Mode::ALL.iter().map(|mode| self.panel(*mode)).collect();
        let overlay = if self.alarm.is_ringing() {
            Some(Overlay::AlarmRinging)
        } else if self.timer.is_flashing(self.now) {
            Some(Overlay::TimerExpired)
        } else {
            None
        };
        DisplayFrame {
            tick: self.tick,
            now: self.now,
            active: self.active,
            panels,
            overlay,
        }
    }

    fn panel(&self, mode: Mode) -> ModeSnapshot {
        let (primary_text, secondary_text) = match mode {
            Mode::Time => self.time_texts(),
            Mode::Date => match self.zone.localize(self.now) {
                Some(local) => format::date_text(&local),
                None => ("--".to_string(), String::new()),
            },
            Mode::Temp => (
                format::temperature_text(
                    self.ambient.temperature_celsius,
                    self.preferences.is_celsius,
                ),
                self.ambient.location_status.clone(),
            ),
            Mode::Stopwatch => (
                self.stopwatch.parts(self.now).to_string(),
                if self.stopwatch.is_running() {
                    "RUNNING".to_string()
                } else {
                    "PAUSED".to_string()
                },
            ),
            Mode::Timer => (
                self.timer.display_parts(self.now).to_string(),
                if self.timer.is_running() {
                    "RUNNING".to_string()
                } else if self.timer.is_flashing(self.now) {
                    "TIME UP".to_string()
                } else {
                    "READY".to_string()
                },
            ),
        };
        ModeSnapshot {
            mode_label: mode.label(),
            primary_text,
            secondary_text,
        }
    }

    fn time_texts(&self) -> (String, String) {
        let Some(local) = self.zone.localize(self.now) else {
            return ("--:--:--".to_string(), String::new());
        };
        let (clock, suffix) = format::clock_text(&local, self.preferences.is_24h);
        let alarm = self.alarm.config();
        let secondary = if alarm.enabled {
            format!("{} | ALARM {}", suffix, alarm.time)
        } else {
            suffix
        };
        (clock, secondary)
    }
}
