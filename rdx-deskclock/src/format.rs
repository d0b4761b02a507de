//! Text formatting for the display panels.
//!
//! Everything here is a pure function of a timestamp or a duration, so the
//! calendar behaviour (12/24 h, weekday names, DST, year rollover) is tested
//! with fixed instants instead of the live clock.

use crate::common::EpochMs;
use chrono::{DateTime, Local, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;

/// The single zone used to turn instants into local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// Whatever the host reports as local time.
    #[default]
    Local,
    Named(Tz),
}

impl From<Option<Tz>> for DisplayZone {
    fn from(tz: Option<Tz>) -> Self {
        tz.map_or(DisplayZone::Local, DisplayZone::Named)
    }
}

impl DisplayZone {
    /// Local wall-clock time for `epoch_ms`, or `None` if it is out of chrono's range.
    pub fn localize(&self, epoch_ms: EpochMs) -> Option<NaiveDateTime> {
        let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms)?;
        Some(match self {
            DisplayZone::Local => utc.with_timezone(&Local).naive_local(),
            DisplayZone::Named(tz) => utc.with_timezone(tz).naive_local(),
        })
    }
}

/// `HH:MM` in 24-hour form, the unit the alarm compares against.
pub fn hhmm(local: &NaiveDateTime) -> String {
    local.format("%H:%M").to_string()
}

/// Primary and secondary text of the TIME panel.
///
/// 24-hour: `("14:05:09", "24H")`. 12-hour: `("2:05:09", "PM")`.
pub fn clock_text(local: &NaiveDateTime, is_24h: bool) -> (String, String) {
    if is_24h {
        (local.format("%H:%M:%S").to_string(), "24H".to_string())
    } else {
        let (is_pm, hour12) = local.hour12();
        let meridiem = if is_pm { "PM" } else { "AM" };
        (
            format!("{}:{:02}:{:02}", hour12, local.minute(), local.second()),
            meridiem.to_string(),
        )
    }
}

/// Primary and secondary text of the DATE panel: `("18 Oct 2026", "Sunday")`.
pub fn date_text(local: &NaiveDateTime) -> (String, String) {
    (
        local.format("%-d %b %Y").to_string(),
        local.format("%A").to_string(),
    )
}

/// Temperature reading in the preferred unit, `--` when no reading is known.
pub fn temperature_text(celsius: Option<f64>, is_celsius: bool) -> String {
    match (celsius, is_celsius) {
        (None, true) => "--°C".to_string(),
        (None, false) => "--°F".to_string(),
        (Some(c), true) => format!("{:.1}°C", c),
        (Some(c), false) => format!("{:.1}°F", c * 9.0 / 5.0 + 32.0),
    }
}

/// Stopwatch split of an elapsed duration: minutes, seconds, centiseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopwatchParts {
    pub minutes: i64,
    pub seconds: i64,
    pub centis: i64,
}

impl StopwatchParts {
    pub fn from_ms(elapsed_ms: i64) -> Self {
        let ms = elapsed_ms.max(0);
        Self {
            minutes: ms / 60_000,
            seconds: (ms / 1_000) % 60,
            centis: (ms % 1_000) / 10,
        }
    }
}

impl std::fmt::Display for StopwatchParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}.{:02}", self.minutes, self.seconds, self.centis)
    }
}

/// Countdown split with ceiling semantics: 400 ms left still reads one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownParts {
    pub minutes: i64,
    pub seconds: i64,
}

impl CountdownParts {
    pub fn from_ms(remaining_ms: i64) -> Self {
        let ms = remaining_ms.max(0);
        let total = ms / 1_000 + i64::from(ms % 1_000 != 0);
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }
}

impl std::fmt::Display for CountdownParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}
