//! Defines all configuration structures for the Deskclock engine.
//!
//! These structs are deserialized with `serde` from an optional TOML file,
//! layered under `DESKCLOCK__*` environment overrides, using the `config`
//! crate. Every field has a default, so an empty or missing file yields the
//! stock clock: 1 Hz clock, 10 Hz stopwatch, 4 Hz countdown, 5 s auto-cycle,
//! 60 s alarm ring and a 5 s timer-expiry flash.

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for overrides, e.g. `DESKCLOCK__HEARTBEATS__CLOCK_MS=500`.
pub const ENV_PREFIX: &str = "DESKCLOCK";

/// The top-level configuration for the `DeskClockEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeskClockConfig {
    /// Periods of the independent recurring callbacks.
    #[serde(default)]
    pub heartbeats: HeartbeatConfig,

    /// Ringing windows for the alarm and the timer-expiry overlay.
    #[serde(default)]
    pub alarm: AlarmSettings,

    /// How wall-clock instants are turned into local time.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Where persisted values live.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Heartbeat periods in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_clock_ms")]
    pub clock_ms: u64,
    #[serde(default = "default_stopwatch_ms")]
    pub stopwatch_ms: u64,
    #[serde(default = "default_timer_ms")]
    pub timer_ms: u64,
    #[serde(default = "default_auto_cycle_ms")]
    pub auto_cycle_ms: u64,
}

/// The two "ringing" windows. They are deliberately separate constants.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmSettings {
    /// How long the alarm rings before silencing itself.
    #[serde(default = "default_ring_seconds")]
    pub ring_seconds: u64,
    /// How long the overlay stays up after a countdown reaches zero.
    #[serde(default = "default_timer_flash_seconds")]
    pub timer_flash_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// IANA zone name (e.g. "Europe/Berlin"). Absent means the system local zone.
    #[serde(default)]
    pub timezone: Option<Tz>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the persistent store. Absent keeps values in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DeskClockConfig {
    /// Loads configuration from `path` (optional file) plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl HeartbeatConfig {
    pub fn clock_period(&self) -> Duration {
        Duration::from_millis(self.clock_ms.max(1))
    }

    pub fn stopwatch_period(&self) -> Duration {
        Duration::from_millis(self.stopwatch_ms.max(1))
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_ms.max(1))
    }

    pub fn auto_cycle_period(&self) -> Duration {
        Duration::from_millis(self.auto_cycle_ms.max(1))
    }
}

impl AlarmSettings {
    pub fn ring_ms(&self) -> i64 {
        i64::try_from(self.ring_seconds.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }

    pub fn timer_flash_ms(&self) -> i64 {
        i64::try_from(self.timer_flash_seconds.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }
}

// --- Default value functions for serde ---

fn default_clock_ms() -> u64 {
    1_000
}

fn default_stopwatch_ms() -> u64 {
    100
}

fn default_timer_ms() -> u64 {
    250
}

fn default_auto_cycle_ms() -> u64 {
    5_000
}

fn default_ring_seconds() -> u64 {
    60
}

fn default_timer_flash_seconds() -> u64 {
    5
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            clock_ms: default_clock_ms(),
            stopwatch_ms: default_stopwatch_ms(),
            timer_ms: default_timer_ms(),
            auto_cycle_ms: default_auto_cycle_ms(),
        }
    }
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            ring_seconds: default_ring_seconds(),
            timer_flash_seconds: default_timer_flash_seconds(),
        }
    }
}
