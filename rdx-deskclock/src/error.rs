//! Error types for the Deskclock core.
//!
//! Very little in the core can fail. Storage problems are logged and replaced
//! by fallbacks inside [`crate::store::Store`], so `StoreError` rarely travels
//! further than that module. The only user-facing rejection is a malformed
//! alarm time.

use thiserror::Error;

/// Failure of a key/value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("value for key '{key}' could not be (de)serialized: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock was poisoned")]
    Poisoned,

    #[error("background writer for {path} is not running")]
    WriterStopped { path: String },
}

/// Errors surfaced by engine operations and startup.
#[derive(Debug, Error)]
pub enum DeskClockError {
    #[error("alarm time '{0}' is not a valid 24-hour HH:MM value")]
    InvalidAlarmTime(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
