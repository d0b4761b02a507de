//! The persistent key/value contract and its two backends.
//!
//! Persistence is a recovery channel across restarts, never the source of
//! truth for a running session. [`Store`] therefore never returns an error:
//! a failed read falls back to the caller's default and a failed write is
//! logged and dropped.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Names of the persisted values.
pub mod keys {
    pub const IS_24H: &str = "is24h";
    pub const IS_CELSIUS: &str = "isCelsius";
    pub const ALARM: &str = "alarm";
    pub const STOPWATCH_ELAPSED_MS: &str = "stopwatchElapsedMs";
    pub const TIMER_REMAINING_MS: &str = "timerRemainingMs";
    pub const AUTO_MODE_ENABLED: &str = "autoModeEnabled";
}

/// A backend holding JSON values under string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// A cheap, cloneable handle adding typed, failure-tolerant access to a backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// An ephemeral store. Values vanish with the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// Reads `key`, returning `fallback` when it is absent or unreadable.
    pub fn load_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.backend.get(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => parsed,
                Err(source) => {
                    let err = StoreError::Json {
                        key: key.to_string(),
                        source,
                    };
                    warn!(key, error = %err, "Stored value unreadable, using default.");
                    fallback
                }
            },
            Ok(None) => fallback,
            Err(err) => {
                warn!(key, error = %err, "Store read failed, using default.");
                fallback
            }
        }
    }

    /// Writes `value` under `key`. Failures are logged and otherwise ignored.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(|source| StoreError::Json {
                key: key.to_string(),
                source,
            })
            .and_then(|json| self.backend.set(key, json));
        if let Err(err) = result {
            warn!(key, error = %err, "Store write failed; keeping in-memory value only.");
        }
    }
}

/// Keeps values in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Keeps all values in one JSON object on disk.
///
/// Reads are served from memory. Every change hands a snapshot of the whole
/// object to a writer thread, which replaces the file atomically through a
/// temporary sibling, so a crash mid-write leaves the previous file intact.
/// Snapshots queued behind a slow write are coalesced into the newest one.
/// Dropping the store waits for the last snapshot to reach the disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Map<String, Value>>,
    writer: Option<StoreWriter>,
}

#[derive(Debug)]
struct StoreWriter {
    queue: mpsc::UnboundedSender<Map<String, Value>>,
    handle: thread::JoinHandle<()>,
}

impl JsonFileStore {
    /// Opens `path`. A missing file starts empty, and so does a corrupt one,
    /// with a warning, since a damaged file must not keep the clock from starting.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let cache = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Store file is corrupt; starting empty.");
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No store file yet; starting empty.");
                Map::new()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Store file unreadable; starting empty.");
                Map::new()
            }
        };
        Self {
            writer: StoreWriter::spawn(&path),
            path,
            cache: Mutex::new(cache),
        }
    }
}

impl StoreWriter {
    fn spawn(path: &Path) -> Option<Self> {
        let (queue, mut pending) = mpsc::unbounded_channel::<Map<String, Value>>();
        let target = path.to_path_buf();
        let spawned = thread::Builder::new()
            .name("deskclock-store".into())
            .spawn(move || {
                while let Some(mut snapshot) = pending.blocking_recv() {
                    while let Ok(newer) = pending.try_recv() {
                        snapshot = newer;
                    }
                    if let Err(err) = write_atomically(&target, &snapshot) {
                        warn!(error = %err, "Store write failed; keeping in-memory values only.");
                    }
                }
            });
        match spawned {
            Ok(handle) => Some(Self { queue, handle }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Store writer could not start; values will not persist.");
                None
            }
        }
    }
}

/// Writes `map` to a temporary file next to `path`, then renames it over `path`.
fn write_atomically(path: &Path, map: &Map<String, Value>) -> Result<(), StoreError> {
    let io_error = |source: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let text = serde_json::to_string_pretty(map).map_err(|source| StoreError::Json {
        key: "*".to_string(),
        source,
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(text.as_bytes()).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        if cache.get(key) == Some(&value) {
            return Ok(());
        }
        cache.insert(key.to_string(), value);
        let stopped = || StoreError::WriterStopped {
            path: self.path.display().to_string(),
        };
        let writer = self.writer.as_ref().ok_or_else(stopped)?;
        writer.queue.send(cache.clone()).map_err(|_| stopped())
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        if let Some(StoreWriter { queue, handle }) = self.writer.take() {
            drop(queue);
            if handle.join().is_err() {
                warn!(path = %self.path.display(), "Store writer panicked.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::alarm::AlarmConfig;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn absent_keys_fall_back_to_defaults() {
        let store = Store::in_memory();
        assert!(store.load_or(keys::IS_24H, true));
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, 0_i64), 0);
        assert_eq!(store.load_or(keys::ALARM, AlarmConfig::default()), AlarmConfig::default());
    }

    #[test]
    fn failing_backend_never_surfaces_errors() {
        let store = Store::new(BrokenStore);
        store.save(keys::TIMER_REMAINING_MS, &1_234_i64);
        assert_eq!(store.load_or(keys::TIMER_REMAINING_MS, 7_i64), 7);
    }

    #[test]
    fn mistyped_value_uses_fallback() {
        let store = Store::in_memory();
        store.save(keys::IS_CELSIUS, "yes");
        assert!(store.load_or(keys::IS_CELSIUS, true));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskclock.json");

        let store = Store::new(JsonFileStore::open(&path));
        store.save(keys::STOPWATCH_ELAPSED_MS, &65_430_i64);
        store.save(
            keys::ALARM,
            &AlarmConfig {
                enabled: true,
                time: "06:45".to_string(),
            },
        );
        drop(store);

        let reopened = Store::new(JsonFileStore::open(&path));
        assert_eq!(reopened.load_or(keys::STOPWATCH_ELAPSED_MS, 0_i64), 65_430);
        let alarm: AlarmConfig = reopened.load_or(keys::ALARM, AlarmConfig::default());
        assert!(alarm.enabled);
        assert_eq!(alarm.time, "06:45");

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["alarm"]["time"], "06:45");
    }

    #[test]
    fn rewrites_replace_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskclock.json");
        fs::write(&path, r#"{"alarm":{"enabled":true,"time":"06:00"},"is24h":false}"#).unwrap();

        let store = Store::new(JsonFileStore::open(&path));
        for elapsed in (0..50_i64).map(|n| n * 100) {
            store.save(keys::STOPWATCH_ELAPSED_MS, &elapsed);
        }
        drop(store);

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["stopwatchElapsedMs"], 4_900);
        assert_eq!(raw["alarm"]["time"], "06:00");
        assert_eq!(raw["is24h"], false);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskclock.json");
        fs::write(&path, "{ not json").unwrap();

        let store = Store::new(JsonFileStore::open(&path));
        assert_eq!(store.load_or(keys::TIMER_REMAINING_MS, 0_i64), 0);
        store.save(keys::TIMER_REMAINING_MS, &500_i64);
        drop(store);
        assert_eq!(
            Store::new(JsonFileStore::open(&path)).load_or(keys::TIMER_REMAINING_MS, 0_i64),
            500
        );
    }

    #[test]
    fn unwritable_path_keeps_cached_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        let backend = JsonFileStore::open(&path);
        assert!(backend.set(keys::IS_24H, Value::Bool(false)).is_ok());
        assert_eq!(backend.get(keys::IS_24H).unwrap(), Some(Value::Bool(false)));
        drop(backend);
        assert!(!path.exists());
    }
}
