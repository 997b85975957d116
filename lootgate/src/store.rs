// lootgate/src/store.rs
//
// Snapshot persistence.
//
// Every logical store (ledger, anomalies, counters, intervals, legendary) is
// one opaque slot keyed by name. Saves are whole-snapshot overwrites; there
// is no incremental write path.
//
// Layout on disk (JsonDirStore):
//   {data_dir}/ledger.json
//   {data_dir}/anomalies.json
//   {data_dir}/counters.json
//   {data_dir}/intervals.json
//   {data_dir}/legendary.json
//   {data_dir}/ledger_backup_{unix_millis}.json   — written on ranking reset
//
// Failures never propagate past this module's typed helpers: a missing,
// unreadable or corrupt slot loads as the default value, and a failed save
// is logged and reported as `false`.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

// ── Store names ───────────────────────────────────────────────────────────────

pub const LEDGER:    &str = "ledger";
pub const ANOMALIES: &str = "anomalies";
pub const COUNTERS:  &str = "counters";
pub const INTERVALS: &str = "intervals";
pub const LEGENDARY: &str = "legendary";

pub fn ledger_backup_name(unix_millis: i64) -> String {
    format!("{}_backup_{}", LEDGER, unix_millis)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store `{name}` i/o failed: {source}")]
    Io {
        name:   String,
        #[source]
        source: std::io::Error,
    },
    #[error("store `{name}` holds malformed JSON: {source}")]
    Json {
        name:   String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw keyed snapshot slots.
pub trait SnapshotStore: Send {
    /// `Ok(None)` when the slot has never been written.
    fn load_raw(&self, name: &str) -> Result<Option<String>, StoreError>;
    fn save_raw(&self, name: &str, body: &str) -> Result<(), StoreError>;
}

// ── Typed helpers ─────────────────────────────────────────────────────────────

/// Load a slot, falling back to `T::default()` when it is absent, unreadable
/// or malformed.
pub fn load_or_default<T>(store: &dyn SnapshotStore, name: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.load_raw(name) {
        Ok(Some(body)) => match serde_json::from_str::<T>(&body) {
            Ok(value) => value,
            Err(source) => {
                let e = StoreError::Json { name: name.to_string(), source };
                warn!("{}; reinitializing to default", e);
                T::default()
            }
        },
        Ok(None) => {
            debug!(store = name, "no snapshot yet, starting empty");
            T::default()
        }
        Err(e) => {
            error!("{}; continuing with in-memory default", e);
            T::default()
        }
    }
}

/// Serialize and overwrite a slot. Returns false (and logs) on failure.
pub fn save<T: Serialize>(store: &dyn SnapshotStore, name: &str, value: &T) -> bool {
    let body = match serde_json::to_string_pretty(value) {
        Ok(b) => b,
        Err(source) => {
            error!("{}", StoreError::Json { name: name.to_string(), source });
            return false;
        }
    };
    match store.save_raw(name, &body) {
        Ok(()) => {
            debug!(store = name, bytes = body.len(), "snapshot saved");
            true
        }
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

// ── JSON directory store ──────────────────────────────────────────────────────

pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root: PathBuf = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            name: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    #[cfg(test)]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }
}

impl SnapshotStore for JsonDirStore {
    fn load_raw(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { name: name.to_string(), source }),
        }
    }

    fn save_raw(&self, name: &str, body: &str) -> Result<(), StoreError> {
        // Write beside the target then rename, so a crash leaves either the
        // previous snapshot or the new one.
        let path = self.path_for(name);
        let tmp  = self.root.join(format!(".{}.json.tmp", name));
        let io = |source| StoreError::Io { name: name.to_string(), source };
        std::fs::write(&tmp, body).map_err(io)?;
        std::fs::rename(&tmp, &path).map_err(io)?;
        Ok(())
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Backs ephemeral runs (nothing touches disk) and tests.

#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.slots.lock().get(name).cloned()
    }

    pub fn put(&self, name: &str, body: &str) {
        self.slots.lock().insert(name.to_string(), body.to_string());
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl SnapshotStore for MemoryStore {
    fn load_raw(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(name))
    }

    fn save_raw(&self, name: &str, body: &str) -> Result<(), StoreError> {
        self.put(name, body);
        Ok(())
    }
}

impl<S: SnapshotStore + Sync + ?Sized> SnapshotStore for std::sync::Arc<S> {
    fn load_raw(&self, name: &str) -> Result<Option<String>, StoreError> {
        (**self).load_raw(name)
    }

    fn save_raw(&self, name: &str, body: &str) -> Result<(), StoreError> {
        (**self).save_raw(name, body)
    }
}
