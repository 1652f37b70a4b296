//! File-backed document database.
//!
//! The whole data set lives in one JSON file:
//!
//! ```json
//! { "monitors": { "<id>": { ...record... } }, "schema": [ { "version": "V1.6.0" } ] }
//! ```
//!
//! Monitor records are kept as raw [`serde_json::Value`]s so that records
//! written by older schema versions load unchanged and can be migrated before
//! anything decodes them into the current model. Every committed change is
//! written atomically (temp file + rename) while holding the database lock,
//! so writers are serialized and readers never observe a half-applied change.
//!
//! The file may also be changed by another process, such as the admin CLI
//! running next to the service. Each operation compares the file's size and
//! modification time with the last load or write and reloads on a mismatch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::schema::SchemaRecord;

/// Untyped view of a single record.
pub type Document = serde_json::Map<String, Value>;

/// On-disk layout of the database file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseFile {
    /// Monitor records keyed by id.
    #[serde(default)]
    monitors: BTreeMap<String, Value>,
    /// Append-only version markers.
    #[serde(default)]
    schema: Vec<SchemaRecord>,
}

/// Size and modification time of the database file, `None` while absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

#[derive(Debug)]
struct DatabaseState {
    data: DatabaseFile,
    stamp: Option<FileStamp>,
    /// Number of changes committed since the database was opened.
    generation: u64,
    closed: bool,
}

/// Handle to an open database file.
///
/// Opened with [`Database::open`] and released with [`Database::close`].
/// After release every operation fails with [`StoreError::Closed`].
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    state: Mutex<DatabaseState>,
}

impl Database {
    /// Open the database at `path`, creating parent directories as needed.
    ///
    /// A missing file is treated as an empty database; it is created on the
    /// first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let stamp = Self::stamp(&path);
        let data = Self::load(&path)?;
        tracing::debug!(
            path = %path.display(),
            monitors = data.monitors.len(),
            markers = data.schema.len(),
            "database opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(DatabaseState {
                data,
                stamp,
                generation: 0,
                closed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of changes committed through this handle.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Release the handle. Returns `true` for the call that actually closed
    /// it; later calls are no-ops returning `false`.
    ///
    /// Every committed change is already on disk, so nothing is flushed here.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        tracing::info!(path = %self.path.display(), "database closed");
        true
    }

    // ── Monitor records ───────────────────────────────────────────────────

    /// All monitor records as `(id, record)` pairs, in id order.
    pub fn records(&self) -> Result<Vec<(String, Value)>> {
        let state = self.open_state()?;
        Ok(state
            .data
            .monitors
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    pub fn record(&self, id: &str) -> Result<Option<Value>> {
        let state = self.open_state()?;
        Ok(state.data.monitors.get(id).cloned())
    }

    /// Insert or fully replace the record stored under `id`.
    pub fn upsert_record(&self, id: &str, record: Value) -> Result<()> {
        self.transaction(|tx| {
            tx.upsert_record(id, record);
            Ok(())
        })
    }

    /// Replace the record stored under `id` only if one exists.
    ///
    /// Returns `false`, without writing, when no record has that id.
    pub fn replace_record(&self, id: &str, record: Value) -> Result<bool> {
        let mut state = self.open_state()?;
        if !state.data.monitors.contains_key(id) {
            return Ok(false);
        }
        let mut next = state.data.clone();
        next.monitors.insert(id.to_string(), record);
        self.commit(&mut state, next)?;
        Ok(true)
    }

    /// Delete the record stored under `id`.
    ///
    /// Returns `false`, without writing, when no record has that id.
    pub fn remove_record(&self, id: &str) -> Result<bool> {
        let mut state = self.open_state()?;
        if !state.data.monitors.contains_key(id) {
            return Ok(false);
        }
        let mut next = state.data.clone();
        next.monitors.remove(id);
        self.commit(&mut state, next)?;
        Ok(true)
    }

    // ── Schema markers ────────────────────────────────────────────────────

    pub fn schema_records(&self) -> Result<Vec<SchemaRecord>> {
        let state = self.open_state()?;
        Ok(state.data.schema.clone())
    }

    pub fn append_schema_record(&self, record: SchemaRecord) -> Result<()> {
        self.transaction(|tx| {
            tx.append_schema_record(record);
            Ok(())
        })
    }

    // ── Transactions ──────────────────────────────────────────────────────

    /// Run `f` against a copy of the data set and commit the copy with one
    /// atomic write if `f` succeeds.
    ///
    /// On error nothing is written and the in-memory state is unchanged.
    /// A transaction that makes no change does not write.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut state = self.open_state()?;
        let mut tx = Transaction {
            data: state.data.clone(),
            dirty: false,
        };

        let value = f(&mut tx)?;

        if tx.dirty {
            self.commit(&mut state, tx.data)?;
        }
        Ok(value)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, DatabaseState> {
        // State is only replaced after a successful write, so a panic while
        // the lock was held cannot have left it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state, reloading it first if the file changed on disk.
    ///
    /// A file that no longer parses fails the operation and leaves the
    /// previous state in place; the next operation tries again.
    fn open_state(&self) -> Result<MutexGuard<'_, DatabaseState>> {
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }

        let stamp = Self::stamp(&self.path);
        if stamp != state.stamp {
            state.data = Self::load(&self.path)?;
            state.stamp = stamp;
            tracing::debug!(
                path = %self.path.display(),
                monitors = state.data.monitors.len(),
                "database file changed on disk; reloaded"
            );
        }
        Ok(state)
    }

    /// Persist `next` and make it the current state.
    fn commit(&self, state: &mut DatabaseState, next: DatabaseFile) -> Result<()> {
        Self::save(&self.path, &next)?;
        state.data = next;
        state.stamp = Self::stamp(&self.path);
        state.generation += 1;
        Ok(())
    }

    fn stamp(path: &Path) -> Option<FileStamp> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(FileStamp {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    fn load(path: &Path) -> Result<DatabaseFile> {
        if !path.exists() {
            return Ok(DatabaseFile::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(DatabaseFile::default());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomically write `data` to `path`.
    fn save(path: &Path, data: &DatabaseFile) -> Result<()> {
        let json = serde_json::to_string_pretty(data).map_err(StoreError::Encode)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Mutable copy of the data set handed to [`Database::transaction`].
#[derive(Debug)]
pub struct Transaction {
    data: DatabaseFile,
    dirty: bool,
}

impl Transaction {
    pub fn record_ids(&self) -> Vec<String> {
        self.data.monitors.keys().cloned().collect()
    }

    pub fn record(&self, id: &str) -> Option<&Value> {
        self.data.monitors.get(id)
    }

    pub fn record_mut(&mut self, id: &str) -> Option<&mut Value> {
        let record = self.data.monitors.get_mut(id)?;
        self.dirty = true;
        Some(record)
    }

    pub fn upsert_record(&mut self, id: &str, record: Value) {
        self.data.monitors.insert(id.to_string(), record);
        self.dirty = true;
    }

    pub fn schema_records(&self) -> &[SchemaRecord] {
        &self.data.schema
    }

    pub fn append_schema_record(&mut self, record: SchemaRecord) {
        self.data.schema.push(record);
        self.dirty = true;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
