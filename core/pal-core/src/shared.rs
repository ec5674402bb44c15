//! Shared state store: the key/value region every surface reads.
//!
//! The app's state-update path writes `{state, steps, lastUpdate}`; onboarding
//! writes `gender`. The widget and the live session extension only read.
//!
//! ```text
//! step change → classify → SharedStateStore::write → reload signal → widget
//!                                 │
//!                                 └── read on adoption by LiveSessionManager
//! ```
//!
//! # File Format
//!
//! ```json
//! {
//!   "avatarState": "neutral",
//!   "currentSteps": 3000,
//!   "gender": "female",
//!   "lastUpdateDate": "2026-03-01T08:30:00Z"
//! }
//! ```
//!
//! Unknown keys are preserved so other processes can add their own.
//!
//! # Defensive Design
//!
//! Other processes write this file on their own schedule, so reads handle:
//! - Missing or empty files (defaults)
//! - Corrupt JSON (defaults, log warning)
//! - Unknown tokens or wrongly typed values (per-key defaults)
//!
//! # Atomic Writes
//!
//! Every write is a read-modify-write of the whole record persisted through a
//! temp file + rename, so `state` and `steps` always land together and a
//! concurrent reader never observes a mismatched pair. Writers hold an
//! exclusive [`RegionLock`] for the whole cycle, so a `write` and a
//! `write_gender` from different processes never undo each other.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{PalError, Result};
use crate::storage::{RegionLock, StorageConfig};
use crate::types::{AvatarSnapshot, AvatarState, Gender};

/// Keys of the shared storage region.
pub mod keys {
    pub const AVATAR_STATE: &str = "avatarState";
    pub const CURRENT_STEPS: &str = "currentSteps";
    pub const GENDER: &str = "gender";
    pub const LAST_UPDATE_DATE: &str = "lastUpdateDate";
}

/// Asks passively scheduled surfaces (the widget) to re-render.
///
/// Fire-and-forget: there is no acknowledgment and implementors must not block.
pub trait SurfaceReloader: Send + Sync {
    fn reload_all(&self);
}

/// Reloader for processes with no passive surfaces to notify.
pub struct NoopReloader;

impl SurfaceReloader for NoopReloader {
    fn reload_all(&self) {}
}

enum Backend {
    File(PathBuf),
    Memory(Mutex<Map<String, Value>>),
    Unavailable(String),
}

/// Key/value façade over the shared storage region.
///
/// Open with [`SharedStateStore::open`] for the group container,
/// or [`SharedStateStore::new_in_memory`] for tests.
pub struct SharedStateStore {
    backend: Backend,
    reloader: Arc<dyn SurfaceReloader>,
}

impl SharedStateStore {
    /// Opens the store in the group container, creating it if needed.
    ///
    /// If the container cannot be created the store opens unavailable:
    /// reads return defaults and writes are dropped.
    pub fn open(storage: &StorageConfig) -> Self {
        match storage.ensure_group_dir() {
            Ok(()) => Self::at_path(&storage.shared_state_file()),
            Err(err) => {
                warn!(
                    error = %err,
                    group = storage.group_id(),
                    "Shared storage container unavailable; using defaults"
                );
                Self::unavailable(format!(
                    "cannot create {}: {}",
                    storage.group_dir().display(),
                    err
                ))
            }
        }
    }

    /// Store backed by an explicit file. The parent directory must exist.
    pub fn at_path(file_path: &Path) -> Self {
        Self {
            backend: Backend::File(file_path.to_path_buf()),
            reloader: Arc::new(NoopReloader),
        }
    }

    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(Map::new())),
            reloader: Arc::new(NoopReloader),
        }
    }

    /// Store whose region could not be resolved.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
            reloader: Arc::new(NoopReloader),
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<dyn SurfaceReloader>) -> Self {
        self.reloader = reloader;
        self
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, Backend::Unavailable(_))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Persists the state/steps pair with a fresh timestamp, then signals
    /// passive surfaces to reload.
    pub fn write(&self, state: AvatarState, steps: u32) -> Result<()> {
        let now = Utc::now();
        self.update_record(|record| {
            record.insert(keys::AVATAR_STATE.to_string(), Value::from(state.token()));
            record.insert(keys::CURRENT_STEPS.to_string(), Value::from(steps));
            record.insert(
                keys::LAST_UPDATE_DATE.to_string(),
                Value::from(now.to_rfc3339()),
            );
        })?;
        debug!(state = %state, steps, "Shared state written");
        self.reloader.reload_all();
        Ok(())
    }

    /// Persists the onboarding gender selection. Leaves the state pair untouched.
    pub fn write_gender(&self, gender: Gender) -> Result<()> {
        self.update_record(|record| {
            record.insert(keys::GENDER.to_string(), Value::from(gender.token()));
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    /// Current tier; `low` when nothing valid has been written.
    pub fn read_state(&self) -> AvatarState {
        decode_state(&self.load_record())
    }

    /// Current step count; 0 when nothing valid has been written.
    pub fn read_steps(&self) -> u32 {
        decode_steps(&self.load_record())
    }

    pub fn read_gender(&self) -> Option<Gender> {
        decode_gender(&self.load_record())
    }

    pub fn read_last_update(&self) -> Option<DateTime<Utc>> {
        decode_last_update(&self.load_record())
    }

    pub fn has_selected_gender(&self) -> bool {
        self.read_gender().is_some()
    }

    /// All four values from a single read of the region.
    pub fn snapshot(&self) -> AvatarSnapshot {
        let record = self.load_record();
        AvatarSnapshot {
            state: decode_state(&record),
            steps: decode_steps(&record),
            gender: decode_gender(&record),
            last_update: decode_last_update(&record).map(|ts| ts.to_rfc3339()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Backend access
    // ─────────────────────────────────────────────────────────────────────────────

    fn load_record(&self) -> Map<String, Value> {
        match &self.backend {
            Backend::File(path) => load_file(path),
            Backend::Memory(record) => record
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            Backend::Unavailable(_) => Map::new(),
        }
    }

    fn update_record(&self, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        match &self.backend {
            Backend::File(path) => {
                // Held across load and save so concurrent writers of other
                // keys are never rolled back.
                let _lock = RegionLock::acquire(path).map_err(|source| PalError::Io {
                    context: format!("Failed to lock {}", path.display()),
                    source,
                })?;
                let mut record = load_file(path);
                apply(&mut record);
                save_file(path, &record)
            }
            Backend::Memory(record) => {
                let mut record = record
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                apply(&mut *record);
                Ok(())
            }
            Backend::Unavailable(reason) => {
                warn!(reason = %reason, "Dropping write to unavailable shared storage");
                Err(PalError::StorageUnavailable {
                    reason: reason.clone(),
                })
            }
        }
    }
}

fn load_file(path: &Path) -> Map<String, Value> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Map::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read shared state; using defaults");
            return Map::new();
        }
    };

    if content.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(record)) => record,
        Ok(_) => {
            warn!(path = %path.display(), "Shared state is not a JSON object; using defaults");
            Map::new()
        }
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Corrupt shared state; using defaults");
            Map::new()
        }
    }
}

fn save_file(path: &Path, record: &Map<String, Value>) -> Result<()> {
    let content = serde_json::to_string_pretty(record).map_err(|source| PalError::Json {
        context: "Failed to serialize shared state".to_string(),
        source,
    })?;

    let parent_dir = path.parent().ok_or_else(|| PalError::StorageUnavailable {
        reason: format!("{} has no parent directory", path.display()),
    })?;
    let io_err = |context: &str, source: std::io::Error| PalError::Io {
        context: format!("{} {}", context, path.display()),
        source,
    };

    let mut temp_file =
        NamedTempFile::new_in(parent_dir).map_err(|e| io_err("Temp file for", e))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| io_err("Failed to write", e))?;
    temp_file.flush().map_err(|e| io_err("Failed to flush", e))?;
    temp_file
        .persist(path)
        .map_err(|e| io_err("Failed to persist", e.error))?;
    Ok(())
}

fn decode_state(record: &Map<String, Value>) -> AvatarState {
    record
        .get(keys::AVATAR_STATE)
        .and_then(Value::as_str)
        .and_then(AvatarState::from_token)
        .unwrap_or_default()
}

fn decode_steps(record: &Map<String, Value>) -> u32 {
    match record.get(keys::CURRENT_STEPS) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .or_else(|| n.as_f64().map(crate::classifier::steps_from_reading))
            .unwrap_or(0),
        _ => 0,
    }
}

fn decode_gender(record: &Map<String, Value>) -> Option<Gender> {
    record
        .get(keys::GENDER)
        .and_then(Value::as_str)
        .and_then(Gender::from_token)
}

fn decode_last_update(record: &Map<String, Value>) -> Option<DateTime<Utc>> {
    record
        .get(keys::LAST_UPDATE_DATE)
        .and_then(Value::as_str)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
