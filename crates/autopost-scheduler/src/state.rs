//! Persisted schedule state.
//!
//! The state file is the sole durable artifact: a flat JSON object
//! mapping job id to its next-run instant in UTC. The full mapping is
//! rewritten on every change via a temp-file rename, so a crash leaves
//! either the old or the new complete state, never a partial write.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::SchedulerError;

/// In-memory schedule state: job id to next-run instant (UTC).
pub type ScheduleState = HashMap<String, DateTime<Utc>>;

/// Durable storage for the job-to-next-run mapping.
///
/// The scheduler owns one store and writes through it synchronously
/// after every reschedule, so any observer of the backing file sees a
/// consistent snapshot.
pub trait StateStore: Send {
    /// Load the persisted mapping. Missing or corrupt state is "no
    /// prior state", never an error.
    fn load(&self) -> Result<ScheduleState, SchedulerError>;

    /// Atomically replace the persisted mapping with `state`.
    fn save(&self, state: &ScheduleState) -> Result<(), SchedulerError>;
}

/// File-backed store writing RFC 3339 UTC instants as JSON.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<ScheduleState, SchedulerError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state file, starting fresh");
            return Ok(ScheduleState::new());
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable state file, starting fresh");
                return Ok(ScheduleState::new());
            }
        };

        let entries: HashMap<String, String> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unparsable state file, starting fresh");
                return Ok(ScheduleState::new());
            }
        };

        let mut state = ScheduleState::new();
        for (job_id, instant) in entries {
            match DateTime::parse_from_rfc3339(&instant) {
                Ok(t) => {
                    state.insert(job_id, t.with_timezone(&Utc));
                }
                Err(e) => {
                    warn!(job = %job_id, value = %instant, error = %e, "dropping unparsable next-run");
                }
            }
        }
        Ok(state)
    }

    fn save(&self, state: &ScheduleState) -> Result<(), SchedulerError> {
        // BTreeMap for a stable key order in the file
        let entries: BTreeMap<&str, String> = state
            .iter()
            .map(|(id, t)| (id.as_str(), t.to_rfc3339()))
            .collect();
        let json = serde_json::to_string_pretty(&entries)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and dry wiring.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<ScheduleState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing state.
    pub fn with_state(state: ScheduleState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> ScheduleState {
        self.inner.lock().expect("state lock poisoned").clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<ScheduleState, SchedulerError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &ScheduleState) -> Result<(), SchedulerError> {
        *self.inner.lock().expect("state lock poisoned") = state.clone();
        Ok(())
    }
}

impl<S: StateStore + Sync + ?Sized> StateStore for &S {
    fn load(&self) -> Result<ScheduleState, SchedulerError> {
        (**self).load()
    }

    fn save(&self, state: &ScheduleState) -> Result<(), SchedulerError> {
        (**self).save(state)
    }
}

impl<S: StateStore + Sync + ?Sized> StateStore for std::sync::Arc<S> {
    fn load(&self) -> Result<ScheduleState, SchedulerError> {
        (**self).load()
    }

    fn save(&self, state: &ScheduleState) -> Result<(), SchedulerError> {
        (**self).save(state)
    }
}
