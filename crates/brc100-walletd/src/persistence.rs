//! Save and load of challenge, session and certificate state.

use std::path::PathBuf;
use std::sync::Mutex;

use brc100_auth::{Challenge, IdentityCertificate, Session};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServiceError;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    pub challenges: Vec<Challenge>,
    pub sessions: Vec<Session>,
    pub certificates: Vec<IdentityCertificate>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            challenges: Vec::new(),
            sessions: Vec::new(),
            certificates: Vec::new(),
        }
    }
}

/// External save/load collaborator for engine state.
pub trait StateStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    fn load_state(&self) -> Result<Option<StateSnapshot>, ServiceError>;
    fn save_state(&self, snapshot: &StateSnapshot) -> Result<(), ServiceError>;
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    saved: Mutex<Option<StateSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_state(&self) -> Result<Option<StateSnapshot>, ServiceError> {
        let saved = self
            .saved
            .lock()
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        Ok(saved.clone())
    }

    fn save_state(&self, snapshot: &StateSnapshot) -> Result<(), ServiceError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        *saved = Some(snapshot.clone());
        Ok(())
    }
}

/// A pretty-printed JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStateStore {
    fn load_state(&self) -> Result<Option<StateSnapshot>, ServiceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: StateSnapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ServiceError::Persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        debug!(path = %self.path.display(), "state loaded");
        Ok(Some(snapshot))
    }

    fn save_state(&self, snapshot: &StateSnapshot) -> Result<(), ServiceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}
