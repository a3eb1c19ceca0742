//! JSON document persistence for the in-memory store.
//!
//! Every mutation rewrites the whole state to one pretty-printed document:
//!
//! ```json
//! {
//!   "timers": { "<id>": { ... } },
//!   "time_slices": { "<id>": { ... } },
//!   "employees": { "<id>": { ... } }
//! }
//! ```
//!
//! Collections are keyed and ordered by ID, so re-saving an unchanged state
//! produces identical bytes. The document is written to a sibling temp file
//! and renamed into place; if that fails the in-memory mutation is discarded.
//! Fine for small, low-concurrency datasets; every write costs the full state.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::DbError;
use crate::memory::{MemoryStore, Persist, State};

/// The in-memory store persisted to a JSON document.
pub type FileStore = MemoryStore<JsonDocument>;

/// Location of the backing document.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. Returns `None` if it does not exist.
    pub fn load(&self) -> Result<Option<State>, DbError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let state = serde_json::from_str(&content).map_err(|source| DbError::Document {
                    path: self.path.clone(),
                    source,
                })?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DbError::io(&self.path, e)),
        }
    }

    /// Serializes `state` exactly as it is written to disk.
    pub fn encode(&self, state: &State) -> Result<String, DbError> {
        let mut json = serde_json::to_string_pretty(state).map_err(|source| DbError::Document {
            path: self.path.clone(),
            source,
        })?;
        json.push('\n');
        Ok(json)
    }
}

impl Persist for JsonDocument {
    const DURABLE: bool = true;

    fn save(&self, state: &State) -> Result<(), DbError> {
        let json = self.encode(state)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| DbError::io(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| DbError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "document saved");
        Ok(())
    }
}

impl FileStore {
    /// Opens the store at `path`, loading the existing document if there is one.
    ///
    /// A missing document starts an empty store; its parent directory is
    /// created so the first write succeeds.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let document = JsonDocument::new(path);
        let state = if let Some(state) = document.load()? {
            info!(
                path = %document.path().display(),
                timers = state.timers.len(),
                time_slices = state.time_slices.len(),
                employees = state.employees.len(),
                "loaded document"
            );
            state
        } else {
            if let Some(parent) = document.path().parent() {
                fs::create_dir_all(parent).map_err(|e| DbError::io(parent, e))?;
            }
            info!(path = %document.path().display(), "starting empty document");
            State::default()
        };
        Ok(Self::with_state(state, document))
    }
}
