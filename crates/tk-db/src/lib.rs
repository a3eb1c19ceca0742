//! Storage backends for timekeeper.
//!
//! Three interchangeable implementations of [`tk_core::Meta`]:
//!
//! - [`MemoryStore`]: maps behind a single readers-writer lock.
//! - [`FileStore`]: the in-memory store plus a JSON document rewritten on every
//!   mutation.
//! - [`SqliteStore`]: a relational schema with transactions, upserts and a
//!   separate active-slice association table.
//!
//! A backend is chosen once at startup from a [`BackendConfig`] via [`open`].
//!
//! # Thread Safety
//!
//! Every store is `Send + Sync`. The memory and file stores serialize all
//! writers behind one lock spanning every entity type, so referential checks
//! that cross entity types never interleave. The SQLite store wraps its
//! connection in a `Mutex` and runs each write in an `IMMEDIATE` transaction,
//! so other processes sharing the database file are serialized by SQLite itself.

mod file;
mod memory;
mod sqlite;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use file::{FileStore, JsonDocument};
pub use memory::{MemoryStore, Persist, State, Volatile};
pub use sqlite::SqliteStore;

/// Default time a SQLite writer waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Backend failures. Converted into [`tk_core::Error::StorageUnavailable`]
/// at the `Meta` boundary, except for [`DbError::Rejected`].
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The backing document could not be encoded or decoded.
    #[error("invalid document {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in {column}: {value}")]
    TimestampParse {
        column: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value violates an entity invariant.
    #[error("invalid stored value in {column}: {source}")]
    InvalidValue {
        column: &'static str,
        #[source]
        source: tk_core::ValidationError,
    },
    /// A thread panicked while holding the store lock.
    #[error("storage lock poisoned")]
    Poisoned,
    /// The operation was refused by an entity rule rather than by storage.
    #[error(transparent)]
    Rejected(#[from] tk_core::Error),
}

impl DbError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<DbError> for tk_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rejected(err) => err,
            other => Self::storage(other),
        }
    }
}

/// Which backend to use, tagged by `kind`.
///
/// ```toml
/// [backend]
/// kind = "sqlite"
/// path = "/var/lib/tk/tk.db"
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory,
    File {
        path: PathBuf,
    },
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_busy_timeout_ms")]
        busy_timeout_ms: u64,
    },
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Opens the configured backend.
pub fn open(config: &BackendConfig) -> Result<Box<dyn tk_core::Meta>, DbError> {
    let meta: Box<dyn tk_core::Meta> = match config {
        BackendConfig::Memory => Box::new(MemoryStore::new()),
        BackendConfig::File { path } => Box::new(FileStore::open(path)?),
        BackendConfig::Sqlite {
            path,
            busy_timeout_ms,
        } => Box::new(SqliteStore::open(
            path,
            Duration::from_millis(*busy_timeout_ms),
        )?),
    };
    info!(?config, "storage backend opened");
    Ok(meta)
}
