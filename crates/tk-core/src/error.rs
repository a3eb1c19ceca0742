//! Error taxonomy shared by every backend and the engine.

use thiserror::Error;

use crate::types::{Entity, TimerId, ValidationError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by storage backends and passed through by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No entity of this type has the given ID.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The timer is archived and cannot be started.
    #[error("timer {id} is archived")]
    AlreadyArchived { id: TimerId },

    /// The timer has been submitted.
    #[error("timer {id} is already completed")]
    AlreadyCompleted { id: TimerId },

    /// Pause was requested but the timer is not running.
    #[error("timer {id} has no active time slice")]
    NoActiveSlice { id: TimerId },

    /// A delete was blocked because other entities still reference this one.
    #[error("cannot delete {entity} {id}: still referenced by a {dependent}")]
    ReferentialIntegrity {
        entity: Entity,
        id: String,
        dependent: Entity,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend could not be reached, read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn not_found(entity: Entity, id: impl AsRef<str>) -> Self {
        Self::NotFound {
            entity,
            id: id.as_ref().to_string(),
        }
    }

    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::StorageUnavailable(source.into())
    }
}

/// An error from an engine operation, annotated with the operation's name.
///
/// The wrapped [`Error`] is exactly what the backend (or the lifecycle rules)
/// produced. It is already part of the message, so it is not reported again
/// as the error source.
#[derive(Debug, Error)]
#[error("{operation}: {error}")]
pub struct EngineError {
    pub operation: &'static str,
    pub error: Error,
}
