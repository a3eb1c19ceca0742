//! Time slices - one start/pause cycle of a timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::elapsed::slice_elapsed_ms;
use crate::types::{Filter, TimeSliceId, TimerId, ValidationError};

/// A contiguous period of work on a timer.
///
/// `timer_id` is a back-reference; the slice does not own the timer.
/// A slice with no `finish` is open, and `elapsed_ms` is only meaningful once
/// it is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlice {
    pub id: TimeSliceId,
    pub timer_id: TimerId,
    pub start: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<DateTime<Utc>>,

    #[serde(default)]
    pub elapsed_ms: i64,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub archived: bool,

    pub audit: Audit,
}

impl TimeSlice {
    /// Builds a new slice. `timer_id` and `start` are required.
    pub fn create(partial: TimeSlicePartial, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let timer_id = partial
            .timer_id
            .clone()
            .ok_or(ValidationError::Missing { field: "timer ID" })?;
        let start = partial
            .start
            .ok_or(ValidationError::Missing { field: "start" })?;
        let mut slice = Self {
            id: TimeSliceId::generate(),
            timer_id,
            start,
            finish: None,
            elapsed_ms: 0,
            completed: false,
            archived: false,
            audit: Audit::new(partial.updated_by.clone(), now),
        };
        partial.apply_fields(&mut slice)?;
        Ok(slice)
    }

    pub const fn is_open(&self) -> bool {
        self.finish.is_none()
    }
}

/// Patch for a stored time slice; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSlicePartial {
    /// Only honoured on create; a slice never moves to another timer.
    pub timer_id: Option<TimerId>,
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub archived: Option<bool>,
    pub updated_by: Option<String>,
}

impl TimeSlicePartial {
    /// The patch that ends a slice at `at`.
    pub fn closing(at: DateTime<Utc>, updated_by: Option<String>) -> Self {
        Self {
            finish: Some(at),
            completed: Some(true),
            updated_by,
            ..Self::default()
        }
    }

    /// Validates and applies the patch, recording the mutation in the audit
    /// block. On error the slice is left untouched.
    pub fn apply(self, slice: &mut TimeSlice, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let mut next = slice.clone();
        next.audit.touch(self.updated_by.as_deref(), now);
        self.apply_fields(&mut next)?;
        *slice = next;
        Ok(())
    }

    fn apply_fields(self, slice: &mut TimeSlice) -> Result<(), ValidationError> {
        if let Some(timer_id) = self.timer_id {
            if timer_id != slice.timer_id {
                return Err(ValidationError::Immutable { field: "timer ID" });
            }
        }
        if let Some(start) = self.start {
            slice.start = start;
        }
        if let Some(finish) = self.finish {
            slice.finish = Some(finish);
        }
        if let Some(finish) = slice.finish {
            if finish < slice.start {
                return Err(ValidationError::FinishBeforeStart);
            }
            slice.elapsed_ms = slice_elapsed_ms(slice.start, finish);
        }
        if let Some(completed) = self.completed {
            slice.completed = completed;
        }
        if let Some(archived) = self.archived {
            slice.archived = archived;
        }
        Ok(())
    }
}

/// Search criteria for time slices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSliceSearch {
    pub id: Filter<TimeSliceId>,
    pub timer_id: Filter<TimerId>,
    pub completed: Filter<bool>,
    pub archived: Filter<bool>,
}

impl TimeSliceSearch {
    /// All slices belonging to one timer.
    pub fn for_timer(timer_id: &TimerId) -> Self {
        Self {
            timer_id: Filter::Is(timer_id.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, slice: &TimeSlice) -> bool {
        self.id.matches(&slice.id)
            && self.timer_id.matches(&slice.timer_id)
            && self.completed.matches(&slice.completed)
            && self.archived.matches(&slice.archived)
    }
}
