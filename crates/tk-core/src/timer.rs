//! Timers - a billable unit of work measured by its time slices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{EmployeeId, Filter, TimeSliceId, TimerId};

/// A unit of work whose duration is the sum of its time slices.
///
/// `elapsed_ms` is derived: backends and the engine recompute it on every
/// read and never treat a stored value as ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,

    #[serde(default)]
    pub comment: String,

    /// Start of the first slice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// Set on submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<DateTime<Utc>>,

    #[serde(default)]
    pub elapsed_ms: i64,

    /// The open slice, if the timer is running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_time_slice_id: Option<TimeSliceId>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub billed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,

    pub audit: Audit,
}

impl Timer {
    /// Builds a new timer from a partial, applying defaults for absent fields.
    pub fn create(partial: TimerPartial, now: DateTime<Utc>) -> Self {
        let mut timer = Self {
            id: TimerId::generate(),
            comment: String::new(),
            start: None,
            finish: None,
            elapsed_ms: 0,
            active_time_slice_id: None,
            completed: false,
            archived: false,
            billed: false,
            employee_id: None,
            audit: Audit::new(partial.updated_by.clone(), now),
        };
        partial.apply_fields(&mut timer);
        timer
    }

    /// Returns true while a slice is open.
    pub const fn is_running(&self) -> bool {
        self.active_time_slice_id.is_some()
    }

    pub const fn elapsed(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.elapsed_ms)
    }
}

/// Patch for a stored timer; `None` leaves a field untouched.
///
/// `employee_id` is doubly optional: `Some(None)` detaches the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerPartial {
    pub comment: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub archived: Option<bool>,
    pub billed: Option<bool>,
    pub employee_id: Option<Option<EmployeeId>>,
    pub updated_by: Option<String>,
}

impl TimerPartial {
    /// Applies the patch and records the mutation in the audit block.
    pub fn apply(self, timer: &mut Timer, now: DateTime<Utc>) {
        timer.audit.touch(self.updated_by.as_deref(), now);
        self.apply_fields(timer);
    }

    fn apply_fields(self, timer: &mut Timer) {
        if let Some(comment) = self.comment {
            timer.comment = comment;
        }
        if let Some(start) = self.start {
            timer.start = Some(start);
        }
        if let Some(finish) = self.finish {
            timer.finish = Some(finish);
        }
        if let Some(completed) = self.completed {
            timer.completed = completed;
        }
        if let Some(archived) = self.archived {
            timer.archived = archived;
        }
        if let Some(billed) = self.billed {
            timer.billed = billed;
        }
        if let Some(employee_id) = self.employee_id {
            timer.employee_id = employee_id;
        }
    }

    /// The employee this patch attaches, if any.
    pub fn employee(&self) -> Option<&EmployeeId> {
        self.employee_id.as_ref().and_then(Option::as_ref)
    }
}

/// The caller-mutable subset of a timer's fields.
///
/// Lifecycle fields (`start`, `finish`, the active slice) only change through
/// the engine's start/pause/submit operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerChanges {
    pub comment: Option<String>,
    pub completed: Option<bool>,
    pub archived: Option<bool>,
    pub billed: Option<bool>,
    pub employee_id: Option<Option<EmployeeId>>,
}

impl TimerChanges {
    pub(crate) fn into_partial(self, updated_by: &str) -> TimerPartial {
        TimerPartial {
            comment: self.comment,
            completed: self.completed,
            archived: self.archived,
            billed: self.billed,
            employee_id: self.employee_id,
            updated_by: Some(updated_by.to_string()),
            ..TimerPartial::default()
        }
    }
}

/// Search criteria for timers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerSearch {
    pub id: Filter<TimerId>,
    pub employee_id: Filter<EmployeeId>,
    pub completed: Filter<bool>,
    pub archived: Filter<bool>,
    pub billed: Filter<bool>,
}

impl TimerSearch {
    pub fn matches(&self, timer: &Timer) -> bool {
        self.id.matches(&timer.id)
            && self.employee_id.matches_option(timer.employee_id.as_ref())
            && self.completed.matches(&timer.completed)
            && self.archived.matches(&timer.archived)
            && self.billed.matches(&timer.billed)
    }
}
