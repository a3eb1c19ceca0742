//! Timer lifecycle engine.
//!
//! The engine owns the only business rules: a timer is created empty, started
//! (opening a slice), paused (closing it), started again any number of times,
//! and finally submitted. All persistence goes through a [`Meta`] backend.
//!
//! # Policies
//!
//! - Starting a running timer is a no-op that returns its current state.
//! - Pausing a timer that is not running fails with `NoActiveSlice`.
//! - Pause and submit take `at`, the end time of the current slice; submit
//!   also stamps it as the timer's `finish`.
//! - Each lifecycle call that changes a timer does so in one storage write,
//!   so the timer's version rises by exactly one.
//! - Archived timers cannot be started. Completed timers cannot be started or
//!   submitted again; clearing `completed` through an update reopens them.
//!
//! No engine-level lock is held. Concurrent starts are arbitrated by
//! [`Meta::timer_active_slice_set`], which only one caller can win.
//!
//! [`Meta::timer_active_slice_set`]: crate::meta::TimerMeta::timer_active_slice_set

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::elapsed;
use crate::employee::{Employee, EmployeePartial, EmployeeSearch};
use crate::error::{EngineError, Error, Result};
use crate::meta::Meta;
use crate::time_slice::{TimeSlice, TimeSlicePartial, TimeSliceSearch};
use crate::timer::{Timer, TimerChanges, TimerPartial, TimerSearch};
use crate::types::{EmployeeId, Filter, TimeSliceId, TimerId, ValidationError};

/// Runs `f` and tags any error with the operation name.
fn annotate<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T, EngineError> {
    f().map_err(|error| EngineError { operation, error })
}

/// Lifecycle operations over a configured storage backend.
pub struct Engine {
    meta: Box<dyn Meta>,
    actor: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine writing `actor` as the audit author of its changes.
    pub fn new(meta: Box<dyn Meta>, actor: impl Into<String>) -> Self {
        Self {
            meta,
            actor: actor.into(),
        }
    }

    // ========== Timers ==========

    pub fn timer_create(&self, changes: TimerChanges) -> Result<Timer, EngineError> {
        annotate("timer_create", || {
            let timer = self.meta.timer_create(changes.into_partial(&self.actor))?;
            info!(timer_id = %timer.id, "timer created");
            Ok(timer)
        })
    }

    /// Reads a timer with its elapsed time computed as of now.
    pub fn timer_read(&self, id: &TimerId) -> Result<Timer, EngineError> {
        self.timer_read_at(id, Utc::now())
    }

    /// Reads a timer with its elapsed time computed as of `now`.
    pub fn timer_read_at(&self, id: &TimerId, now: DateTime<Utc>) -> Result<Timer, EngineError> {
        annotate("timer_read", || {
            let timer = self.meta.timer_read(id)?;
            self.with_elapsed(timer, now)
        })
    }

    pub fn timer_update(&self, id: &TimerId, changes: TimerChanges) -> Result<Timer, EngineError> {
        annotate("timer_update", || {
            let timer = self
                .meta
                .timer_update(id, changes.into_partial(&self.actor))?;
            debug!(timer_id = %id, version = timer.audit.version, "timer updated");
            self.with_elapsed(timer, Utc::now())
        })
    }

    pub fn timer_delete(&self, id: &TimerId) -> Result<(), EngineError> {
        annotate("timer_delete", || {
            self.meta.timer_delete(id)?;
            info!(timer_id = %id, "timer deleted");
            Ok(())
        })
    }

    pub fn timer_search(&self, search: &TimerSearch) -> Result<Vec<Timer>, EngineError> {
        self.timer_search_at(search, Utc::now())
    }

    /// Searches timers, computing each one's elapsed time as of `now`.
    pub fn timer_search_at(
        &self,
        search: &TimerSearch,
        now: DateTime<Utc>,
    ) -> Result<Vec<Timer>, EngineError> {
        annotate("timer_search", || {
            let timers = self.meta.timer_search(search)?;
            if timers.is_empty() {
                return Ok(timers);
            }
            let slices = self.meta.time_slice_search(&TimeSliceSearch {
                timer_id: Filter::AnyOf(timers.iter().map(|timer| timer.id.clone()).collect()),
                ..TimeSliceSearch::default()
            })?;
            let mut by_timer: HashMap<TimerId, Vec<TimeSlice>> = HashMap::new();
            for slice in slices {
                by_timer.entry(slice.timer_id.clone()).or_default().push(slice);
            }
            Ok(timers
                .into_iter()
                .map(|mut timer| {
                    let slices = by_timer.get(&timer.id).map_or(&[][..], Vec::as_slice);
                    timer.elapsed_ms = elapsed::elapsed_ms(&timer, slices, now);
                    timer
                })
                .collect())
        })
    }

    /// Opens a new slice at `at` unless one is already open.
    pub fn timer_start(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer, EngineError> {
        annotate("timer_start", || self.start(id, at))
    }

    /// Closes the open slice at `at`.
    pub fn timer_pause(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer, EngineError> {
        annotate("timer_pause", || self.pause(id, at))
    }

    /// Closes any open slice at `at` and marks the timer completed.
    pub fn timer_submit(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer, EngineError> {
        annotate("timer_submit", || self.submit(id, at))
    }

    // ========== Time slices ==========

    pub fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice, EngineError> {
        annotate("time_slice_read", || self.meta.time_slice_read(id))
    }

    pub fn time_slice_delete(&self, id: &TimeSliceId) -> Result<(), EngineError> {
        annotate("time_slice_delete", || {
            self.meta.time_slice_delete(id)?;
            info!(slice_id = %id, "time slice deleted");
            Ok(())
        })
    }

    pub fn time_slice_search(
        &self,
        search: &TimeSliceSearch,
    ) -> Result<Vec<TimeSlice>, EngineError> {
        annotate("time_slice_search", || self.meta.time_slice_search(search))
    }

    // ========== Employees ==========

    pub fn employee_create(&self, mut partial: EmployeePartial) -> Result<Employee, EngineError> {
        annotate("employee_create", || {
            partial.updated_by = Some(self.actor.clone());
            let employee = self.meta.employee_create(partial)?;
            info!(employee_id = %employee.id, "employee created");
            Ok(employee)
        })
    }

    pub fn employee_read(&self, id: &EmployeeId) -> Result<Employee, EngineError> {
        annotate("employee_read", || self.meta.employee_read(id))
    }

    pub fn employee_update(
        &self,
        id: &EmployeeId,
        mut partial: EmployeePartial,
    ) -> Result<Employee, EngineError> {
        annotate("employee_update", || {
            partial.updated_by = Some(self.actor.clone());
            self.meta.employee_update(id, partial)
        })
    }

    pub fn employee_delete(&self, id: &EmployeeId) -> Result<(), EngineError> {
        annotate("employee_delete", || {
            self.meta.employee_delete(id)?;
            info!(employee_id = %id, "employee deleted");
            Ok(())
        })
    }

    pub fn employee_search(&self, search: &EmployeeSearch) -> Result<Vec<Employee>, EngineError> {
        annotate("employee_search", || self.meta.employee_search(search))
    }

    // ========== Lifecycle ==========

    fn start(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer> {
        let timer = self.meta.timer_read(id)?;
        if timer.archived {
            return Err(Error::AlreadyArchived { id: id.clone() });
        }
        if timer.completed {
            return Err(Error::AlreadyCompleted { id: id.clone() });
        }
        if timer.is_running() {
            debug!(timer_id = %id, "timer already running");
            return self.with_elapsed(timer, at);
        }

        let slice = self.meta.time_slice_create(TimeSlicePartial {
            timer_id: Some(id.clone()),
            start: Some(at),
            updated_by: Some(self.actor.clone()),
            ..TimeSlicePartial::default()
        })?;
        let claimed = match self.meta.timer_active_slice_set(id, &slice.id, &self.actor) {
            Ok(claimed) => claimed,
            Err(err) => {
                self.discard_slice(&slice.id);
                return Err(err);
            }
        };
        if !claimed {
            warn!(timer_id = %id, slice_id = %slice.id, "lost concurrent start, discarding slice");
            self.discard_slice(&slice.id);
            let timer = self.meta.timer_read(id)?;
            return self.with_elapsed(timer, at);
        }

        let timer = self.meta.timer_read(id)?;
        info!(timer_id = %id, slice_id = %slice.id, "timer started");
        self.with_elapsed(timer, at)
    }

    fn pause(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer> {
        let timer = self.meta.timer_read(id)?;
        let Some(slice_id) = timer.active_time_slice_id else {
            return Err(Error::NoActiveSlice { id: id.clone() });
        };
        let patch = TimerPartial {
            updated_by: Some(self.actor.clone()),
            ..TimerPartial::default()
        };
        if !self.meta.timer_active_slice_close(id, &slice_id, at, patch)? {
            return Err(Error::NoActiveSlice { id: id.clone() });
        }
        info!(timer_id = %id, slice_id = %slice_id, "timer paused");
        let timer = self.meta.timer_read(id)?;
        self.with_elapsed(timer, at)
    }

    fn submit(&self, id: &TimerId, at: DateTime<Utc>) -> Result<Timer> {
        let timer = self.meta.timer_read(id)?;
        if timer.completed {
            return Err(Error::AlreadyCompleted { id: id.clone() });
        }
        if timer.start.is_some_and(|start| at < start) {
            return Err(ValidationError::FinishBeforeStart.into());
        }
        let patch = TimerPartial {
            finish: Some(at),
            completed: Some(true),
            updated_by: Some(self.actor.clone()),
            ..TimerPartial::default()
        };
        let closed = match &timer.active_time_slice_id {
            Some(slice_id) => self
                .meta
                .timer_active_slice_close(id, slice_id, at, patch.clone())?,
            None => false,
        };
        let timer = if closed {
            self.meta.timer_read(id)?
        } else {
            // Nothing was open, or a concurrent pause closed it first.
            self.meta.timer_update(id, patch)?
        };
        info!(timer_id = %id, "timer submitted");
        self.with_elapsed(timer, at)
    }

    fn discard_slice(&self, slice_id: &TimeSliceId) {
        if let Err(err) = self.meta.time_slice_delete(slice_id) {
            warn!(slice_id = %slice_id, error = %err, "failed to discard time slice");
        }
    }

    fn with_elapsed(&self, mut timer: Timer, now: DateTime<Utc>) -> Result<Timer> {
        let slices = self
            .meta
            .time_slice_search(&TimeSliceSearch::for_timer(&timer.id))?;
        timer.elapsed_ms = elapsed::elapsed_ms(&timer, &slices, now);
        Ok(timer)
    }
}
