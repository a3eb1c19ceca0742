//! The storage contract every backend implements.
//!
//! Backends own their state exclusively and hand out copies, never references
//! into it. They enforce referential integrity and field validation but hold
//! no lifecycle rules; those live in [`crate::Engine`].
//!
//! # Shared semantics
//!
//! - `*_create` assigns a fresh ID, applies defaults and sets `audit.version = 1`.
//! - `*_read`, `*_update`, `*_delete` fail with [`Error::NotFound`] for unknown IDs.
//! - `*_update` applies only the provided fields and bumps the version by one.
//! - `*_search` ANDs criteria across fields and returns results ordered by ID.
//! - Reported `Timer::elapsed_ms` is the sum of the timer's closed slices; the
//!   live delta of the active slice is added by the engine.
//!
//! [`Error::NotFound`]: crate::Error::NotFound

use chrono::{DateTime, Utc};

use crate::employee::{Employee, EmployeePartial, EmployeeSearch};
use crate::error::Result;
use crate::time_slice::{TimeSlice, TimeSlicePartial, TimeSliceSearch};
use crate::timer::{Timer, TimerPartial, TimerSearch};
use crate::types::{EmployeeId, TimeSliceId, TimerId};

pub trait TimerMeta {
    /// Fails with `NotFound(employee)` if the partial references an unknown employee.
    fn timer_create(&self, partial: TimerPartial) -> Result<Timer>;

    fn timer_read(&self, id: &TimerId) -> Result<Timer>;

    fn timer_update(&self, id: &TimerId, partial: TimerPartial) -> Result<Timer>;

    /// Fails with `ReferentialIntegrity` while any slice references the timer.
    fn timer_delete(&self, id: &TimerId) -> Result<()>;

    fn timer_search(&self, search: &TimerSearch) -> Result<Vec<Timer>>;

    /// Marks `slice_id` as the timer's open slice if it has none.
    ///
    /// A timer that has never run also takes the slice's start as its `start`.
    /// Returns `false`, changing nothing, when another slice is already active.
    /// This is the only way a slice becomes active, so concurrent callers can
    /// never leave a timer with two open slices.
    fn timer_active_slice_set(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        updated_by: &str,
    ) -> Result<bool>;

    /// Closes the timer's open slice at `at` and applies `patch` to the timer,
    /// all in one write.
    ///
    /// The slice gets its finish time and is marked completed, the association
    /// is released, and the timer's version rises by one. Returns `false`,
    /// changing nothing, when `slice_id` is not the active one. Fails with
    /// `FinishBeforeStart` if `at` precedes the slice's start.
    fn timer_active_slice_close(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        at: DateTime<Utc>,
        patch: TimerPartial,
    ) -> Result<bool>;
}

pub trait TimeSliceMeta {
    /// Fails with `NotFound(timer)` if the referenced timer does not exist.
    fn time_slice_create(&self, partial: TimeSlicePartial) -> Result<TimeSlice>;

    fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice>;

    fn time_slice_update(&self, id: &TimeSliceId, partial: TimeSlicePartial) -> Result<TimeSlice>;

    /// Always allowed. Deleting a timer's active slice also clears it from the timer.
    fn time_slice_delete(&self, id: &TimeSliceId) -> Result<()>;

    fn time_slice_search(&self, search: &TimeSliceSearch) -> Result<Vec<TimeSlice>>;
}

pub trait EmployeeMeta {
    /// Fails with a validation error if the email is missing or already used.
    fn employee_create(&self, partial: EmployeePartial) -> Result<Employee>;

    fn employee_read(&self, id: &EmployeeId) -> Result<Employee>;

    fn employee_update(&self, id: &EmployeeId, partial: EmployeePartial) -> Result<Employee>;

    /// Fails with `ReferentialIntegrity` while any timer references the employee.
    fn employee_delete(&self, id: &EmployeeId) -> Result<()>;

    fn employee_search(&self, search: &EmployeeSearch) -> Result<Vec<Employee>>;
}

/// A complete storage backend.
pub trait Meta: TimerMeta + TimeSliceMeta + EmployeeMeta + Send + Sync {}

impl<T> Meta for T where T: TimerMeta + TimeSliceMeta + EmployeeMeta + Send + Sync {}
