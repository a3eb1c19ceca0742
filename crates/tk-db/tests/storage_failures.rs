//! Engine behavior when the backend fails part way through an operation.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use common::at;
use tk_core::{
    Employee, EmployeeId, EmployeeMeta, EmployeePartial, EmployeeSearch, Engine, Error, Result,
    TimeSlice, TimeSliceId, TimeSliceMeta, TimeSlicePartial, TimeSliceSearch, Timer, TimerChanges,
    TimerId, TimerMeta, TimerPartial, TimerSearch,
};
use tk_db::MemoryStore;

/// A memory store whose slice claims, slice closes and slice deletes can be
/// switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_claims: AtomicBool,
    fail_closes: AtomicBool,
    fail_deletes: AtomicBool,
}

fn disk_full(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(Error::storage("disk full"));
    }
    Ok(())
}

impl TimerMeta for FlakyStore {
    fn timer_create(&self, partial: TimerPartial) -> Result<Timer> {
        self.inner.timer_create(partial)
    }

    fn timer_read(&self, id: &TimerId) -> Result<Timer> {
        self.inner.timer_read(id)
    }

    fn timer_update(&self, id: &TimerId, partial: TimerPartial) -> Result<Timer> {
        self.inner.timer_update(id, partial)
    }

    fn timer_delete(&self, id: &TimerId) -> Result<()> {
        self.inner.timer_delete(id)
    }

    fn timer_search(&self, search: &TimerSearch) -> Result<Vec<Timer>> {
        self.inner.timer_search(search)
    }

    fn timer_active_slice_set(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        updated_by: &str,
    ) -> Result<bool> {
        disk_full(&self.fail_claims)?;
        self.inner.timer_active_slice_set(id, slice_id, updated_by)
    }

    fn timer_active_slice_close(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        at: DateTime<Utc>,
        patch: TimerPartial,
    ) -> Result<bool> {
        disk_full(&self.fail_closes)?;
        self.inner.timer_active_slice_close(id, slice_id, at, patch)
    }
}

impl TimeSliceMeta for FlakyStore {
    fn time_slice_create(&self, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.inner.time_slice_create(partial)
    }

    fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice> {
        self.inner.time_slice_read(id)
    }

    fn time_slice_update(&self, id: &TimeSliceId, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.inner.time_slice_update(id, partial)
    }

    fn time_slice_delete(&self, id: &TimeSliceId) -> Result<()> {
        disk_full(&self.fail_deletes)?;
        self.inner.time_slice_delete(id)
    }

    fn time_slice_search(&self, search: &TimeSliceSearch) -> Result<Vec<TimeSlice>> {
        self.inner.time_slice_search(search)
    }
}

impl EmployeeMeta for FlakyStore {
    fn employee_create(&self, partial: EmployeePartial) -> Result<Employee> {
        self.inner.employee_create(partial)
    }

    fn employee_read(&self, id: &EmployeeId) -> Result<Employee> {
        self.inner.employee_read(id)
    }

    fn employee_update(&self, id: &EmployeeId, partial: EmployeePartial) -> Result<Employee> {
        self.inner.employee_update(id, partial)
    }

    fn employee_delete(&self, id: &EmployeeId) -> Result<()> {
        self.inner.employee_delete(id)
    }

    fn employee_search(&self, search: &EmployeeSearch) -> Result<Vec<Employee>> {
        self.inner.employee_search(search)
    }
}

#[test]
fn failed_start_leaves_the_timer_stopped() {
    let store = FlakyStore::default();
    store.fail_claims.store(true, Ordering::SeqCst);
    store.fail_deletes.store(true, Ordering::SeqCst);
    let engine = Engine::new(Box::new(store), "tester");
    let timer = engine.timer_create(TimerChanges::default()).unwrap();

    let err = engine.timer_start(&timer.id, at(0)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "timer_start: storage unavailable: disk full"
    );

    // The undeletable slice stays open but is not the timer's active slice.
    let leftovers = engine
        .time_slice_search(&TimeSliceSearch::for_timer(&timer.id))
        .unwrap();
    assert_eq!(leftovers.len(), 1);
    assert!(leftovers[0].is_open());

    let stored = engine.timer_read_at(&timer.id, at(3_600)).unwrap();
    assert!(!stored.is_running());
    assert_eq!(stored.elapsed_ms, 0);
    assert_eq!(stored.start, None);
    assert_eq!(stored.audit.version, 1);

    let listed = engine
        .timer_search_at(&TimerSearch::default(), at(3_600))
        .unwrap();
    assert_eq!(listed[0].elapsed_ms, 0);
}

#[test]
fn failed_pause_leaves_the_timer_running() {
    let store = FlakyStore::default();
    store.fail_closes.store(true, Ordering::SeqCst);
    let engine = Engine::new(Box::new(store), "tester");
    let timer = engine.timer_create(TimerChanges::default()).unwrap();
    let started = engine.timer_start(&timer.id, at(0)).unwrap();
    let slice_id = started.active_time_slice_id.clone().unwrap();

    assert!(engine.timer_pause(&timer.id, at(10)).is_err());
    assert!(engine.timer_submit(&timer.id, at(10)).is_err());

    let stored = engine.timer_read_at(&timer.id, at(60)).unwrap();
    assert_eq!(stored.active_time_slice_id, Some(slice_id.clone()));
    assert!(!stored.completed);
    assert_eq!(stored.elapsed_ms, 60_000);
    assert_eq!(stored.audit.version, started.audit.version);
    assert!(engine.time_slice_read(&slice_id).unwrap().is_open());
}
