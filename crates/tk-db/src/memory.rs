//! Map-based store guarded by a single readers-writer lock.
//!
//! All entity types share one lock, so a write that checks another entity type
//! (an employee's timers, a timer's slices) sees a consistent snapshot. Every
//! operation checks its preconditions before mutating, so a rejected call
//! leaves the state untouched.
//!
//! The same store backs [`crate::FileStore`] through the [`Persist`] hook.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tk_core::elapsed::closed_elapsed_ms;
use tk_core::{
    Employee, EmployeeId, EmployeeMeta, EmployeePartial, EmployeeSearch, Entity, Error, Result,
    TimeSlice, TimeSliceId, TimeSliceMeta, TimeSlicePartial, TimeSliceSearch, Timer, TimerId,
    TimerMeta, TimerPartial, TimerSearch, ValidationError,
};

use crate::DbError;

/// Everything a memory-backed store holds.
///
/// Maps are ordered by ID, which fixes search order and keeps the serialized
/// document stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub timers: BTreeMap<TimerId, Timer>,
    #[serde(default)]
    pub time_slices: BTreeMap<TimeSliceId, TimeSlice>,
    #[serde(default)]
    pub employees: BTreeMap<EmployeeId, Employee>,
}

impl State {
    fn slices_of(&self, timer_id: &TimerId) -> Vec<TimeSlice> {
        self.time_slices
            .values()
            .filter(|slice| &slice.timer_id == timer_id)
            .cloned()
            .collect()
    }

    /// A copy of the timer with elapsed time summed over its closed slices.
    fn reported(&self, timer: &Timer) -> Timer {
        let mut timer = timer.clone();
        timer.elapsed_ms = closed_elapsed_ms(&timer, &self.slices_of(&timer.id));
        timer
    }

    fn timer(&self, id: &TimerId) -> Result<&Timer> {
        self.timers
            .get(id)
            .ok_or_else(|| Error::not_found(Entity::Timer, id))
    }

    fn time_slice(&self, id: &TimeSliceId) -> Result<&TimeSlice> {
        self.time_slices
            .get(id)
            .ok_or_else(|| Error::not_found(Entity::TimeSlice, id))
    }

    fn employee(&self, id: &EmployeeId) -> Result<&Employee> {
        self.employees
            .get(id)
            .ok_or_else(|| Error::not_found(Entity::Employee, id))
    }

    fn ensure_email_free(&self, email: &str, owner: Option<&EmployeeId>) -> Result<()> {
        let taken = self
            .employees
            .values()
            .any(|employee| employee.email_address == email && Some(&employee.id) != owner);
        if taken {
            return Err(ValidationError::DuplicateEmail {
                email: email.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // ========== Timers ==========

    pub(crate) fn timer_create(&mut self, partial: TimerPartial, now: DateTime<Utc>) -> Result<Timer> {
        if let Some(employee_id) = partial.employee() {
            self.employee(employee_id)?;
        }
        let timer = Timer::create(partial, now);
        self.timers.insert(timer.id.clone(), timer.clone());
        Ok(timer)
    }

    pub(crate) fn timer_read(&self, id: &TimerId) -> Result<Timer> {
        Ok(self.reported(self.timer(id)?))
    }

    pub(crate) fn timer_update(
        &mut self,
        id: &TimerId,
        partial: TimerPartial,
        now: DateTime<Utc>,
    ) -> Result<Timer> {
        let mut timer = self.timer(id)?.clone();
        if let Some(employee_id) = partial.employee() {
            self.employee(employee_id)?;
        }
        partial.apply(&mut timer, now);
        let reported = self.reported(&timer);
        self.timers.insert(id.clone(), timer);
        Ok(reported)
    }

    pub(crate) fn timer_delete(&mut self, id: &TimerId) -> Result<()> {
        self.timer(id)?;
        if self.time_slices.values().any(|slice| &slice.timer_id == id) {
            return Err(Error::ReferentialIntegrity {
                entity: Entity::Timer,
                id: id.to_string(),
                dependent: Entity::TimeSlice,
            });
        }
        self.timers.remove(id);
        Ok(())
    }

    pub(crate) fn timer_search(&self, search: &TimerSearch) -> Vec<Timer> {
        self.timers
            .values()
            .filter(|timer| search.matches(timer))
            .map(|timer| self.reported(timer))
            .collect()
    }

    pub(crate) fn timer_active_slice_set(
        &mut self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        updated_by: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let timer = self.timer(id)?;
        let slice = self.time_slice(slice_id)?;
        if &slice.timer_id != id {
            return Err(Error::not_found(Entity::TimeSlice, slice_id));
        }
        if timer.active_time_slice_id.is_some() {
            return Ok(false);
        }
        let start = slice.start;
        if let Some(timer) = self.timers.get_mut(id) {
            timer.active_time_slice_id = Some(slice_id.clone());
            timer.start.get_or_insert(start);
            timer.audit.touch(Some(updated_by), now);
        }
        Ok(true)
    }

    pub(crate) fn timer_active_slice_close(
        &mut self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        at: DateTime<Utc>,
        patch: TimerPartial,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut timer = self.timer(id)?.clone();
        if timer.active_time_slice_id.as_ref() != Some(slice_id) {
            return Ok(false);
        }
        let mut slice = self.time_slice(slice_id)?.clone();
        TimeSlicePartial::closing(at, patch.updated_by.clone()).apply(&mut slice, now)?;
        if let Some(employee_id) = patch.employee() {
            self.employee(employee_id)?;
        }
        timer.active_time_slice_id = None;
        patch.apply(&mut timer, now);
        self.time_slices.insert(slice_id.clone(), slice);
        self.timers.insert(id.clone(), timer);
        Ok(true)
    }

    // ========== Time slices ==========

    pub(crate) fn time_slice_create(
        &mut self,
        partial: TimeSlicePartial,
        now: DateTime<Utc>,
    ) -> Result<TimeSlice> {
        if let Some(timer_id) = &partial.timer_id {
            self.timer(timer_id)?;
        }
        let slice = TimeSlice::create(partial, now)?;
        self.time_slices.insert(slice.id.clone(), slice.clone());
        Ok(slice)
    }

    pub(crate) fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice> {
        self.time_slice(id).cloned()
    }

    pub(crate) fn time_slice_update(
        &mut self,
        id: &TimeSliceId,
        partial: TimeSlicePartial,
        now: DateTime<Utc>,
    ) -> Result<TimeSlice> {
        let mut slice = self.time_slice(id)?.clone();
        partial.apply(&mut slice, now)?;
        self.time_slices.insert(id.clone(), slice.clone());
        Ok(slice)
    }

    pub(crate) fn time_slice_delete(&mut self, id: &TimeSliceId, now: DateTime<Utc>) -> Result<()> {
        let timer_id = self.time_slice(id)?.timer_id.clone();
        if let Some(timer) = self.timers.get_mut(&timer_id) {
            if timer.active_time_slice_id.as_ref() == Some(id) {
                timer.active_time_slice_id = None;
                timer.audit.touch(None, now);
            }
        }
        self.time_slices.remove(id);
        Ok(())
    }

    pub(crate) fn time_slice_search(&self, search: &TimeSliceSearch) -> Vec<TimeSlice> {
        self.time_slices
            .values()
            .filter(|slice| search.matches(slice))
            .cloned()
            .collect()
    }

    // ========== Employees ==========

    pub(crate) fn employee_create(
        &mut self,
        partial: EmployeePartial,
        now: DateTime<Utc>,
    ) -> Result<Employee> {
        let employee = Employee::create(partial, now)?;
        self.ensure_email_free(&employee.email_address, None)?;
        self.employees.insert(employee.id.clone(), employee.clone());
        Ok(employee)
    }

    pub(crate) fn employee_read(&self, id: &EmployeeId) -> Result<Employee> {
        self.employee(id).cloned()
    }

    pub(crate) fn employee_update(
        &mut self,
        id: &EmployeeId,
        partial: EmployeePartial,
        now: DateTime<Utc>,
    ) -> Result<Employee> {
        let mut employee = self.employee(id)?.clone();
        if let Some(email) = partial.email() {
            self.ensure_email_free(email, Some(id))?;
        }
        partial.apply(&mut employee, now)?;
        self.employees.insert(id.clone(), employee.clone());
        Ok(employee)
    }

    pub(crate) fn employee_delete(&mut self, id: &EmployeeId) -> Result<()> {
        self.employee(id)?;
        if self
            .timers
            .values()
            .any(|timer| timer.employee_id.as_ref() == Some(id))
        {
            return Err(Error::ReferentialIntegrity {
                entity: Entity::Employee,
                id: id.to_string(),
                dependent: Entity::Timer,
            });
        }
        self.employees.remove(id);
        Ok(())
    }

    pub(crate) fn employee_search(&self, search: &EmployeeSearch) -> Vec<Employee> {
        self.employees
            .values()
            .filter(|employee| search.matches(employee))
            .cloned()
            .collect()
    }
}

/// Durability hook run on every mutation, under the write lock.
pub trait Persist: Send + Sync {
    /// Whether `save` does anything. Volatile stores skip staging a copy.
    const DURABLE: bool;

    /// Stores the proposed next state. On error the mutation is discarded.
    fn save(&self, state: &State) -> Result<(), DbError>;
}

/// No durability: state lives and dies with the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct Volatile;

impl Persist for Volatile {
    const DURABLE: bool = false;

    fn save(&self, _state: &State) -> Result<(), DbError> {
        Ok(())
    }
}

/// Entity store over [`State`], optionally persisted through `P`.
#[derive(Debug, Default)]
pub struct MemoryStore<P: Persist = Volatile> {
    state: RwLock<State>,
    persist: P,
}

impl MemoryStore {
    /// Creates an empty volatile store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: Persist> MemoryStore<P> {
    /// Creates a store seeded with `state`.
    pub fn with_state(state: State, persist: P) -> Self {
        Self {
            state: RwLock::new(state),
            persist,
        }
    }

    /// A deep copy of the current state.
    pub fn snapshot(&self) -> Result<State> {
        Ok(self.read_lock()?.clone())
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, State>, DbError> {
        self.state.read().map_err(|_| DbError::Poisoned)
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, State>, DbError> {
        self.state.write().map_err(|_| DbError::Poisoned)
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let state = self.read_lock()?;
        f(&state)
    }

    /// Applies `f` under the write lock. Durable stores mutate a copy and
    /// swap it in only after it has been saved.
    fn write<T>(&self, f: impl FnOnce(&mut State, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let mut state = self.write_lock()?;
        let now = Utc::now();
        if !P::DURABLE {
            return f(&mut state, now);
        }
        let mut next = state.clone();
        let out = f(&mut next, now)?;
        self.persist.save(&next)?;
        *state = next;
        Ok(out)
    }
}

impl<P: Persist> TimerMeta for MemoryStore<P> {
    fn timer_create(&self, partial: TimerPartial) -> Result<Timer> {
        self.write(|state, now| state.timer_create(partial, now))
    }

    fn timer_read(&self, id: &TimerId) -> Result<Timer> {
        self.read(|state| state.timer_read(id))
    }

    fn timer_update(&self, id: &TimerId, partial: TimerPartial) -> Result<Timer> {
        self.write(|state, now| state.timer_update(id, partial, now))
    }

    fn timer_delete(&self, id: &TimerId) -> Result<()> {
        self.write(|state, _| state.timer_delete(id))
    }

    fn timer_search(&self, search: &TimerSearch) -> Result<Vec<Timer>> {
        debug!(?search, "searching timers");
        self.read(|state| Ok(state.timer_search(search)))
    }

    fn timer_active_slice_set(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        updated_by: &str,
    ) -> Result<bool> {
        self.write(|state, now| state.timer_active_slice_set(id, slice_id, updated_by, now))
    }

    fn timer_active_slice_close(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        at: DateTime<Utc>,
        patch: TimerPartial,
    ) -> Result<bool> {
        self.write(|state, now| state.timer_active_slice_close(id, slice_id, at, patch, now))
    }
}

impl<P: Persist> TimeSliceMeta for MemoryStore<P> {
    fn time_slice_create(&self, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.write(|state, now| state.time_slice_create(partial, now))
    }

    fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice> {
        self.read(|state| state.time_slice_read(id))
    }

    fn time_slice_update(&self, id: &TimeSliceId, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.write(|state, now| state.time_slice_update(id, partial, now))
    }

    fn time_slice_delete(&self, id: &TimeSliceId) -> Result<()> {
        self.write(|state, now| state.time_slice_delete(id, now))
    }

    fn time_slice_search(&self, search: &TimeSliceSearch) -> Result<Vec<TimeSlice>> {
        debug!(?search, "searching time slices");
        self.read(|state| Ok(state.time_slice_search(search)))
    }
}

impl<P: Persist> EmployeeMeta for MemoryStore<P> {
    fn employee_create(&self, partial: EmployeePartial) -> Result<Employee> {
        self.write(|state, now| state.employee_create(partial, now))
    }

    fn employee_read(&self, id: &EmployeeId) -> Result<Employee> {
        self.read(|state| state.employee_read(id))
    }

    fn employee_update(&self, id: &EmployeeId, partial: EmployeePartial) -> Result<Employee> {
        self.write(|state, now| state.employee_update(id, partial, now))
    }

    fn employee_delete(&self, id: &EmployeeId) -> Result<()> {
        self.write(|state, _| state.employee_delete(id))
    }

    fn employee_search(&self, search: &EmployeeSearch) -> Result<Vec<Employee>> {
        debug!(?search, "searching employees");
        self.read(|state| Ok(state.employee_search(search)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tk_core::Filter;

    use super::*;

    fn start_slice(store: &MemoryStore, timer_id: &TimerId, start: DateTime<Utc>) -> TimeSlice {
        store
            .time_slice_create(TimeSlicePartial {
                timer_id: Some(timer_id.clone()),
                start: Some(start),
                ..TimeSlicePartial::default()
            })
            .unwrap()
    }

    #[test]
    fn read_returns_independent_copies() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();

        let mut copy = store.timer_read(&timer.id).unwrap();
        copy.comment = "mutated by caller".to_string();

        assert_eq!(store.timer_read(&timer.id).unwrap().comment, "");
    }

    #[test]
    fn timer_read_sums_closed_slices_only() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();
        let t0 = Utc::now() - Duration::seconds(60);

        let closed = start_slice(&store, &timer.id, t0);
        store
            .time_slice_update(
                &closed.id,
                TimeSlicePartial {
                    finish: Some(t0 + Duration::seconds(10)),
                    ..TimeSlicePartial::default()
                },
            )
            .unwrap();
        start_slice(&store, &timer.id, t0 + Duration::seconds(20));

        assert_eq!(store.timer_read(&timer.id).unwrap().elapsed_ms, 10_000);
    }

    #[test]
    fn active_slice_can_only_be_claimed_once() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();
        let first = start_slice(&store, &timer.id, Utc::now());
        let second = start_slice(&store, &timer.id, Utc::now());

        assert!(store.timer_active_slice_set(&timer.id, &first.id, "a").unwrap());
        assert!(!store.timer_active_slice_set(&timer.id, &second.id, "b").unwrap());

        let stored = store.timer_read(&timer.id).unwrap();
        assert_eq!(stored.active_time_slice_id, Some(first.id.clone()));
        assert_eq!(stored.audit.version, 2);
        assert_eq!(stored.audit.last_updated_by, "a");

        assert_eq!(stored.start, Some(first.start));
    }

    #[test]
    fn closing_the_active_slice_is_one_timer_mutation() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();
        let t0 = Utc::now() - Duration::seconds(60);
        let first = start_slice(&store, &timer.id, t0);
        let second = start_slice(&store, &timer.id, t0);
        store.timer_active_slice_set(&timer.id, &first.id, "a").unwrap();
        let patch = TimerPartial {
            finish: Some(t0 + Duration::seconds(30)),
            completed: Some(true),
            updated_by: Some("b".to_string()),
            ..TimerPartial::default()
        };

        let before = store.snapshot().unwrap();
        assert!(
            !store
                .timer_active_slice_close(&timer.id, &second.id, t0, patch.clone())
                .unwrap()
        );
        let early = t0 - Duration::seconds(1);
        assert!(
            store
                .timer_active_slice_close(&timer.id, &first.id, early, patch.clone())
                .is_err()
        );
        assert_eq!(store.snapshot().unwrap(), before);

        let at = t0 + Duration::seconds(30);
        assert!(store.timer_active_slice_close(&timer.id, &first.id, at, patch).unwrap());

        let stored = store.timer_read(&timer.id).unwrap();
        assert!(stored.active_time_slice_id.is_none());
        assert!(stored.completed);
        assert_eq!(stored.audit.version, 3);
        assert_eq!(stored.audit.last_updated_by, "b");
        assert_eq!(stored.elapsed_ms, 30_000);

        let closed = store.time_slice_read(&first.id).unwrap();
        assert_eq!(closed.finish, Some(at));
        assert!(closed.completed);
    }

    #[test]
    fn deleting_active_slice_clears_timer() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();
        let slice = start_slice(&store, &timer.id, Utc::now());
        store.timer_active_slice_set(&timer.id, &slice.id, "a").unwrap();

        store.time_slice_delete(&slice.id).unwrap();

        let stored = store.timer_read(&timer.id).unwrap();
        assert!(stored.active_time_slice_id.is_none());
        assert_eq!(stored.audit.version, 3);
    }

    #[test]
    fn rejected_update_leaves_state_untouched() {
        let store = MemoryStore::new();
        let timer = store.timer_create(TimerPartial::default()).unwrap();
        let before = store.snapshot().unwrap();

        let err = store
            .timer_update(
                &timer.id,
                TimerPartial {
                    comment: Some("new".to_string()),
                    employee_id: Some(Some(EmployeeId::new("missing").unwrap())),
                    ..TimerPartial::default()
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            Error::NotFound {
                entity: Entity::Employee,
                ..
            }
        ));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn search_with_empty_list_matches_nothing() {
        let store = MemoryStore::new();
        store.timer_create(TimerPartial::default()).unwrap();

        let found = store
            .timer_search(&TimerSearch {
                id: Filter::AnyOf(Vec::new()),
                ..TimerSearch::default()
            })
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(store.timer_search(&TimerSearch::default()).unwrap().len(), 1);
    }
}
