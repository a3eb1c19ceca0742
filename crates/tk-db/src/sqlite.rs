//! Relational store on SQLite.
//!
//! # Schema
//!
//! - `employee`: one row per employee; `email_address` is unique.
//! - `timer`: one row per timer; `employee_id` references `employee`.
//! - `slice`: one row per time slice; `timer_id` references `timer` without
//!   cascade, so a timer with slices cannot be deleted.
//! - `timer_slice_active`: at most one row per timer naming its open slice.
//!   The open slice is a relationship rather than a nullable column, so the
//!   primary key on `timer_id` structurally forbids two active slices.
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 with nanoseconds and a `Z`
//! suffix (e.g. `2024-01-15T10:30:00.000000000Z`). The fixed width keeps
//! lexicographic order equal to chronological order and round-trips losslessly.
//!
//! ## Elapsed Time
//!
//! `slice.elapsed_ms` is written when a slice closes. A timer's reported
//! elapsed time is a `SUM` over its closed slices; the open-slice delta is
//! added by the engine at read time.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params, params_from_iter,
};
use tracing::{debug, info};

use tk_core::{
    Audit, Employee, EmployeeId, EmployeeMeta, EmployeePartial, EmployeeSearch, Entity, Error,
    Filter, Result, TimeSlice, TimeSliceId, TimeSliceMeta, TimeSlicePartial, TimeSliceSearch,
    Timer, TimerId, TimerMeta, TimerPartial, TimerSearch, ValidationError,
};

use crate::DbError;

/// SQLite-backed store.
///
/// The connection is guarded by a mutex; every write runs in its own
/// `IMMEDIATE` transaction and rolls back on any error.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open. Writers wait up to
    /// `busy_timeout` for a lock held by another connection.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        init(&conn)?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the store is dropped.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, DbError>) -> Result<T> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Runs `f` in a transaction: commit on success, rollback on any error.
    fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>, DateTime<Utc>) -> Result<T, DbError>,
    ) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let out = f(&tx, Utc::now())?;
        tx.commit().map_err(DbError::from)?;
        Ok(out)
    }
}

/// Initializes the database schema.
///
/// This is idempotent - safe to call on an already-initialized database.
fn init(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS employee (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email_address TEXT NOT NULL UNIQUE,
            last_updated TEXT NOT NULL,
            last_updated_by TEXT NOT NULL DEFAULT '',
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS timer (
            id TEXT PRIMARY KEY,
            comment TEXT NOT NULL DEFAULT '',
            start TEXT,
            finish TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            billed INTEGER NOT NULL DEFAULT 0,
            employee_id TEXT,
            last_updated TEXT NOT NULL,
            last_updated_by TEXT NOT NULL DEFAULT '',
            version INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (employee_id) REFERENCES employee(id)
        );

        CREATE INDEX IF NOT EXISTS idx_timer_employee ON timer(employee_id);

        -- elapsed_ms: finish - start in milliseconds, 0 while open
        CREATE TABLE IF NOT EXISTS slice (
            id TEXT PRIMARY KEY,
            timer_id TEXT NOT NULL,
            start TEXT NOT NULL,
            finish TEXT,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL,
            last_updated_by TEXT NOT NULL DEFAULT '',
            version INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (timer_id) REFERENCES timer(id)
        );

        CREATE INDEX IF NOT EXISTS idx_slice_timer ON slice(timer_id);

        CREATE TABLE IF NOT EXISTS timer_slice_active (
            timer_id TEXT PRIMARY KEY,
            slice_id TEXT NOT NULL UNIQUE,
            FOREIGN KEY (timer_id) REFERENCES timer(id) ON DELETE CASCADE,
            FOREIGN KEY (slice_id) REFERENCES slice(id) ON DELETE CASCADE
        );
        ",
    )?;
    Ok(())
}

// ========== Row mapping ==========

const TIMER_SELECT: &str = "
    SELECT t.id, t.comment, t.start, t.finish, a.slice_id,
           t.completed, t.archived, t.billed, t.employee_id,
           t.last_updated, t.last_updated_by, t.version,
           COALESCE(SUM(CASE WHEN s.finish IS NOT NULL THEN s.elapsed_ms END), 0)
    FROM timer t
    LEFT JOIN timer_slice_active a ON a.timer_id = t.id
    LEFT JOIN slice s ON s.timer_id = t.id
";

const SLICE_SELECT: &str = "
    SELECT s.id, s.timer_id, s.start, s.finish, s.elapsed_ms, s.completed, s.archived,
           s.last_updated, s.last_updated_by, s.version
    FROM slice s
";

const EMPLOYEE_SELECT: &str = "
    SELECT e.id, e.first_name, e.last_name, e.email_address,
           e.last_updated, e.last_updated_by, e.version
    FROM employee e
";

#[derive(Debug)]
struct AuditRow {
    last_updated: String,
    last_updated_by: String,
    version: i64,
}

impl AuditRow {
    fn from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            last_updated: row.get(first)?,
            last_updated_by: row.get(first + 1)?,
            version: row.get(first + 2)?,
        })
    }

    fn into_audit(self) -> Result<Audit, DbError> {
        Ok(Audit {
            last_updated: parse_timestamp("last_updated", &self.last_updated)?,
            last_updated_by: self.last_updated_by,
            version: self.version,
        })
    }
}

#[derive(Debug)]
struct TimerRow {
    id: String,
    comment: String,
    start: Option<String>,
    finish: Option<String>,
    active_slice_id: Option<String>,
    completed: bool,
    archived: bool,
    billed: bool,
    employee_id: Option<String>,
    audit: AuditRow,
    elapsed_ms: i64,
}

impl TimerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            comment: row.get(1)?,
            start: row.get(2)?,
            finish: row.get(3)?,
            active_slice_id: row.get(4)?,
            completed: row.get(5)?,
            archived: row.get(6)?,
            billed: row.get(7)?,
            employee_id: row.get(8)?,
            audit: AuditRow::from_row(row, 9)?,
            elapsed_ms: row.get(12)?,
        })
    }

    fn into_timer(self) -> Result<Timer, DbError> {
        Ok(Timer {
            id: parse_id("timer.id", self.id)?,
            comment: self.comment,
            start: parse_optional_timestamp("timer.start", self.start.as_deref())?,
            finish: parse_optional_timestamp("timer.finish", self.finish.as_deref())?,
            elapsed_ms: self.elapsed_ms,
            active_time_slice_id: self
                .active_slice_id
                .map(|id| parse_id("timer_slice_active.slice_id", id))
                .transpose()?,
            completed: self.completed,
            archived: self.archived,
            billed: self.billed,
            employee_id: self
                .employee_id
                .map(|id| parse_id("timer.employee_id", id))
                .transpose()?,
            audit: self.audit.into_audit()?,
        })
    }
}

#[derive(Debug)]
struct SliceRow {
    id: String,
    timer_id: String,
    start: String,
    finish: Option<String>,
    elapsed_ms: i64,
    completed: bool,
    archived: bool,
    audit: AuditRow,
}

impl SliceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timer_id: row.get(1)?,
            start: row.get(2)?,
            finish: row.get(3)?,
            elapsed_ms: row.get(4)?,
            completed: row.get(5)?,
            archived: row.get(6)?,
            audit: AuditRow::from_row(row, 7)?,
        })
    }

    fn into_slice(self) -> Result<TimeSlice, DbError> {
        Ok(TimeSlice {
            id: parse_id("slice.id", self.id)?,
            timer_id: parse_id("slice.timer_id", self.timer_id)?,
            start: parse_timestamp("slice.start", &self.start)?,
            finish: parse_optional_timestamp("slice.finish", self.finish.as_deref())?,
            elapsed_ms: self.elapsed_ms,
            completed: self.completed,
            archived: self.archived,
            audit: self.audit.into_audit()?,
        })
    }
}

#[derive(Debug)]
struct EmployeeRow {
    id: String,
    first_name: String,
    last_name: String,
    email_address: String,
    audit: AuditRow,
}

impl EmployeeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email_address: row.get(3)?,
            audit: AuditRow::from_row(row, 4)?,
        })
    }

    fn into_employee(self) -> Result<Employee, DbError> {
        Ok(Employee {
            id: parse_id("employee.id", self.id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email_address: self.email_address,
            audit: self.audit.into_audit()?,
        })
    }
}

fn parse_id<T>(column: &'static str, value: String) -> Result<T, DbError>
where
    T: TryFrom<String, Error = ValidationError>,
{
    T::try_from(value).map_err(|source| DbError::InvalidValue { column, source })
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            column,
            value: value.to_string(),
            source,
        })
}

fn parse_optional_timestamp(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, DbError> {
    value.map(|value| parse_timestamp(column, value)).transpose()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ========== Query building ==========

/// Accumulates AND-ed `WHERE` clauses and their bound values.
#[derive(Debug, Default)]
struct Where {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Where {
    fn filter<T>(&mut self, column: &str, filter: &Filter<T>, to_value: impl Fn(&T) -> Value) {
        match filter {
            Filter::Any => {}
            Filter::Is(value) => {
                self.clauses.push(format!("{column} = ?"));
                self.values.push(to_value(value));
            }
            Filter::AnyOf(values) if values.is_empty() => self.clauses.push("0".to_string()),
            Filter::AnyOf(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                self.clauses.push(format!("{column} IN ({placeholders})"));
                self.values.extend(values.iter().map(to_value));
            }
        }
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn text<T: AsRef<str>>(value: &T) -> Value {
    Value::Text(value.as_ref().to_string())
}

fn flag(value: &bool) -> Value {
    Value::Integer(i64::from(*value))
}

// ========== Timer statements ==========

fn select_timers(conn: &Connection, filter: &Where) -> Result<Vec<Timer>, DbError> {
    let query = format!(
        "{TIMER_SELECT} {} GROUP BY t.id ORDER BY t.id ASC",
        filter.sql()
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(filter.values.iter()), TimerRow::from_row)?;
    let mut timers = Vec::new();
    for row in rows {
        timers.push(row?.into_timer()?);
    }
    Ok(timers)
}

fn read_timer(conn: &Connection, id: &TimerId) -> Result<Timer, DbError> {
    let mut filter = Where::default();
    filter.filter("t.id", &Filter::Is(id.clone()), text);
    select_timers(conn, &filter)?
        .pop()
        .ok_or_else(|| Error::not_found(Entity::Timer, id).into())
}

fn upsert_timer(conn: &Connection, timer: &Timer) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO timer
        (id, comment, start, finish, completed, archived, billed, employee_id,
         last_updated, last_updated_by, version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            comment = excluded.comment,
            start = excluded.start,
            finish = excluded.finish,
            completed = excluded.completed,
            archived = excluded.archived,
            billed = excluded.billed,
            employee_id = excluded.employee_id,
            last_updated = excluded.last_updated,
            last_updated_by = excluded.last_updated_by,
            version = excluded.version
        ",
        params![
            timer.id.as_str(),
            timer.comment,
            timer.start.map(format_timestamp),
            timer.finish.map(format_timestamp),
            timer.completed,
            timer.archived,
            timer.billed,
            timer.employee_id.as_ref().map(EmployeeId::as_str),
            format_timestamp(timer.audit.last_updated),
            timer.audit.last_updated_by,
            timer.audit.version,
        ],
    )?;
    Ok(())
}

/// Records a mutation of the timer row without touching its fields.
fn touch_timer(
    conn: &Connection,
    id: &TimerId,
    updated_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "
        UPDATE timer
        SET version = version + 1,
            last_updated = ?,
            last_updated_by = COALESCE(?, last_updated_by)
        WHERE id = ?
        ",
        params![format_timestamp(now), updated_by, id.as_str()],
    )?;
    Ok(())
}

fn count(conn: &Connection, query: &str, id: &str) -> Result<i64, DbError> {
    Ok(conn.query_row(query, [id], |row| row.get(0))?)
}

fn ensure_employee(conn: &Connection, id: &EmployeeId) -> Result<(), DbError> {
    if count(conn, "SELECT COUNT(*) FROM employee WHERE id = ?", id.as_str())? == 0 {
        return Err(Error::not_found(Entity::Employee, id).into());
    }
    Ok(())
}

// ========== Slice statements ==========

fn select_slices(conn: &Connection, filter: &Where) -> Result<Vec<TimeSlice>, DbError> {
    let query = format!("{SLICE_SELECT} {} ORDER BY s.id ASC", filter.sql());
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(filter.values.iter()), SliceRow::from_row)?;
    let mut slices = Vec::new();
    for row in rows {
        slices.push(row?.into_slice()?);
    }
    Ok(slices)
}

fn read_slice(conn: &Connection, id: &TimeSliceId) -> Result<TimeSlice, DbError> {
    let mut filter = Where::default();
    filter.filter("s.id", &Filter::Is(id.clone()), text);
    select_slices(conn, &filter)?
        .pop()
        .ok_or_else(|| Error::not_found(Entity::TimeSlice, id).into())
}

fn upsert_slice(conn: &Connection, slice: &TimeSlice) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO slice
        (id, timer_id, start, finish, elapsed_ms, completed, archived,
         last_updated, last_updated_by, version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            start = excluded.start,
            finish = excluded.finish,
            elapsed_ms = excluded.elapsed_ms,
            completed = excluded.completed,
            archived = excluded.archived,
            last_updated = excluded.last_updated,
            last_updated_by = excluded.last_updated_by,
            version = excluded.version
        ",
        params![
            slice.id.as_str(),
            slice.timer_id.as_str(),
            format_timestamp(slice.start),
            slice.finish.map(format_timestamp),
            slice.elapsed_ms,
            slice.completed,
            slice.archived,
            format_timestamp(slice.audit.last_updated),
            slice.audit.last_updated_by,
            slice.audit.version,
        ],
    )?;
    Ok(())
}

// ========== Employee statements ==========

fn select_employees(conn: &Connection, filter: &Where) -> Result<Vec<Employee>, DbError> {
    let query = format!("{EMPLOYEE_SELECT} {} ORDER BY e.id ASC", filter.sql());
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(filter.values.iter()), EmployeeRow::from_row)?;
    let mut employees = Vec::new();
    for row in rows {
        employees.push(row?.into_employee()?);
    }
    Ok(employees)
}

fn read_employee(conn: &Connection, id: &EmployeeId) -> Result<Employee, DbError> {
    let mut filter = Where::default();
    filter.filter("e.id", &Filter::Is(id.clone()), text);
    select_employees(conn, &filter)?
        .pop()
        .ok_or_else(|| Error::not_found(Entity::Employee, id).into())
}

fn ensure_email_free(
    conn: &Connection,
    email: &str,
    owner: Option<&EmployeeId>,
) -> Result<(), DbError> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT id FROM employee WHERE email_address = ?",
            [email],
            |row| row.get(0),
        )
        .optional()?;
    match holder {
        Some(holder) if Some(holder.as_str()) != owner.map(EmployeeId::as_str) => {
            Err(Error::from(ValidationError::DuplicateEmail {
                email: email.to_string(),
            })
            .into())
        }
        _ => Ok(()),
    }
}

fn upsert_employee(conn: &Connection, employee: &Employee) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO employee
        (id, first_name, last_name, email_address, last_updated, last_updated_by, version)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            email_address = excluded.email_address,
            last_updated = excluded.last_updated,
            last_updated_by = excluded.last_updated_by,
            version = excluded.version
        ",
        params![
            employee.id.as_str(),
            employee.first_name,
            employee.last_name,
            employee.email_address,
            format_timestamp(employee.audit.last_updated),
            employee.audit.last_updated_by,
            employee.audit.version,
        ],
    )?;
    Ok(())
}

// ========== Meta ==========

impl TimerMeta for SqliteStore {
    fn timer_create(&self, partial: TimerPartial) -> Result<Timer> {
        self.write(|tx, now| {
            if let Some(employee_id) = partial.employee() {
                ensure_employee(tx, employee_id)?;
            }
            let timer = Timer::create(partial, now);
            upsert_timer(tx, &timer)?;
            Ok(timer)
        })
    }

    fn timer_read(&self, id: &TimerId) -> Result<Timer> {
        self.read(|conn| read_timer(conn, id))
    }

    fn timer_update(&self, id: &TimerId, partial: TimerPartial) -> Result<Timer> {
        self.write(|tx, now| {
            let mut timer = read_timer(tx, id)?;
            if let Some(employee_id) = partial.employee() {
                ensure_employee(tx, employee_id)?;
            }
            partial.apply(&mut timer, now);
            upsert_timer(tx, &timer)?;
            Ok(timer)
        })
    }

    fn timer_delete(&self, id: &TimerId) -> Result<()> {
        self.write(|tx, _| {
            read_timer(tx, id)?;
            if count(tx, "SELECT COUNT(*) FROM slice WHERE timer_id = ?", id.as_str())? > 0 {
                return Err(Error::ReferentialIntegrity {
                    entity: Entity::Timer,
                    id: id.to_string(),
                    dependent: Entity::TimeSlice,
                }
                .into());
            }
            tx.execute("DELETE FROM timer WHERE id = ?", [id.as_str()])?;
            Ok(())
        })
    }

    fn timer_search(&self, search: &TimerSearch) -> Result<Vec<Timer>> {
        debug!(?search, "searching timers");
        let mut filter = Where::default();
        filter.filter("t.id", &search.id, text);
        filter.filter("t.employee_id", &search.employee_id, text);
        filter.filter("t.completed", &search.completed, flag);
        filter.filter("t.archived", &search.archived, flag);
        filter.filter("t.billed", &search.billed, flag);
        self.read(|conn| select_timers(conn, &filter))
    }

    fn timer_active_slice_set(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        updated_by: &str,
    ) -> Result<bool> {
        self.write(|tx, now| {
            read_timer(tx, id)?;
            let slice = read_slice(tx, slice_id)?;
            if slice.timer_id != *id {
                return Err(Error::not_found(Entity::TimeSlice, slice_id).into());
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO timer_slice_active (timer_id, slice_id) VALUES (?, ?)",
                params![id.as_str(), slice_id.as_str()],
            )?;
            if inserted == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE timer SET start = COALESCE(start, ?) WHERE id = ?",
                params![format_timestamp(slice.start), id.as_str()],
            )?;
            touch_timer(tx, id, Some(updated_by), now)?;
            Ok(true)
        })
    }

    fn timer_active_slice_close(
        &self,
        id: &TimerId,
        slice_id: &TimeSliceId,
        at: DateTime<Utc>,
        patch: TimerPartial,
    ) -> Result<bool> {
        self.write(|tx, now| {
            let mut timer = read_timer(tx, id)?;
            if timer.active_time_slice_id.as_ref() != Some(slice_id) {
                return Ok(false);
            }
            let mut slice = read_slice(tx, slice_id)?;
            TimeSlicePartial::closing(at, patch.updated_by.clone())
                .apply(&mut slice, now)
                .map_err(Error::from)?;
            if let Some(employee_id) = patch.employee() {
                ensure_employee(tx, employee_id)?;
            }
            upsert_slice(tx, &slice)?;
            tx.execute(
                "DELETE FROM timer_slice_active WHERE timer_id = ? AND slice_id = ?",
                params![id.as_str(), slice_id.as_str()],
            )?;
            patch.apply(&mut timer, now);
            upsert_timer(tx, &timer)?;
            Ok(true)
        })
    }
}

impl TimeSliceMeta for SqliteStore {
    fn time_slice_create(&self, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.write(|tx, now| {
            if let Some(timer_id) = &partial.timer_id {
                read_timer(tx, timer_id)?;
            }
            let slice = TimeSlice::create(partial, now).map_err(Error::from)?;
            upsert_slice(tx, &slice)?;
            Ok(slice)
        })
    }

    fn time_slice_read(&self, id: &TimeSliceId) -> Result<TimeSlice> {
        self.read(|conn| read_slice(conn, id))
    }

    fn time_slice_update(&self, id: &TimeSliceId, partial: TimeSlicePartial) -> Result<TimeSlice> {
        self.write(|tx, now| {
            let mut slice = read_slice(tx, id)?;
            partial.apply(&mut slice, now).map_err(Error::from)?;
            upsert_slice(tx, &slice)?;
            Ok(slice)
        })
    }

    fn time_slice_delete(&self, id: &TimeSliceId) -> Result<()> {
        self.write(|tx, now| {
            let slice = read_slice(tx, id)?;
            let released = tx.execute(
                "DELETE FROM timer_slice_active WHERE slice_id = ?",
                [id.as_str()],
            )?;
            if released > 0 {
                touch_timer(tx, &slice.timer_id, None, now)?;
            }
            tx.execute("DELETE FROM slice WHERE id = ?", [id.as_str()])?;
            Ok(())
        })
    }

    fn time_slice_search(&self, search: &TimeSliceSearch) -> Result<Vec<TimeSlice>> {
        debug!(?search, "searching time slices");
        let mut filter = Where::default();
        filter.filter("s.id", &search.id, text);
        filter.filter("s.timer_id", &search.timer_id, text);
        filter.filter("s.completed", &search.completed, flag);
        filter.filter("s.archived", &search.archived, flag);
        self.read(|conn| select_slices(conn, &filter))
    }
}

impl EmployeeMeta for SqliteStore {
    fn employee_create(&self, partial: EmployeePartial) -> Result<Employee> {
        self.write(|tx, now| {
            let employee = Employee::create(partial, now).map_err(Error::from)?;
            ensure_email_free(tx, &employee.email_address, None)?;
            upsert_employee(tx, &employee)?;
            Ok(employee)
        })
    }

    fn employee_read(&self, id: &EmployeeId) -> Result<Employee> {
        self.read(|conn| read_employee(conn, id))
    }

    fn employee_update(&self, id: &EmployeeId, partial: EmployeePartial) -> Result<Employee> {
        self.write(|tx, now| {
            let mut employee = read_employee(tx, id)?;
            if let Some(email) = partial.email() {
                ensure_email_free(tx, email, Some(id))?;
            }
            partial.apply(&mut employee, now).map_err(Error::from)?;
            upsert_employee(tx, &employee)?;
            Ok(employee)
        })
    }

    fn employee_delete(&self, id: &EmployeeId) -> Result<()> {
        self.write(|tx, _| {
            read_employee(tx, id)?;
            if count(tx, "SELECT COUNT(*) FROM timer WHERE employee_id = ?", id.as_str())? > 0 {
                return Err(Error::ReferentialIntegrity {
                    entity: Entity::Employee,
                    id: id.to_string(),
                    dependent: Entity::Timer,
                }
                .into());
            }
            tx.execute("DELETE FROM employee WHERE id = ?", [id.as_str()])?;
            Ok(())
        })
    }

    fn employee_search(&self, search: &EmployeeSearch) -> Result<Vec<Employee>> {
        debug!(?search, "searching employees");
        let mut filter = Where::default();
        filter.filter("e.id", &search.id, text);
        filter.filter("e.first_name", &search.first_name, text);
        filter.filter("e.last_name", &search.last_name, text);
        filter.filter("e.email_address", &search.email_address, text);
        self.read(|conn| select_employees(conn, &filter))
    }
}
