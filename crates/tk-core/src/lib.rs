//! Core domain logic for timekeeper.
//!
//! This crate contains:
//! - Entities: timers, time slices and employees with audit metadata
//! - The storage contract ([`Meta`]) that every backend implements
//! - Elapsed-time computation shared by all backends
//! - The lifecycle [`Engine`]: create, start, pause, submit, delete

mod audit;
pub mod elapsed;
mod employee;
mod engine;
mod error;
pub mod meta;
mod time_slice;
mod timer;
mod types;

pub use audit::Audit;
pub use employee::{Employee, EmployeePartial, EmployeeSearch};
pub use engine::Engine;
pub use error::{EngineError, Error, Result};
pub use meta::{EmployeeMeta, Meta, TimeSliceMeta, TimerMeta};
pub use time_slice::{TimeSlice, TimeSlicePartial, TimeSliceSearch};
pub use timer::{Timer, TimerChanges, TimerPartial, TimerSearch};
pub use types::{EmployeeId, Entity, Filter, TimeSliceId, TimerId, ValidationError};
