//! Timer commands: CRUD plus the start/pause/submit lifecycle.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use tk_core::{EmployeeId, Engine, Filter, TimerChanges, TimerId, TimerSearch};

use super::{Deleted, write_json};

#[derive(Debug, Subcommand)]
pub enum TimerAction {
    /// Create a stopped timer.
    Create(CreateArgs),
    /// Show a timer with its elapsed time as of now.
    Read { id: TimerId },
    /// Change a timer's comment, flags or owner.
    Update(UpdateArgs),
    /// Delete a timer that has no time slices.
    Delete { id: TimerId },
    /// Open a new time slice. Does nothing if the timer is running.
    Start(LifecycleArgs),
    /// Close the open time slice.
    Pause(LifecycleArgs),
    /// Close any open time slice and mark the timer completed.
    Submit(LifecycleArgs),
    /// List timers matching all given filters.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub comment: Option<String>,
    /// Employee who owns the timer.
    #[arg(long)]
    pub employee: Option<EmployeeId>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: TimerId,
    #[arg(long)]
    pub comment: Option<String>,
    #[arg(long)]
    pub archived: Option<bool>,
    #[arg(long)]
    pub completed: Option<bool>,
    #[arg(long)]
    pub billed: Option<bool>,
    /// Assign the timer to this employee.
    #[arg(long, conflicts_with = "unassign")]
    pub employee: Option<EmployeeId>,
    /// Remove the timer's owner.
    #[arg(long)]
    pub unassign: bool,
}

#[derive(Debug, Args)]
pub struct LifecycleArgs {
    pub id: TimerId,
    /// When the transition happened (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub employee: Option<EmployeeId>,
    #[arg(long)]
    pub completed: Option<bool>,
    #[arg(long)]
    pub archived: Option<bool>,
    #[arg(long)]
    pub billed: Option<bool>,
}

fn filter<T>(value: Option<T>) -> Filter<T> {
    value.map_or(Filter::Any, Filter::Is)
}

pub fn run<W: Write>(writer: &mut W, engine: &Engine, action: &TimerAction) -> Result<()> {
    match action {
        TimerAction::Create(args) => {
            let timer = engine.timer_create(TimerChanges {
                comment: args.comment.clone(),
                employee_id: args.employee.clone().map(Some),
                ..TimerChanges::default()
            })?;
            write_json(writer, &timer)
        }
        TimerAction::Read { id } => write_json(writer, &engine.timer_read(id)?),
        TimerAction::Update(args) => {
            let employee_id = if args.unassign {
                Some(None)
            } else {
                args.employee.clone().map(Some)
            };
            let timer = engine.timer_update(
                &args.id,
                TimerChanges {
                    comment: args.comment.clone(),
                    completed: args.completed,
                    archived: args.archived,
                    billed: args.billed,
                    employee_id,
                },
            )?;
            write_json(writer, &timer)
        }
        TimerAction::Delete { id } => {
            engine.timer_delete(id)?;
            write_json(writer, &Deleted { deleted: id.as_str() })
        }
        TimerAction::Start(args) => {
            let timer = engine
                .timer_start(&args.id, args.at.unwrap_or_else(Utc::now))
                .with_context(|| format!("failed to start timer {}", args.id))?;
            write_json(writer, &timer)
        }
        TimerAction::Pause(args) => {
            let timer = engine
                .timer_pause(&args.id, args.at.unwrap_or_else(Utc::now))
                .with_context(|| format!("failed to pause timer {}", args.id))?;
            write_json(writer, &timer)
        }
        TimerAction::Submit(args) => {
            let timer = engine
                .timer_submit(&args.id, args.at.unwrap_or_else(Utc::now))
                .with_context(|| format!("failed to submit timer {}", args.id))?;
            write_json(writer, &timer)
        }
        TimerAction::List(args) => {
            let timers = engine.timer_search(&TimerSearch {
                employee_id: filter(args.employee.clone()),
                completed: filter(args.completed),
                archived: filter(args.archived),
                billed: filter(args.billed),
                ..TimerSearch::default()
            })?;
            write_json(writer, &timers)
        }
    }
}
