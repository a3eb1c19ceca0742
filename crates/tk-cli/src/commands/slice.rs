//! Time slice commands. Slices are created and closed through the timer
//! lifecycle; here they can only be inspected or removed.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};

use tk_core::{Engine, Filter, TimeSliceId, TimeSliceSearch, TimerId};

use super::{Deleted, write_json};

#[derive(Debug, Subcommand)]
pub enum SliceAction {
    /// Show a time slice.
    Read { id: TimeSliceId },
    /// Delete a time slice. Deleting the open slice stops its timer.
    Delete { id: TimeSliceId },
    /// List time slices.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only slices of this timer.
    #[arg(long)]
    pub timer: Option<TimerId>,
    #[arg(long)]
    pub completed: Option<bool>,
}

pub fn run<W: Write>(writer: &mut W, engine: &Engine, action: &SliceAction) -> Result<()> {
    match action {
        SliceAction::Read { id } => write_json(writer, &engine.time_slice_read(id)?),
        SliceAction::Delete { id } => {
            engine.time_slice_delete(id)?;
            write_json(writer, &Deleted { deleted: id.as_str() })
        }
        SliceAction::List(args) => {
            let slices = engine.time_slice_search(&TimeSliceSearch {
                timer_id: args.timer.clone().map_or(Filter::Any, Filter::Is),
                completed: args.completed.map_or(Filter::Any, Filter::Is),
                ..TimeSliceSearch::default()
            })?;
            write_json(writer, &slices)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tk_core::TimerChanges;

    use super::*;
    use crate::commands::test_support::{engine, json};

    #[test]
    fn list_shows_only_the_timers_slices() {
        let engine = engine();
        let timer = engine.timer_create(TimerChanges::default()).unwrap();
        let other = engine.timer_create(TimerChanges::default()).unwrap();
        let started = engine.timer_start(&timer.id, Utc::now()).unwrap();
        engine.timer_start(&other.id, Utc::now()).unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &engine,
            &SliceAction::List(ListArgs {
                timer: Some(timer.id.clone()),
                completed: None,
            }),
        )
        .unwrap();

        let slices = json(output);
        let slices = slices.as_array().unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(
            slices[0]["id"],
            started.active_time_slice_id.unwrap().as_str()
        );
        assert!(slices[0].get("finish").is_none());
    }

    #[test]
    fn deleting_open_slice_stops_timer() {
        let engine = engine();
        let timer = engine.timer_create(TimerChanges::default()).unwrap();
        let slice_id = engine
            .timer_start(&timer.id, Utc::now())
            .unwrap()
            .active_time_slice_id
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &engine, &SliceAction::Delete { id: slice_id.clone() }).unwrap();
        assert_eq!(json(output)["deleted"], slice_id.as_str());

        assert!(!engine.timer_read(&timer.id).unwrap().is_running());
        let err = run(&mut Vec::new(), &engine, &SliceAction::Read { id: slice_id }).unwrap_err();
        assert!(err.to_string().contains("time slice not found"));
    }
}
