//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{employee::EmployeeAction, slice::SliceAction, timer::TimerAction};

/// Billable-time tracker.
///
/// Timers accumulate time across start/pause cycles; each cycle is recorded
/// as a time slice. Every command prints the affected entity as JSON.
#[derive(Debug, Parser)]
#[command(name = "tk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, run and inspect timers.
    #[command(subcommand)]
    Timer(TimerAction),

    /// Inspect or remove recorded time slices.
    #[command(subcommand)]
    Slice(SliceAction),

    /// Manage employees that own timers.
    #[command(subcommand)]
    Employee(EmployeeAction),
}
