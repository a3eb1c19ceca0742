//! Timekeeper CLI library.
//!
//! A thin transport over [`tk_core::Engine`]: argument parsing, configuration
//! and JSON output. All business rules live in `tk-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
