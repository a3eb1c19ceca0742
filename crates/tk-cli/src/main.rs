use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tk_cli::commands::{employee, slice, timer};
use tk_cli::{Cli, Commands, Config};
use tk_core::Engine;

/// Load config and open the configured backend.
fn open_engine(config_path: Option<&Path>) -> Result<Engine> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let meta = tk_db::open(&config.backend).context("failed to open storage backend")?;
    Ok(Engine::new(meta, config.actor))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays valid JSON.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let engine = open_engine(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::Timer(action) => timer::run(&mut stdout, &engine, action)?,
        Commands::Slice(action) => slice::run(&mut stdout, &engine, action)?,
        Commands::Employee(action) => employee::run(&mut stdout, &engine, action)?,
    }

    stdout.flush()?;
    Ok(())
}
