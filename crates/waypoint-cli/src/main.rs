//! Waypoint CLI Application
//!
//! Command-line interface for the Waypoint plan execution engine.

mod args;
mod cli;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use waypoint_core::{EngineConfig, PlannerBuilder};
use Commands::*;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    let Args {
        store_file,
        timeout,
        parallel,
        command,
    } = Args::parse();

    let mut config = EngineConfig::from_env().context("Invalid WAYPOINT_* environment")?;
    if let Some(seconds) = timeout {
        config = config.with_command_timeout(Duration::from_secs(seconds));
    }
    if let Some(parallel) = parallel {
        let parallel = usize::try_from(parallel).context("--parallel is too large")?;
        config = config.with_max_parallel_steps(parallel);
    }

    let planner = PlannerBuilder::new()
        .with_store_path(store_file)
        .with_config(config)
        .build()
        .await
        .context("Failed to initialize planner")?;

    info!("Waypoint started");

    let cli = Cli::new(planner);
    match command {
        Some(Plan { command }) => cli.handle_plan_command(command).await,
        Some(Classify(args)) => cli.classify(&args),
        Some(Tables) => cli.show_tables(),
        None => cli.list_active().await,
    }
}
