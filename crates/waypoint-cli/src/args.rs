use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{ClassifyArgs, PlanCommands};

/// Command-line front end for the Waypoint plan execution engine
///
/// Waypoint stores plans of shell commands with dependencies between their
/// steps, runs them in dependency order behind a command risk classifier, and
/// replays rollback commands on request. All output is JSON.
#[derive(Parser)]
#[command(version, about, name = "wp")]
pub struct Args {
    /// Path to the plan snapshot file. Defaults to
    /// $XDG_DATA_HOME/waypoint/plans.json
    #[arg(long, global = true)]
    pub store_file: Option<PathBuf>,

    /// Per-command timeout in seconds (overrides WAYPOINT_COMMAND_TIMEOUT)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Maximum number of ready steps run at once (overrides
    /// WAYPOINT_MAX_PARALLEL_STEPS)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub parallel: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for the Waypoint CLI
///
/// - `plan`: Create, run, inspect, cancel, roll back and prune plans
/// - `classify`: Show how a command would be classified and adapted
/// - `commands`: Show the classifier's command tables
#[derive(Subcommand)]
pub enum Commands {
    /// Manage plans
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Classify a command without running it
    Classify(ClassifyArgs),
    /// List safe, dangerous and forbidden commands
    #[command(name = "commands")]
    Tables,
}
