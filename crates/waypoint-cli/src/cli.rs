//! Plan subcommands and their handlers.
//!
//! Each subcommand has a clap argument struct converted into the core
//! parameter type it drives:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Planner → JSON on stdout
//! ```
//!
//! Core parameter types stay free of clap derives; the conversions below are
//! the only place the two meet.

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use log::debug;
use serde::Serialize;
use serde_json::json;
use waypoint_core::{
    params::{CreatePlan, ExecutePlan, Id, PrunePlans},
    ExecutionResult, Planner,
};

/// Operations on stored plans
#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a plan from a JSON document
    Create(CreatePlanArgs),
    /// List plans
    List(ListPlansArgs),
    /// Show a plan with its progress
    Show(PlanIdArgs),
    /// Execute a plan
    Run(RunPlanArgs),
    /// Cancel a pending or running plan
    Cancel(PlanIdArgs),
    /// Run the rollback commands of a plan's completed steps
    Rollback(PlanIdArgs),
    /// Remove the oldest finished plans
    Prune(PrunePlansArgs),
}

/// Create a plan
///
/// The document has the shape of the core `CreatePlan` parameters: a
/// description, the user intent, an optional plan id and confirmation
/// settings, and a list of steps with commands, dependencies and rollback
/// commands.
#[derive(Args)]
pub struct CreatePlanArgs {
    /// JSON file describing the plan, or `-` to read standard input
    pub file: PathBuf,
}

impl CreatePlanArgs {
    pub fn read_params(&self) -> Result<CreatePlan> {
        let contents = if self.file.as_os_str() == "-" {
            io::read_to_string(io::stdin()).context("Failed to read plan from stdin")?
        } else {
            fs::read_to_string(&self.file)
                .with_context(|| format!("Failed to read plan file {}", self.file.display()))?
        };
        serde_json::from_str(&contents).context("Invalid plan document")
    }
}

#[derive(Args)]
pub struct ListPlansArgs {
    /// Include completed, failed and cancelled plans
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct PlanIdArgs {
    /// Plan identifier
    pub id: String,
}

impl From<PlanIdArgs> for Id {
    fn from(val: PlanIdArgs) -> Self {
        Id { id: val.id }
    }
}

/// Execute a plan
///
/// Execution stops before a step whose command requires confirmation unless
/// `--force` is given; running the plan again with `--force` resumes it.
#[derive(Args)]
pub struct RunPlanArgs {
    /// Plan identifier
    pub id: String,
    /// Run steps that require confirmation
    #[arg(short, long)]
    pub force: bool,
}

impl From<RunPlanArgs> for ExecutePlan {
    fn from(val: RunPlanArgs) -> Self {
        ExecutePlan {
            id: val.id,
            force: val.force,
        }
    }
}

#[derive(Args)]
pub struct PrunePlansArgs {
    /// Number of finished plans to keep
    #[arg(long, default_value_t = PrunePlans::default().max_retained)]
    pub keep: usize,
}

impl From<PrunePlansArgs> for PrunePlans {
    fn from(val: PrunePlansArgs) -> Self {
        PrunePlans {
            max_retained: val.keep,
        }
    }
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Command to classify; multiple words are joined with spaces
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ClassifyArgs {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Exit status of `plan run` when the plan failed or was cancelled.
const EXIT_PLAN_FAILED: u8 = 1;
/// Exit status of `plan run` when execution stopped for confirmation.
const EXIT_AWAITING_CONFIRMATION: u8 = 2;

/// Runs CLI commands against one planner and prints their results as JSON.
pub struct Cli {
    planner: Planner,
}

impl Cli {
    pub fn new(planner: Planner) -> Self {
        Self { planner }
    }

    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<ExitCode> {
        match command {
            PlanCommands::Create(args) => {
                let params = args.read_params()?;
                let plan = self
                    .planner
                    .create_plan(&params)
                    .await
                    .context("Failed to create plan")?;
                print_json(&plan)?;
            }
            PlanCommands::List(args) => {
                let plans = if args.all {
                    self.planner.list_plans().await
                } else {
                    self.planner.list_active_plans().await
                }
                .context("Failed to list plans")?;
                print_json(&plans)?;
            }
            PlanCommands::Show(args) => {
                let report = self
                    .planner
                    .get_plan_status(&args.into())
                    .await
                    .context("Failed to get plan")?;
                print_json(&report)?;
            }
            PlanCommands::Run(args) => {
                let result = self
                    .planner
                    .execute_plan(&args.into())
                    .await
                    .context("Failed to execute plan")?;
                print_json(&result)?;
                return Ok(run_exit_code(&result));
            }
            PlanCommands::Cancel(args) => {
                let id: Id = args.into();
                let cancelled = self
                    .planner
                    .cancel_plan(&id)
                    .await
                    .context("Failed to cancel plan")?;
                print_json(&json!({ "plan_id": id.id, "cancelled": cancelled }))?;
            }
            PlanCommands::Rollback(args) => {
                let result = self
                    .planner
                    .rollback_plan(&args.into())
                    .await
                    .context("Failed to roll back plan")?;
                print_json(&result)?;
            }
            PlanCommands::Prune(args) => {
                let removed = self
                    .planner
                    .prune_completed_plans(&args.into())
                    .await
                    .context("Failed to prune plans")?;
                print_json(&json!({ "removed": removed }))?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    pub fn classify(&self, args: &ClassifyArgs) -> Result<ExitCode> {
        let command = args.command_line();
        debug!("Classifying '{command}'");
        print_json(&self.planner.analyze_command(&command))?;
        Ok(ExitCode::SUCCESS)
    }

    pub fn show_tables(&self) -> Result<ExitCode> {
        print_json(&self.planner.command_tables())?;
        Ok(ExitCode::SUCCESS)
    }

    pub async fn list_active(&self) -> Result<ExitCode> {
        let plans = self
            .planner
            .list_active_plans()
            .await
            .context("Failed to list plans")?;
        print_json(&plans)?;
        Ok(ExitCode::SUCCESS)
    }
}

fn run_exit_code(result: &ExecutionResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else if result.requires_confirmation {
        ExitCode::from(EXIT_AWAITING_CONFIRMATION)
    } else {
        ExitCode::from(EXIT_PLAN_FAILED)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to serialize output")?;
    writeln!(stdout).context("Failed to write output")?;
    Ok(())
}
