//! Plan execution: the scheduling loop and rollback.
//!
//! [`PlanExecutor::execute_plan`] drives a plan to a terminal status:
//!
//! ```text
//! loop:
//!   cancelled?            -> plan CANCELLED
//!   every step done?      -> plan COMPLETED
//!   any step FAILED?      -> plan FAILED
//!   no ready step?        -> plan FAILED (dependency deadlock)
//!   ready step needs confirmation and not forced?
//!                         -> halt, plan stays IN_PROGRESS
//!   run the ready batch, max_parallel_steps at a time
//! ```
//!
//! Every iteration completes or fails at least one step, so a plan of N steps
//! needs at most N iterations. Step failures are recorded on the step and
//! never returned as `Err`.

mod rollback;
mod working_dir;

use std::sync::Arc;

use futures::future::{self, join_all, BoxFuture, FutureExt};
use jiff::Timestamp;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub use rollback::{RollbackOutcome, RollbackResult};
pub use working_dir::WorkingDirectory;

use crate::{
    config::EngineConfig,
    memory::{CommandRecord, SessionMemory},
    models::{ExecutionPlan, PlanReport, PlanStatus, StepStatus},
    platform::{CommandMetadata, CommandReport, PlatformAdapter},
    safety::validate_syntax,
};

/// Hooks the executor consults while a plan runs.
pub trait ExecutionControl: Send + Sync {
    /// Checked before every scheduling iteration and every dispatched batch.
    fn is_cancelled(&self, plan_id: &str) -> bool;

    /// Called with the current plan state after every batch. The executor
    /// waits for the returned future before scheduling the next batch.
    fn checkpoint<'a>(&'a self, plan: &'a ExecutionPlan) -> BoxFuture<'a, ()>;
}

/// Control for plans that are not shared with anyone: never cancelled,
/// never checkpointed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupervised;

impl ExecutionControl for Unsupervised {
    fn is_cancelled(&self, _plan_id: &str) -> bool {
        false
    }

    fn checkpoint<'a>(&'a self, _plan: &'a ExecutionPlan) -> BoxFuture<'a, ()> {
        future::ready(()).boxed()
    }
}

/// Outcome of one `execute_plan` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// True only when the plan ended COMPLETED
    pub success: bool,
    pub message: String,
    /// Set when execution stopped to wait for operator confirmation
    #[serde(default)]
    pub requires_confirmation: bool,
    pub plan: PlanReport,
}

impl ExecutionResult {
    fn finished(plan: &ExecutionPlan, message: impl Into<String>) -> Self {
        Self {
            success: plan.status == PlanStatus::Completed,
            message: message.into(),
            requires_confirmation: false,
            plan: plan.into(),
        }
    }

    fn awaiting_confirmation(plan: &ExecutionPlan, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            requires_confirmation: true,
            plan: plan.into(),
        }
    }
}

enum Halt {
    Finished(String),
    AwaitingConfirmation(String),
}

/// Runs plans step by step against the host through a [`PlatformAdapter`].
pub struct PlanExecutor {
    adapter: PlatformAdapter,
    memory: Arc<dyn SessionMemory>,
    max_parallel_steps: usize,
}

impl PlanExecutor {
    pub fn new(config: &EngineConfig, memory: Arc<dyn SessionMemory>) -> Self {
        Self {
            adapter: PlatformAdapter::new(config),
            memory,
            max_parallel_steps: config.max_parallel_steps.max(1),
        }
    }

    /// Replaces the platform adapter.
    pub fn with_adapter(mut self, adapter: PlatformAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn adapter(&self) -> &PlatformAdapter {
        &self.adapter
    }

    /// Executes `plan` until it is terminal or needs confirmation.
    ///
    /// Terminal plans are returned untouched. A plan that requires
    /// confirmation does not start unless `force` is set; the same holds for
    /// each step whose command the classifier marks as requiring
    /// confirmation. A halted plan stays IN_PROGRESS and resumes on the next
    /// call.
    pub async fn execute_plan(
        &self,
        plan: &mut ExecutionPlan,
        force: bool,
        control: &dyn ExecutionControl,
    ) -> ExecutionResult {
        if plan.status.is_terminal() {
            return ExecutionResult::finished(plan, format!("Plan is already {}", plan.status));
        }

        if plan.requires_confirmation && !force {
            info!("Plan {} requires confirmation", plan.plan_id);
            let message = if plan.confirmation_message.is_empty() {
                "Plan requires confirmation".to_string()
            } else {
                format!("Plan requires confirmation: {}", plan.confirmation_message)
            };
            return ExecutionResult::awaiting_confirmation(plan, message);
        }

        if let Err(e) = plan.transition(PlanStatus::InProgress) {
            error!("Cannot start plan {}: {e}", plan.plan_id);
            return ExecutionResult::finished(plan, e.to_string());
        }
        if plan.start_time.is_none() {
            plan.start_time = Some(Timestamp::now());
        }

        let mut directory = WorkingDirectory::resume(plan.working_directory.as_deref());
        info!(
            "Starting plan {} ({} steps) in '{}'",
            plan.plan_id,
            plan.steps.len(),
            directory.path().display()
        );

        let halt = self
            .run_loop(plan, force, control, &mut directory)
            .await;
        plan.working_directory = Some(directory.path().to_path_buf());

        match halt {
            Halt::Finished(message) => {
                info!("Plan {} finished: {message}", plan.plan_id);
                ExecutionResult::finished(plan, message)
            }
            Halt::AwaitingConfirmation(message) => {
                info!("Plan {} halted: {message}", plan.plan_id);
                control.checkpoint(plan).await;
                ExecutionResult::awaiting_confirmation(plan, message)
            }
        }
    }

    async fn run_loop(
        &self,
        plan: &mut ExecutionPlan,
        force: bool,
        control: &dyn ExecutionControl,
        directory: &mut WorkingDirectory,
    ) -> Halt {
        loop {
            if let Some(halt) = self.check_terminal(plan, control) {
                return halt;
            }

            let ready = plan.ready_step_indices();
            if ready.is_empty() {
                let reason = deadlock_reason(plan);
                error!("Plan {}: {reason}", plan.plan_id);
                plan.metadata
                    .insert("failure_reason".to_string(), reason.clone().into());
                return self.conclude(plan, PlanStatus::Failed, reason);
            }

            let (runnable, blocked) = self.split_at_confirmation(plan, &ready, force);

            for chunk in runnable.chunks(self.max_parallel_steps) {
                if control.is_cancelled(&plan.plan_id) {
                    break;
                }
                self.run_batch(plan, chunk, force, directory).await;
            }
            control.checkpoint(plan).await;

            if let Some(index) = blocked {
                if plan.has_failed_steps() || control.is_cancelled(&plan.plan_id) {
                    continue;
                }
                let step = &plan.steps[index];
                let message = format!(
                    "Step {} requires confirmation: {}",
                    step.step_id, step.metadata.reason
                );
                return Halt::AwaitingConfirmation(message);
            }
        }
    }

    fn check_terminal(
        &self,
        plan: &mut ExecutionPlan,
        control: &dyn ExecutionControl,
    ) -> Option<Halt> {
        if control.is_cancelled(&plan.plan_id) {
            info!("Plan {} was cancelled", plan.plan_id);
            return Some(self.conclude(plan, PlanStatus::Cancelled, "Plan cancelled".into()));
        }
        if plan.is_complete() {
            return Some(self.conclude(plan, PlanStatus::Completed, "Plan completed".into()));
        }
        if plan.has_failed_steps() {
            return Some(self.conclude(plan, PlanStatus::Failed, "Plan failed".into()));
        }
        None
    }

    fn conclude(&self, plan: &mut ExecutionPlan, status: PlanStatus, message: String) -> Halt {
        if let Err(e) = plan.transition(status) {
            warn!("Plan {}: {e}", plan.plan_id);
        }
        Halt::Finished(message)
    }

    /// Splits the ready steps at the first one that needs confirmation. That
    /// step keeps its classification in its metadata and stays PENDING.
    fn split_at_confirmation(
        &self,
        plan: &mut ExecutionPlan,
        ready: &[usize],
        force: bool,
    ) -> (Vec<usize>, Option<usize>) {
        if force {
            return (ready.to_vec(), None);
        }

        for (position, &index) in ready.iter().enumerate() {
            let classification = self.adapter.classifier().classify(&plan.steps[index].command);
            if classification.requires_confirmation() {
                let mut metadata = CommandMetadata {
                    platform: Some(self.adapter.platform()),
                    confirmation_required: true,
                    ..CommandMetadata::default()
                };
                metadata.apply_classification(classification);
                plan.steps[index].metadata = metadata;
                return (ready[..position].to_vec(), Some(index));
            }
        }
        (ready.to_vec(), None)
    }

    /// Runs one batch of ready steps from the same directory, then applies
    /// directory changes in insertion order.
    async fn run_batch(
        &self,
        plan: &mut ExecutionPlan,
        batch: &[usize],
        force: bool,
        directory: &mut WorkingDirectory,
    ) {
        let mut dispatched = Vec::with_capacity(batch.len());
        for &index in batch {
            let step = &mut plan.steps[index];
            if let Err(e) = step.begin() {
                warn!("Skipping dispatch of step {}: {e}", step.step_id);
                continue;
            }
            info!("Executing step {}: {}", step.step_id, step.command);

            if let Err(e) = validate_syntax(&step.command) {
                warn!("Step {} failed syntax validation: {e}", step.step_id);
                if let Err(e) = step.fail(e.to_string()) {
                    warn!("Step {}: {e}", step.step_id);
                }
                self.remember(plan, index, directory);
                continue;
            }
            dispatched.push((index, step.command.clone()));
        }

        let snapshot = directory.clone();
        let reports: Vec<CommandReport> = join_all(dispatched.iter().map(|(_, command)| {
            self.adapter.execute(command, Some(snapshot.path()), force)
        }))
        .await;

        for ((index, command), report) in dispatched.into_iter().zip(reports) {
            let succeeded = report.success();
            let step = &mut plan.steps[index];
            if let Err(e) = step.finish(report) {
                warn!("Step {}: {e}", step.step_id);
            }
            if succeeded {
                debug!("Step {} completed", step.step_id);
            } else {
                warn!("Step {} failed: {}", step.step_id, step.error);
            }

            self.remember(plan, index, &snapshot);

            if succeeded {
                if let Some(path) = directory.apply(&command) {
                    info!("Working directory is now '{}'", path.display());
                    self.memory.update_current_directory(path);
                }
            }
        }
    }

    fn remember(&self, plan: &ExecutionPlan, index: usize, directory: &WorkingDirectory) {
        let step = &plan.steps[index];
        let succeeded = step.status == StepStatus::Completed;
        let mut record = CommandRecord::new(step.command.clone(), succeeded);
        record.output = step.output.clone();
        record.error = step.error.clone();
        record.working_directory = Some(directory.path().to_path_buf());
        record.plan_id = Some(plan.plan_id.clone());
        record.step_id = Some(step.step_id.clone());
        record.intent = if step.description.is_empty() {
            plan.user_intent.clone()
        } else {
            step.description.clone()
        };
        self.memory.record_command(record);
    }
}

/// Explains why no step is ready in a plan that is neither complete nor
/// failed.
fn deadlock_reason(plan: &ExecutionPlan) -> String {
    let mut causes = Vec::new();

    if let Some(cycle) = plan.find_dependency_cycle() {
        causes.push(format!("dependency cycle {}", cycle.join(" -> ")));
    }

    let missing = plan.missing_dependencies();
    if !missing.is_empty() {
        let edges: Vec<String> = missing
            .iter()
            .map(|(step_id, dependency)| format!("{step_id} -> {dependency}"))
            .collect();
        causes.push(format!("missing dependencies {}", edges.join(", ")));
    }

    if causes.is_empty() {
        let waiting: Vec<&str> = plan
            .steps
            .iter()
            .filter(|step| !step.status.is_terminal())
            .map(|step| step.step_id.as_str())
            .collect();
        causes.push(format!(
            "steps {} wait on dependencies that will never complete",
            waiting.join(", ")
        ));
    }

    format!("Dependency deadlock: {}", causes.join("; "))
}

#[cfg(test)]
mod tests;
