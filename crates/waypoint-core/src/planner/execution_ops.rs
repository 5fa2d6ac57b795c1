//! Execution, rollback and command analysis for the Planner.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{info, warn};
use tokio::task;

use super::Planner;
use crate::{
    error::{Result, WaypointError},
    executor::{ExecutionControl, ExecutionResult, RollbackResult},
    memory::CommandRecord,
    models::{ExecutionPlan, PlanStatus},
    params::{ExecutePlan, Id},
    platform::CommandAnalysis,
    safety::CommandTables,
    store::{Claim, PlanStore, RunGuard},
};

/// Execution control backed by the plan store: cancellation is read from the
/// stored plan and checkpoints are written to the snapshot off the runtime.
pub(crate) struct StoreControl {
    store: Arc<PlanStore>,
}

impl StoreControl {
    pub(crate) fn new(store: Arc<PlanStore>) -> Self {
        Self { store }
    }
}

impl ExecutionControl for StoreControl {
    fn is_cancelled(&self, plan_id: &str) -> bool {
        self.store.is_cancelled(plan_id)
    }

    fn checkpoint<'a>(&'a self, plan: &'a ExecutionPlan) -> BoxFuture<'a, ()> {
        let store = self.store.clone();
        let snapshot = plan.clone();
        async move {
            let plan_id = snapshot.plan_id.clone();
            match task::spawn_blocking(move || store.write_back(&snapshot)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Failed to checkpoint plan {plan_id}: {e}"),
                Err(e) => warn!("Checkpoint of plan {plan_id} did not finish: {e}"),
            }
        }
        .boxed()
    }
}

impl Planner {
    /// Executes a stored plan until it is terminal or halts for confirmation.
    ///
    /// Step results are checkpointed to the store after every batch. A plan
    /// cancelled through [`Planner::cancel_plan`] while it runs stays
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::PlanNotFound` for an unknown id and
    /// `WaypointError::PlanRunning` if the plan is already executing or
    /// rolling back. Step failures are reported in the result, not as errors.
    pub async fn execute_plan(&self, params: &ExecutePlan) -> Result<ExecutionResult> {
        let (mut plan, _guard) = self.claim(&params.id)?;
        info!(
            "Executing plan {} ({} steps, force: {})",
            plan.plan_id,
            plan.steps.len(),
            params.force
        );

        let control = StoreControl::new(self.store.clone());
        let mut result = self
            .executor
            .execute_plan(&mut plan, params.force, &control)
            .await;
        let executed_status = plan.status;

        let stored = self.blocking(move |store| store.write_back(&plan)).await?;
        if stored.status == PlanStatus::Cancelled && executed_status != PlanStatus::Cancelled {
            result.success = false;
            result.requires_confirmation = false;
            result.message = "Plan cancelled".to_string();
        }
        result.plan = stored.into();
        Ok(result)
    }

    /// Replays the rollback commands of the plan's completed steps, newest
    /// first. Plan and step statuses are not changed.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::PlanNotFound` for an unknown id and
    /// `WaypointError::PlanRunning` if the plan is executing.
    pub async fn rollback_plan(&self, params: &Id) -> Result<RollbackResult> {
        let (mut plan, _guard) = self.claim(&params.id)?;
        let result = self.executor.rollback_plan(&mut plan).await;
        self.blocking(move |store| store.write_back(&plan)).await?;
        Ok(result)
    }

    /// Classifies and adapts a command without running it.
    pub fn analyze_command(&self, command: &str) -> CommandAnalysis {
        self.executor.adapter().analyze(command)
    }

    /// The classifier's safe, dangerous and forbidden command tables.
    pub fn command_tables(&self) -> CommandTables {
        self.executor.adapter().classifier().tables()
    }

    /// The most recently executed commands, oldest first.
    pub fn recent_commands(&self, limit: usize) -> Vec<CommandRecord> {
        self.session.recent_commands(limit)
    }

    fn claim(&self, plan_id: &str) -> Result<(ExecutionPlan, RunGuard<'_>)> {
        match self.store.claim(plan_id) {
            Claim::Ready { plan, guard } => Ok((plan, guard)),
            Claim::AlreadyRunning => Err(WaypointError::PlanRunning {
                id: plan_id.to_string(),
            }),
            Claim::NotFound => Err(WaypointError::PlanNotFound {
                id: plan_id.to_string(),
            }),
        }
    }
}
