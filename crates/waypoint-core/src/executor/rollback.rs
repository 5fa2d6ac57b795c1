//! Best-effort rollback of completed steps.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{PlanExecutor, WorkingDirectory};
use crate::{memory::CommandRecord, models::ExecutionPlan};

/// Key under which the last rollback result is stored in plan metadata.
pub(crate) const ROLLBACK_METADATA_KEY: &str = "rollback";

/// Result of replaying one step's rollback command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub step_id: String,
    pub rollback_command: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
}

/// Result of a rollback sweep. `success` means the sweep ran; individual
/// failures are in `results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackResult {
    pub success: bool,
    pub message: String,
    /// Number of rollback commands attempted
    pub attempted: usize,
    pub results: Vec<RollbackOutcome>,
}

impl PlanExecutor {
    /// Replays the rollback command of every completed step, newest first,
    /// starting from the plan's last working directory.
    ///
    /// Rollback commands are always forced past confirmation. A failing
    /// command is recorded and the sweep continues. Step and plan statuses
    /// are left as they are; the result is stored in the plan's metadata
    /// under `rollback`.
    pub async fn rollback_plan(&self, plan: &mut ExecutionPlan) -> RollbackResult {
        let candidates = plan.rollback_candidates();
        info!(
            "Rolling back plan {}: {} steps have rollback commands",
            plan.plan_id,
            candidates.len()
        );

        let mut directory = WorkingDirectory::resume(plan.working_directory.as_deref());
        let mut results = Vec::with_capacity(candidates.len());

        for index in candidates {
            let step = &plan.steps[index];
            let Some(command) = step.rollback().map(str::to_string) else {
                continue;
            };
            info!(
                "Rolling back step {} in '{}': {command}",
                step.step_id,
                directory.path().display()
            );

            let ran_in = directory.path().to_path_buf();
            let report = self.adapter.execute(&command, Some(&ran_in), true).await;
            let success = report.success();
            let error = match report.error() {
                Some(error) if report.stderr.is_empty() => error.to_string(),
                _ => report.stderr.clone(),
            };

            if success {
                if let Some(path) = directory.apply(&command) {
                    self.memory.update_current_directory(path);
                }
            } else {
                warn!("Rollback of step {} failed: {error}", step.step_id);
            }

            let mut record = CommandRecord::new(command.clone(), success);
            record.output = report.stdout.clone();
            record.error = error.clone();
            record.working_directory = Some(ran_in);
            record.plan_id = Some(plan.plan_id.clone());
            record.step_id = Some(step.step_id.clone());
            record.intent = format!("Rollback of step {}", step.step_id);
            self.memory.record_command(record);

            results.push(RollbackOutcome {
                step_id: step.step_id.clone(),
                rollback_command: command,
                success,
                output: report.stdout,
                error,
            });
        }

        let result = RollbackResult {
            success: true,
            message: format!("Rollback attempted for {} steps", results.len()),
            attempted: results.len(),
            results,
        };

        match serde_json::to_value(&result) {
            Ok(value) => {
                plan.metadata
                    .insert(ROLLBACK_METADATA_KEY.to_string(), value);
            }
            Err(e) => warn!("Cannot record rollback result on plan {}: {e}", plan.plan_id),
        }
        result
    }
}
