//! Progress summaries and the serialized plan report.

use serde::{Deserialize, Serialize};

use super::{ExecutionPlan, PlanStatus, StepStatus};

/// Step counts for a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    /// Total number of steps
    pub total_steps: usize,
    /// Number of completed steps
    pub completed_steps: usize,
    /// Number of failed steps
    pub failed_steps: usize,
    /// Completed steps as a percentage of all steps (0 for an empty plan)
    pub progress_percentage: f64,
    /// Plan status at the time the summary was taken
    pub status: PlanStatus,
}

impl From<&ExecutionPlan> for Progress {
    fn from(plan: &ExecutionPlan) -> Self {
        let count = |status: StepStatus| plan.steps.iter().filter(|s| s.status == status).count();

        let total_steps = plan.steps.len();
        let completed_steps = count(StepStatus::Completed);
        let failed_steps = count(StepStatus::Failed);
        let progress_percentage = if total_steps > 0 {
            completed_steps as f64 / total_steps as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_steps,
            completed_steps,
            failed_steps,
            progress_percentage,
            status: plan.status,
        }
    }
}

/// Wire form of a plan handed to callers: the full plan plus its progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanReport {
    /// The plan with per-step status, output, error and timestamps
    #[serde(flatten)]
    pub plan: ExecutionPlan,
    /// Progress summary computed from the plan
    pub progress: Progress,
}

impl From<ExecutionPlan> for PlanReport {
    fn from(plan: ExecutionPlan) -> Self {
        let progress = Progress::from(&plan);
        Self { plan, progress }
    }
}

impl From<&ExecutionPlan> for PlanReport {
    fn from(plan: &ExecutionPlan) -> Self {
        plan.clone().into()
    }
}
