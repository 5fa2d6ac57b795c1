//! Status enumerations for plans and steps.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Type-safe enumeration of plan statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Plan has been created but not started
    #[default]
    Pending,

    /// Executor is driving the plan
    InProgress,

    /// Every step completed or was skipped
    Completed,

    /// A step failed or the dependency graph deadlocked
    Failed,

    /// Operator cancelled the plan
    Cancelled,
}

impl PlanStatus {
    /// Convert to wire string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further lifecycle transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    /// Whether the plan lifecycle allows moving from `self` to `next`.
    ///
    /// `InProgress -> InProgress` is allowed so that a plan halted on a
    /// confirmation request can be resumed.
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        use PlanStatus::{Cancelled, Completed, Failed, InProgress, Pending};

        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Pending, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PlanStatus::Pending),
            "in_progress" | "inprogress" => Ok(PlanStatus::InProgress),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            "cancelled" | "canceled" => Ok(PlanStatus::Cancelled),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-safe enumeration of step statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting for dependencies or dispatch
    #[default]
    Pending,

    /// Command has been dispatched
    Running,

    /// Command exited successfully
    Completed,

    /// Validation, safety check, exit status or timeout failed
    Failed,

    /// Skipped by an explicit operator decision
    Skipped,
}

impl StepStatus {
    /// Convert to wire string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Whether no further lifecycle transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Whether the step lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        use StepStatus::{Completed, Failed, Pending, Running, Skipped};

        matches!(
            (self, next),
            (Pending, Running) | (Running, Completed) | (Running, Failed) | (Pending, Skipped)
        )
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
