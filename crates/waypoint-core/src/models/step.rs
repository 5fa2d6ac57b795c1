//! Step model definition and lifecycle transitions.

use std::collections::BTreeSet;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::StepStatus;
use crate::{
    error::{Result, WaypointError},
    platform::{CommandMetadata, CommandOutcome, CommandReport},
};

/// One shell command within a plan, plus its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    /// Identifier, unique within the owning plan
    pub step_id: String,

    /// Literal shell command; opaque to the scheduler
    pub command: String,

    /// Human-readable description of what the command does
    #[serde(default)]
    pub description: String,

    /// Step ids that must be completed before this step is eligible
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// Command that undoes this step, replayed during rollback
    #[serde(default)]
    pub rollback_command: Option<String>,

    /// Current lifecycle status
    #[serde(default)]
    pub status: StepStatus,

    /// When the step was dispatched (UTC)
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    /// When the step reached a terminal status (UTC)
    #[serde(default)]
    pub end_time: Option<Timestamp>,

    /// Captured stdout of the most recent attempt
    #[serde(default)]
    pub output: String,

    /// Captured stderr or failure reason of the most recent attempt
    #[serde(default)]
    pub error: String,

    /// Classifier and adapter diagnostics of the most recent attempt
    #[serde(default)]
    pub metadata: CommandMetadata,
}

impl PlanStep {
    /// Creates a pending step with no dependencies.
    pub fn new(step_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            command: command.into(),
            description: String::new(),
            dependencies: BTreeSet::new(),
            rollback_command: None,
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            output: String::new(),
            error: String::new(),
            metadata: CommandMetadata::default(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds dependencies on other step ids.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Sets the rollback command.
    pub fn with_rollback(mut self, rollback_command: impl Into<String>) -> Self {
        self.rollback_command = Some(rollback_command.into());
        self
    }

    /// Rollback command, if one is set and non-blank.
    pub fn rollback(&self) -> Option<&str> {
        self.rollback_command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
    }

    /// Moves the step to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: StepStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(WaypointError::InvalidStepTransition {
                step_id: self.step_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Marks the step as dispatched and clears the previous attempt.
    pub fn begin(&mut self) -> Result<()> {
        self.transition(StepStatus::Running)?;
        self.start_time = Some(Timestamp::now());
        self.end_time = None;
        self.output.clear();
        self.error.clear();
        Ok(())
    }

    /// Fails a running step without a command report, e.g. after a syntax
    /// check.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(StepStatus::Failed)?;
        self.error = error.into();
        self.end_time = Some(Timestamp::now());
        Ok(())
    }

    /// Records the outcome of a command run for a running step.
    pub fn finish(&mut self, report: CommandReport) -> Result<()> {
        let next = if report.success() {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };
        self.transition(next)?;

        self.output = report.stdout;
        self.error = match report.outcome {
            CommandOutcome::Failed(error) if report.stderr.is_empty() => error.to_string(),
            CommandOutcome::ConfirmationRequired => {
                format!("Confirmation required: {}", report.metadata.reason)
            }
            _ => report.stderr,
        };
        self.metadata = report.metadata;
        self.end_time = Some(Timestamp::now());
        Ok(())
    }
}
