//! Plan model definition and dependency-graph queries.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::PathBuf,
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{PlanStatus, PlanStep, StepStatus};
use crate::error::{Result, WaypointError};

/// An ordered set of steps with dependency edges, executed to a terminal
/// status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    /// Identifier, unique across the store
    pub plan_id: String,

    /// Summary of what the plan does
    #[serde(default)]
    pub description: String,

    /// The operator request the plan was produced from
    #[serde(default)]
    pub user_intent: String,

    /// Steps in insertion order
    #[serde(default)]
    pub steps: Vec<PlanStep>,

    /// Current lifecycle status
    #[serde(default)]
    pub status: PlanStatus,

    /// Timestamp when the plan was created (UTC)
    pub created_time: Timestamp,

    /// Timestamp when execution started (UTC)
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    /// Timestamp when the plan reached a terminal status (UTC)
    #[serde(default)]
    pub end_time: Option<Timestamp>,

    /// Whether the operator must confirm before execution
    #[serde(default)]
    pub requires_confirmation: bool,

    /// Message shown to the operator when confirmation is required
    #[serde(default)]
    pub confirmation_message: String,

    /// Last virtual working directory of an execution of this plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Free-form metadata (failure diagnostics, rollback results, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ExecutionPlan {
    /// Creates an empty pending plan.
    pub fn new(
        plan_id: impl Into<String>,
        description: impl Into<String>,
        user_intent: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            description: description.into(),
            user_intent: user_intent.into(),
            steps: Vec::new(),
            status: PlanStatus::Pending,
            created_time: Timestamp::now(),
            start_time: None,
            end_time: None,
            requires_confirmation: false,
            confirmation_message: String::new(),
            working_directory: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Appends a step. Dependencies are not checked here: a dependency on an
    /// unknown step simply never becomes satisfied.
    pub fn add_step(&mut self, step: PlanStep) -> Result<()> {
        if self.get_step(&step.step_id).is_some() {
            return Err(WaypointError::invalid_input("step_id")
                .with_reason(format!("duplicate step id '{}'", step.step_id)));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Looks up a step by id.
    pub fn get_step(&self, step_id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }

    /// Looks up a step by id for mutation.
    pub fn get_step_mut(&mut self, step_id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|step| step.step_id == step_id)
    }

    fn completed_ids(&self) -> HashSet<&str> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .map(|step| step.step_id.as_str())
            .collect()
    }

    /// Indices of pending steps whose dependencies are all completed, in
    /// insertion order.
    pub fn ready_step_indices(&self) -> Vec<usize> {
        let completed = self.completed_ids();

        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.status == StepStatus::Pending)
            .filter(|(_, step)| {
                step.dependencies
                    .iter()
                    .all(|dependency| completed.contains(dependency.as_str()))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Pending steps whose dependencies are all completed, in insertion order.
    pub fn get_ready_steps(&self) -> Vec<&PlanStep> {
        self.ready_step_indices()
            .into_iter()
            .map(|index| &self.steps[index])
            .collect()
    }

    /// True when every step is completed or skipped.
    pub fn is_complete(&self) -> bool {
        self.steps
            .iter()
            .all(|step| matches!(step.status, StepStatus::Completed | StepStatus::Skipped))
    }

    /// True when at least one step failed.
    pub fn has_failed_steps(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == StepStatus::Failed)
    }

    /// Moves the plan to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(WaypointError::InvalidPlanTransition {
                plan_id: self.plan_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Timestamp::now());
        }
        Ok(())
    }

    /// Marks a pending step as skipped. This is the only way a step becomes
    /// skipped; the scheduler never does it on its own.
    pub fn skip_step(&mut self, step_id: &str) -> Result<()> {
        let plan_id = self.plan_id.clone();
        let step = self
            .get_step_mut(step_id)
            .ok_or_else(|| WaypointError::StepNotFound {
                plan_id,
                step_id: step_id.to_string(),
            })?;
        step.transition(StepStatus::Skipped)?;
        step.end_time = Some(Timestamp::now());
        Ok(())
    }

    /// `(step_id, dependency)` pairs whose dependency names no step in this
    /// plan.
    pub fn missing_dependencies(&self) -> Vec<(String, String)> {
        let known: HashSet<&str> = self.steps.iter().map(|s| s.step_id.as_str()).collect();

        self.steps
            .iter()
            .flat_map(|step| {
                step.dependencies
                    .iter()
                    .filter(|dependency| !known.contains(dependency.as_str()))
                    .map(move |dependency| (step.step_id.clone(), dependency.clone()))
            })
            .collect()
    }

    /// Finds one dependency cycle, returned as the step ids along the cycle
    /// with the first id repeated at the end.
    pub fn find_dependency_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            id: &'a str,
            edges: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|s| (*s).to_string()).collect();
                    cycle.push(id.to_string());
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            path.push(id);
            for next in edges.get(id).into_iter().flatten().copied() {
                if let Some(cycle) = visit(next, edges, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let edges: HashMap<&str, Vec<&str>> = self
            .steps
            .iter()
            .map(|step| {
                let targets = step
                    .dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|dependency| self.get_step(dependency).is_some())
                    .collect();
                (step.step_id.as_str(), targets)
            })
            .collect();

        let mut marks = HashMap::new();
        let mut path = Vec::new();
        self.steps
            .iter()
            .find_map(|step| visit(&step.step_id, &edges, &mut marks, &mut path))
    }

    /// Indices of completed steps with a rollback command, newest first.
    pub fn rollback_candidates(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, step)| step.status == StepStatus::Completed && step.rollback().is_some())
            .map(|(index, _)| index)
            .collect()
    }
}
