//! Plan operations for the Planner.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use jiff::Zoned;
use log::{info, warn};

use super::Planner;
use crate::{
    error::{Result, WaypointError},
    models::{ExecutionPlan, PlanReport, PlanStep},
    params::{CreatePlan, DependencyRef, Id, PrunePlans, StepSpec},
};

impl Planner {
    /// Builds a plan from `params` and stores it.
    ///
    /// Steps without an explicit id are named `<plan_id>_step_<n>` (one
    /// based). Dependency references are resolved against the step list:
    ///
    /// - a number, or a string of digits, is a zero-based step index
    /// - a string naming a step id is kept as is
    /// - a string equal to the command of an earlier step points to that step
    /// - anything else is dropped with a warning
    ///
    /// An index past the end of the list becomes a dependency on a step that
    /// does not exist, so the dependent step never becomes ready.
    pub async fn create_plan(&self, params: &CreatePlan) -> Result<ExecutionPlan> {
        let plan_id = match &params.plan_id {
            Some(plan_id) if plan_id.trim().is_empty() => {
                return Err(WaypointError::invalid_input("plan_id").with_reason("must not be empty"));
            }
            Some(plan_id) => plan_id.clone(),
            None => self.generate_plan_id(),
        };

        let mut plan = ExecutionPlan::new(&plan_id, &params.description, &params.user_intent);
        plan.requires_confirmation = params.requires_confirmation;
        plan.confirmation_message = params.confirmation_message.clone();
        plan.working_directory = params.working_directory.as_deref().map(absolute_directory);

        let step_ids: Vec<String> = params
            .steps
            .iter()
            .enumerate()
            .map(|(index, spec)| match &spec.step_id {
                Some(step_id) => step_id.clone(),
                None => format!("{plan_id}_step_{}", index + 1),
            })
            .collect();

        for (index, spec) in params.steps.iter().enumerate() {
            let dependencies = resolve_dependencies(&plan_id, &params.steps, &step_ids, index);
            let mut step = PlanStep::new(&step_ids[index], &spec.command)
                .with_description(&spec.description)
                .with_dependencies(dependencies);
            if let Some(rollback) = &spec.rollback_command {
                step = step.with_rollback(rollback);
            }
            plan.add_step(step)?;
        }

        if let Some(cycle) = plan.find_dependency_cycle() {
            warn!(
                "Plan {plan_id} has a dependency cycle and will not complete: {}",
                cycle.join(" -> ")
            );
        }

        let stored = plan.clone();
        self.blocking(move |store| store.insert(stored)).await?;
        info!("Created plan {plan_id} with {} steps", plan.steps.len());
        Ok(plan)
    }

    /// Stores a fully formed plan as is.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::InvalidInput` for an empty plan id, duplicate
    /// step ids, or a plan id that is already taken.
    pub async fn add_plan(&self, plan: ExecutionPlan) -> Result<ExecutionPlan> {
        if plan.plan_id.trim().is_empty() {
            return Err(WaypointError::invalid_input("plan_id").with_reason("must not be empty"));
        }

        let mut seen = HashSet::new();
        if let Some(step) = plan.steps.iter().find(|step| !seen.insert(&step.step_id)) {
            return Err(WaypointError::invalid_input("step_id")
                .with_reason(format!("duplicate step id '{}'", step.step_id)));
        }

        let stored = plan.clone();
        self.blocking(move |store| store.insert(stored)).await?;
        Ok(plan)
    }

    /// Current state of a plan with its progress summary.
    pub async fn get_plan_status(&self, params: &Id) -> Result<PlanReport> {
        self.store
            .get(&params.id)
            .map(PlanReport::from)
            .ok_or_else(|| WaypointError::PlanNotFound {
                id: params.id.clone(),
            })
    }

    /// Pending and in-progress plans, oldest first.
    pub async fn list_active_plans(&self) -> Result<Vec<PlanReport>> {
        Ok(self
            .store
            .list_active()
            .into_iter()
            .map(PlanReport::from)
            .collect())
    }

    /// Every stored plan, oldest first.
    pub async fn list_plans(&self) -> Result<Vec<PlanReport>> {
        Ok(self.store.list().into_iter().map(PlanReport::from).collect())
    }

    /// Cancels a plan. Returns `false` when the plan already finished.
    ///
    /// A plan that is executing stops before its next batch of steps; the
    /// commands already running are left to finish.
    pub async fn cancel_plan(&self, params: &Id) -> Result<bool> {
        let plan_id = params.id.clone();
        self.blocking(move |store| store.cancel(&plan_id)).await
    }

    /// Removes the oldest finished plans beyond `max_retained`. Returns the
    /// removed plan ids.
    pub async fn prune_completed_plans(&self, params: &PrunePlans) -> Result<Vec<String>> {
        let max_retained = params.max_retained;
        self.blocking(move |store| store.prune(max_retained)).await
    }

    /// `plan_<YYYYmmdd_HHMMSS>_<counter>`, skipping ids already in the store.
    fn generate_plan_id(&self) -> String {
        let stamp = Zoned::now().strftime("%Y%m%d_%H%M%S").to_string();
        loop {
            let plan_id = format!("plan_{stamp}_{}", self.next_plan_counter());
            if !self.store.contains(&plan_id) {
                return plan_id;
            }
        }
    }
}

fn absolute_directory(directory: &Path) -> PathBuf {
    if directory.is_absolute() {
        return directory.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(directory),
        Err(e) => {
            warn!("Cannot resolve '{}': {e}", directory.display());
            directory.to_path_buf()
        }
    }
}

fn resolve_dependencies(
    plan_id: &str,
    specs: &[StepSpec],
    step_ids: &[String],
    index: usize,
) -> Vec<String> {
    let step_id = &step_ids[index];
    let mut resolved: Vec<String> = Vec::new();

    for dependency in &specs[index].dependencies {
        let target = match dependency {
            DependencyRef::Index(position) => Some(index_target(plan_id, step_ids, *position)),
            DependencyRef::Name(name) => match name.parse::<usize>() {
                Ok(position) => Some(index_target(plan_id, step_ids, position)),
                Err(_) if step_ids.contains(name) || name.starts_with(plan_id) => {
                    Some(name.clone())
                }
                Err(_) => specs[..index]
                    .iter()
                    .position(|earlier| earlier.command == *name)
                    .map(|position| step_ids[position].clone()),
            },
        };

        match target {
            Some(target) => {
                if !step_ids.contains(&target) {
                    warn!("Step {step_id} depends on unknown step {target}; it will never run");
                }
                if !resolved.contains(&target) {
                    resolved.push(target);
                }
            }
            None => warn!("Dropping unresolvable dependency '{dependency}' of step {step_id}"),
        }
    }

    resolved
}

fn index_target(plan_id: &str, step_ids: &[String], position: usize) -> String {
    match step_ids.get(position) {
        Some(step_id) => step_id.clone(),
        None => format!("{plan_id}_step_{}", position + 1),
    }
}
