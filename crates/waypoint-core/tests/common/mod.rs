use waypoint_core::{
    params::{CreatePlan, DependencyRef, StepSpec},
    EngineConfig, PlannerBuilder,
};
use tempfile::TempDir;

/// Helper function to create a test planner
pub async fn create_test_planner() -> (TempDir, waypoint_core::Planner) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("plans.json");
    let planner = PlannerBuilder::new()
        .with_store_path(Some(&store_path))
        .with_config(EngineConfig::default())
        .build()
        .await
        .expect("Failed to create planner");
    (temp_dir, planner)
}

/// A step running `command` after the steps at `dependencies`.
pub fn step(command: &str, dependencies: &[usize]) -> StepSpec {
    StepSpec {
        command: command.to_string(),
        dependencies: dependencies.iter().copied().map(DependencyRef::Index).collect(),
        ..StepSpec::default()
    }
}

pub fn plan_params(intent: &str, steps: Vec<StepSpec>) -> CreatePlan {
    CreatePlan {
        description: format!("Plan for: {intent}"),
        user_intent: intent.to_string(),
        steps,
        ..CreatePlan::default()
    }
}
