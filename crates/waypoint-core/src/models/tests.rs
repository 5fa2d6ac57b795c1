#[cfg(test)]
mod model_tests {
    use std::str::FromStr;

    use jiff::Timestamp;

    use crate::{
        error::{CommandError, WaypointError},
        models::{ExecutionPlan, PlanReport, PlanStatus, PlanStep, Progress, StepStatus},
        platform::{CommandMetadata, CommandOutcome, CommandReport},
    };

    fn create_test_plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new("plan_1", "Deploy", "deploy the service");
        plan.add_step(PlanStep::new("fetch", "git pull")).unwrap();
        plan.add_step(PlanStep::new("build", "make").with_dependencies(["fetch"]))
            .unwrap();
        plan.add_step(PlanStep::new("lint", "make lint").with_dependencies(["fetch"]))
            .unwrap();
        plan.add_step(
            PlanStep::new("ship", "make deploy")
                .with_dependencies(["build", "lint"])
                .with_rollback("make undeploy"),
        )
        .unwrap();
        plan
    }

    fn ready_ids(plan: &ExecutionPlan) -> Vec<String> {
        plan.get_ready_steps()
            .iter()
            .map(|step| step.step_id.clone())
            .collect()
    }

    fn report(outcome: CommandOutcome, stdout: &str, stderr: &str) -> CommandReport {
        CommandReport {
            outcome,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            metadata: CommandMetadata {
                reason: "`rm` is a destructive operation".to_string(),
                ..CommandMetadata::default()
            },
        }
    }

    #[test]
    fn test_ready_steps_in_insertion_order() {
        let mut plan = create_test_plan();
        assert_eq!(ready_ids(&plan), vec!["fetch"]);

        plan.get_step_mut("fetch").unwrap().status = StepStatus::Completed;
        assert_eq!(ready_ids(&plan), vec!["build", "lint"]);

        plan.get_step_mut("build").unwrap().status = StepStatus::Completed;
        assert_eq!(ready_ids(&plan), vec!["lint"]);
    }

    #[test]
    fn test_ready_steps_is_idempotent() {
        let plan = create_test_plan();
        assert_eq!(ready_ids(&plan), ready_ids(&plan));
        assert_eq!(plan.ready_step_indices(), vec![0]);
    }

    #[test]
    fn test_acyclic_plan_completes_in_step_count_iterations() {
        let mut plan = create_test_plan();
        let mut iterations = 0;

        while !plan.is_complete() {
            let next = plan.ready_step_indices()[0];
            plan.steps[next].status = StepStatus::Completed;
            iterations += 1;
            assert!(iterations <= plan.steps.len());
        }

        assert_eq!(iterations, plan.steps.len());
    }

    #[test]
    fn test_failed_dependency_blocks_dependents() {
        let mut plan = create_test_plan();
        plan.get_step_mut("fetch").unwrap().status = StepStatus::Failed;
        assert!(ready_ids(&plan).is_empty());
        assert!(plan.has_failed_steps());
        assert!(!plan.is_complete());
    }

    #[test]
    fn test_skipped_steps_count_as_complete() {
        let mut plan = ExecutionPlan::new("plan_2", "Skip", "skip things");
        plan.add_step(PlanStep::new("a", "echo a")).unwrap();
        plan.add_step(PlanStep::new("b", "echo b")).unwrap();

        plan.skip_step("a").unwrap();
        plan.steps[1].status = StepStatus::Completed;

        assert_eq!(plan.steps[0].status, StepStatus::Skipped);
        assert!(plan.steps[0].end_time.is_some());
        assert!(plan.is_complete());
        assert!(matches!(
            plan.skip_step("missing"),
            Err(WaypointError::StepNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_plan_is_complete() {
        let plan = ExecutionPlan::new("plan_3", "Empty", "nothing");
        assert!(plan.is_complete());
        assert!(plan.get_ready_steps().is_empty());
    }

    #[test]
    fn test_duplicate_step_id_rejected() {
        let mut plan = create_test_plan();
        let err = plan.add_step(PlanStep::new("fetch", "git fetch")).unwrap_err();
        assert!(matches!(err, WaypointError::InvalidInput { .. }));
        assert_eq!(plan.steps.len(), 4);
    }

    #[test]
    fn test_missing_dependency_never_ready() {
        let mut plan = ExecutionPlan::new("plan_4", "Orphan", "orphan step");
        plan.add_step(PlanStep::new("a", "echo a").with_dependencies(["nope"]))
            .unwrap();

        assert!(plan.get_ready_steps().is_empty());
        assert_eq!(
            plan.missing_dependencies(),
            vec![("a".to_string(), "nope".to_string())]
        );
        assert!(plan.find_dependency_cycle().is_none());
    }

    #[test]
    fn test_find_dependency_cycle() {
        let mut plan = ExecutionPlan::new("plan_5", "Cycle", "cycle");
        plan.add_step(PlanStep::new("a", "echo a").with_dependencies(["c"]))
            .unwrap();
        plan.add_step(PlanStep::new("b", "echo b").with_dependencies(["a"]))
            .unwrap();
        plan.add_step(PlanStep::new("c", "echo c").with_dependencies(["b"]))
            .unwrap();

        let cycle = plan.find_dependency_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);

        assert!(create_test_plan().find_dependency_cycle().is_none());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut plan = ExecutionPlan::new("plan_6", "Self", "self loop");
        plan.add_step(PlanStep::new("a", "echo a").with_dependencies(["a"]))
            .unwrap();
        assert_eq!(
            plan.find_dependency_cycle(),
            Some(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn test_step_transitions() {
        let mut step = PlanStep::new("a", "echo a");
        step.begin().unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.start_time.is_some());

        step.finish(report(CommandOutcome::Succeeded, "a", ""))
            .unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.output, "a");
        assert!(step.end_time.is_some());

        let err = step.begin().unwrap_err();
        assert!(matches!(
            err,
            WaypointError::InvalidStepTransition {
                from: StepStatus::Completed,
                to: StepStatus::Running,
                ..
            }
        ));

        let mut pending = PlanStep::new("b", "echo b");
        assert!(pending.transition(StepStatus::Completed).is_err());
    }

    #[test]
    fn test_step_error_text() {
        let mut step = PlanStep::new("a", "false");
        step.begin().unwrap();
        step.finish(report(
            CommandOutcome::Failed(CommandError::TimedOut { seconds: 30 }),
            "",
            "",
        ))
        .unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error, "Command timed out after 30 seconds");

        let mut step = PlanStep::new("b", "ls missing");
        step.begin().unwrap();
        step.finish(report(
            CommandOutcome::Failed(CommandError::NonZeroExit { code: Some(2) }),
            "",
            "No such file",
        ))
        .unwrap();
        assert_eq!(step.error, "No such file");

        let mut step = PlanStep::new("c", "rm x");
        step.begin().unwrap();
        step.finish(report(CommandOutcome::ConfirmationRequired, "", ""))
            .unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.error.starts_with("Confirmation required"));
    }

    #[test]
    fn test_plan_transitions() {
        let mut plan = create_test_plan();
        assert!(plan.transition(PlanStatus::Completed).is_err());

        plan.transition(PlanStatus::InProgress).unwrap();
        plan.transition(PlanStatus::Failed).unwrap();
        assert!(plan.end_time.is_some());

        let err = plan.transition(PlanStatus::InProgress).unwrap_err();
        assert!(matches!(err, WaypointError::InvalidPlanTransition { .. }));

        let mut pending = create_test_plan();
        pending.transition(PlanStatus::Cancelled).unwrap();
        assert!(pending.transition(PlanStatus::Cancelled).is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PlanStatus::InProgress.to_string(), "in_progress");
        assert_eq!(PlanStatus::from_str("cancelled").unwrap(), PlanStatus::Cancelled);
        assert_eq!(StepStatus::from_str("skipped").unwrap(), StepStatus::Skipped);
        assert!(StepStatus::from_str("done").is_err());
        assert!(PlanStatus::Completed.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn test_rollback_candidates() {
        let mut plan = ExecutionPlan::new("plan_7", "Rollback", "undo");
        plan.add_step(PlanStep::new("a", "touch a").with_rollback("rm a"))
            .unwrap();
        plan.add_step(PlanStep::new("b", "touch b").with_rollback("rm b"))
            .unwrap();
        plan.add_step(PlanStep::new("c", "touch c").with_rollback("rm c"))
            .unwrap();
        plan.steps[0].status = StepStatus::Completed;
        plan.steps[1].status = StepStatus::Completed;
        plan.steps[2].status = StepStatus::Failed;

        assert_eq!(plan.rollback_candidates(), vec![1, 0]);
    }

    #[test]
    fn test_progress() {
        let mut plan = create_test_plan();
        plan.steps[0].status = StepStatus::Completed;
        plan.steps[1].status = StepStatus::Failed;

        let progress = Progress::from(&plan);
        assert_eq!(progress.total_steps, 4);
        assert_eq!(progress.completed_steps, 1);
        assert_eq!(progress.failed_steps, 1);
        assert_eq!(progress.progress_percentage, 25.0);

        let empty = ExecutionPlan::new("plan_8", "Empty", "nothing");
        assert_eq!(Progress::from(&empty).progress_percentage, 0.0);
    }

    #[test]
    fn test_plan_wire_round_trip() {
        let mut plan = create_test_plan();
        plan.created_time = Timestamp::from_second(1_700_000_000).unwrap();
        plan.steps[0].status = StepStatus::Completed;
        plan.metadata
            .insert("origin".to_string(), serde_json::json!("test"));

        let json = serde_json::to_string(&plan).unwrap();
        let decoded: ExecutionPlan = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, plan);
        assert_eq!(decoded.steps[3].dependencies.len(), 2);
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_report_flattens_plan() {
        let plan = create_test_plan();
        let value = serde_json::to_value(PlanReport::from(&plan)).unwrap();

        assert_eq!(value["plan_id"], "plan_1");
        assert_eq!(value["steps"].as_array().unwrap().len(), 4);
        assert_eq!(value["progress"]["total_steps"], 4);
        assert_eq!(value["progress"]["status"], "pending");
    }
}
