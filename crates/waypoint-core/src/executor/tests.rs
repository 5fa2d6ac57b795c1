//! Tests for the executor module.

use std::{
    env,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use tempfile::TempDir;

use super::*;
use crate::models::{PlanStep, StepStatus};

#[derive(Default)]
struct RecordingMemory {
    commands: Mutex<Vec<CommandRecord>>,
    directories: Mutex<Vec<PathBuf>>,
}

impl RecordingMemory {
    fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }
}

impl SessionMemory for RecordingMemory {
    fn record_command(&self, record: CommandRecord) {
        self.commands.lock().unwrap().push(record);
    }

    fn update_current_directory(&self, directory: &Path) {
        self.directories
            .lock()
            .unwrap()
            .push(directory.to_path_buf());
    }
}

/// Control that can be cancelled by hand and remembers every checkpoint.
#[derive(Default)]
struct RecordingControl {
    cancelled: AtomicBool,
    checkpoints: Mutex<Vec<Vec<StepStatus>>>,
}

impl ExecutionControl for RecordingControl {
    fn is_cancelled(&self, _plan_id: &str) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn checkpoint<'a>(&'a self, plan: &'a ExecutionPlan) -> BoxFuture<'a, ()> {
        async move {
            tokio::task::yield_now().await;
            self.checkpoints.lock().unwrap().push(statuses(plan));
        }
        .boxed()
    }
}

fn create_test_executor() -> (Arc<RecordingMemory>, PlanExecutor) {
    let memory = Arc::new(RecordingMemory::default());
    let executor = PlanExecutor::new(&EngineConfig::default(), memory.clone());
    (memory, executor)
}

fn plan_in(dir: &Path, steps: Vec<PlanStep>) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new("plan_test", "Test plan", "exercise the executor");
    plan.working_directory = Some(dir.to_path_buf());
    for step in steps {
        plan.add_step(step).unwrap();
    }
    plan
}

fn statuses(plan: &ExecutionPlan) -> Vec<StepStatus> {
    plan.steps.iter().map(|s| s.status).collect()
}

#[cfg(unix)]
#[tokio::test]
async fn test_linear_plan_completes() {
    let temp_dir = TempDir::new().unwrap();
    let (memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "echo first"),
            PlanStep::new("b", "echo second").with_dependencies(["a"]),
            PlanStep::new("c", "echo third").with_dependencies(["b"]),
        ],
    );

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Plan completed");
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.start_time.is_some());
    assert!(plan.end_time.is_some());
    assert_eq!(plan.steps[1].output, "second");
    assert_eq!(result.plan.progress.completed_steps, 3);
    assert_eq!(result.plan.progress.progress_percentage, 100.0);
    assert_eq!(
        memory.commands(),
        vec!["echo first", "echo second", "echo third"]
    );
}

#[tokio::test]
async fn test_empty_plan_completes() {
    let (_memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_empty", "Nothing", "do nothing");

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(result.success);
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_step_stops_plan() {
    let temp_dir = TempDir::new().unwrap();
    let (_memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "echo broken >&2; exit 4"),
            PlanStep::new("b", "echo never").with_dependencies(["a"]),
        ],
    );

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(!result.success);
    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(statuses(&plan), vec![StepStatus::Failed, StepStatus::Pending]);
    assert_eq!(plan.steps[0].error, "broken");
    assert_eq!(plan.steps[0].metadata.exit_code, Some(4));
    assert_eq!(result.plan.progress.failed_steps, 1);
}

#[tokio::test]
async fn test_cycle_fails_without_failing_steps() {
    let (memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_cycle", "Cycle", "loop forever");
    plan.add_step(PlanStep::new("a", "echo a").with_dependencies(["b"]))
        .unwrap();
    plan.add_step(PlanStep::new("b", "echo b").with_dependencies(["a"]))
        .unwrap();

    let result = executor.execute_plan(&mut plan, true, &Unsupervised).await;

    assert!(!result.success);
    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(result.message.contains("dependency cycle"), "{}", result.message);
    assert!(plan.metadata.contains_key("failure_reason"));
    assert_eq!(statuses(&plan), vec![StepStatus::Pending, StepStatus::Pending]);
    assert!(memory.commands().is_empty());
}

#[tokio::test]
async fn test_missing_dependency_deadlocks() {
    let (_memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_missing", "Missing", "wait forever");
    plan.add_step(PlanStep::new("a", "echo a").with_dependencies(["ghost"]))
        .unwrap();

    let result = executor.execute_plan(&mut plan, true, &Unsupervised).await;

    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(result.message.contains("a -> ghost"), "{}", result.message);
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_plan_confirmation_gate() {
    let (memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_gate", "Gate", "needs approval");
    plan.requires_confirmation = true;
    plan.confirmation_message = "This restarts services".to_string();
    plan.add_step(PlanStep::new("a", "echo a")).unwrap();

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(!result.success);
    assert!(result.requires_confirmation);
    assert!(result.message.contains("This restarts services"));
    assert_eq!(plan.status, PlanStatus::Pending);
    assert!(memory.commands().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_risky_step_halts_until_forced() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("old.log");
    std::fs::write(&target, "stale").unwrap();

    let (_memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "echo preparing"),
            PlanStep::new("b", "rm old.log").with_dependencies(["a"]),
        ],
    );

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;
    assert!(result.requires_confirmation);
    assert!(!result.success);
    assert_eq!(plan.status, PlanStatus::InProgress);
    assert_eq!(statuses(&plan), vec![StepStatus::Completed, StepStatus::Pending]);
    assert!(plan.steps[1].metadata.confirmation_required);
    assert!(target.exists());

    let result = executor.execute_plan(&mut plan, true, &Unsupervised).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(!target.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_directory_changes_are_tracked() {
    let temp_dir = TempDir::new().unwrap();
    let process_dir = env::current_dir().unwrap();
    let (memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("mk", "mkdir -p nested"),
            PlanStep::new("cd", "cd nested").with_dependencies(["mk"]),
            PlanStep::new("touch", "touch marker").with_dependencies(["cd"]),
        ],
    );

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(result.success, "{}", result.message);
    let nested = temp_dir.path().join("nested");
    assert!(nested.join("marker").exists());
    assert_eq!(plan.working_directory.as_deref(), Some(nested.as_path()));
    assert_eq!(*memory.directories.lock().unwrap(), vec![nested]);
    assert_eq!(env::current_dir().unwrap(), process_dir);
}

#[tokio::test]
async fn test_syntax_error_fails_step_without_spawning() {
    let (memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_syntax", "Syntax", "broken quoting");
    plan.add_step(PlanStep::new("a", "echo 'unterminated"))
        .unwrap();

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(plan.steps[0].error.contains("Unbalanced"));
    assert!(plan.steps[0].metadata.duration_ms.is_none());
    assert!(!result.success);
    assert_eq!(memory.commands(), vec!["echo 'unterminated"]);
}

#[tokio::test]
async fn test_forbidden_step_is_blocked() {
    let (_memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_forbidden", "Wipe", "wipe the disk");
    plan.add_step(PlanStep::new("a", "rm -rf /")).unwrap();

    executor.execute_plan(&mut plan, true, &Unsupervised).await;

    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(plan.steps[0].error.contains("Blocked by safety policy"));
}

#[tokio::test]
async fn test_cancelled_plan_runs_nothing() {
    let (memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_cancel", "Cancel", "stop early");
    plan.add_step(PlanStep::new("a", "echo a")).unwrap();

    let control = RecordingControl::default();
    control.cancelled.store(true, Ordering::SeqCst);
    let result = executor.execute_plan(&mut plan, false, &control).await;

    assert_eq!(result.message, "Plan cancelled");
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
    assert!(memory.commands().is_empty());
}

#[tokio::test]
async fn test_checkpoint_after_every_batch() {
    let (_memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_checkpoint", "Checkpoint", "save progress");
    plan.add_step(PlanStep::new("a", "echo a")).unwrap();
    plan.add_step(PlanStep::new("b", "echo b").with_dependencies(["a"]))
        .unwrap();

    let control = RecordingControl::default();
    let result = executor.execute_plan(&mut plan, false, &control).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        *control.checkpoints.lock().unwrap(),
        vec![
            vec![StepStatus::Completed, StepStatus::Pending],
            vec![StepStatus::Completed, StepStatus::Completed],
        ]
    );
}

#[tokio::test]
async fn test_terminal_plan_is_not_rerun() {
    let (memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_done", "Done", "already done");
    plan.add_step(PlanStep::new("a", "echo a")).unwrap();
    plan.status = PlanStatus::Failed;

    let result = executor.execute_plan(&mut plan, true, &Unsupervised).await;

    assert_eq!(result.message, "Plan is already failed");
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
    assert!(memory.commands().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_parallel_batch() {
    let temp_dir = TempDir::new().unwrap();
    let memory = Arc::new(RecordingMemory::default());
    let config = EngineConfig::default().with_max_parallel_steps(2);
    let executor = PlanExecutor::new(&config, memory.clone());
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "touch a.txt"),
            PlanStep::new("b", "touch b.txt"),
            PlanStep::new("c", "touch c.txt"),
            PlanStep::new("d", "ls a.txt b.txt c.txt").with_dependencies(["a", "b", "c"]),
        ],
    );

    let result = executor.execute_plan(&mut plan, false, &Unsupervised).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(memory.commands().len(), 4);
    assert_eq!(memory.commands()[3], "ls a.txt b.txt c.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn test_rollback_runs_completed_steps_in_reverse() {
    let temp_dir = TempDir::new().unwrap();
    let (memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "echo a").with_rollback("echo undo-a"),
            PlanStep::new("b", "echo b").with_rollback("echo undo-b"),
            PlanStep::new("c", "echo c").with_rollback("echo undo-c"),
            PlanStep::new("d", "echo d"),
        ],
    );
    plan.steps[0].status = StepStatus::Completed;
    plan.steps[1].status = StepStatus::Completed;
    plan.steps[2].status = StepStatus::Failed;
    plan.steps[3].status = StepStatus::Completed;
    plan.status = PlanStatus::Failed;

    let result = executor.rollback_plan(&mut plan).await;

    assert!(result.success);
    assert_eq!(result.attempted, 2);
    assert_eq!(result.message, "Rollback attempted for 2 steps");
    let replayed: Vec<_> = result
        .results
        .iter()
        .map(|r| r.rollback_command.as_str())
        .collect();
    assert_eq!(replayed, vec!["echo undo-b", "echo undo-a"]);
    assert_eq!(result.results[0].output, "undo-b");
    assert_eq!(memory.commands(), vec!["echo undo-b", "echo undo-a"]);

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert!(plan.metadata.contains_key("rollback"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_rollback_continues_after_failure() {
    let temp_dir = TempDir::new().unwrap();
    let (_memory, executor) = create_test_executor();
    let mut plan = plan_in(
        temp_dir.path(),
        vec![
            PlanStep::new("a", "echo a").with_rollback("echo restored"),
            PlanStep::new("b", "echo b").with_rollback("exit 2"),
        ],
    );
    plan.steps[0].status = StepStatus::Completed;
    plan.steps[1].status = StepStatus::Completed;

    let result = executor.rollback_plan(&mut plan).await;

    assert!(result.success);
    assert_eq!(result.attempted, 2);
    assert!(!result.results[0].success);
    assert!(result.results[0].error.contains("status 2"));
    assert!(result.results[1].success);
}

#[tokio::test]
async fn test_rollback_without_candidates() {
    let (_memory, executor) = create_test_executor();
    let mut plan = ExecutionPlan::new("plan_none", "None", "nothing to undo");
    plan.add_step(PlanStep::new("a", "echo a").with_rollback("   "))
        .unwrap();
    plan.steps[0].status = StepStatus::Completed;

    let result = executor.rollback_plan(&mut plan).await;

    assert!(result.success);
    assert_eq!(result.attempted, 0);
    assert_eq!(result.message, "Rollback attempted for 0 steps");
}
