//! Data models for execution plans and their steps.
//!
//! An [`ExecutionPlan`] is an ordered list of [`PlanStep`]s with dependency
//! edges between them. Both carry a closed status enumeration
//! ([`PlanStatus`], [`StepStatus`]) whose legal transitions are checked by
//! `transition` methods, so an illegal move such as `Completed -> Running`
//! is rejected when attempted rather than silently stored.
//!
//! # Step lifecycle
//!
//! ```text
//! Pending ──▶ Running ──▶ Completed
//!    │           └──────▶ Failed
//!    └──▶ Skipped (explicit operator decision only)
//! ```
//!
//! # Plan lifecycle
//!
//! ```text
//! Pending ──▶ InProgress ──▶ Completed | Failed
//!    └───────────┴─────────▶ Cancelled
//! ```
//!
//! # Ready steps
//!
//! [`ExecutionPlan::get_ready_steps`] returns every pending step whose
//! dependencies are all completed, in insertion order. It has no side effects.
//!
//! ```rust
//! use waypoint_core::models::{ExecutionPlan, PlanStep, StepStatus};
//!
//! let mut plan = ExecutionPlan::new("plan_1", "Build", "build the project");
//! plan.add_step(PlanStep::new("fetch", "git pull")).unwrap();
//! plan.add_step(PlanStep::new("build", "make").with_dependencies(["fetch"]))
//!     .unwrap();
//!
//! let ready: Vec<_> = plan.get_ready_steps().iter().map(|s| s.step_id.clone()).collect();
//! assert_eq!(ready, vec!["fetch".to_string()]);
//!
//! plan.steps[0].status = StepStatus::Completed;
//! assert_eq!(plan.get_ready_steps()[0].step_id, "build");
//! ```

pub mod plan;
pub mod status;
pub mod step;
pub mod summary;

#[cfg(test)]
mod tests;

pub use plan::ExecutionPlan;
pub use status::{PlanStatus, StepStatus};
pub use step::PlanStep;
pub use summary::{PlanReport, Progress};
