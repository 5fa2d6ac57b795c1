//! Core library for the Waypoint plan execution engine.
//!
//! A plan is an ordered set of shell-command steps with dependency edges.
//! This crate stores plans, schedules their ready steps, runs each command
//! through a risk classifier and a platform adapter, and reports progress,
//! failures and rollback results as structured data.
//!
//! # Architecture
//!
//! - **Models** ([`models`]): plans, steps, their status machines and the
//!   serialized plan report
//! - **Safety** ([`safety`]): static risk classification and syntax checks
//! - **Platform** ([`platform`]): command adaptation and supervised child
//!   processes with timeouts
//! - **Executor** ([`executor`]): the scheduling loop, the virtual working
//!   directory and rollback
//! - **Store** ([`store`]): the keyed plan collection and its JSON snapshot
//! - **Planner** ([`planner`]): the composition root tying them together
//!
//! # Quick Start
//!
//! ```rust
//! use waypoint_core::{
//!     params::{CreatePlan, ExecutePlan, StepSpec},
//!     PlannerBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let planner = PlannerBuilder::new()
//!     .with_store_path(Some("plans.json"))
//!     .build()
//!     .await?;
//!
//! let plan = planner
//!     .create_plan(&CreatePlan {
//!         description: "List files".to_string(),
//!         user_intent: "show me what is here".to_string(),
//!         steps: vec![StepSpec {
//!             command: "ls -la".to_string(),
//!             ..StepSpec::default()
//!         }],
//!         ..CreatePlan::default()
//!     })
//!     .await?;
//!
//! let result = planner
//!     .execute_plan(&ExecutePlan {
//!         id: plan.plan_id,
//!         force: false,
//!     })
//!     .await?;
//! println!(
//!     "{} ({:.0}% complete)",
//!     result.message, result.plan.progress.progress_percentage
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod memory;
pub mod models;
pub mod params;
pub mod platform;
pub mod planner;
pub mod safety;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{CommandError, Result, WaypointError};
pub use executor::{ExecutionResult, RollbackResult};
pub use models::{ExecutionPlan, PlanReport, PlanStatus, PlanStep, Progress, StepStatus};
pub use planner::{Planner, PlannerBuilder};
pub use safety::{Classification, RiskLevel};
