//! High-level planner API: the composition root of the engine.
//!
//! The [`Planner`] owns one [`PlanStore`], one [`PlanExecutor`] and the
//! session memory the executor reports to. Every interface of the engine
//! (the `wp` CLI, tests, embedding applications) goes through it.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │    Planner      │    │  PlanExecutor   │    │ PlatformAdapter │
//! │ (plan_ops,      │───▶│ (scheduling,    │───▶│ (classify,      │
//! │  execution_ops) │    │  rollback)      │    │  spawn)         │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   PlanStore     │
//! │ (JSON snapshot) │
//! └─────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: Factory for creating [`Planner`] instances with configuration
//! - [`plan_ops`]: Plan creation, lookup, cancellation and pruning
//! - [`execution_ops`]: Execution, rollback and command analysis
//!
//! # Usage Examples
//!
//! ```rust
//! use waypoint_core::{
//!     params::{CreatePlan, DependencyRef, ExecutePlan, StepSpec},
//!     PlannerBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let planner = PlannerBuilder::new().in_memory().build().await?;
//!
//! let plan = planner
//!     .create_plan(&CreatePlan {
//!         description: "Say hello".to_string(),
//!         user_intent: "greet twice".to_string(),
//!         steps: vec![
//!             StepSpec {
//!                 command: "echo hello".to_string(),
//!                 ..StepSpec::default()
//!             },
//!             StepSpec {
//!                 command: "echo again".to_string(),
//!                 dependencies: vec![DependencyRef::Index(0)],
//!                 ..StepSpec::default()
//!             },
//!         ],
//!         ..CreatePlan::default()
//!     })
//!     .await?;
//!
//! let result = planner
//!     .execute_plan(&ExecutePlan {
//!         id: plan.plan_id.clone(),
//!         force: false,
//!     })
//!     .await?;
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::task;

pub mod builder;
pub mod execution_ops;
pub mod plan_ops;


pub use builder::PlannerBuilder;

use crate::{
    config::EngineConfig,
    error::{Result, WaypointError},
    executor::PlanExecutor,
    memory::SessionLog,
    store::PlanStore,
};

/// Main planner interface for creating, running and inspecting plans.
pub struct Planner {
    pub(crate) store: Arc<PlanStore>,
    pub(crate) executor: PlanExecutor,
    pub(crate) session: Arc<SessionLog>,
    pub(crate) config: EngineConfig,
    plan_counter: AtomicU64,
}

impl Planner {
    pub(crate) fn new(store: PlanStore, session: SessionLog, config: EngineConfig) -> Self {
        let session = Arc::new(session);
        let executor = PlanExecutor::new(&config, session.clone());
        Self {
            store: Arc::new(store),
            executor,
            session,
            config,
            plan_counter: AtomicU64::new(0),
        }
    }

    /// The configuration this planner was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Session memory the executor reports executed commands to.
    pub fn session(&self) -> &SessionLog {
        &self.session
    }

    pub(crate) fn next_plan_counter(&self) -> u64 {
        self.plan_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Runs blocking store IO off the async runtime.
    pub(crate) async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&PlanStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|e| WaypointError::Configuration {
                message: format!("Task join error: {e}"),
            })?
    }
}
