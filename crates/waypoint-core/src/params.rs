//! Parameter structures for planner operations.
//!
//! These are the data contracts shared by every interface of the engine. They
//! carry no behavior; the [`crate::Planner`] validates and converts them.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   CLI Args      │    │  Core Params    │    │    Planner      │
//! │  (clap derives) │───▶│ (serde derives) │───▶│  (validation)   │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! The plan input is the JSON document produced by an external planner:
//!
//! ```json
//! {
//!   "description": "Build and test",
//!   "user_intent": "build the project and run the tests",
//!   "steps": [
//!     { "command": "cargo build", "description": "Build" },
//!     { "command": "cargo test", "dependencies": [0], "rollback_command": "cargo clean" }
//!   ]
//! }
//! ```

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Generic parameters for operations requiring just a plan id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Id {
    /// The id of the plan to operate on
    pub id: String,
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// A reference from one step to another, as written by the plan author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyRef {
    /// Zero-based position of an earlier step in the `steps` list
    Index(usize),
    /// Step id, an all-digit index, or the command text of an earlier step
    Name(String),
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::Index(index) => write!(f, "{index}"),
            DependencyRef::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for DependencyRef {
    fn from(index: usize) -> Self {
        DependencyRef::Index(index)
    }
}

impl From<&str> for DependencyRef {
    fn from(name: &str) -> Self {
        DependencyRef::Name(name.to_string())
    }
}

/// One step of a plan to create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSpec {
    /// Optional explicit id; generated as `<plan_id>_step_<n>` when absent
    #[serde(default)]
    pub step_id: Option<String>,
    /// Shell command to run
    pub command: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default)]
    pub rollback_command: Option<String>,
}

/// Parameters for creating a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePlan {
    /// Optional explicit id; generated when absent
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_intent: String,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub confirmation_message: String,
    /// Directory the first step runs in; defaults to the process directory
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Parameters for executing a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutePlan {
    pub id: String,
    /// Run past plan- and step-level confirmation requirements
    #[serde(default)]
    pub force: bool,
}

/// Parameters for pruning finished plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrunePlans {
    /// Number of finished plans to keep
    pub max_retained: usize,
}

impl Default for PrunePlans {
    fn default() -> Self {
        Self { max_retained: 10 }
    }
}
