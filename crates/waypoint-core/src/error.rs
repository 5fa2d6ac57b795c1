//! Error types for the plan execution engine.
//!
//! Two layers of errors exist:
//!
//! - [`WaypointError`] is returned from store, planner and configuration
//!   operations. It is the only error that crosses the public API as `Err`.
//! - [`CommandError`] describes why a single command did not succeed. It is
//!   recorded on steps and in command reports and never escapes the
//!   scheduling loop.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{PlanStatus, StepStatus};

/// Comprehensive error type for engine operations.
#[derive(Error, Debug)]
pub enum WaypointError {
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: String },
    /// Plan is claimed by another execution or rollback
    #[error("Plan {id} is already running")]
    PlanRunning { id: String },
    /// Step not found within a plan
    #[error("Step {step_id} not found in plan {plan_id}")]
    StepNotFound { plan_id: String, step_id: String },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Illegal lifecycle transition of a step
    #[error("Step {step_id} cannot move from {from} to {to}")]
    InvalidStepTransition {
        step_id: String,
        from: StepStatus,
        to: StepStatus,
    },
    /// Illegal lifecycle transition of a plan
    #[error("Plan {plan_id} cannot move from {from} to {to}")]
    InvalidPlanTransition {
        plan_id: String,
        from: PlanStatus,
        to: PlanStatus,
    },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> WaypointError {
        WaypointError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl WaypointError {
    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates a file system error for the given path.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Extension trait mapping IO results onto [`WaypointError::FileSystem`].
pub trait IoResultExt<T> {
    /// Attach the path the IO operation was working on.
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| WaypointError::file_system(path, e))
    }
}

/// Reasons a single command did not run to a successful exit.
///
/// A command awaiting confirmation has not failed and has no variant here; see
/// [`crate::platform::CommandOutcome::ConfirmationRequired`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Empty, oversize or syntactically malformed command
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Command matched a forbidden pattern and was never spawned
    #[error("Blocked by safety policy: {0}")]
    SafetyBlocked(String),
    /// Process exited unsuccessfully
    #[error("Command exited with {}", exit_code_label(.code))]
    NonZeroExit { code: Option<i32> },
    /// Process exceeded its time budget and was killed
    #[error("Command timed out after {seconds} seconds")]
    TimedOut { seconds: u64 },
    /// Process could not be started or awaited
    #[error("Failed to run command: {0}")]
    Spawn(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, WaypointError>;
