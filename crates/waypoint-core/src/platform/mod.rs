//! Host platform abstraction: command adaptation and supervised execution.
//!
//! [`PlatformAdapter::execute`] is the single place a command is turned into
//! a child process. Every call goes through the same pipeline:
//!
//! ```text
//! length check ─▶ syntax check ─▶ classify ─▶ adapt ─▶ spawn with timeout
//!      │               │              │
//!      ▼               ▼              ▼
//!  Validation      Validation    SafetyBlocked / ConfirmationRequired
//! ```
//!
//! and every call yields a [`CommandReport`]; failures are values, not `Err`.

mod adapter;

use serde::{Deserialize, Serialize};

pub use adapter::PlatformAdapter;

use crate::{
    error::CommandError,
    safety::{Classification, RiskCategory, RiskLevel},
};

/// Operating system family commands are run on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HostPlatform {
    /// Unix-like; commands run under `sh -c`
    Posix,
    /// Windows; commands run under `powershell.exe -Command`
    Windows,
}

impl HostPlatform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Posix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Posix => "posix",
            HostPlatform::Windows => "windows",
        }
    }
}

/// How a command run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Process exited with status zero
    Succeeded,
    /// Command was rejected, could not be spawned, or did not exit cleanly
    Failed(CommandError),
    /// Command needs operator confirmation and was not spawned
    ConfirmationRequired,
}

/// Diagnostics attached to a command run and copied onto the step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RiskCategory>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Command actually handed to the shell, when adaptation changed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapted_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<HostPlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Wall-clock run time of the child process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default)]
    pub confirmation_required: bool,
}

impl CommandMetadata {
    pub(crate) fn apply_classification(&mut self, classification: Classification) {
        self.risk_level = Some(classification.risk_level);
        self.reason = classification.reason;
        self.category = classification.category;
        self.suggestions = classification.suggestions;
    }
}

/// What would happen to a command, without running it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandAnalysis {
    pub command: String,
    pub classification: Classification,
    /// Command as it would be handed to the shell
    pub adapted_command: String,
    pub platform: HostPlatform,
    /// Length or syntax problem that would reject the command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

/// Everything known about one command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub outcome: CommandOutcome,
    /// Trimmed standard output
    pub stdout: String,
    /// Trimmed standard error
    pub stderr: String,
    pub metadata: CommandMetadata,
}

impl CommandReport {
    fn new(outcome: CommandOutcome, metadata: CommandMetadata) -> Self {
        Self {
            outcome,
            stdout: String::new(),
            stderr: String::new(),
            metadata,
        }
    }

    /// True when the process ran and exited with status zero.
    pub fn success(&self) -> bool {
        self.outcome == CommandOutcome::Succeeded
    }

    pub fn requires_confirmation(&self) -> bool {
        self.outcome == CommandOutcome::ConfirmationRequired
    }

    /// Failure reason, if the run failed.
    pub fn error(&self) -> Option<&CommandError> {
        match &self.outcome {
            CommandOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}
