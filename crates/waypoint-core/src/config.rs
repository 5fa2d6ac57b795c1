//! Engine configuration.
//!
//! Values come from defaults, overridden by `WAYPOINT_*` environment
//! variables via [`EngineConfig::from_env`], overridden again by explicit
//! setters (the CLI maps its flags onto those).

use std::{env, time::Duration};

use crate::error::{Result, WaypointError};

/// Default time budget for one command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum command length, in characters.
pub const DEFAULT_MAX_COMMAND_LENGTH: usize = 1000;

/// Default number of ready steps dispatched concurrently.
pub const DEFAULT_MAX_PARALLEL_STEPS: usize = 1;

pub const ENV_COMMAND_TIMEOUT: &str = "WAYPOINT_COMMAND_TIMEOUT";
pub const ENV_MAX_COMMAND_LENGTH: &str = "WAYPOINT_MAX_COMMAND_LENGTH";
pub const ENV_MAX_PARALLEL_STEPS: &str = "WAYPOINT_MAX_PARALLEL_STEPS";

/// Tunables shared by the platform adapter and the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time budget per command; the process is killed when it expires
    pub command_timeout: Duration,
    /// Commands longer than this are rejected before classification
    pub max_command_length: usize,
    /// Upper bound on ready steps run at the same time
    pub max_parallel_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
            max_parallel_steps: DEFAULT_MAX_PARALLEL_STEPS,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `WAYPOINT_*` variables that are set.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::Configuration` if a variable is set but is not
    /// a positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(seconds) = parse_positive(ENV_COMMAND_TIMEOUT, lookup(ENV_COMMAND_TIMEOUT))? {
            config.command_timeout = Duration::from_secs(seconds as u64);
        }
        if let Some(length) =
            parse_positive(ENV_MAX_COMMAND_LENGTH, lookup(ENV_MAX_COMMAND_LENGTH))?
        {
            config.max_command_length = length;
        }
        if let Some(parallel) =
            parse_positive(ENV_MAX_PARALLEL_STEPS, lookup(ENV_MAX_PARALLEL_STEPS))?
        {
            config.max_parallel_steps = parallel;
        }

        Ok(config)
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_command_length(mut self, length: usize) -> Self {
        self.max_command_length = length;
        self
    }

    /// Sets the concurrency bound; zero is treated as one.
    pub fn with_max_parallel_steps(mut self, parallel: usize) -> Self {
        self.max_parallel_steps = parallel.max(1);
        self
    }
}

fn parse_positive(key: &str, value: Option<String>) -> Result<Option<usize>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        _ => Err(WaypointError::configuration(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}
