//! Session memory: a bounded log of executed commands and the last known
//! working directory.

use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use jiff::Timestamp;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    error::{IoResultExt, Result},
    store::write_atomically,
};

/// Maximum number of commands a [`SessionLog`] keeps.
pub const SESSION_HISTORY_LIMIT: usize = 100;

/// One executed command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    pub command: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Operator request of the plan the command belonged to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub intent: String,
    pub timestamp: Timestamp,
}

impl CommandRecord {
    pub fn new(command: impl Into<String>, success: bool) -> Self {
        Self {
            command: command.into(),
            success,
            output: String::new(),
            error: String::new(),
            working_directory: None,
            plan_id: None,
            step_id: None,
            intent: String::new(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Sink the executor reports executed commands and directory changes to.
pub trait SessionMemory: Send + Sync {
    fn record_command(&self, record: CommandRecord);

    fn update_current_directory(&self, directory: &Path);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionState {
    #[serde(default)]
    commands: VecDeque<CommandRecord>,
    #[serde(default)]
    current_directory: Option<PathBuf>,
}

/// [`SessionMemory`] holding the most recent commands, optionally mirrored to
/// a JSON file after every change.
#[derive(Debug, Default)]
pub struct SessionLog {
    path: Option<PathBuf>,
    state: Mutex<SessionState>,
}

impl SessionLog {
    /// A log that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the log at `path`, loading its contents if the file exists.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::FileSystem` if the file exists but cannot be
    /// read, or `WaypointError::Serialization` if it is not a session log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let contents = fs::read_to_string(&path).with_path(&path)?;
            serde_json::from_str(&contents)?
        } else {
            SessionState::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Most recent commands, oldest first, at most `limit` of them.
    pub fn recent_commands(&self, limit: usize) -> Vec<CommandRecord> {
        let state = self.lock();
        let skip = state.commands.len().saturating_sub(limit);
        state.commands.iter().skip(skip).cloned().collect()
    }

    pub fn current_directory(&self) -> Option<PathBuf> {
        self.lock().current_directory.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn persist(&self, state: &SessionState) {
        let Some(path) = &self.path else {
            return;
        };
        let written = serde_json::to_vec_pretty(state)
            .map_err(Into::into)
            .and_then(|bytes| write_atomically(path, &bytes));
        if let Err(e) = written {
            warn!("Failed to save session log to '{}': {e}", path.display());
        }
    }
}

impl SessionMemory for SessionLog {
    fn record_command(&self, record: CommandRecord) {
        let mut state = self.lock();
        state.commands.push_back(record);
        while state.commands.len() > SESSION_HISTORY_LIMIT {
            state.commands.pop_front();
        }
        self.persist(&state);
    }

    fn update_current_directory(&self, directory: &Path) {
        let mut state = self.lock();
        state.current_directory = Some(directory.to_path_buf());
        self.persist(&state);
    }
}
