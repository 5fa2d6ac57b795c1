//! Builder for creating and configuring Planner instances.

use std::path::{Path, PathBuf};

use tokio::task;

use super::Planner;
use crate::{
    config::EngineConfig,
    error::{Result, WaypointError},
    memory::SessionLog,
    store::PlanStore,
};

const APP_PREFIX: &str = "waypoint";
const PLANS_FILE: &str = "plans.json";
const SESSION_FILE: &str = "session.json";

/// Builder for creating and configuring Planner instances.
#[derive(Debug, Clone, Default)]
pub struct PlannerBuilder {
    store_path: Option<PathBuf>,
    session_path: Option<PathBuf>,
    config: Option<EngineConfig>,
    in_memory: bool,
}

impl PlannerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom plan snapshot path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/waypoint/plans.json` or
    /// `~/.local/share/waypoint/plans.json`
    pub fn with_store_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.store_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets a custom session log path. Defaults to `session.json` next to
    /// the plan snapshot.
    pub fn with_session_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.session_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses this configuration instead of reading `WAYPOINT_*` variables.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Keeps plans and session memory in memory only.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Builds the configured planner instance.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::Configuration` if a `WAYPOINT_*` variable is
    /// malformed, `WaypointError::XdgDirectory` if the default data
    /// directory cannot be created, `WaypointError::FileSystem` or
    /// `WaypointError::Serialization` if an existing snapshot cannot be
    /// loaded.
    pub async fn build(self) -> Result<Planner> {
        let config = match self.config {
            Some(config) => config,
            None => EngineConfig::from_env()?,
        };

        if self.in_memory {
            return Ok(Planner::new(
                PlanStore::in_memory(),
                SessionLog::in_memory(),
                config,
            ));
        }

        let store_path = match self.store_path {
            Some(path) => path,
            None => Self::default_data_path(PLANS_FILE)?,
        };
        let session_path = match self.session_path {
            Some(path) => path,
            None => store_path.with_file_name(SESSION_FILE),
        };

        let (store, session) = task::spawn_blocking(move || {
            let store = PlanStore::open(&store_path)?;
            let session = SessionLog::open(&session_path)?;
            Ok::<_, WaypointError>((store, session))
        })
        .await
        .map_err(|e| WaypointError::Configuration {
            message: format!("Task join error: {e}"),
        })??;

        Ok(Planner::new(store, session, config))
    }

    /// Returns a path under the XDG data directory, creating the directory.
    fn default_data_path(file: &str) -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix(APP_PREFIX)
            .place_data_file(file)
            .map_err(|e| WaypointError::XdgDirectory(e.to_string()))
    }
}
