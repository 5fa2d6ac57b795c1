//! Keyed plan collection with JSON snapshot persistence.
//!
//! The snapshot is a JSON object mapping `plan_id` to the full plan. Every
//! mutating operation rewrites the whole file through a uniquely named
//! temporary sibling that is persisted over the target, so readers never
//! observe a partially written snapshot. A mutation is applied in memory only
//! after its snapshot was written. All mutation and snapshot writes go through
//! one mutex per store.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use jiff::Timestamp;
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::{
    error::{IoResultExt, Result, WaypointError},
    models::{ExecutionPlan, PlanStatus},
};

/// Writes `bytes` to a fresh temporary file next to `path` and persists it
/// over the target.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_path(parent)?;

    let mut temp = NamedTempFile::new_in(parent).with_path(parent)?;
    temp.write_all(bytes).with_path(temp.path())?;
    temp.persist(path).map_err(|e| e.error).with_path(path)?;
    Ok(())
}

type Plans = BTreeMap<String, ExecutionPlan>;

#[derive(Debug, Default)]
struct StoreState {
    plans: Plans,
    running: HashSet<String>,
}

/// Result of trying to take a plan for execution.
#[derive(Debug)]
pub enum Claim<'a> {
    /// The plan was free; it stays claimed until the guard is dropped
    Ready {
        plan: ExecutionPlan,
        guard: RunGuard<'a>,
    },
    /// Another execution or rollback of the plan is in flight
    AlreadyRunning,
    NotFound,
}

/// Marks a plan as being executed; releases it on drop.
#[derive(Debug)]
pub struct RunGuard<'a> {
    store: &'a PlanStore,
    plan_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.store.lock().running.remove(&self.plan_id);
    }
}

/// Owns every plan known to one engine instance.
#[derive(Debug, Default)]
pub struct PlanStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl PlanStore {
    /// A store without a snapshot file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store backed by the snapshot at `path`, loading it if the
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::FileSystem` if the snapshot cannot be read, or
    /// `WaypointError::Serialization` if it is not a valid snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let plans: Plans = if path.exists() {
            let contents = fs::read_to_string(&path).with_path(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} plans from '{}'", plans.len(), path.display());

        Ok(Self {
            path: Some(path),
            state: Mutex::new(StoreState {
                plans,
                running: HashSet::new(),
            }),
        })
    }

    /// Path of the snapshot file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, plans: &Plans) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(plans)?;
        write_atomically(path, &bytes)?;
        debug!("Saved {} plans to '{}'", plans.len(), path.display());
        Ok(())
    }

    /// Writes `candidate` to the snapshot and, once that succeeded, makes it
    /// the in-memory state.
    fn commit(&self, state: &mut StoreState, candidate: Plans) -> Result<()> {
        self.persist(&candidate)?;
        state.plans = candidate;
        Ok(())
    }

    /// Adds a new plan.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::InvalidInput` if a plan with the same id
    /// exists, or a snapshot write error.
    pub fn insert(&self, plan: ExecutionPlan) -> Result<()> {
        let mut state = self.lock();
        if state.plans.contains_key(&plan.plan_id) {
            return Err(WaypointError::invalid_input("plan_id")
                .with_reason(format!("plan '{}' already exists", plan.plan_id)));
        }
        let plan_id = plan.plan_id.clone();
        let steps = plan.steps.len();
        let mut candidate = state.plans.clone();
        candidate.insert(plan_id.clone(), plan);
        self.commit(&mut state, candidate)?;
        info!("Stored plan {plan_id} with {steps} steps");
        Ok(())
    }

    pub fn get(&self, plan_id: &str) -> Option<ExecutionPlan> {
        self.lock().plans.get(plan_id).cloned()
    }

    pub fn contains(&self, plan_id: &str) -> bool {
        self.lock().plans.contains_key(plan_id)
    }

    /// Every plan, oldest first.
    pub fn list(&self) -> Vec<ExecutionPlan> {
        let mut plans: Vec<_> = self.lock().plans.values().cloned().collect();
        plans.sort_by(|a, b| {
            a.created_time
                .cmp(&b.created_time)
                .then_with(|| a.plan_id.cmp(&b.plan_id))
        });
        plans
    }

    /// Plans that are pending or in progress, oldest first.
    pub fn list_active(&self) -> Vec<ExecutionPlan> {
        self.list()
            .into_iter()
            .filter(|plan| !plan.status.is_terminal())
            .collect()
    }

    /// Takes a plan for execution or rollback. At most one claim per plan
    /// exists at a time.
    pub fn claim(&self, plan_id: &str) -> Claim<'_> {
        let mut state = self.lock();
        let Some(plan) = state.plans.get(plan_id).cloned() else {
            return Claim::NotFound;
        };
        if !state.running.insert(plan_id.to_string()) {
            return Claim::AlreadyRunning;
        }
        Claim::Ready {
            plan,
            guard: RunGuard {
                store: self,
                plan_id: plan_id.to_string(),
            },
        }
    }

    pub fn is_running(&self, plan_id: &str) -> bool {
        self.lock().running.contains(plan_id)
    }

    /// Replaces the stored copy of a plan with `plan`.
    ///
    /// A plan cancelled while it was executing stays cancelled: the step
    /// results of `plan` are merged in but its status is not. The returned
    /// plan is what the store now holds.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::PlanNotFound` if the plan was removed, or a
    /// snapshot write error.
    pub fn write_back(&self, plan: &ExecutionPlan) -> Result<ExecutionPlan> {
        let mut state = self.lock();
        let mut candidate = state.plans.clone();
        let stored = candidate
            .get_mut(&plan.plan_id)
            .ok_or_else(|| WaypointError::PlanNotFound {
                id: plan.plan_id.clone(),
            })?;

        if stored.status == PlanStatus::Cancelled && plan.status != PlanStatus::Cancelled {
            stored.steps = plan.steps.clone();
            stored.working_directory = plan.working_directory.clone();
            stored.metadata = plan.metadata.clone();
        } else {
            *stored = plan.clone();
        }
        let result = stored.clone();

        self.commit(&mut state, candidate)?;
        Ok(result)
    }

    /// Cancels a pending or in-progress plan. Returns `false` when the plan
    /// is already terminal.
    ///
    /// # Errors
    ///
    /// Returns `WaypointError::PlanNotFound` for an unknown id, or a snapshot
    /// write error.
    pub fn cancel(&self, plan_id: &str) -> Result<bool> {
        let mut state = self.lock();
        let mut candidate = state.plans.clone();
        let plan = candidate
            .get_mut(plan_id)
            .ok_or_else(|| WaypointError::PlanNotFound {
                id: plan_id.to_string(),
            })?;

        if plan.status.is_terminal() {
            return Ok(false);
        }
        plan.transition(PlanStatus::Cancelled)?;

        self.commit(&mut state, candidate)?;
        info!("Cancelled plan {plan_id}");
        Ok(true)
    }

    /// Removes the oldest terminal plans so that at most `max_retained`
    /// remain. Plans are ordered by `end_time`, falling back to
    /// `created_time`. Returns the removed ids.
    ///
    /// # Errors
    ///
    /// Returns a snapshot write error.
    pub fn prune(&self, max_retained: usize) -> Result<Vec<String>> {
        let mut state = self.lock();

        let mut terminal: Vec<(Timestamp, String)> = state
            .plans
            .values()
            .filter(|plan| plan.status.is_terminal() && !state.running.contains(&plan.plan_id))
            .map(|plan| {
                (
                    plan.end_time.unwrap_or(plan.created_time),
                    plan.plan_id.clone(),
                )
            })
            .collect();
        terminal.sort();

        let excess = terminal.len().saturating_sub(max_retained);
        let removed: Vec<String> = terminal
            .into_iter()
            .take(excess)
            .map(|(_, plan_id)| plan_id)
            .collect();

        if removed.is_empty() {
            return Ok(removed);
        }
        let mut candidate = state.plans.clone();
        for plan_id in &removed {
            candidate.remove(plan_id);
        }

        self.commit(&mut state, candidate)?;
        info!("Pruned {} finished plans", removed.len());
        Ok(removed)
    }

    /// Whether the stored copy of the plan has been cancelled.
    pub fn is_cancelled(&self, plan_id: &str) -> bool {
        self.lock()
            .plans
            .get(plan_id)
            .is_some_and(|plan| plan.status == PlanStatus::Cancelled)
    }
}
