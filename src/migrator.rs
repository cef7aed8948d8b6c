//! Command-level orchestration.
//!
//! Every mutating operation follows the same steps: take the store lock,
//! reconcile from scratch, refuse an invalid state, plan, apply, then
//! reconcile again so the caller can report the resulting state.
//!
//! Once anything has been applied the [`Outcome`] is always returned, even
//! if that final reconcile fails.

use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::driver::{ApplyReport, apply_plan};
use crate::error::Result;
use crate::plan::{Plan, plan_apply, plan_baseline, plan_undo};
use crate::state::{ReconciledState, reconcile};
use crate::store::EventStore;

/// Result of a mutating operation.
#[derive(Debug)]
pub struct Outcome {
    pub plan: Plan,
    pub report: ApplyReport,
    /// State reconciled after the run, or why it could not be read back.
    pub state: Result<ReconciledState>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }

    pub fn applied(&self) -> usize {
        self.report.committed.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Apply(Option<usize>),
    Undo(usize),
    Baseline(Option<&'a str>),
}

pub struct Migrator<S> {
    store: S,
    directory: PathBuf,
}

impl<S: EventStore> Migrator<S> {
    pub fn new(store: S, directory: impl Into<PathBuf>) -> Self {
        Self {
            store,
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reconcile the current history against the migration directory.
    pub async fn load_state(&mut self) -> Result<ReconciledState> {
        let events = self.store.read_all().await?;
        let catalog = Catalog::load(&self.directory)?;
        Ok(reconcile(&events, catalog))
    }

    /// Apply pending migrations, at most `max_count` of them.
    pub async fn migrate(&mut self, max_count: Option<usize>) -> Result<Outcome> {
        self.run_locked(Operation::Apply(max_count)).await
    }

    /// Undo the `count` most recent versioned migrations, or nothing.
    pub async fn undo(&mut self, count: usize) -> Result<Outcome> {
        self.run_locked(Operation::Undo(count)).await
    }

    /// Record versioned migrations up to `target` as applied without running them.
    pub async fn baseline(&mut self, target: Option<&str>) -> Result<Outcome> {
        self.run_locked(Operation::Baseline(target)).await
    }

    async fn run_locked(&mut self, operation: Operation<'_>) -> Result<Outcome> {
        self.store.lock().await?;
        let result = self.run(operation).await;
        // The session lock also ends with the connection.
        if let Err(e) = self.store.unlock().await {
            tracing::warn!("Failed to release the migration lock: {}", e);
        }
        result
    }

    async fn run(&mut self, operation: Operation<'_>) -> Result<Outcome> {
        let state = self.load_state().await?;
        state.ensure_valid()?;

        let plan = match operation {
            Operation::Apply(max_count) => plan_apply(&state, max_count),
            Operation::Undo(count) => plan_undo(&state, count)?,
            Operation::Baseline(target) => plan_baseline(&state, target)?,
        };
        tracing::debug!(?operation, items = plan.len(), "Planned {:?}", plan.filenames());

        let report = apply_plan(&mut self.store, &plan).await;
        let state = self.load_state().await;
        if let Err(e) = &state {
            tracing::warn!("Could not reload migration state after applying: {}", e);
        }

        Ok(Outcome {
            plan,
            report,
            state,
        })
    }
}
