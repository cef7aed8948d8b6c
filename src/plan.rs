//! Migration planning.
//!
//! Turns a reconciled state and a request into the exact ordered list of
//! actions the driver will perform. Planning is pure and all-or-nothing:
//! an infeasible request yields a [`PlanError`] and no plan at all.
//!
//! The planners assume the state passed [`ReconciledState::ensure_valid`];
//! the [`Migrator`](crate::Migrator) checks that before planning.

use crate::error::PlanError;
use crate::model::MigrationScript;
use crate::state::ReconciledState;

/// Whether an action runs its script or only records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Execute,
    /// Record the event without running the script (baseline).
    ShadowOnly,
}

/// One action of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
    pub script: MigrationScript,
    pub mode: ApplyMode,
    /// For undo actions, the versioned migration being reversed.
    pub reverts: Option<String>,
}

impl PlanItem {
    pub fn execute(script: MigrationScript) -> Self {
        Self {
            script,
            mode: ApplyMode::Execute,
            reverts: None,
        }
    }

    pub fn shadow(script: MigrationScript) -> Self {
        Self {
            script,
            mode: ApplyMode::ShadowOnly,
            reverts: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.script.filename
    }
}

/// Ordered list of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanItem> {
        self.items.iter()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.filename()).collect()
    }
}

impl FromIterator<PlanItem> for Plan {
    fn from_iter<T: IntoIterator<Item = PlanItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Pending scripts in execution order, at most `max_count` of them.
///
/// Every unapplied versioned script comes before any repeatable one:
/// repeatable objects (views, functions) usually depend on versioned schema.
pub fn plan_apply(state: &ReconciledState, max_count: Option<usize>) -> Plan {
    state
        .unapplied_versioned
        .iter()
        .chain(state.unapplied_repeatable.iter())
        .take(max_count.unwrap_or(usize::MAX))
        .cloned()
        .map(PlanItem::execute)
        .collect()
}

/// Undo the `requested` most recent versioned migrations.
///
/// Undo only ever walks backwards from the latest migration, so only the
/// unbroken run of undo scripts starting at the top of the stack counts.
pub fn plan_undo(state: &ReconciledState, requested: usize) -> Result<Plan, PlanError> {
    let plan: Plan = state
        .applied
        .versioned
        .iter()
        .rev()
        .map_while(|applied| {
            state.catalog.find_undo_for(&applied.filename).map(|undo| PlanItem {
                script: undo.clone(),
                mode: ApplyMode::Execute,
                reverts: Some(applied.filename.clone()),
            })
        })
        .take(requested)
        .collect();

    if plan.len() < requested {
        return Err(PlanError::InsufficientUndo {
            requested,
            available: plan.len(),
        });
    }
    Ok(plan)
}

/// Shadow-apply unapplied versioned scripts up to and including `target`.
///
/// Without a target, baselines to the last unapplied versioned script.
pub fn plan_baseline(state: &ReconciledState, target: Option<&str>) -> Result<Plan, PlanError> {
    let last = state
        .unapplied_versioned
        .last()
        .ok_or(PlanError::NothingToBaseline)?;
    let target = target.unwrap_or(last.filename.as_str());

    let Some(position) = state
        .unapplied_versioned
        .iter()
        .position(|s| s.filename == target)
    else {
        return Err(if state.catalog.versioned().iter().any(|s| s.filename == target) {
            PlanError::NotUnapplied(target.to_string())
        } else {
            PlanError::TargetNotFound(target.to_string())
        });
    };

    Ok(state.unapplied_versioned[..=position]
        .iter()
        .cloned()
        .map(PlanItem::shadow)
        .collect())
}
