//! State reconciliation.
//!
//! The applied state is never stored. It is derived on every invocation by
//! folding the event log, then cross-checked against the catalog:
//!
//! - versioned events push onto a stack, undo events pop the matching top;
//! - repeatable events keep only the latest event per filename;
//! - applied versioned files must be byte-identical on disk (drift check);
//! - no unapplied versioned file may sort before an applied one;
//! - whatever is left over in the catalog is pending.
//!
//! Nothing in this module has side effects. Problems are collected into
//! [`ReconciledState::errors`] and it is up to the caller whether they abort.

use crate::catalog::Catalog;
use crate::diff::line_diff;
use crate::error::{Error, Result, StateError};
use crate::model::{Event, EventKind, MigrationScript};
use crate::naming;

/// Migrations currently in effect, derived from the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedState {
    /// Stack of versioned events still in effect, oldest first.
    pub versioned: Vec<Event>,
    /// Latest event per repeatable filename, ordered by that event.
    pub repeatable: Vec<Event>,
}

impl AppliedState {
    pub fn versioned_event(&self, filename: &str) -> Option<&Event> {
        self.versioned.iter().find(|e| e.filename == filename)
    }

    pub fn repeatable_event(&self, filename: &str) -> Option<&Event> {
        self.repeatable.iter().find(|e| e.filename == filename)
    }

    /// Recorded script of an applied versioned or repeatable migration.
    pub fn script_for(&self, filename: &str) -> Option<&str> {
        self.versioned_event(filename)
            .or_else(|| self.repeatable_event(filename))
            .map(|e| e.script.as_str())
    }
}

/// Fold an ordered event log into the applied state.
///
/// Stops at the first inconsistent event: everything after it is
/// unreliable, so the returned state reflects only the events before it.
pub fn fold_events<'a, I>(events: I) -> (AppliedState, Option<StateError>)
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut state = AppliedState::default();

    for event in events {
        match &event.kind {
            EventKind::Versioned => {
                if state.versioned_event(&event.filename).is_some() {
                    return (
                        state,
                        Some(corruption(
                            event,
                            format!(
                                "versioned migration {} applied again without being undone",
                                event.filename
                            ),
                        )),
                    );
                }
                state.versioned.push(event.clone());
            }
            EventKind::Undo => {
                let Some(top) = state.versioned.last() else {
                    return (
                        state,
                        Some(corruption(event, "undo event without a migration to undo".into())),
                    );
                };
                if naming::undo_filename(&top.filename) != event.filename {
                    let reason = format!(
                        "undo {} does not match the most recently applied migration {}",
                        event.filename, top.filename
                    );
                    return (state, Some(corruption(event, reason)));
                }
                tracing::debug!("Event {} undoes {}", event.id, top.filename);
                state.versioned.pop();
            }
            EventKind::Repeatable => {
                state.repeatable.retain(|e| e.filename != event.filename);
                state.repeatable.push(event.clone());
            }
            EventKind::Other(raw) => {
                return (
                    state,
                    Some(corruption(event, format!("unknown event type {}", raw))),
                );
            }
        }
    }

    (state, None)
}

fn corruption(event: &Event, reason: String) -> StateError {
    StateError::LogCorruption {
        event_id: event.id,
        reason,
    }
}

/// Applied state cross-checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledState {
    pub applied: AppliedState,
    pub catalog: Catalog,
    /// Versioned scripts not yet applied, filename order.
    pub unapplied_versioned: Vec<MigrationScript>,
    /// Repeatable scripts that are new or changed since their last run.
    pub unapplied_repeatable: Vec<MigrationScript>,
    /// Applied repeatable migrations with no file left on disk. Informational.
    pub orphaned_repeatable: Vec<String>,
    pub errors: Vec<StateError>,
}

impl ReconciledState {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Reject a state that must not be migrated further.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidState(self.errors.clone()))
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.unapplied_versioned.is_empty() && self.unapplied_repeatable.is_empty()
    }
}

/// Derive the current state from the event log and the scripts on disk.
pub fn reconcile(events: &[Event], catalog: Catalog) -> ReconciledState {
    let (applied, corruption) = fold_events(events);
    let mut errors: Vec<StateError> = corruption.into_iter().collect();

    for event in &applied.versioned {
        match catalog.versioned().iter().find(|s| s.filename == event.filename) {
            Some(script) if script.content != event.script => {
                errors.push(StateError::Drift {
                    filename: event.filename.clone(),
                    diff: line_diff(&event.script, &script.content),
                });
            }
            Some(_) => {}
            None => errors.push(StateError::MissingFile {
                filename: event.filename.clone(),
            }),
        }
    }

    let unapplied_versioned: Vec<MigrationScript> = catalog
        .versioned()
        .iter()
        .filter(|s| applied.versioned_event(&s.filename).is_none())
        .cloned()
        .collect();

    // Filename order is execution order: nothing new may slot in below
    // the latest applied migration.
    if let Some(latest) = applied.versioned.iter().map(|e| &e.filename).max() {
        errors.extend(
            unapplied_versioned
                .iter()
                .filter(|s| s.filename < *latest)
                .map(|s| StateError::OutOfOrder {
                    filename: s.filename.clone(),
                    after: latest.clone(),
                }),
        );
    }

    let unapplied_repeatable = catalog
        .repeatable()
        .iter()
        .filter(|s| {
            applied
                .repeatable_event(&s.filename)
                .is_none_or(|e| e.script != s.content)
        })
        .cloned()
        .collect();

    let orphaned_repeatable: Vec<String> = applied
        .repeatable
        .iter()
        .filter(|e| catalog.find(&e.filename).is_none())
        .map(|e| e.filename.clone())
        .collect();
    for filename in &orphaned_repeatable {
        tracing::warn!("Applied repeatable migration {} is no longer on disk", filename);
    }

    ReconciledState {
        applied,
        catalog,
        unapplied_versioned,
        unapplied_repeatable,
        orphaned_repeatable,
        errors,
    }
}
