//! Application driver.
//!
//! Runs a [`Plan`] item by item against an [`EventStore`]. Each item is
//! its own transaction; the first failure stops the run and everything
//! committed before it stays committed.

use crate::error::Error;
use crate::model::{Event, NewEvent};
use crate::plan::{ApplyMode, Plan, PlanItem};
use crate::store::EventStore;

/// Lifecycle of a single plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Executing,
    Committed,
    RolledBack,
    Failed,
}

/// The item that stopped a run.
#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub filename: String,
    pub error: Error,
}

/// What happened when a plan was applied.
#[derive(Debug)]
pub struct ApplyReport {
    /// Final state of every plan item, in plan order.
    pub states: Vec<ItemState>,
    /// Events appended by committed items.
    pub committed: Vec<Event>,
    pub failure: Option<ItemFailure>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn planned(&self) -> usize {
        self.states.len()
    }

    /// Committed events, or the error of the item that stopped the run.
    pub fn into_result(self) -> Result<Vec<Event>, Error> {
        match self.failure {
            None => Ok(self.committed),
            Some(failure) => Err(failure.error),
        }
    }
}

fn transition(states: &mut [ItemState], index: usize, filename: &str, next: ItemState) {
    tracing::debug!("{} [{}]: {:?} -> {:?}", filename, index + 1, states[index], next);
    states[index] = next;
}

/// Apply `plan` sequentially, stopping at the first failed item.
pub async fn apply_plan<S>(store: &mut S, plan: &Plan) -> ApplyReport
where
    S: EventStore + ?Sized,
{
    let mut states = vec![ItemState::Pending; plan.len()];
    let mut committed = Vec::with_capacity(plan.len());

    for (index, item) in plan.iter().enumerate() {
        let filename = item.filename();
        transition(&mut states, index, filename, ItemState::Executing);

        match apply_item(store, item).await {
            Ok(event) => {
                transition(&mut states, index, filename, ItemState::Committed);
                tracing::info!(
                    "{} {} migration {} (event {})",
                    match item.mode {
                        ApplyMode::Execute => "Applied",
                        ApplyMode::ShadowOnly => "Baselined",
                    },
                    item.script.kind,
                    filename,
                    event.id
                );
                committed.push(event);
            }
            Err(error) => {
                transition(&mut states, index, filename, ItemState::RolledBack);
                tracing::warn!("Rolled back {}: {}", filename, error);
                transition(&mut states, index, filename, ItemState::Failed);
                return ApplyReport {
                    states,
                    committed,
                    failure: Some(ItemFailure {
                        index,
                        filename: filename.to_string(),
                        error,
                    }),
                };
            }
        }
    }

    ApplyReport {
        states,
        committed,
        failure: None,
    }
}

async fn apply_item<S>(store: &mut S, item: &PlanItem) -> Result<Event, Error>
where
    S: EventStore + ?Sized,
{
    let event = NewEvent::for_script(&item.script);
    let body = match item.mode {
        ApplyMode::Execute => Some(item.script.content.as_str()),
        ApplyMode::ShadowOnly => None,
    };
    store.apply_in_transaction(body, &event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, MigrationScript};
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn plan(names: &[&str]) -> Plan {
        names
            .iter()
            .map(|n| PlanItem::execute(MigrationScript::new(*n, format!("-- {}", n))))
            .collect()
    }

    #[tokio::test]
    async fn test_applies_in_order() {
        let mut store = InMemoryStore::new();
        let report = apply_plan(&mut store, &plan(&["v1.sql", "v2.sql", "r.repeatable.sql"])).await;

        assert!(report.is_success());
        assert_eq!(report.states, vec![ItemState::Committed; 3]);
        let kinds: Vec<_> = store.events().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Versioned, EventKind::Versioned, EventKind::Repeatable]
        );
        assert_eq!(store.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut store = InMemoryStore::new();
        store.fail_on("v2.sql");
        let report = apply_plan(&mut store, &plan(&["v1.sql", "v2.sql", "v3.sql"])).await;

        assert_eq!(
            report.states,
            vec![ItemState::Committed, ItemState::Failed, ItemState::Pending]
        );
        assert_eq!(report.committed.len(), 1);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.filename, "v2.sql");
        // v1 stays applied, v3 never ran.
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.executed(), &["v1.sql".to_string()]);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_shadow_items_do_not_execute() {
        let mut store = InMemoryStore::new();
        store.fail_on("v1.sql");
        let plan: Plan = [PlanItem::shadow(MigrationScript::new("v1.sql", "boom"))]
            .into_iter()
            .collect();
        let report = apply_plan(&mut store, &plan).await;

        assert!(report.is_success());
        assert!(store.executed().is_empty());
        assert_eq!(store.events()[0].script, "boom");
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let mut store = InMemoryStore::new();
        let report = apply_plan(&mut store, &Plan::default()).await;
        assert!(report.is_success());
        assert_eq!(report.planned(), 0);
    }
}
