//! In-memory event store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;

use super::EventStore;
use crate::error::{Error, Result};
use crate::model::{Event, NewEvent};

/// Keeps the history in a `Vec`. Script bodies are recorded, not run.
///
/// `fail_on` makes the body of a given file fail, which exercises the
/// rollback path of the driver. `disconnect_after` simulates a connection
/// dropped partway through a run.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    events: Vec<Event>,
    executed: Vec<String>,
    failing: HashSet<String>,
    actor: String,
    initialised: bool,
    locked: bool,
    appended: usize,
    disconnect_after: Option<usize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            executed: Vec::new(),
            failing: HashSet::new(),
            actor: "stepwise".to_string(),
            initialised: true,
            locked: false,
            appended: 0,
            disconnect_after: None,
        }
    }

    /// A store whose history table has not been created yet.
    pub fn uninitialised() -> Self {
        Self {
            initialised: false,
            ..Self::new()
        }
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Self::new()
        }
    }

    pub fn initialise(&mut self) {
        self.initialised = true;
    }

    pub fn fail_on(&mut self, filename: impl Into<String>) {
        self.failing.insert(filename.into());
    }

    /// Fail every read once `appends` events have been appended.
    pub fn disconnect_after(&mut self, appends: usize) {
        self.disconnect_after = Some(appends);
    }

    fn check_connected(&self) -> Result<()> {
        match self.disconnect_after {
            Some(limit) if self.appended >= limit => Err(Error::StoreUnavailable(
                "connection to the event store was lost".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Filenames whose bodies were run and committed, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn read_all(&mut self) -> Result<Vec<Event>> {
        self.check_connected()?;
        if !self.initialised {
            return Err(Error::StoreUnavailable(
                "migration events table does not exist".to_string(),
            ));
        }
        Ok(self.events.clone())
    }

    async fn apply_in_transaction(&mut self, body: Option<&str>, event: &NewEvent) -> Result<Event> {
        if !self.initialised {
            return Err(Error::StoreUnavailable(
                "migration events table does not exist".to_string(),
            ));
        }

        if body.is_some() && self.failing.contains(&event.filename) {
            return Err(Error::Execution {
                filename: event.filename.clone(),
                detail: "injected failure".to_string(),
            });
        }

        let id = self.events.last().map_or(1, |e| e.id + 1);
        let stored = Event {
            id,
            kind: event.kind.clone(),
            filename: event.filename.clone(),
            script: event.script.clone(),
            applied_by: self.actor.clone(),
            applied_at: Utc::now().naive_utc(),
        };
        if body.is_some() {
            self.executed.push(event.filename.clone());
        }
        self.events.push(stored.clone());
        self.appended += 1;
        Ok(stored)
    }

    async fn lock(&mut self) -> Result<()> {
        self.locked = true;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        self.locked = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, MigrationScript};

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let mut store = InMemoryStore::new();
        let a = NewEvent::for_script(&MigrationScript::new("v1.sql", "1"));
        let b = NewEvent::for_script(&MigrationScript::new("v2.sql", "2"));
        let first = store.apply_in_transaction(Some("1"), &a).await.unwrap();
        let second = store.apply_in_transaction(None, &b).await.unwrap();
        assert!(second.id > first.id);
        assert_eq!(second.kind, EventKind::Versioned);
        assert_eq!(store.executed(), &["v1.sql".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_appends_nothing() {
        let mut store = InMemoryStore::new();
        store.fail_on("v1.sql");
        let event = NewEvent::for_script(&MigrationScript::new("v1.sql", "1"));
        let err = store.apply_in_transaction(Some("1"), &event).await.unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_after_appends() {
        let mut store = InMemoryStore::new();
        store.disconnect_after(1);
        assert!(store.read_all().await.unwrap().is_empty());

        let event = NewEvent::for_script(&MigrationScript::new("v1.sql", "1"));
        store.apply_in_transaction(Some("1"), &event).await.unwrap();
        assert!(matches!(
            store.read_all().await,
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_uninitialised_is_unavailable() {
        let mut store = InMemoryStore::uninitialised();
        assert!(matches!(
            store.read_all().await,
            Err(Error::StoreUnavailable(_))
        ));
    }
}
