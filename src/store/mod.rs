//! Event stores.
//!
//! An [`EventStore`] owns the append-only history and the transactional
//! execution of scripts. The two have to share a transaction, so a single
//! call runs a script and appends its event atomically.
//!
//! Submodules:
//! - `postgres`: the real store, one table per schema
//! - `memory`: an in-process store for tests and dry runs

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{EVENTS_TABLE, PgStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Event, NewEvent};

#[async_trait]
pub trait EventStore: Send {
    /// Every event, ordered by id.
    ///
    /// Fails with [`Error::StoreUnavailable`](crate::Error::StoreUnavailable)
    /// when the history table does not exist.
    async fn read_all(&mut self) -> Result<Vec<Event>>;

    /// Run `body` (when given) and append `event` in one transaction.
    ///
    /// Either both take effect or neither does. A failing body is reported
    /// as [`Error::Execution`](crate::Error::Execution).
    async fn apply_in_transaction(&mut self, body: Option<&str>, event: &NewEvent) -> Result<Event>;

    /// Take an exclusive lock on the history for a mutating command.
    async fn lock(&mut self) -> Result<()> {
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        Ok(())
    }
}
