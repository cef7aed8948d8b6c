//! # stepwise
//!
//! Event-sourced SQL migrations.
//!
//! The applied state of a database is never stored as a counter. It is
//! replayed from an append-only event log on every run and cross-checked
//! against the migration scripts on disk.
//!
//! ## Migration files
//!
//! - `*.sql` - versioned, applied once in filename order
//! - `*.undo.sql` - reverses the versioned file of the same stem
//! - `*.repeatable.sql` - re-applied whenever its content changes
//!
//! ## Pipeline
//!
//! [`Catalog`] + [`EventStore`] -> [`reconcile`] -> planner
//! ([`plan_apply`], [`plan_undo`], [`plan_baseline`]) -> [`apply_plan`].
//! [`Migrator`] chains these for each command.
//!
//! ```no_run
//! use stepwise::{InMemoryStore, Migrator};
//!
//! # async fn example() -> stepwise::Result<()> {
//! let mut migrator = Migrator::new(InMemoryStore::new(), "./db/migration");
//! let outcome = migrator.migrate(None).await?;
//! println!("applied {} migrations", outcome.applied());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod driver;
pub mod error;
pub mod migrator;
pub mod model;
pub mod naming;
pub mod output;
pub mod plan;
pub mod state;
pub mod store;

pub use catalog::Catalog;
pub use driver::{ApplyReport, ItemFailure, ItemState, apply_plan};
pub use error::{Error, PlanError, Result, StateError};
pub use migrator::{Migrator, Outcome};
pub use model::{Event, EventKind, MigrationKind, MigrationScript, NewEvent};
pub use plan::{ApplyMode, Plan, PlanItem, plan_apply, plan_baseline, plan_undo};
pub use state::{AppliedState, ReconciledState, fold_events, reconcile};
pub use store::{EventStore, InMemoryStore, PgStore};
