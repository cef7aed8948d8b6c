//! Error types for stepwise.
//!
//! Reconciliation and planning return their errors as data
//! ([`StateError`], [`PlanError`]); the crate-level [`Error`] is what
//! mutating operations and the stores propagate.

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reconciling the event log against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The event log is internally inconsistent. Retrying will not help.
    #[error("Events table is in a bad state at event {event_id}: {reason}")]
    LogCorruption { event_id: i64, reason: String },

    /// An applied versioned script was edited after it was applied.
    #[error("Migration {filename} has been modified since it was applied.\n\n{diff}")]
    Drift { filename: String, diff: String },

    /// An applied versioned script is no longer on disk.
    #[error("Applied migration {filename} is missing from the migration directory (renamed or deleted)")]
    MissingFile { filename: String },

    /// An unapplied versioned script sorts before one already applied, so
    /// applying it now would break filename order.
    #[error("Unapplied migration {filename} sorts before applied migration {after}")]
    OutOfOrder { filename: String, after: String },
}

impl StateError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, StateError::LogCorruption { .. })
    }

    /// Drift covers both edited and vanished applied scripts.
    pub fn is_drift(&self) -> bool {
        matches!(self, StateError::Drift { .. } | StateError::MissingFile { .. })
    }
}

/// A requested operation cannot be satisfied. Nothing is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error(
        "not enough sequential (from last) undo migrations to apply {requested} undos, only {available} available"
    )]
    InsufficientUndo { requested: usize, available: usize },

    #[error("no unapplied versioned migrations to baseline")]
    NothingToBaseline,

    #[error("'{0}' is not a versioned migration in the migration directory")]
    TargetNotFound(String),

    #[error("'{0}' is not an unapplied versioned migration")]
    NotUnapplied(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Migration state is invalid:\n{}", format_state_errors(.0))]
    InvalidState(Vec<StateError>),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Failed to execute {filename}: {detail}")]
    Execution { filename: String, detail: String },

    #[error("Event store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_state_errors(errors: &[StateError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_classification() {
        let drift = StateError::Drift {
            filename: "v1.sql".into(),
            diff: String::new(),
        };
        let missing = StateError::MissingFile {
            filename: "v1.sql".into(),
        };
        let corrupt = StateError::LogCorruption {
            event_id: 3,
            reason: "x".into(),
        };
        assert!(drift.is_drift());
        assert!(missing.is_drift());
        assert!(!corrupt.is_drift());
        assert!(corrupt.is_corruption());
    }

    #[test]
    fn test_invalid_state_lists_every_error() {
        let err = Error::InvalidState(vec![
            StateError::MissingFile {
                filename: "v1_a.sql".into(),
            },
            StateError::LogCorruption {
                event_id: 7,
                reason: "undo without a migration to undo".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("v1_a.sql"));
        assert!(msg.contains("event 7"));
    }

    #[test]
    fn test_plan_error_converts() {
        let err: Error = PlanError::InsufficientUndo {
            requested: 3,
            available: 2,
        }
        .into();
        assert!(err.to_string().contains("apply 3 undos"));
    }
}
