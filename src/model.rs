//! Migration scripts and history events.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// Kind of a migration script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    Versioned,
    Undo,
    Repeatable,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::Versioned => "versioned",
            MigrationKind::Undo => "undo",
            MigrationKind::Repeatable => "repeatable",
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A migration file read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationScript {
    pub kind: MigrationKind,
    pub filename: String,
    #[serde(skip)]
    pub content: String,
}

impl MigrationScript {
    /// Build a script, classifying it by filename.
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            kind: crate::naming::classify(&filename),
            filename,
            content: content.into(),
        }
    }
}

/// Kind column of a history event.
///
/// Unknown values are kept rather than rejected at decode time so the fold
/// can report them as log corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Versioned,
    Undo,
    Repeatable,
    Other(String),
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "versioned" => EventKind::Versioned,
            "undo" => EventKind::Undo,
            "repeatable" => EventKind::Repeatable,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Versioned => "versioned",
            EventKind::Undo => "undo",
            EventKind::Repeatable => "repeatable",
            EventKind::Other(raw) => raw,
        }
    }
}

impl From<MigrationKind> for EventKind {
    fn from(kind: MigrationKind) -> Self {
        match kind {
            MigrationKind::Versioned => EventKind::Versioned,
            MigrationKind::Undo => EventKind::Undo,
            MigrationKind::Repeatable => EventKind::Repeatable,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of the append-only migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub filename: String,
    #[serde(skip)]
    pub script: String,
    pub applied_by: String,
    pub applied_at: NaiveDateTime,
}

/// An event about to be appended. Id, actor and timestamp are assigned by
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub filename: String,
    pub script: String,
}

impl NewEvent {
    pub fn for_script(script: &MigrationScript) -> Self {
        Self {
            kind: script.kind.into(),
            filename: script.filename.clone(),
            script: script.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("versioned"), EventKind::Versioned);
        assert_eq!(EventKind::parse("undo"), EventKind::Undo);
        assert_eq!(EventKind::parse("repeatable"), EventKind::Repeatable);
        assert_eq!(EventKind::parse("up"), EventKind::Other("up".into()));
        assert_eq!(EventKind::parse("up").as_str(), "up");
    }

    #[test]
    fn test_new_event_takes_kind_from_script() {
        let undo = MigrationScript::new("v1.undo.sql", "DROP TABLE t;");
        let event = NewEvent::for_script(&undo);
        assert_eq!(event.kind, EventKind::Undo);
        assert_eq!(event.script, "DROP TABLE t;");
    }
}
