//! Migration catalog: the scripts on disk.
//!
//! Reads a migration directory (non-recursive, `.sql` files only),
//! classifies each file by suffix and keeps every kind in filename order.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{MigrationKind, MigrationScript};
use crate::naming;

/// Classified migration scripts, each kind sorted by filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    versioned: Vec<MigrationScript>,
    undo: Vec<MigrationScript>,
    repeatable: Vec<MigrationScript>,
}

impl Catalog {
    /// Read and classify every migration file in `directory`.
    pub fn load(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;

        let mut scripts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(directory, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
            if !file_type.is_file() {
                continue;
            }

            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping non UTF-8 filename {}", path.display());
                continue;
            };
            if !naming::is_migration_file(filename) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            scripts.push(MigrationScript::new(filename, content));
        }

        let catalog = Self::from_scripts(scripts);
        tracing::debug!(
            versioned = catalog.versioned.len(),
            undo = catalog.undo.len(),
            repeatable = catalog.repeatable.len(),
            "Loaded migration catalog from {}",
            directory.display()
        );
        Ok(catalog)
    }

    /// Build a catalog from scripts already in memory.
    pub fn from_scripts(scripts: impl IntoIterator<Item = MigrationScript>) -> Self {
        let mut catalog = Self::default();
        for script in scripts {
            match script.kind {
                MigrationKind::Versioned => catalog.versioned.push(script),
                MigrationKind::Undo => catalog.undo.push(script),
                MigrationKind::Repeatable => catalog.repeatable.push(script),
            }
        }
        catalog.versioned.sort_by(|a, b| a.filename.cmp(&b.filename));
        catalog.undo.sort_by(|a, b| a.filename.cmp(&b.filename));
        catalog.repeatable.sort_by(|a, b| a.filename.cmp(&b.filename));
        catalog
    }

    pub fn versioned(&self) -> &[MigrationScript] {
        &self.versioned
    }

    pub fn undo(&self) -> &[MigrationScript] {
        &self.undo
    }

    pub fn repeatable(&self) -> &[MigrationScript] {
        &self.repeatable
    }

    /// All scripts: versioned, then undo, then repeatable.
    pub fn all(&self) -> impl Iterator<Item = &MigrationScript> {
        self.versioned
            .iter()
            .chain(self.undo.iter())
            .chain(self.repeatable.iter())
    }

    pub fn len(&self) -> usize {
        self.versioned.len() + self.undo.len() + self.repeatable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up any script by filename.
    pub fn find(&self, filename: &str) -> Option<&MigrationScript> {
        let list = match naming::classify(filename) {
            MigrationKind::Versioned => &self.versioned,
            MigrationKind::Undo => &self.undo,
            MigrationKind::Repeatable => &self.repeatable,
        };
        list.iter().find(|s| s.filename == filename)
    }

    /// The undo script paired with a versioned filename, if present.
    pub fn find_undo_for(&self, versioned_filename: &str) -> Option<&MigrationScript> {
        let wanted = naming::undo_filename(versioned_filename);
        self.undo.iter().find(|s| s.filename == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::TempDir;

    #[test]
    fn test_load_classifies_and_sorts() {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("v2_second.sql"), "select 2;").unwrap();
        write(dir.path().join("v1_first.sql"), "select 1;").unwrap();
        write(dir.path().join("v1_first.undo.sql"), "select -1;").unwrap();
        write(dir.path().join("views.repeatable.sql"), "create view v;").unwrap();
        write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let catalog = Catalog::load(dir.path()).unwrap();

        let versioned: Vec<_> = catalog.versioned().iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(versioned, vec!["v1_first.sql", "v2_second.sql"]);
        assert_eq!(catalog.undo().len(), 1);
        assert_eq!(catalog.repeatable()[0].filename, "views.repeatable.sql");
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.versioned()[0].content, "select 1;");
    }

    #[test]
    fn test_load_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Catalog::load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_find_undo_for() {
        let catalog = Catalog::from_scripts([
            MigrationScript::new("v1_a.sql", "a"),
            MigrationScript::new("v1_a.undo.sql", "undo a"),
            MigrationScript::new("v2_b.sql", "b"),
        ]);
        assert_eq!(
            catalog.find_undo_for("v1_a.sql").map(|s| s.content.as_str()),
            Some("undo a")
        );
        assert!(catalog.find_undo_for("v2_b.sql").is_none());
        assert!(catalog.find("v2_b.sql").is_some());
        assert!(catalog.find("v3_c.sql").is_none());
    }
}
