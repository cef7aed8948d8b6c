//! Filename conventions.
//!
//! Every rule that reads meaning out of a migration filename lives here:
//! which files are migrations, what kind they are, and how an undo script
//! pairs with the versioned script it reverses.

use crate::model::MigrationKind;

pub const SQL_SUFFIX: &str = ".sql";
pub const UNDO_SUFFIX: &str = ".undo.sql";
pub const REPEATABLE_SUFFIX: &str = ".repeatable.sql";

/// Only `.sql` files take part in migrations.
pub fn is_migration_file(filename: &str) -> bool {
    filename.ends_with(SQL_SUFFIX) && filename.len() > SQL_SUFFIX.len()
}

/// Kind of a migration file, decided by suffix alone.
pub fn classify(filename: &str) -> MigrationKind {
    if filename.ends_with(UNDO_SUFFIX) {
        MigrationKind::Undo
    } else if filename.ends_with(REPEATABLE_SUFFIX) {
        MigrationKind::Repeatable
    } else {
        MigrationKind::Versioned
    }
}

/// `v1_create.sql` -> `v1_create.undo.sql`.
///
/// Only the trailing `.sql` is replaced; a name without it gets the undo
/// suffix appended so it can never collide with a real versioned file.
pub fn undo_filename(versioned: &str) -> String {
    match versioned.strip_suffix(SQL_SUFFIX) {
        Some(stem) => format!("{}{}", stem, UNDO_SUFFIX),
        None => format!("{}{}", versioned, UNDO_SUFFIX),
    }
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("v1_users.sql"), MigrationKind::Versioned);
        assert_eq!(classify("v1_users.undo.sql"), MigrationKind::Undo);
        assert_eq!(classify("views.repeatable.sql"), MigrationKind::Repeatable);
        // Suffix, not substring.
        assert_eq!(classify("v2_undo.sql_fix.sql"), MigrationKind::Versioned);
        assert_eq!(classify("v3.repeatable.sql.bak.sql"), MigrationKind::Versioned);
    }

    #[test]
    fn test_is_migration_file() {
        assert!(is_migration_file("v1.sql"));
        assert!(!is_migration_file("README.md"));
        assert!(!is_migration_file(".sql"));
        assert!(!is_migration_file("v1.sql.orig"));
    }

    #[test]
    fn test_undo_filename_replaces_trailing_suffix_only() {
        assert_eq!(undo_filename("v1_first.sql"), "v1_first.undo.sql");
        assert_eq!(undo_filename("v1.sql_thing.sql"), "v1.sql_thing.undo.sql");
        assert_eq!(undo_filename("odd"), "odd.undo.sql");
    }

    #[test]
    fn test_undo_pairs_classify_as_undo() {
        let name = undo_filename("v9_last.sql");
        assert_eq!(classify(&name), MigrationKind::Undo);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("myschema"), "\"myschema\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
