//! `SQLite` schema definitions for vahanguard.
//!
//! Each named collection is stored as one JSON document in its own row.

/// Version 1: one row per named document.
pub const CREATE_COLLECTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Schema changes in order. Entry `n` takes the database from version `n` to `n + 1`.
pub const MIGRATIONS: &[&str] = &[CREATE_COLLECTIONS_TABLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_table_columns() {
        assert!(CREATE_COLLECTIONS_TABLE.contains("name TEXT PRIMARY KEY"));
        assert!(CREATE_COLLECTIONS_TABLE.contains("body TEXT NOT NULL"));
        assert!(CREATE_COLLECTIONS_TABLE.contains("updated_at"));
    }

    #[test]
    fn test_migrations_are_idempotent_sql() {
        for migration in MIGRATIONS {
            assert!(migration.contains("IF NOT EXISTS"));
        }
    }
}
