//! Embedded schema migrations for the SQLite remote store.
//!
//! Migrations are versioned and run automatically when the database is opened.
//! The schema version is tracked in the `_clinotes_meta` table.

/// Current schema version. Increment when adding new migrations.
pub const SCHEMA_VERSION: i64 = 2;

/// A database migration with version number and SQL statements.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// All migrations in order. Each migration should be idempotent where possible.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        statements: &[
            "CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            "CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_modified TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_clients_created_at ON clients(created_at)",
        ],
    },
    Migration {
        version: 2,
        name: "index_notes_by_client",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_notes_client_created ON notes(client_id, created_at)",
        ],
    },
];

/// Get migrations that need to be applied given the current version.
pub fn get_pending_migrations(current_version: i64) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_ordered_and_current() {
        let versions: Vec<_> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
        assert_eq!(versions.last(), Some(&SCHEMA_VERSION));
    }

    #[test]
    fn test_pending_after_version() {
        assert_eq!(get_pending_migrations(0).len(), MIGRATIONS.len());
        let pending: Vec<_> = get_pending_migrations(1).iter().map(|m| m.name).collect();
        assert_eq!(pending, vec!["index_notes_by_client"]);
        assert!(get_pending_migrations(SCHEMA_VERSION).is_empty());
    }
}
