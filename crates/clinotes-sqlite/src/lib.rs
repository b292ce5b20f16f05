//! SQLite implementation of the clinotes remote store trait.
//!
//! Stands in for the hosted backend when self-hosting, and gives integration
//! tests a store that assigns ids and timestamps the way a real server does.

mod migrations;

pub use migrations::{get_pending_migrations, Migration, MIGRATIONS, SCHEMA_VERSION};

use clinotes_core::{
    ClientId, ClientRecord, Error, NewClient, NewNote, Note, NoteId, NoteUpdate, RemoteStore,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NOTE_COLUMNS: &str = "id, client_id, content, created_at, last_modified";

/// SQLite-backed remote store.
pub struct SqliteRemote {
    conn: Mutex<Connection>,
}

impl SqliteRemote {
    /// Open a database at the given path and run any pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::init(conn)
    }

    /// Open an in-memory database and run migrations.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_error)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("sqlite connection lock poisoned".into()))
    }

    /// Current schema version recorded in the meta table.
    pub fn schema_version(&self) -> Result<i64, Error> {
        let conn = self.conn()?;
        Self::read_version(&conn)
    }

    fn read_version(conn: &Connection) -> Result<i64, Error> {
        let version = conn
            .query_row(
                "SELECT value FROM _clinotes_meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(db_error)?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Run any pending database migrations.
    fn run_migrations(&self) -> Result<(), Error> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _clinotes_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(db_error)?;

        let current_version = Self::read_version(&conn)?;
        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        for migration in get_pending_migrations(current_version) {
            tracing::info!(version = migration.version, name = migration.name, "running migration");
            for statement in migration.statements {
                conn.execute(statement, []).map_err(|e| {
                    Error::Remote(format!("Migration {} failed: {}", migration.name, e))
                })?;
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO _clinotes_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(db_error)?;

        Ok(())
    }

    fn client_from_row(row: &Row<'_>) -> rusqlite::Result<ClientRecord> {
        Ok(ClientRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            client_id: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            last_modified: row.get(4)?,
        })
    }
}

fn db_error(e: rusqlite::Error) -> Error {
    Error::Remote(e.to_string())
}

#[async_trait::async_trait(?Send)]
impl RemoteStore for SqliteRemote {
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM clients ORDER BY created_at DESC, id DESC")
            .map_err(db_error)?;
        let clients = stmt
            .query_map([], Self::client_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        Ok(clients)
    }

    async fn list_notes(&self, client_id: ClientId) -> Result<Vec<Note>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM notes WHERE client_id = ?1 ORDER BY created_at DESC, id DESC",
                NOTE_COLUMNS
            ))
            .map_err(db_error)?;
        let notes = stmt
            .query_map(params![client_id], Self::note_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        Ok(notes)
    }

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "INSERT INTO clients (name) VALUES (?1) RETURNING id, name, created_at",
            params![client.name],
            Self::client_from_row,
        )
        .map_err(db_error)
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, Error> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "INSERT INTO notes (client_id, content) VALUES (?1, ?2) RETURNING {}",
                NOTE_COLUMNS
            ),
            params![note.client_id, note.content],
            Self::note_from_row,
        )
        .map_err(db_error)
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note, Error> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "UPDATE notes SET content = ?1, last_modified = ?2 WHERE id = ?3 RETURNING {}",
                NOTE_COLUMNS
            ),
            params![update.content, update.last_modified, id],
            Self::note_from_row,
        )
        .optional()
        .map_err(db_error)?
        .ok_or_else(|| Error::Remote(format!("note {} does not exist", id)))
    }

    async fn delete_note(&self, id: NoteId) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM notes WHERE id = ?1", params![id])
            .map_err(db_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinotes_core::{
        CollectionStore, ConnectivityMonitor, Engine, LocalMirror, MemoryStore, Outcome,
    };
    use tempfile::TempDir;

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
        }
    }

    fn new_note(client_id: ClientId, content: &str) -> NewNote {
        NewNote {
            client_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let db = SqliteRemote::open_in_memory().unwrap();

        let client = db.insert_client(new_client("Acme")).await.unwrap();
        assert_eq!(client.id, 1);
        assert_eq!(client.name, "Acme");
        assert!(client.created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&client.created_at).is_ok());

        let note = db.insert_note(new_note(client.id, "hello")).await.unwrap();
        assert_eq!(note.client_id, client.id);
        assert_eq!(note.last_modified, None);
    }

    #[tokio::test]
    async fn test_lists_are_newest_first() {
        let db = SqliteRemote::open_in_memory().unwrap();
        let acme = db.insert_client(new_client("Acme")).await.unwrap();
        let globex = db.insert_client(new_client("Globex")).await.unwrap();
        for content in ["N1", "N2", "N3"] {
            db.insert_note(new_note(acme.id, content)).await.unwrap();
        }
        db.insert_note(new_note(globex.id, "other")).await.unwrap();

        let ids: Vec<_> = db.list_clients().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![globex.id, acme.id]);

        let contents: Vec<_> = db
            .list_notes(acme.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.content)
            .collect();
        assert_eq!(contents, vec!["N3", "N2", "N1"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = SqliteRemote::open_in_memory().unwrap();
        let acme = db.insert_client(new_client("Acme")).await.unwrap();
        let note = db.insert_note(new_note(acme.id, "draft")).await.unwrap();

        let updated = db
            .update_note(
                note.id,
                NoteUpdate {
                    content: "final".to_string(),
                    last_modified: "2024-07-01T00:00:00.000Z".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "final");
        assert_eq!(updated.created_at, note.created_at);
        assert_eq!(updated.last_modified.as_deref(), Some("2024-07-01T00:00:00.000Z"));

        db.delete_note(note.id).await.unwrap();
        assert!(db.list_notes(acme.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejections_are_remote_errors() {
        let db = SqliteRemote::open_in_memory().unwrap();

        let missing_client = db.insert_note(new_note(99, "orphan")).await;
        assert!(matches!(missing_client, Err(Error::Remote(_))));

        let blank = db.insert_client(new_client("   ")).await;
        assert!(matches!(blank, Err(Error::Remote(_))));

        let missing_note = db
            .update_note(
                5,
                NoteUpdate {
                    content: "x".to_string(),
                    last_modified: "t".to_string(),
                },
            )
            .await;
        assert!(matches!(missing_note, Err(Error::Remote(_))));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("remote.sqlite");

        let db = SqliteRemote::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
        db.insert_client(new_client("Acme")).await.unwrap();
        drop(db);

        let db = SqliteRemote::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(db.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_round_trip() {
        let kv = MemoryStore::new();
        let engine = Engine::new(
            Some(SqliteRemote::open_in_memory().unwrap()),
            LocalMirror::new(&kv),
            ConnectivityMonitor::new(true),
        );
        let mut store = CollectionStore::default();

        let client = match engine.create_client(&mut store, " Acme ").await.unwrap() {
            Outcome::Confirmed(client) => client,
            other => panic!("expected remote confirmation, got {:?}", other),
        };
        assert_eq!(client.id, 1);

        engine.create_note(&mut store, client.id, "first").await.unwrap();
        engine.create_note(&mut store, client.id, "second").await.unwrap();

        let reloaded = engine.load().await;
        assert_eq!(reloaded.clients, store.clients());
        assert_eq!(engine.mirror().load().unwrap(), store.clients());
    }
}
