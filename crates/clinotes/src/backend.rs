//! The remote store selected from configuration.

use clinotes_core::{
    ClientId, ClientRecord, Error, NewClient, NewNote, Note, NoteId, NoteUpdate, RemoteStore,
};
use clinotes_rest::RestRemote;
use clinotes_sqlite::SqliteRemote;

pub enum Remote {
    Rest(RestRemote),
    Sqlite(SqliteRemote),
}

impl Remote {
    pub fn kind(&self) -> &'static str {
        match self {
            Remote::Rest(_) => "rest",
            Remote::Sqlite(_) => "sqlite",
        }
    }
}

#[async_trait::async_trait(?Send)]
impl RemoteStore for Remote {
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, Error> {
        match self {
            Remote::Rest(r) => r.list_clients().await,
            Remote::Sqlite(r) => r.list_clients().await,
        }
    }

    async fn list_notes(&self, client_id: ClientId) -> Result<Vec<Note>, Error> {
        match self {
            Remote::Rest(r) => r.list_notes(client_id).await,
            Remote::Sqlite(r) => r.list_notes(client_id).await,
        }
    }

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, Error> {
        match self {
            Remote::Rest(r) => r.insert_client(client).await,
            Remote::Sqlite(r) => r.insert_client(client).await,
        }
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, Error> {
        match self {
            Remote::Rest(r) => r.insert_note(note).await,
            Remote::Sqlite(r) => r.insert_note(note).await,
        }
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note, Error> {
        match self {
            Remote::Rest(r) => r.update_note(id, update).await,
            Remote::Sqlite(r) => r.update_note(id, update).await,
        }
    }

    async fn delete_note(&self, id: NoteId) -> Result<(), Error> {
        match self {
            Remote::Rest(r) => r.delete_note(id).await,
            Remote::Sqlite(r) => r.delete_note(id).await,
        }
    }
}
