use crate::{ClientId, ClientRecord, Error, NewClient, NewNote, Note, NoteId, NoteUpdate};

/// Remote store abstraction that works for both the REST backend and SQLite.
///
/// Uses `async_trait` with `?Send` bound so the core runs on single-threaded
/// runtimes.
#[async_trait::async_trait(?Send)]
pub trait RemoteStore {
    /// List all clients, newest first.
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, Error>;

    /// List one client's notes, newest first.
    async fn list_notes(&self, client_id: ClientId) -> Result<Vec<Note>, Error>;

    /// Insert a client and return the stored record with server-assigned fields.
    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, Error>;

    /// Insert a note and return the stored record with server-assigned fields.
    async fn insert_note(&self, note: NewNote) -> Result<Note, Error>;

    /// Update a note and return the stored record.
    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note, Error>;

    /// Delete a note by ID.
    async fn delete_note(&self, id: NoteId) -> Result<(), Error>;
}
