use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::export::{export_all, export_client, Export};
use crate::{
    Advisory, Client, ClientId, CollectionStore, Engine, Error, KeyValueStore, LoadSource, Note,
    NoteId, Outcome, RemoteStore, SyncReport, WritePath,
};

/// What the interface shows in its status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub configured: bool,
    pub online: bool,
    pub syncing: bool,
    pub path: WritePath,
}

/// The interface-facing facade: owns the snapshot and the current advisory.
/// Generic over the remote store and local storage implementations.
pub struct Workspace<R, S> {
    engine: Engine<R, S>,
    store: CollectionStore,
    advisory: Option<Advisory>,
    loaded_from: LoadSource,
}

impl<R: RemoteStore, S: KeyValueStore> Workspace<R, S> {
    /// Load the initial snapshot and wrap it.
    pub async fn open(engine: Engine<R, S>) -> Self {
        let report = engine.load().await;
        Self {
            engine,
            store: CollectionStore::new(report.clients),
            advisory: report.advisory,
            loaded_from: report.source,
        }
    }

    pub fn engine(&self) -> &Engine<R, S> {
        &self.engine
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn loaded_from(&self) -> LoadSource {
        self.loaded_from
    }

    /// Clients whose name contains `search`, ignoring case.
    pub fn clients(&self, search: &str) -> Vec<&Client> {
        self.store.search(search)
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.store.client(id)
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisory.as_ref()
    }

    pub fn dismiss_advisory(&mut self) {
        self.advisory = None;
    }

    pub fn status(&self) -> Status {
        Status {
            configured: self.engine.is_configured(),
            online: self.engine.connectivity().is_online(),
            syncing: self.engine.is_syncing(),
            path: self.engine.write_path(),
        }
    }

    /// Add a client.
    pub async fn add_client(&mut self, name: &str) -> Result<Outcome<Client>, Error> {
        self.ensure_idle()?;
        let outcome = self.engine.create_client(&mut self.store, name).await?;
        self.note_outcome(&outcome);
        Ok(outcome)
    }

    /// Add a note to a client.
    pub async fn add_note(
        &mut self,
        client_id: ClientId,
        content: &str,
    ) -> Result<Outcome<Note>, Error> {
        self.ensure_idle()?;
        let outcome = self
            .engine
            .create_note(&mut self.store, client_id, content)
            .await?;
        self.note_outcome(&outcome);
        Ok(outcome)
    }

    /// Replace a note's content.
    pub async fn edit_note(
        &mut self,
        client_id: ClientId,
        note_id: NoteId,
        content: &str,
    ) -> Result<Outcome<Note>, Error> {
        self.ensure_idle()?;
        let outcome = self
            .engine
            .update_note(&mut self.store, client_id, note_id, content)
            .await?;
        self.note_outcome(&outcome);
        Ok(outcome)
    }

    /// Delete a note.
    pub async fn remove_note(
        &mut self,
        client_id: ClientId,
        note_id: NoteId,
    ) -> Result<Outcome<NoteId>, Error> {
        self.ensure_idle()?;
        let outcome = self
            .engine
            .delete_note(&mut self.store, client_id, note_id)
            .await?;
        self.note_outcome(&outcome);
        Ok(outcome)
    }

    /// Reload everything from the remote store.
    pub async fn sync(&mut self) -> Result<SyncReport, Error> {
        self.ensure_idle()?;
        let report = self.engine.sync(&mut self.store).await;
        if report.replaced {
            self.loaded_from = LoadSource::Remote;
        }
        self.advisory = report.advisory.clone();
        Ok(report)
    }

    pub fn export_client<Tz>(&self, id: ClientId, now: &DateTime<Tz>) -> Result<Export, Error>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let client = self
            .store
            .client(id)
            .ok_or_else(|| Error::NotFound(format!("client {}", id)))?;
        Ok(export_client(client, now))
    }

    pub fn export_all<Tz>(&self, now: &DateTime<Tz>) -> Export
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        export_all(self.store.clients(), now)
    }

    /// Mutations are refused while a remote call is outstanding.
    fn ensure_idle(&self) -> Result<(), Error> {
        if self.engine.is_syncing() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn note_outcome<T>(&mut self, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Confirmed(_) => self.advisory = None,
            Outcome::LocalOnly { advisory: Some(advisory), .. } | Outcome::Rejected(advisory) => {
                self.advisory = Some(advisory.clone())
            }
            Outcome::LocalOnly { advisory: None, .. } | Outcome::Skipped => {}
        }
    }
}
