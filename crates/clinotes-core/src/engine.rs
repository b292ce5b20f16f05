//! The reconciliation engine.
//!
//! Every mutation picks one of two paths when it starts and sticks with it:
//! write through the remote store, or apply locally only. Whichever path
//! runs, the caller's [`CollectionStore`] and the local mirror agree when the
//! operation returns.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::loader::fetch_all;
use crate::model::missing_records;
use crate::{
    Advisory, Client, ClientId, CollectionLoader, CollectionStore, ConnectivityMonitor, Error,
    KeyValueStore, LoadReport, LocalMirror, NewClient, NewNote, Note, NoteId, NoteUpdate,
    RemoteStore,
};

/// Why a mutation is not going to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalReason {
    /// No remote store credentials.
    Unconfigured,
    /// Configured, but not reachable right now.
    Offline,
}

/// The path a mutation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    Remote,
    LocalOnly(LocalReason),
}

/// Choose the write path. Both configuration and reachability are required
/// for the remote path; a missing configuration wins over being offline.
pub fn choose_path(configured: bool, online: bool) -> WritePath {
    match (configured, online) {
        (true, true) => WritePath::Remote,
        (false, _) => WritePath::LocalOnly(LocalReason::Unconfigured),
        (true, false) => WritePath::LocalOnly(LocalReason::Offline),
    }
}

/// A resolved write path carrying the capability it needs.
enum Route<'a, R> {
    Remote(&'a R),
    LocalOnly(LocalReason),
}

impl LocalReason {
    fn advisory(self, verb: &str) -> Option<Advisory> {
        match self {
            LocalReason::Unconfigured => None,
            LocalReason::Offline => Some(Advisory::Info(format!(
                "{} offline - will need manual re-sync",
                verb
            ))),
        }
    }
}

/// Result of one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The input failed validation; nothing changed.
    Skipped,
    /// The remote store accepted the change and its record was applied.
    Confirmed(T),
    /// The change was applied to local state only.
    LocalOnly { record: T, advisory: Option<Advisory> },
    /// The remote store refused the change and local state was left alone.
    Rejected(Advisory),
}

impl<T> Outcome<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Outcome::Confirmed(record) | Outcome::LocalOnly { record, .. } => Some(record),
            Outcome::Skipped | Outcome::Rejected(_) => None,
        }
    }

    pub fn advisory(&self) -> Option<&Advisory> {
        match self {
            Outcome::LocalOnly { advisory, .. } => advisory.as_ref(),
            Outcome::Rejected(advisory) => Some(advisory),
            Outcome::Skipped | Outcome::Confirmed(_) => None,
        }
    }
}

/// Result of a manual sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// True if the snapshot was replaced with fresh remote data.
    pub replaced: bool,
    /// Clients present before the sync that the remote store does not have.
    pub discarded_clients: Vec<ClientId>,
    /// Notes present before the sync that the remote store does not have.
    pub discarded_notes: Vec<NoteId>,
    pub advisory: Option<Advisory>,
}

/// Shared handle to the engine's "syncing" flag.
///
/// The flag is set while a remote call is outstanding. Interfaces read it to
/// keep users from starting another mutation; the engine itself does not
/// refuse work while it is set.
#[derive(Debug, Clone, Default)]
pub struct SyncFlag(Arc<AtomicBool>);

impl SyncFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn raise(&self) -> SyncGuard<'_> {
        self.0.store(true, Ordering::SeqCst);
        SyncGuard(self)
    }
}

/// Clears the flag on every exit path.
pub(crate) struct SyncGuard<'a>(&'a SyncFlag);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::SeqCst);
    }
}

pub struct Engine<R, S> {
    remote: Option<R>,
    mirror: LocalMirror<S>,
    connectivity: ConnectivityMonitor,
    syncing: SyncFlag,
    last_local_id: Cell<i64>,
}

impl<R: RemoteStore, S: KeyValueStore> Engine<R, S> {
    /// Create an engine. `remote` is `None` when no remote store is configured.
    pub fn new(remote: Option<R>, mirror: LocalMirror<S>, connectivity: ConnectivityMonitor) -> Self {
        Self {
            remote,
            mirror,
            connectivity,
            syncing: SyncFlag::default(),
            last_local_id: Cell::new(0),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn mirror(&self) -> &LocalMirror<S> {
        &self.mirror
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.is_set()
    }

    pub fn sync_flag(&self) -> SyncFlag {
        self.syncing.clone()
    }

    /// The path a mutation started now would take.
    pub fn write_path(&self) -> WritePath {
        choose_path(self.is_configured(), self.connectivity.is_online())
    }

    fn route(&self) -> Route<'_, R> {
        match (self.write_path(), self.remote.as_ref()) {
            (WritePath::Remote, Some(remote)) => Route::Remote(remote),
            (WritePath::LocalOnly(reason), _) => Route::LocalOnly(reason),
            (WritePath::Remote, None) => Route::LocalOnly(LocalReason::Unconfigured),
        }
    }

    /// Load the snapshot from the remote store or, failing that, the mirror.
    pub async fn load(&self) -> LoadReport {
        CollectionLoader::new(self.remote.as_ref(), &self.mirror)
            .load()
            .await
    }

    pub async fn create_client(
        &self,
        store: &mut CollectionStore,
        name: &str,
    ) -> Result<Outcome<Client>, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Outcome::Skipped);
        }

        let outcome = match self.route() {
            Route::LocalOnly(reason) => {
                let client = self.local_client(name);
                store.prepend_client(client.clone());
                Outcome::LocalOnly {
                    record: client,
                    advisory: reason.advisory("Added"),
                }
            }
            Route::Remote(remote) => {
                let _syncing = self.syncing.raise();
                let new = NewClient {
                    name: name.to_string(),
                };
                match remote.insert_client(new).await {
                    Ok(record) => {
                        let client = record.with_notes(Vec::new());
                        store.prepend_client(client.clone());
                        Outcome::Confirmed(client)
                    }
                    Err(e) => {
                        tracing::warn!("error adding client: {}", e);
                        let client = self.local_client(name);
                        store.prepend_client(client.clone());
                        Outcome::LocalOnly {
                            record: client,
                            advisory: Some(Advisory::Error(format!("Failed to add client: {}", e))),
                        }
                    }
                }
            }
        };

        self.mirror.save(store.clients());
        Ok(outcome)
    }

    pub async fn create_note(
        &self,
        store: &mut CollectionStore,
        client_id: ClientId,
        content: &str,
    ) -> Result<Outcome<Note>, Error> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(Outcome::Skipped);
        }
        if store.client(client_id).is_none() {
            return Err(Error::NotFound(format!("client {}", client_id)));
        }

        let outcome = match self.route() {
            Route::LocalOnly(reason) => {
                let note = self.local_note(client_id, content);
                store.prepend_note(note.clone());
                Outcome::LocalOnly {
                    record: note,
                    advisory: reason.advisory("Added"),
                }
            }
            Route::Remote(remote) => {
                let _syncing = self.syncing.raise();
                let new = NewNote {
                    client_id,
                    content: content.to_string(),
                };
                match remote.insert_note(new).await {
                    Ok(note) if note.client_id == client_id => {
                        store.prepend_note(note.clone());
                        Outcome::Confirmed(note)
                    }
                    Ok(note) => {
                        return Err(Error::Internal(format!(
                            "remote filed note {} under client {} instead of {}",
                            note.id, note.client_id, client_id
                        )));
                    }
                    Err(e) => {
                        tracing::warn!("error adding note: {}", e);
                        let note = self.local_note(client_id, content);
                        store.prepend_note(note.clone());
                        Outcome::LocalOnly {
                            record: note,
                            advisory: Some(Advisory::Error(format!("Failed to add note: {}", e))),
                        }
                    }
                }
            }
        };

        self.mirror.save(store.clients());
        Ok(outcome)
    }

    pub async fn update_note(
        &self,
        store: &mut CollectionStore,
        client_id: ClientId,
        note_id: NoteId,
        content: &str,
    ) -> Result<Outcome<Note>, Error> {
        if content.trim().is_empty() {
            return Ok(Outcome::Skipped);
        }
        let existing = store
            .client(client_id)
            .and_then(|c| c.note(note_id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("note {} of client {}", note_id, client_id)))?;

        let modified_at = now();
        let edited = Note {
            content: content.to_string(),
            last_modified: Some(modified_at.clone()),
            ..existing
        };

        let outcome = match self.route() {
            Route::LocalOnly(reason) => {
                store.replace_note(client_id, note_id, edited.clone());
                Outcome::LocalOnly {
                    record: edited,
                    advisory: reason.advisory("Updated"),
                }
            }
            Route::Remote(remote) => {
                let _syncing = self.syncing.raise();
                let update = NoteUpdate {
                    content: edited.content.clone(),
                    last_modified: modified_at,
                };
                match remote.update_note(note_id, update).await {
                    Ok(note) => {
                        store.replace_note(client_id, note_id, note.clone());
                        Outcome::Confirmed(note)
                    }
                    Err(e) => {
                        tracing::warn!("error updating note: {}", e);
                        store.replace_note(client_id, note_id, edited.clone());
                        Outcome::LocalOnly {
                            record: edited,
                            advisory: Some(Advisory::Error(format!(
                                "Failed to update note: {}",
                                e
                            ))),
                        }
                    }
                }
            }
        };

        self.mirror.save(store.clients());
        Ok(outcome)
    }

    /// Delete a note. A remote failure leaves the note in place.
    pub async fn delete_note(
        &self,
        store: &mut CollectionStore,
        client_id: ClientId,
        note_id: NoteId,
    ) -> Result<Outcome<NoteId>, Error> {
        if store.client(client_id).and_then(|c| c.note(note_id)).is_none() {
            return Err(Error::NotFound(format!(
                "note {} of client {}",
                note_id, client_id
            )));
        }

        let outcome = match self.route() {
            Route::LocalOnly(reason) => {
                store.remove_note(client_id, note_id);
                Outcome::LocalOnly {
                    record: note_id,
                    advisory: reason.advisory("Deleted"),
                }
            }
            Route::Remote(remote) => {
                let _syncing = self.syncing.raise();
                match remote.delete_note(note_id).await {
                    Ok(()) => {
                        store.remove_note(client_id, note_id);
                        Outcome::Confirmed(note_id)
                    }
                    Err(e) => {
                        tracing::warn!("error deleting note: {}", e);
                        Outcome::Rejected(Advisory::Error(format!(
                            "Failed to delete note: {}",
                            e
                        )))
                    }
                }
            }
        };

        self.mirror.save(store.clients());
        Ok(outcome)
    }

    /// Reload from the remote store and replace the whole snapshot with it.
    ///
    /// Records that only ever existed locally are dropped; the report lists
    /// them. If the remote load fails the snapshot is kept as it is.
    pub async fn sync(&self, store: &mut CollectionStore) -> SyncReport {
        let remote = match self.route() {
            Route::Remote(remote) => remote,
            Route::LocalOnly(reason) => {
                let msg = match reason {
                    LocalReason::Unconfigured => "No remote store configured - nothing to sync",
                    LocalReason::Offline => "Offline - sync needs a connection",
                };
                return SyncReport {
                    advisory: Some(Advisory::Info(msg.to_string())),
                    ..Default::default()
                };
            }
        };

        let _syncing = self.syncing.raise();
        let clients = match fetch_all(remote).await {
            Ok(clients) => clients,
            Err(e) => {
                tracing::warn!("error syncing with remote: {}", e);
                return SyncReport {
                    advisory: Some(Advisory::Error(format!(
                        "Sync failed: {} (local data kept)",
                        e
                    ))),
                    ..Default::default()
                };
            }
        };

        let previous = store.replace_all(clients);
        self.mirror.save(store.clients());
        let (discarded_clients, discarded_notes) = missing_records(&previous, store.clients());
        let advisory = if discarded_clients.is_empty() && discarded_notes.is_empty() {
            None
        } else {
            tracing::warn!(
                clients = ?discarded_clients,
                notes = ?discarded_notes,
                "sync dropped records that only existed locally"
            );
            Some(Advisory::Info(format!(
                "Sync replaced local data: {} client(s) and {} note(s) existed only on this device",
                discarded_clients.len(),
                discarded_notes.len()
            )))
        };

        SyncReport {
            replaced: true,
            discarded_clients,
            discarded_notes,
            advisory,
        }
    }

    fn local_client(&self, name: &str) -> Client {
        Client {
            id: self.mint_id(),
            name: name.to_string(),
            created_at: now(),
            notes: Vec::new(),
        }
    }

    fn local_note(&self, client_id: ClientId, content: &str) -> Note {
        Note {
            id: self.mint_id(),
            client_id,
            content: content.to_string(),
            created_at: now(),
            last_modified: None,
        }
    }

    /// Wall-clock milliseconds, bumped past the last id minted by this engine.
    fn mint_id(&self) -> i64 {
        let id = Utc::now()
            .timestamp_millis()
            .max(self.last_local_id.get() + 1);
        self.last_local_id.set(id);
        id
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
