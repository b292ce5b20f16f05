//! Startup population of the in-memory snapshot.

use crate::model::missing_records;
use crate::{
    Advisory, Client, ClientId, Error, KeyValueStore, LocalMirror, NoteId, RemoteStore,
};

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Mirror,
    Empty,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub clients: Vec<Client>,
    pub source: LoadSource,
    /// Clients held in the mirror that the remote snapshot replaced.
    pub discarded_clients: Vec<ClientId>,
    /// Notes held in the mirror that the remote snapshot replaced.
    pub discarded_notes: Vec<NoteId>,
    /// Set when the remote load failed and a fallback was used, or when
    /// local records were dropped.
    pub advisory: Option<Advisory>,
}

/// Loads the snapshot from the remote store, falling back to the local mirror.
pub struct CollectionLoader<'a, R, S> {
    remote: Option<&'a R>,
    mirror: &'a LocalMirror<S>,
}

impl<'a, R: RemoteStore, S: KeyValueStore> CollectionLoader<'a, R, S> {
    pub fn new(remote: Option<&'a R>, mirror: &'a LocalMirror<S>) -> Self {
        Self { remote, mirror }
    }

    pub async fn load(&self) -> LoadReport {
        let Some(remote) = self.remote else {
            return self.from_mirror(None);
        };

        match fetch_all(remote).await {
            Ok(clients) => {
                let previous = self.mirror.load().unwrap_or_default();
                let (discarded_clients, discarded_notes) = missing_records(&previous, &clients);
                let advisory = if discarded_clients.is_empty() && discarded_notes.is_empty() {
                    None
                } else {
                    tracing::warn!(
                        clients = ?discarded_clients,
                        notes = ?discarded_notes,
                        "remote snapshot replaced records that only existed locally"
                    );
                    Some(Advisory::Error(format!(
                        "Loaded remote data: dropped {} client(s) and {} note(s) \
                         that existed only on this device",
                        discarded_clients.len(),
                        discarded_notes.len()
                    )))
                };
                self.mirror.save(&clients);
                LoadReport {
                    clients,
                    source: LoadSource::Remote,
                    discarded_clients,
                    discarded_notes,
                    advisory,
                }
            }
            Err(e) => {
                tracing::warn!("error loading clients from remote: {}", e);
                self.from_mirror(Some(format!("Failed to load data: {}", e)))
            }
        }
    }

    fn from_mirror(&self, failure: Option<String>) -> LoadReport {
        match self.mirror.load() {
            Some(clients) => LoadReport {
                clients,
                source: LoadSource::Mirror,
                discarded_clients: Vec::new(),
                discarded_notes: Vec::new(),
                advisory: failure
                    .map(|msg| Advisory::Error(format!("{} (loaded from local backup)", msg))),
            },
            None => LoadReport {
                clients: Vec::new(),
                source: LoadSource::Empty,
                discarded_clients: Vec::new(),
                discarded_notes: Vec::new(),
                advisory: failure.map(Advisory::Error),
            },
        }
    }
}

/// Fetch every client and its notes. Any failure discards everything fetched so far.
pub(crate) async fn fetch_all<R: RemoteStore>(remote: &R) -> Result<Vec<Client>, Error> {
    let records = remote.list_clients().await?;
    let mut clients = Vec::with_capacity(records.len());
    for record in records {
        let notes = remote.list_notes(record.id).await?;
        if notes.iter().any(|n| n.client_id != record.id) {
            return Err(Error::Remote(format!(
                "notes for client {} reference another client",
                record.id
            )));
        }
        clients.push(record.with_notes(notes));
    }
    if !crate::model::is_well_formed(&clients) {
        return Err(Error::Remote("remote returned duplicate records".into()));
    }
    Ok(clients)
}
