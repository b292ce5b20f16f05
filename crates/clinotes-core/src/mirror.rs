//! Durable local copy of the whole snapshot.
//!
//! The mirror is a best-effort side channel: reads that fail look like "no
//! local data" and writes that fail are logged and dropped. Callers must not
//! treat a `save` as a durability guarantee.

use crate::model::is_well_formed;
use crate::{Client, Error, KeyValueStore};

/// Default key the snapshot is stored under.
pub const MIRROR_KEY: &str = "clientNotes";

pub struct LocalMirror<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> LocalMirror<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, MIRROR_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read and decode the mirrored snapshot. Any failure yields `None`.
    pub fn load(&self) -> Option<Vec<Client>> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("error loading local mirror: {}", e);
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<Vec<Client>>, Error> {
        let Some(bytes) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let clients: Vec<Client> = serde_json::from_slice(&bytes)?;
        if !is_well_formed(&clients) {
            return Err(Error::Storage(
                "mirrored snapshot has duplicate or orphaned records".into(),
            ));
        }
        Ok(Some(clients))
    }

    /// Encode and write the full snapshot, replacing whatever was there.
    pub fn save(&self, clients: &[Client]) {
        let result = serde_json::to_vec(clients)
            .map_err(Error::from)
            .and_then(|bytes| self.store.set(&self.key, &bytes));

        match result {
            Ok(()) => tracing::debug!(clients = clients.len(), "saved local mirror"),
            Err(e) => tracing::warn!("error saving local mirror: {}", e),
        }
    }
}
