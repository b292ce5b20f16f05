use crate::{Client, ClientId, Note, NoteId};

/// The authoritative in-memory snapshot.
///
/// Presentation code reads from it; only the engine mutates it. It is passed
/// into each engine operation by `&mut` rather than held by the engine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStore {
    clients: Vec<Client>,
}

impl CollectionStore {
    pub fn new(clients: Vec<Client>) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn total_notes(&self) -> usize {
        self.clients.iter().map(|c| c.notes.len()).sum()
    }

    /// Clients whose name contains `term`, ignoring case. An empty term matches all.
    pub fn search(&self, term: &str) -> Vec<&Client> {
        let term = term.to_lowercase();
        self.clients
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&term))
            .collect()
    }

    pub(crate) fn prepend_client(&mut self, client: Client) {
        self.clients.insert(0, client);
    }

    /// Prepend a note to its owning client. Returns false if the client is gone.
    pub(crate) fn prepend_note(&mut self, note: Note) -> bool {
        match self.clients.iter_mut().find(|c| c.id == note.client_id) {
            Some(client) => {
                client.notes.insert(0, note);
                true
            }
            None => false,
        }
    }

    /// Replace a note in place, keeping its position.
    pub(crate) fn replace_note(
        &mut self,
        client_id: ClientId,
        note_id: NoteId,
        note: Note,
    ) -> bool {
        let slot = self
            .clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .and_then(|c| c.notes.iter_mut().find(|n| n.id == note_id));
        match slot {
            Some(slot) => {
                *slot = note;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_note(&mut self, client_id: ClientId, note_id: NoteId) -> bool {
        let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) else {
            return false;
        };
        let before = client.notes.len();
        client.notes.retain(|n| n.id != note_id);
        client.notes.len() != before
    }

    /// Swap in a whole new snapshot, returning the previous one.
    pub(crate) fn replace_all(&mut self, clients: Vec<Client>) -> Vec<Client> {
        std::mem::replace(&mut self.clients, clients)
    }
}
