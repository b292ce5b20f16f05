//! In-process fakes shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{
    Client, ClientId, ClientRecord, Error, NewClient, NewNote, Note, NoteId, NoteUpdate,
    RemoteStore,
};

#[derive(Default)]
struct State {
    clients: Vec<ClientRecord>,
    notes: Vec<Note>,
    next_id: i64,
    tick: u32,
    failing: bool,
    fail_list_notes: bool,
    fixed_created_at: Option<String>,
    calls: usize,
}

impl State {
    fn mint(&mut self) -> (i64, String) {
        self.next_id += 1;
        self.tick += 1;
        let created_at = self.fixed_created_at.clone().unwrap_or_else(|| {
            format!(
                "2024-06-01T00:{:02}:{:02}.000Z",
                self.tick / 60,
                self.tick % 60
            )
        });
        (self.next_id, created_at)
    }

    fn check(&mut self) -> Result<(), Error> {
        self.calls += 1;
        if self.failing {
            return Err(Error::Remote("connection reset".into()));
        }
        Ok(())
    }
}

/// A remote store held in memory. Clones share state so a test can keep a
/// handle after moving one into the engine.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Rc<RefCell<State>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_client(&self, name: &str) -> ClientId {
        let mut state = self.state.borrow_mut();
        let (id, created_at) = state.mint();
        state.clients.push(ClientRecord {
            id,
            name: name.to_string(),
            created_at,
        });
        id
    }

    pub fn seed_note(&self, client_id: ClientId, content: &str) -> NoteId {
        let mut state = self.state.borrow_mut();
        let (id, created_at) = state.mint();
        state.notes.push(Note {
            id,
            client_id,
            content: content.to_string(),
            created_at,
            last_modified: None,
        });
        id
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    pub fn fail_list_notes(&self, fail: bool) {
        self.state.borrow_mut().fail_list_notes = fail;
    }

    /// The next inserted record gets id `next_id` and the given timestamp.
    pub fn assign_next(&self, next_id: i64, created_at: &str) {
        let mut state = self.state.borrow_mut();
        state.next_id = next_id - 1;
        state.fixed_created_at = Some(created_at.to_string());
    }

    pub fn calls(&self) -> usize {
        self.state.borrow().calls
    }

    pub fn note_ids(&self) -> Vec<NoteId> {
        self.state.borrow().notes.iter().map(|n| n.id).collect()
    }
}

#[async_trait::async_trait(?Send)]
impl RemoteStore for FakeRemote {
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        let mut clients = state.clients.clone();
        clients.sort_by(|a, b| (&b.created_at, b.id).cmp(&(&a.created_at, a.id)));
        Ok(clients)
    }

    async fn list_notes(&self, client_id: ClientId) -> Result<Vec<Note>, Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        if state.fail_list_notes {
            return Err(Error::Remote("notes query timed out".into()));
        }
        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|n| n.client_id == client_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| (&b.created_at, b.id).cmp(&(&a.created_at, a.id)));
        Ok(notes)
    }

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        let (id, created_at) = state.mint();
        let record = ClientRecord {
            id,
            name: client.name,
            created_at,
        };
        state.clients.push(record.clone());
        Ok(record)
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        let (id, created_at) = state.mint();
        let note = Note {
            id,
            client_id: note.client_id,
            content: note.content,
            created_at,
            last_modified: None,
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note, Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::Remote(format!("note {} does not exist", id)))?;
        note.content = update.content;
        note.last_modified = Some(update.last_modified);
        Ok(note.clone())
    }

    async fn delete_note(&self, id: NoteId) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.check()?;
        state.notes.retain(|n| n.id != id);
        Ok(())
    }
}

/// A small well-formed snapshot.
pub fn sample_clients() -> Vec<Client> {
    vec![
        Client {
            id: 2,
            name: "Globex".to_string(),
            created_at: "2024-05-02T09:00:00.000Z".to_string(),
            notes: vec![],
        },
        Client {
            id: 1,
            name: "Acme".to_string(),
            created_at: "2024-05-01T09:00:00.000Z".to_string(),
            notes: vec![Note {
                id: 10,
                client_id: 1,
                content: "kickoff call".to_string(),
                created_at: "2024-05-01T10:00:00.000Z".to_string(),
                last_modified: None,
            }],
        },
    ]
}
