use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub type ClientId = i64;
pub type NoteId = i64;

/// A note attached to one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub client_id: ClientId,
    pub content: String,
    pub created_at: String,
    /// Absent until the note is first edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// A client together with its notes, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub created_at: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// A client row as the remote store returns it, without notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    pub created_at: String,
}

/// Payload for inserting a client.
#[derive(Debug, Clone, Serialize)]
pub struct NewClient {
    pub name: String,
}

/// Payload for inserting a note.
#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
    pub client_id: ClientId,
    pub content: String,
}

/// Payload for editing a note.
#[derive(Debug, Clone, Serialize)]
pub struct NoteUpdate {
    pub content: String,
    pub last_modified: String,
}

/// The full client+note collection at a point in time.
pub type Snapshot = Vec<Client>;

impl ClientRecord {
    pub fn with_notes(self, notes: Vec<Note>) -> Client {
        Client {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            notes,
        }
    }
}

impl Client {
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }
}

impl Note {
    /// Single-line preview of the content, truncated to `max_len` characters.
    pub fn preview(&self, max_len: usize) -> String {
        let normalized: String = self
            .content
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let trimmed = normalized.trim();

        if trimmed.chars().count() > max_len {
            let head: String = trimmed.chars().take(max_len).collect();
            format!("{}...", head)
        } else {
            trimmed.to_string()
        }
    }
}

/// Check the snapshot invariants: unique client ids, unique note ids within a
/// client, and every note pointing at its enclosing client.
pub fn is_well_formed(clients: &[Client]) -> bool {
    let mut client_ids = HashSet::new();
    for client in clients {
        if !client_ids.insert(client.id) {
            return false;
        }
        let mut note_ids = HashSet::new();
        for note in &client.notes {
            if note.client_id != client.id || !note_ids.insert(note.id) {
                return false;
            }
        }
    }
    true
}

/// Ids of clients and notes in `before` that are absent from `after`.
pub(crate) fn missing_records(
    before: &[Client],
    after: &[Client],
) -> (Vec<ClientId>, Vec<NoteId>) {
    let kept_clients: HashSet<ClientId> = after.iter().map(|c| c.id).collect();
    let kept_notes: HashSet<(ClientId, NoteId)> = after
        .iter()
        .flat_map(|c| c.notes.iter().map(move |n| (c.id, n.id)))
        .collect();

    let clients = before
        .iter()
        .filter(|c| !kept_clients.contains(&c.id))
        .map(|c| c.id)
        .collect();
    let notes = before
        .iter()
        .flat_map(|c| c.notes.iter())
        .filter(|n| !kept_notes.contains(&(n.client_id, n.id)))
        .map(|n| n.id)
        .collect();
    (clients, notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: NoteId, client_id: ClientId, content: &str) -> Note {
        Note {
            id,
            client_id,
            content: content.to_string(),
            created_at: "2024-05-01T10:00:00.000Z".to_string(),
            last_modified: None,
        }
    }

    fn client(id: ClientId, notes: Vec<Note>) -> Client {
        Client {
            id,
            name: format!("client {}", id),
            created_at: "2024-05-01T09:00:00.000Z".to_string(),
            notes,
        }
    }

    #[test]
    fn test_well_formed_snapshot() {
        let clients = vec![
            client(2, vec![note(20, 2, "b"), note(21, 2, "c")]),
            client(1, vec![note(20, 1, "a")]),
        ];
        assert!(is_well_formed(&clients));
        assert!(is_well_formed(&[]));
    }

    #[test]
    fn test_duplicate_client_ids_rejected() {
        let clients = vec![client(1, vec![]), client(1, vec![])];
        assert!(!is_well_formed(&clients));
    }

    #[test]
    fn test_foreign_note_rejected() {
        let clients = vec![client(1, vec![note(5, 2, "stray")])];
        assert!(!is_well_formed(&clients));
    }

    #[test]
    fn test_duplicate_note_ids_rejected() {
        let clients = vec![client(1, vec![note(5, 1, "a"), note(5, 1, "b")])];
        assert!(!is_well_formed(&clients));
    }

    #[test]
    fn test_last_modified_omitted_when_absent() {
        let json = serde_json::to_string(&note(1, 1, "x")).unwrap();
        assert!(!json.contains("last_modified"));

        let client: Client =
            serde_json::from_str(r#"{"id":3,"name":"Acme","created_at":"t"}"#).unwrap();
        assert!(client.notes.is_empty());
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let n = note(1, 1, "héllo\nwörld and more");
        assert_eq!(n.preview(11), "héllo wörld...");
        assert_eq!(n.preview(100), "héllo wörld and more");
    }
}
