//! Plain-text reports of the collection.
//!
//! Output is deterministic for a given snapshot and generation time. Stored
//! timestamps are shown in the generation time's zone.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::Client;

const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// A rendered report and the file name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub content: String,
}

/// Render one client's notes.
pub fn export_client<Tz>(client: &Client, generated_at: &DateTime<Tz>) -> Export
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = generated_at.timezone();
    let mut content = format!(
        "CLIENT NOTES: {}\nGenerated: {}\nTotal Notes: {}\n\n{}\n\n",
        client.name,
        generated_at.format(DISPLAY_FORMAT),
        client.notes.len(),
        "=".repeat(50)
    );

    let blocks: Vec<String> = client
        .notes
        .iter()
        .map(|note| {
            let modified = note
                .last_modified
                .as_deref()
                .map(|ts| format!("Last Modified: {}\n", display_time(ts, &tz)))
                .unwrap_or_default();
            format!(
                "Date: {}\n{}Note:\n{}\n\n{}\n",
                display_time(&note.created_at, &tz),
                modified,
                note.content,
                "-".repeat(30)
            )
        })
        .collect();
    content.push_str(&blocks.join("\n"));

    Export {
        file_name: format!("{}_notes.txt", client.name),
        content,
    }
}

/// Render every client and note.
pub fn export_all<Tz>(clients: &[Client], generated_at: &DateTime<Tz>) -> Export
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = generated_at.timezone();
    let total_notes: usize = clients.iter().map(|c| c.notes.len()).sum();
    let mut content = format!(
        "ALL CLIENT NOTES\nGenerated: {}\nTotal Clients: {}\nTotal Notes: {}\n\n{}\n\n",
        generated_at.format(DISPLAY_FORMAT),
        clients.len(),
        total_notes,
        "=".repeat(60)
    );

    for client in clients {
        content.push_str(&format!(
            "CLIENT: {}\nNotes: {}\n\n",
            client.name,
            client.notes.len()
        ));
        for note in &client.notes {
            // The indent before "Note:" is written even without a modification line.
            let modified = note
                .last_modified
                .as_deref()
                .map(|ts| format!("Last Modified: {}\n", display_time(ts, &tz)))
                .unwrap_or_default();
            content.push_str(&format!(
                "  Date: {}\n  {}  Note: {}\n\n",
                display_time(&note.created_at, &tz),
                modified,
                note.content
            ));
        }
        content.push_str(&"=".repeat(40));
        content.push_str("\n\n");
    }

    Export {
        file_name: "all_client_notes.txt".to_string(),
        content,
    }
}

fn display_time<Tz>(raw: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(tz).format(DISPLAY_FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}
