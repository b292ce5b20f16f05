//! Clinotes core library - shared types, traits, and reconciliation logic.
//!
//! This crate contains no I/O and can be compiled for any target.

mod advisory;
mod connectivity;
mod engine;
mod error;
pub mod export;
mod kv;
mod loader;
mod mirror;
pub mod model;
mod remote;
mod store;
mod workspace;

#[cfg(test)]
mod test_support;

pub use advisory::Advisory;
pub use connectivity::ConnectivityMonitor;
pub use engine::{choose_path, Engine, LocalReason, Outcome, SyncFlag, SyncReport, WritePath};
pub use error::Error;
pub use export::Export;
pub use kv::{KeyValueStore, MemoryStore};
pub use loader::{CollectionLoader, LoadReport, LoadSource};
pub use mirror::{LocalMirror, MIRROR_KEY};
pub use model::{Client, ClientId, ClientRecord, NewClient, NewNote, Note, NoteId, NoteUpdate, Snapshot};
pub use remote::RemoteStore;
pub use store::CollectionStore;
pub use workspace::{Status, Workspace};
