//! Remote reachability signal.
//!
//! The flag is seeded from whatever network indicator the host platform
//! offers and then driven by its transition events. Nothing here polls.

use std::sync::Arc;

use tokio::sync::watch;

/// Tracks whether the remote store is currently reachable.
///
/// Clones share the same state, so the event source and the engine can each
/// hold one.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { state: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a "became reachable" event.
    pub fn went_online(&self) {
        self.set_online(true);
    }

    /// Record a "became unreachable" event.
    pub fn went_offline(&self) {
        self.set_online(false);
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.state.send_replace(online);
        if previous != online {
            if online {
                tracing::info!("remote became reachable");
            } else {
                tracing::info!("remote became unreachable");
            }
        }
    }

    /// Subscribe to reachability transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
