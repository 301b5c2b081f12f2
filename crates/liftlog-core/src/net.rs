//! Process-wide connectivity state.
//!
//! The core never probes the network itself; the embedding application feeds
//! online/offline events in (from OS reachability callbacks, socket errors,
//! or the platform's equivalent of an `online` event). Readers consult
//! `is_online` before attempting remote calls; the sync scheduler subscribes
//! to catch the offline-to-online edge.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a connectivity change. No-op if the state is unchanged, so
    /// repeated OS events do not wake subscribers spuriously.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    /// Assume online until told otherwise, matching browser semantics.
    fn default() -> Self {
        Self::new(true)
    }
}
