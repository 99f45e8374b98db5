use crate::client::{ClientId, ClientSink};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Set of clients currently believed to be alive, keyed by [`ClientId`].
///
/// Iteration always goes through [`snapshot`](Self::snapshot): the lock is
/// held only long enough to copy the handles out. Never hold it across a
/// send; a single slow client would then block every connect and
/// disconnect in the process.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, Arc<dyn ClientSink>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an identity for a new connection.
    pub fn next_id(&self) -> ClientId {
        ClientId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Adds a client; registering the same ID twice keeps a single entry.
    ///
    /// Returns the membership count observed right after the insertion,
    /// under the same lock.
    pub fn register(&self, client: Arc<dyn ClientSink>) -> usize {
        let mut clients = self.clients.lock();
        let id = client.id();
        if clients.insert(id, client).is_some() {
            log::debug!("{} was already registered", id);
        }
        let count = clients.len();
        log::info!("{} registered. Total clients: {}", id, count);
        count
    }

    /// Removes a client. Unknown IDs are ignored.
    ///
    /// Returns `true` if the client was present.
    pub fn unregister(&self, id: ClientId) -> bool {
        let mut clients = self.clients.lock();
        let removed = clients.remove(&id).is_some();
        if removed {
            log::info!("{} unregistered. Total clients: {}", id, clients.len());
        }
        removed
    }

    /// Current number of registered clients.
    pub fn count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Point-in-time copy of all registered handles.
    pub fn snapshot(&self) -> Vec<Arc<dyn ClientSink>> {
        self.clients.lock().values().cloned().collect()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<ClientId> = self.clients.lock().keys().copied().collect();
        ids.sort();
        f.debug_struct("ClientRegistry")
            .field("clients", &ids)
            .finish()
    }
}
