//! Connection registry: every live connection across all listeners.
//!
//! Listeners are not visible here beyond the `origin` tag on each
//! connection; routing treats all of them as one pool.

use std::collections::HashMap;
use std::sync::Arc;

use tether_core::ConnectionId;
use tokio::sync::mpsc;

use crate::websocket::connection::ClientConnection;

/// Point-in-time snapshot of open connections. Consumed once.
pub type Snapshot = std::vec::IntoIter<Arc<ClientConnection>>;

/// Live connections indexed by identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity and register a new connection under it.
    pub fn register(
        &mut self,
        origin: &str,
        tx: mpsc::Sender<Arc<String>>,
    ) -> Arc<ClientConnection> {
        let mut id = ConnectionId::generate();
        while self.connections.contains_key(&id) {
            id = ConnectionId::generate();
        }
        let connection = Arc::new(ClientConnection::new(id.clone(), origin, tx));
        let _ = self.connections.insert(id, Arc::clone(&connection));
        connection
    }

    /// Remove a connection. Returns `None` if it was already gone.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id)
    }

    /// Snapshot of every open connection.
    pub fn all_open(&self) -> Snapshot {
        self.connections
            .values()
            .filter(|c| c.is_open())
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Look up an open connection by identity.
    pub fn find_by_identity(&self, id: &str) -> Option<Arc<ClientConnection>> {
        self.connections
            .get(id)
            .filter(|c| c.is_open())
            .cloned()
    }

    /// Whether the identity is registered (open or not).
    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
