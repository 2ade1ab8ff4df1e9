//! Connection manager
//!
//! Registry of all accepted connections using DashMap for thread-safe access.

use super::{Connection, ConnectionId, OutboundFrame};
use crate::error::{GatewayError, GatewayResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all accepted connections
///
/// Uses `DashMap` for concurrent access from the accept path, every connection task and the
/// broadcast dispatcher.
pub struct ConnectionManager {
    /// Accepted connections by identity
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Next handle handed out by `next_id`
    next_handle: AtomicU64,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Allocate an identity for a freshly accepted socket
    pub fn next_id(&self, remote: SocketAddr) -> ConnectionId {
        ConnectionId::new(remote, self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a new connection
    ///
    /// The connection starts un-handshaked and unnamed.
    pub fn add_connection(
        &self,
        id: ConnectionId,
        sender: mpsc::Sender<OutboundFrame>,
    ) -> GatewayResult<Arc<Connection>> {
        match self.connections.entry(id) {
            Entry::Occupied(_) => Err(GatewayError::DuplicateConnection(id)),
            Entry::Vacant(entry) => {
                let connection = Connection::new(id, sender);
                entry.insert(connection.clone());

                tracing::debug!(connection = %id, "Connection added");

                Ok(connection)
            }
        }
    }

    /// Mark a connection's handshake as completed
    ///
    /// Returns `false` if the connection is unknown or was already handshaked.
    pub fn mark_handshaked(&self, id: ConnectionId) -> bool {
        let marked = self
            .connections
            .get(&id)
            .is_some_and(|connection| connection.mark_handshaked());

        if marked {
            tracing::debug!(connection = %id, "Connection handshaked");
        }

        marked
    }

    /// Set a connection's nickname
    pub fn set_nickname(&self, id: ConnectionId, name: &str) -> bool {
        if let Some(connection) = self.connections.get(&id) {
            connection.set_nickname(name);

            tracing::debug!(connection = %id, nickname = %name, "Nickname set");

            true
        } else {
            false
        }
    }

    /// Remove a connection
    ///
    /// Safe to call while the dispatcher iterates a snapshot: the snapshot keeps its own
    /// references, and snapshots taken afterwards no longer contain the connection.
    pub fn remove_connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(&id).map(|(_, connection)| connection);

        if removed.is_some() {
            tracing::debug!(connection = %id, "Connection removed");
        }

        removed
    }

    /// Check if a connection is registered
    pub fn has_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Point-in-time copy of every registered connection
    ///
    /// No shard lock is held once this returns, so callers may write to sockets while
    /// iterating.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Point-in-time copy of the connections eligible for broadcast
    pub fn handshaked_snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|r| r.is_handshaked())
            .map(|r| r.value().clone())
            .collect()
    }

    /// Get the total number of registered connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of handshaked connections
    pub fn handshaked_count(&self) -> usize {
        self.connections.iter().filter(|r| r.is_handshaked()).count()
    }

    /// Remove every connection, returning how many there were
    pub fn clear(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();

        if count > 0 {
            tracing::info!(count = count, "Cleared connection registry");
        }

        count
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("next_handle", &self.next_handle.load(Ordering::Relaxed))
            .finish()
    }
}
