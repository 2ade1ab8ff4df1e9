//! Individual chat connection
//!
//! Represents a single accepted socket and its handshake and nickname state.

use parking_lot::RwLock;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Encoded frame shared by every connection it is broadcast to
pub type OutboundFrame = Arc<[u8]>;

/// Identity of an accepted socket: the peer address plus a server-assigned handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    remote: SocketAddr,
    handle: u64,
}

impl ConnectionId {
    /// Create a connection identity
    #[must_use]
    pub const fn new(remote: SocketAddr, handle: u64) -> Self {
        Self { remote, handle }
    }

    /// Get the peer address
    pub const fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Get the server-assigned handle
    pub const fn handle(&self) -> u64 {
        self.handle
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.remote, self.handle)
    }
}

/// Connection state
///
/// A named connection is still `Handshaked`; the nickname is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, waiting for the Upgrade request
    Connected,
    /// Handshake completed, frames are exchanged
    Handshaked,
}

/// A single chat connection
pub struct Connection {
    /// Unique identity
    id: ConnectionId,

    /// Set once the handshake response has been written
    handshaked: AtomicBool,

    /// Display name announced with a login marker
    nickname: RwLock<Option<String>>,

    /// Frames waiting to be written by the connection's task
    sender: mpsc::Sender<OutboundFrame>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(id: ConnectionId, sender: mpsc::Sender<OutboundFrame>) -> Arc<Self> {
        Arc::new(Self {
            id,
            handshaked: AtomicBool::new(false),
            nickname: RwLock::new(None),
            sender,
            created_at: Instant::now(),
        })
    }

    /// Get the connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the peer address
    pub fn remote_addr(&self) -> SocketAddr {
        self.id.remote
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        if self.is_handshaked() {
            ConnectionState::Handshaked
        } else {
            ConnectionState::Connected
        }
    }

    /// Check if the handshake has completed
    pub fn is_handshaked(&self) -> bool {
        self.handshaked.load(Ordering::Acquire)
    }

    /// Mark the handshake as completed
    ///
    /// Returns `false` if it already was; the flag only ever moves from unset to set.
    pub fn mark_handshaked(&self) -> bool {
        self.handshaked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Get the nickname (if announced)
    pub fn nickname(&self) -> Option<String> {
        self.nickname.read().clone()
    }

    /// Set the nickname
    pub fn set_nickname(&self, name: impl Into<String>) {
        *self.nickname.write() = Some(name.into());
    }

    /// Name shown in chat lines: the nickname, or `<remote>#<handle>` when none was announced
    pub fn display_name(&self) -> String {
        match self.nickname.read().as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }

    /// Get connection age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Queue a frame without waiting
    ///
    /// Fails with `Full` when the connection is not keeping up and `Closed` once its task
    /// has exited.
    pub fn try_send(
        &self,
        frame: OutboundFrame,
    ) -> Result<(), mpsc::error::TrySendError<OutboundFrame>> {
        self.sender.try_send(frame)
    }

    /// Check if the connection's task has stopped receiving frames
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("handshaked", &self.is_handshaked())
            .field("nickname", &self.nickname())
            .field("created_at", &self.created_at)
            .finish()
    }
}
