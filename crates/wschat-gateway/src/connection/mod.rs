//! Connection management
//!
//! Tracks accepted sockets, their handshake state and nicknames.

mod connection;
mod manager;

pub use connection::{Connection, ConnectionId, ConnectionState, OutboundFrame};
pub use manager::ConnectionManager;
