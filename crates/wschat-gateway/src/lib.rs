//! # wschat-gateway
//!
//! Chat server speaking WebSocket directly over TCP: accepts sockets, performs the opening
//! handshake, decodes client frames and broadcasts chat lines to every handshaked client.

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod events;
pub mod logging;
pub mod queue;
pub mod server;

// Re-export commonly used types at crate root
pub use broadcast::BroadcastDispatcher;
pub use connection::{Connection, ConnectionId, ConnectionManager, ConnectionState};
pub use error::{GatewayError, GatewayResult};
pub use events::ChatEvent;
pub use logging::{LogSink, Severity, TracingLogSink};
pub use queue::MessageQueue;
pub use server::{run, ChatServer, GatewayState};
