//! Event broadcasting
//!
//! Drains the message queue and writes each event to every handshaked connection.

mod dispatcher;

pub use dispatcher::BroadcastDispatcher;
