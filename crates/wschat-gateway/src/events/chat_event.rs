//! Chat event
//!
//! One message (or login announcement) waiting to be broadcast.

use crate::connection::Connection;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Format of the timestamp prefix in rendered lines
pub const TIME_FORMAT: &str = "%H:%M";

/// A single broadcast unit
///
/// Immutable once created. The origin is shared so the rendered name reflects the nickname
/// at dispatch time, even if the connection has since left the registry.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    origin: Arc<Connection>,
    message: String,
    timestamp: DateTime<Local>,
    is_login: bool,
}

impl ChatEvent {
    /// Chat message from a connection
    pub fn chat(origin: Arc<Connection>, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
            timestamp: Local::now(),
            is_login: false,
        }
    }

    /// Login announcement from a connection that just named itself
    pub fn login(origin: Arc<Connection>) -> Self {
        Self {
            origin,
            message: String::new(),
            timestamp: Local::now(),
            is_login: true,
        }
    }

    /// Override the event timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn origin(&self) -> &Arc<Connection> {
        &self.origin
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn is_login(&self) -> bool {
        self.is_login
    }

    /// Render the line sent to every client
    ///
    /// Logins read `[HH:MM]name joined the server`, messages read `[HH:MM]name:message`.
    pub fn render(&self) -> String {
        let time = self.timestamp.format(TIME_FORMAT);
        let name = self.origin.display_name();

        if self.is_login {
            format!("[{time}]{name} joined the server")
        } else {
            format!("[{time}]{name}:{}", self.message)
        }
    }
}
