//! WebSocket close codes
//!
//! The status codes this server sends in its close frames (RFC 6455 section 7.4.1).

/// Close frame status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure, sent when echoing a client's close frame
    Normal = 1000,
    /// Server is shutting down
    GoingAway = 1001,
    /// Frame violated the protocol
    ProtocolError = 1002,
    /// Frame payload exceeded the configured envelope
    MessageTooBig = 1009,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::ProtocolError),
            1009 => Some(Self::MessageTooBig),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({})", self.as_u16())
    }
}
