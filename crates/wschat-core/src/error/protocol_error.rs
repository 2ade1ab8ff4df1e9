//! Protocol errors - everything the handshake engine and frame codec can reject

use thiserror::Error;

/// Protocol layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    // =========================================================================
    // Handshake
    // =========================================================================
    #[error("Request does not carry a Sec-WebSocket-Key header")]
    NotAHandshake,

    // =========================================================================
    // Unsupported frames (dropped, connection stays open)
    // =========================================================================
    #[error("Fragmented frame (FIN bit unset)")]
    Fragmented,

    #[error("Client frame is not masked")]
    Unmasked,

    #[error("Unknown op code: {0:#x}")]
    UnknownOpCode(u8),

    // =========================================================================
    // Framing
    // =========================================================================
    #[error("Frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: u64, max: usize },
}

impl ProtocolError {
    /// Get an error code string for log lines
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAHandshake => "HANDSHAKE_MALFORMED",
            Self::Fragmented | Self::Unmasked | Self::UnknownOpCode(_) => "FRAME_UNSUPPORTED",
            Self::Truncated { .. } => "FRAME_TRUNCATED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
        }
    }

    /// Check if the frame was well formed but uses a feature this server does not accept
    pub fn is_unsupported_frame(&self) -> bool {
        matches!(self, Self::Fragmented | Self::Unmasked | Self::UnknownOpCode(_))
    }

    /// Check if the connection can keep reading after this error
    ///
    /// An oversized frame cannot be skipped without buffering it, so the stream is lost.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::PayloadTooLarge { .. })
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
