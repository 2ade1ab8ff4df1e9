//! # wschat-core
//!
//! Protocol layer for the chat server: WebSocket frame codec, opening handshake and the
//! login marker convention. This crate performs no I/O; every operation works on byte slices.

pub mod error;
pub mod protocol;

// Re-export commonly used types at crate root
pub use error::{ProtocolError, ProtocolResult};
pub use protocol::{
    accept_key, compute_accept, decode_server_frame, encode_client_frame, parse_login_marker,
    CloseCode, Frame, FrameCodec, OpCode, DEFAULT_MAX_FRAME_BYTES, WEBSOCKET_GUID,
};
