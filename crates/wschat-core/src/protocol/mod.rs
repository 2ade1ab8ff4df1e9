//! WebSocket protocol
//!
//! The subset of RFC 6455 the chat server speaks: the opening handshake, single-frame
//! text messages and the `{<name>}` login marker carried inside them.

mod close_codes;
mod frame;
mod handshake;
mod login;
mod opcodes;

pub use close_codes::CloseCode;
pub use frame::{
    decode_server_frame, encode_client_frame, Frame, FrameCodec, DEFAULT_MAX_FRAME_BYTES,
};
pub use handshake::{accept_key, compute_accept, WEBSOCKET_GUID};
pub use login::parse_login_marker;
pub use opcodes::OpCode;
