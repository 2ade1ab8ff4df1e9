//! Protocol errors

mod protocol_error;

pub use protocol_error::{ProtocolError, ProtocolResult};
