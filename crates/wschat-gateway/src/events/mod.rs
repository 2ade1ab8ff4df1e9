//! Chat events
//!
//! Units of broadcast work produced by the receive path and consumed by the dispatcher.

mod chat_event;

pub use chat_event::{ChatEvent, TIME_FORMAT};
