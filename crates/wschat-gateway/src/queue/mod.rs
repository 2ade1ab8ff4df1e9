//! Pending broadcast work

mod message_queue;

pub use message_queue::MessageQueue;
