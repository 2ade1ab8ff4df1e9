//! Message queue
//!
//! FIFO of chat events with many producers and a single consumer.

use crate::events::ChatEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Ordered queue of events waiting for the dispatcher
///
/// Producers never block. The consumer suspends on a [`Notify`] while the queue is empty.
#[derive(Debug, Default)]
pub struct MessageQueue {
    events: Mutex<VecDeque<ChatEvent>>,
    notify: Notify,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and wake the consumer
    pub fn enqueue(&self, event: ChatEvent) {
        self.events.lock().push_back(event);
        self.notify.notify_one();
    }

    /// Remove the oldest event, waiting until one is available
    ///
    /// Cancel safe: an event is only removed in the same poll that returns it.
    pub async fn dequeue(&self) -> ChatEvent {
        loop {
            if let Some(event) = self.try_dequeue() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    /// Remove the oldest event if there is one
    pub fn try_dequeue(&self) -> Option<ChatEvent> {
        self.events.lock().pop_front()
    }

    /// Remove every queued event, oldest first
    pub fn drain_all(&self) -> Vec<ChatEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop every queued event, returning how many there were
    pub fn clear(&self) -> usize {
        let mut events = self.events.lock();
        let count = events.len();
        events.clear();
        count
    }
}
