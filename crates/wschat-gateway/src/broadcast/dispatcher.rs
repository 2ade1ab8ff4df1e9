//! Broadcast dispatcher
//!
//! Single consumer of the message queue. Each event is encoded once and offered to every
//! handshaked connection in a registry snapshot.

use crate::connection::OutboundFrame;
use crate::events::ChatEvent;
use crate::logging::Severity;
use crate::server::GatewayState;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Routes queued chat events to connections
pub struct BroadcastDispatcher {
    /// Registry, queue and codec
    state: GatewayState,
    /// Whether the dispatcher loop is running
    running: AtomicBool,
    /// Events broadcast so far
    dispatched: AtomicU64,
}

impl BroadcastDispatcher {
    /// Create a new dispatcher
    pub fn new(state: GatewayState) -> Self {
        Self {
            state,
            running: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Start the dispatcher loop
    ///
    /// The loop ends once `shutdown` is cancelled. Events still queued at that point are left
    /// for the caller to clear.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.running.swap(true, Ordering::SeqCst) {
                tracing::warn!("Broadcast dispatcher is already running");
                return;
            }

            tracing::info!("Broadcast dispatcher started");
            self.run(&shutdown).await;
            self.running.store(false, Ordering::SeqCst);
            tracing::info!(
                dispatched = self.dispatched_count(),
                "Broadcast dispatcher stopped"
            );
        })
    }

    async fn run(&self, shutdown: &CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = self.state.queue().dequeue() => event,
            };

            self.dispatch(&event);
        }
    }

    /// Encode an event and offer it to every handshaked connection
    ///
    /// Returns the number of connections the frame was queued for. Connections that are not
    /// keeping up, or whose task has already exited, are skipped for this event.
    pub fn dispatch(&self, event: &ChatEvent) -> usize {
        let line = event.render();
        let frame: OutboundFrame = match self.state.codec().encode_text(&line) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                tracing::warn!(
                    origin = %event.origin().id(),
                    error = %e,
                    "Dropping event that cannot be encoded"
                );
                self.state.log(
                    &format!(
                        "message from {} dropped: {e}",
                        event.origin().display_name()
                    ),
                    Severity::Warning,
                );
                return 0;
            }
        };

        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let mut sent = 0;
        for connection in self.state.connection_manager().handshaked_snapshot() {
            match connection.try_send(frame.clone()) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        connection = %connection.id(),
                        "Outbound queue full, skipping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!(
                        connection = %connection.id(),
                        "Connection closing, skipping event"
                    );
                }
            }
        }

        tracing::trace!(
            origin = %event.origin().id(),
            login = event.is_login(),
            sent = sent,
            "Event broadcast"
        );

        sent
    }

    /// Check if the dispatcher loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of events encoded and broadcast
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for BroadcastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastDispatcher")
            .field("running", &self.is_running())
            .field("dispatched", &self.dispatched_count())
            .finish_non_exhaustive()
    }
}
