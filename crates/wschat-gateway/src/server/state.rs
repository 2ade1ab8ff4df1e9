//! Gateway state
//!
//! Shared handles passed to the accept loop, every connection task and the dispatcher.

use crate::connection::ConnectionManager;
use crate::logging::{LogSink, Severity};
use crate::queue::MessageQueue;
use std::sync::Arc;
use wschat_common::GatewayConfig;
use wschat_core::FrameCodec;

/// Gateway state
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct GatewayState {
    /// Registry of accepted connections
    connection_manager: Arc<ConnectionManager>,
    /// Events waiting for the dispatcher
    queue: Arc<MessageQueue>,
    /// Operator log lines
    log: Arc<dyn LogSink>,
    /// Frame codec sized by the configured envelope
    codec: FrameCodec,
    /// Gateway configuration
    config: Arc<GatewayConfig>,
}

impl GatewayState {
    /// Create a new gateway state with an empty registry and queue
    pub fn new(config: GatewayConfig, log: Arc<dyn LogSink>) -> Self {
        Self {
            connection_manager: ConnectionManager::new_shared(),
            queue: Arc::new(MessageQueue::new()),
            log,
            codec: FrameCodec::new(config.max_frame_bytes),
            config: Arc::new(config),
        }
    }

    /// Get the connection manager
    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection_manager
    }

    /// Get the message queue
    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Get the frame codec
    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Get the gateway configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Emit an operator log line
    pub fn log(&self, message: &str, severity: Severity) {
        self.log.log(message, severity);
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connection_manager", &self.connection_manager)
            .field("queue_len", &self.queue.len())
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
