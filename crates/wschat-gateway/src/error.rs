//! Gateway error types

use crate::connection::ConnectionId;
use std::net::SocketAddr;
use thiserror::Error;
use wschat_core::ProtocolError;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Start requested while the server is listening
    #[error("Server is already running on {0}")]
    AlreadyRunning(SocketAddr),

    /// Stop requested while the server is stopped
    #[error("Server is not running")]
    NotRunning,

    /// Listening socket could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection identity already present in the registry
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// Read or write failure on a connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame the connection cannot recover from
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A socket write was abandoned because the server is stopping
    #[error("Server is shutting down")]
    Shutdown,

    /// Accept loop or dispatcher task ended abnormally
    #[error("Server task failed: {0}")]
    TaskFailed(String),
}

impl GatewayError {
    /// Get an error code string for log lines
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning(_) => "ALREADY_RUNNING",
            Self::NotRunning => "NOT_RUNNING",
            Self::Bind { .. } => "SERVER_START_FAILURE",
            Self::DuplicateConnection(_) => "DUPLICATE_CONNECTION",
            Self::Io(_) => "CONNECTION_IO_ERROR",
            Self::Protocol(e) => e.code(),
            Self::Shutdown => "SHUTDOWN",
            Self::TaskFailed(_) => "TASK_FAILED",
        }
    }

    /// Check if this error only concerns a single connection
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateConnection(_) | Self::Io(_) | Self::Protocol(_)
        )
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
