//! Gateway server
//!
//! Start/stop control surface over the accept loop and the broadcast dispatcher.

mod handler;
mod listener;
mod state;

pub use handler::handle_connection;
pub use listener::accept_loop;
pub use state::GatewayState;

use crate::broadcast::BroadcastDispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::logging::{LogSink, Severity, TracingLogSink};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wschat_common::{AppConfig, AppError, AppResult, GatewayConfig};

/// Handles of a listening server
struct RunningServer {
    local_addr: SocketAddr,
    state: GatewayState,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    dispatcher_task: JoinHandle<()>,
}

/// Chat server control surface
///
/// A server can be started and stopped any number of times; each start gets a fresh
/// registry and queue.
pub struct ChatServer {
    config: GatewayConfig,
    log: Arc<dyn LogSink>,
    running: Mutex<Option<RunningServer>>,
}

impl ChatServer {
    /// Create a stopped server reporting to `log`
    pub fn new(config: GatewayConfig, log: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            log,
            running: Mutex::new(None),
        }
    }

    /// Create a stopped server reporting through `tracing`
    pub fn with_tracing_log(config: GatewayConfig) -> Self {
        Self::new(config, Arc::new(TracingLogSink))
    }

    /// Bind `port` on the configured host and start accepting clients
    ///
    /// Port `0` asks the OS for a free port. Returns the bound address. On failure the
    /// server stays stopped.
    pub async fn start(&self, port: u16) -> GatewayResult<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            self.log.log("Server is already running", Severity::Warning);
            return Err(GatewayError::AlreadyRunning(server.local_addr));
        }

        let addr = format!("{}:{port}", self.config.host);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let err = GatewayError::Bind { addr, source };
                tracing::error!(code = err.code(), error = %err, "Failed to start server");
                self.log.log(&format!("failed to start server: {err}"), Severity::Error);
                return Err(err);
            }
        };
        let local_addr = listener.local_addr()?;

        let config = GatewayConfig {
            port: local_addr.port(),
            ..self.config.clone()
        };
        let state = GatewayState::new(config, self.log.clone());
        let shutdown = CancellationToken::new();

        let dispatcher = Arc::new(BroadcastDispatcher::new(state.clone()));
        let dispatcher_task = dispatcher.start(shutdown.clone());
        let accept_task = tokio::spawn(accept_loop(listener, state.clone(), shutdown.clone()));

        tracing::info!(addr = %local_addr, "Chat server listening");
        self.log
            .log(&format!("Server listening on {local_addr}"), Severity::Info);

        *running = Some(RunningServer {
            local_addr,
            state,
            shutdown,
            accept_task,
            dispatcher_task,
        });

        Ok(local_addr)
    }

    /// Stop accepting, close every connection and discard pending events
    ///
    /// Returns once every server task has finished.
    pub async fn stop(&self) -> GatewayResult<()> {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            self.log.log("Server is not running", Severity::Warning);
            return Err(GatewayError::NotRunning);
        };

        server.shutdown.cancel();
        let (accept, dispatcher) = tokio::join!(server.accept_task, server.dispatcher_task);

        let connections = server.state.connection_manager().clear();
        let pending = server.state.queue().clear();

        tracing::info!(
            addr = %server.local_addr,
            connections = connections,
            pending = pending,
            "Chat server stopped"
        );
        self.log.log("Server stopped", Severity::Info);

        accept.map_err(|e| GatewayError::TaskFailed(format!("accept loop: {e}")))?;
        dispatcher.map_err(|e| GatewayError::TaskFailed(format!("dispatcher: {e}")))?;

        Ok(())
    }

    /// Check if the server is listening
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Get the bound address while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.local_addr)
    }

    /// Get the shared state while running
    pub async fn state(&self) -> Option<GatewayState> {
        self.running.lock().await.as_ref().map(|s| s.state.clone())
    }
}

impl std::fmt::Debug for ChatServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run the server on the configured port until Ctrl-C
pub async fn run(config: AppConfig) -> AppResult<()> {
    let server = ChatServer::with_tracing_log(config.gateway.clone());

    let addr = server
        .start(config.gateway.port)
        .await
        .map_err(AppError::server)?;
    tracing::info!(addr = %addr, "Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.map_err(AppError::internal)?;
    tracing::info!("Shutdown signal received");

    server.stop().await.map_err(AppError::server)
}
