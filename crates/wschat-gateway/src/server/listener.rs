//! Accept loop
//!
//! Owns the listening socket and spawns one task per accepted connection.

use super::handler::handle_connection;
use crate::logging::Severity;
use crate::server::GatewayState;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until `shutdown` fires, then wait for every connection task
///
/// Accept failures are logged and retried; they never end the loop.
pub async fn accept_loop(listener: TcpListener, state: GatewayState, shutdown: CancellationToken) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                report_join(joined);
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::trace!(remote = %remote, error = %e, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(handle_connection(
                        state.clone(),
                        stream,
                        remote,
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    state.log(&format!("accept failed: {e}"), Severity::Error);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    drop(listener);
    tracing::debug!(
        remaining = connections.len(),
        "Listener closed, waiting for connection tasks"
    );

    while let Some(joined) = connections.join_next().await {
        report_join(joined);
    }

    tracing::info!("Accept loop stopped");
}

fn report_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Connection task panicked");
        }
    }
}
