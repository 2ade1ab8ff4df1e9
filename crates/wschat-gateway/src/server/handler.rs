//! Connection handler
//!
//! One task per accepted socket. The task owns both halves of the socket: it reads and
//! parses client bytes, and writes the frames the dispatcher queues for it.

use crate::connection::{Connection, OutboundFrame};
use crate::error::{GatewayError, GatewayResult};
use crate::events::ChatEvent;
use crate::logging::Severity;
use crate::server::GatewayState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wschat_core::{compute_accept, parse_login_marker, CloseCode, FrameCodec, OpCode, ProtocolError};

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 4096;

/// Longest wait for the going-away close frame during shutdown
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// End of the HTTP request head
const REQUEST_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Why a connection ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// The peer closed the TCP stream
    PeerClosed,
    /// The peer sent a close frame
    ClientClosed,
    /// The server is stopping
    Shutdown,
}

/// Outcome of one handshake attempt on the buffered bytes
enum HandshakeStep {
    /// The request head is not complete yet
    NeedMore,
    /// A request head was consumed but carried no key
    Ignored,
    /// The response was written
    Completed,
}

/// Serve a single accepted socket until it disconnects or `shutdown` fires
///
/// The connection is registered on entry and always removed from the registry on exit.
pub async fn handle_connection(
    state: GatewayState,
    stream: TcpStream,
    remote: SocketAddr,
    shutdown: CancellationToken,
) {
    let manager = state.connection_manager();
    let id = manager.next_id(remote);
    let (tx, rx) = mpsc::channel::<OutboundFrame>(state.config().outbound_buffer);

    let connection = match manager.add_connection(id, tx) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(remote = %remote, error = %e, "Failed to register connection");
            return;
        }
    };

    tracing::debug!(connection = %id, "Connection accepted");
    state.log(&format!("client {remote} connected"), Severity::Info);

    let (reader, writer) = stream.into_split();
    let mut session = Session {
        state: state.clone(),
        connection,
        writer,
        buffer: Vec::with_capacity(READ_CHUNK),
        shutdown,
        torn: false,
    };

    let result = match session.run(reader, rx).await {
        Err(GatewayError::Shutdown) => Ok(Disconnect::Shutdown),
        result => result,
    };
    session.finish(result).await;
}

/// Per-connection state owned by the connection task
struct Session {
    state: GatewayState,
    connection: Arc<Connection>,
    writer: OwnedWriteHalf,
    /// Bytes read but not yet consumed as a handshake or frame
    buffer: Vec<u8>,
    shutdown: CancellationToken,
    /// A write was cut short, so the outbound stream ends mid-frame
    torn: bool,
}

impl Session {
    async fn run(
        &mut self,
        mut reader: OwnedReadHalf,
        mut rx: mpsc::Receiver<OutboundFrame>,
    ) -> GatewayResult<Disconnect> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Ok(Disconnect::Shutdown),
                Some(frame) = rx.recv() => self.write(&frame).await?,
                read = reader.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(Disconnect::PeerClosed);
                    }

                    tracing::trace!(connection = %self.connection.id(), bytes = n, "Read");
                    self.buffer.extend_from_slice(&chunk[..n]);

                    if let Some(disconnect) = self.process_buffer().await? {
                        return Ok(disconnect);
                    }
                }
            }
        }
    }

    /// Write all of `bytes` unless the server starts shutting down first
    ///
    /// A peer that stops reading fills the socket buffer; without the race against
    /// `shutdown` such a write would never complete.
    async fn write(&mut self, bytes: &[u8]) -> GatewayResult<()> {
        tokio::select! {
            biased;
            written = self.writer.write_all(bytes) => Ok(written?),
            () = self.shutdown.cancelled() => {
                self.torn = true;
                Err(GatewayError::Shutdown)
            }
        }
    }

    /// Consume as much of the buffer as forms complete requests or frames
    async fn process_buffer(&mut self) -> GatewayResult<Option<Disconnect>> {
        while !self.connection.is_handshaked() {
            match self.handshake().await? {
                HandshakeStep::NeedMore => return Ok(None),
                HandshakeStep::Ignored => {}
                HandshakeStep::Completed => break,
            }
        }

        self.process_frames().await
    }

    async fn handshake(&mut self) -> GatewayResult<HandshakeStep> {
        let Some(pos) = find_subslice(&self.buffer, REQUEST_TERMINATOR) else {
            if self.buffer.len() > self.state.config().max_handshake_bytes {
                tracing::debug!(
                    connection = %self.connection.id(),
                    buffered = self.buffer.len(),
                    "Discarding oversized pre-handshake data"
                );
                self.buffer.clear();
            }
            return Ok(HandshakeStep::NeedMore);
        };

        let end = pos + REQUEST_TERMINATOR.len();
        let response = compute_accept(&self.buffer[..end]);
        self.buffer.drain(..end);

        match response {
            Ok(response) => {
                // Frames queued from here on are written by this task after the response
                self.state
                    .connection_manager()
                    .mark_handshaked(self.connection.id());
                self.write(&response).await?;

                tracing::debug!(connection = %self.connection.id(), "Handshake completed");
                Ok(HandshakeStep::Completed)
            }
            Err(e) => {
                tracing::debug!(
                    connection = %self.connection.id(),
                    code = e.code(),
                    "Ignoring request without a WebSocket key"
                );
                Ok(HandshakeStep::Ignored)
            }
        }
    }

    async fn process_frames(&mut self) -> GatewayResult<Option<Disconnect>> {
        loop {
            let len = match self.state.codec().frame_len(&self.buffer) {
                Ok(Some(len)) if len <= self.buffer.len() => len,
                Ok(_) => return Ok(None),
                Err(e) => return Err(self.reject(e).await),
            };

            let decoded = self.state.codec().decode(&self.buffer[..len]);
            self.buffer.drain(..len);

            match decoded {
                Ok(frame) => match frame.opcode {
                    OpCode::Text => self.on_text(frame.payload),
                    OpCode::Close => {
                        self.write(&FrameCodec::close_frame(CloseCode::Normal))
                            .await?;
                        return Ok(Some(Disconnect::ClientClosed));
                    }
                    opcode => {
                        tracing::trace!(
                            connection = %self.connection.id(),
                            opcode = %opcode,
                            control = opcode.is_control(),
                            "Dropping non-text frame"
                        );
                    }
                },
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(
                        connection = %self.connection.id(),
                        code = e.code(),
                        error = %e,
                        "Dropping unsupported frame"
                    );
                }
                Err(e) => return Err(self.reject(e).await),
            }
        }
    }

    /// Tell the peer why the stream is being abandoned
    ///
    /// Returns `Shutdown` instead of the protocol error if the close frame was cut short.
    async fn reject(&mut self, error: ProtocolError) -> GatewayError {
        let code = match error {
            ProtocolError::PayloadTooLarge { .. } => CloseCode::MessageTooBig,
            _ => CloseCode::ProtocolError,
        };

        match self.write(&FrameCodec::close_frame(code)).await {
            Err(GatewayError::Shutdown) => GatewayError::Shutdown,
            Err(e) => {
                tracing::debug!(connection = %self.connection.id(), error = %e, "Close frame not sent");
                error.into()
            }
            Ok(()) => error.into(),
        }
    }

    fn on_text(&self, text: String) {
        let id = self.connection.id();

        if let Some(name) = parse_login_marker(&text) {
            self.state.connection_manager().set_nickname(id, name);
            self.state.log(
                &format!("{} logged in as {name}", self.connection.remote_addr()),
                Severity::Info,
            );
            self.state
                .queue()
                .enqueue(ChatEvent::login(self.connection.clone()));
        } else {
            self.state.log(
                &format!("[{}]:{text}", self.connection.display_name()),
                Severity::Info,
            );
            self.state
                .queue()
                .enqueue(ChatEvent::chat(self.connection.clone(), text));
        }
    }

    /// Unregister the connection and release the socket
    async fn finish(mut self, result: GatewayResult<Disconnect>) {
        let id = self.connection.id();
        self.state.connection_manager().remove_connection(id);

        match result {
            Ok(Disconnect::Shutdown) => {
                if self.torn {
                    tracing::debug!(connection = %id, "Write abandoned mid-frame");
                } else if self.connection.is_handshaked() {
                    let close = FrameCodec::close_frame(CloseCode::GoingAway);
                    if tokio::time::timeout(CLOSE_GRACE, self.writer.write_all(&close))
                        .await
                        .is_err()
                    {
                        tracing::debug!(connection = %id, "Going-away frame timed out");
                    }
                }
                tracing::debug!(connection = %id, "Connection closed by shutdown");
            }
            Ok(reason) => {
                tracing::debug!(
                    connection = %id,
                    reason = ?reason,
                    age_ms = self.connection.age().as_millis(),
                    "Connection closed"
                );
            }
            Err(e) => {
                tracing::debug!(connection = %id, code = e.code(), error = %e, "Connection failed");
                self.state.log(
                    &format!("connection {id} dropped: {e}"),
                    Severity::Warning,
                );
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            tracing::trace!(connection = %id, error = %e, "Socket shutdown failed");
        }

        self.state.log(
            &format!("user [{}] disconnected", self.connection.display_name()),
            Severity::Info,
        );
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
