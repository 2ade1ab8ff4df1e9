//! Test helpers for integration tests
//!
//! Provides a running test server with a capturing log sink and a raw WebSocket client
//! built on a plain TCP stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wschat_common::GatewayConfig;
use wschat_core::{decode_server_frame, Frame, OpCode};
use wschat_gateway::{ChatServer, GatewayState, LogSink, Severity};

use crate::fixtures::{close_frame, login_marker, text_frame, upgrade_request, SAMPLE_KEY};

/// How long a test waits for something the server should do promptly
pub const WAIT: Duration = Duration::from_secs(5);

/// How long a test waits before concluding nothing arrives
pub const QUIET: Duration = Duration::from_millis(300);

/// Log lines captured from a server
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl LogCapture {
    /// Sink that appends to this capture
    pub fn sink(&self) -> Arc<dyn LogSink> {
        let lines = self.lines.clone();
        Arc::new(move |message: &str, severity: Severity| {
            lines.lock().push((severity, message.to_string()));
        })
    }

    /// Snapshot of every captured line
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().clone()
    }

    /// Check if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, line)| line.contains(needle))
    }

    /// Wait until a line containing `needle` is captured
    pub async fn wait_for(&self, needle: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !self.contains(needle) {
            if tokio::time::Instant::now() >= deadline {
                bail!("log line containing {needle:?} not seen; got {:?}", self.lines());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: ChatServer,
    pub logs: LogCapture,
}

impl TestServer {
    /// Start a new test server on a free local port
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: GatewayConfig) -> Result<Self> {
        let logs = LogCapture::default();
        let server = ChatServer::new(config, logs.sink());
        let addr = server.start(0).await?;

        Ok(Self { addr, server, logs })
    }

    /// Shared state of the running server
    pub async fn state(&self) -> Result<GatewayState> {
        self.server.state().await.context("server is not running")
    }

    /// Connect a client and complete the handshake
    pub async fn connect(&self) -> Result<TestClient> {
        let mut client = TestClient::connect(self.addr).await?;
        client.handshake().await?;
        Ok(client)
    }

    /// Connect a client, announce `name` and consume its own join line
    pub async fn login(&self, name: &str) -> Result<TestClient> {
        let mut client = self.connect().await?;
        client.send_text(&login_marker(name)).await?;

        let joined = client.recv_text().await?;
        if !joined.ends_with(&format!("]{name} joined the server")) {
            bail!("unexpected join line: {joined:?}");
        }
        Ok(client)
    }

    /// Wait until the registry holds exactly `count` connections
    pub async fn wait_for_connections(&self, count: usize) -> Result<()> {
        let state = self.state().await?;
        let deadline = tokio::time::Instant::now() + WAIT;
        while state.connection_manager().connection_count() != count {
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "expected {count} connections, registry holds {}",
                    state.connection_manager().connection_count()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

/// Create a test configuration bound to the loopback interface
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..GatewayConfig::default()
    }
}

/// Raw WebSocket client over a TCP stream
pub struct TestClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TestClient {
    /// Open a TCP connection without handshaking
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: Vec::new(),
        })
    }

    /// Send the Upgrade request and check the response
    pub async fn handshake(&mut self) -> Result<String> {
        self.send_raw(&upgrade_request(SAMPLE_KEY)).await?;
        let response = self.read_response().await?;
        if !response.starts_with("HTTP/1.1 101 Switching Protocols\r\n") {
            bail!("unexpected handshake response: {response:?}");
        }
        Ok(response)
    }

    /// Read the HTTP response head
    pub async fn read_response(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buffer.drain(..pos + 4).collect();
                return Ok(String::from_utf8(head)?);
            }
            self.fill().await?;
        }
    }

    /// Write bytes as they are
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Send a masked text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_raw(&text_frame(text)).await
    }

    /// Send a close frame
    pub async fn send_close(&mut self) -> Result<()> {
        self.send_raw(&close_frame()).await
    }

    /// Receive the next frame
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        tokio::time::timeout(WAIT, self.next_frame())
            .await
            .context("timed out waiting for a frame")?
    }

    /// Receive the next text frame payload
    pub async fn recv_text(&mut self) -> Result<String> {
        let frame = self.recv_frame().await?;
        if frame.opcode != OpCode::Text {
            bail!("expected a text frame, got {}", frame.opcode);
        }
        Ok(frame.payload)
    }

    /// Receive a close frame and return its status code
    pub async fn recv_close(&mut self) -> Result<u16> {
        tokio::time::timeout(WAIT, async {
            while self.buffer.len() < 4 {
                self.fill().await?;
            }
            if self.buffer[0] != 0x88 || self.buffer[1] != 0x02 {
                bail!("expected a close frame, got {:02x?}", &self.buffer[..2]);
            }
            let code = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
            self.buffer.drain(..4);
            Ok::<_, anyhow::Error>(code)
        })
        .await
        .context("timed out waiting for a close frame")?
    }

    /// Check that no frame arrives for a short while
    pub async fn expect_silence(&mut self) -> Result<()> {
        match tokio::time::timeout(QUIET, self.next_frame()).await {
            Err(_) => Ok(()),
            Ok(Ok(frame)) => bail!("unexpected frame: {frame:?}"),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Wait for the server to close the TCP stream
    pub async fn expect_eof(&mut self) -> Result<()> {
        let mut chunk = [0u8; 1024];
        tokio::time::timeout(WAIT, async {
            loop {
                match self.stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
            }
        })
        .await
        .context("server did not close the connection")
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, used)) = decode_server_frame(&self.buffer)? {
                self.buffer.drain(..used);
                return Ok(frame);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; 4096];
        let n = self.stream.read(&mut chunk).await?;
        if n == 0 {
            bail!("connection closed by server");
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
