//! Gateway Integration Tests
//!
//! Each test starts a server on a free loopback port and drives it with raw TCP clients.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use anyhow::Result;
use integration_tests::{
    fragment_frame, ping_frame, test_config, text_frame, upgrade_request, TestClient,
    TestServer, SAMPLE_ACCEPT, SAMPLE_KEY,
};
use std::time::Duration;
use wschat_common::GatewayConfig;
use wschat_gateway::{GatewayError, Severity};

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_handshake_accept_value() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = TestClient::connect(server.addr).await?;

    let response = client.handshake().await?;

    assert!(response.contains("Upgrade: websocket\r\n"));
    assert!(response.contains("Connection: Upgrade\r\n"));
    assert!(response.contains(&format!("Sec-WebSocket-Accept: {SAMPLE_ACCEPT}\r\n")));

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_request_without_key_is_ignored() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = TestClient::connect(server.addr).await?;

    client
        .send_raw(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await?;
    client.expect_silence().await?;

    // The same connection can still upgrade afterwards
    client.handshake().await?;

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_frames_pipelined_after_request() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = TestClient::connect(server.addr).await?;

    let mut bytes = upgrade_request(SAMPLE_KEY);
    bytes.extend_from_slice(&text_frame("{<eve>}"));
    client.send_raw(&bytes).await?;

    client.read_response().await?;
    assert!(client.recv_text().await?.ends_with("]eve joined the server"));

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unhandshaked_clients_get_no_broadcasts() -> Result<()> {
    let server = TestServer::start().await?;
    let mut lurker = TestClient::connect(server.addr).await?;
    let mut alice = server.login("alice").await?;

    alice.send_text("anyone there?").await?;
    assert!(alice.recv_text().await?.ends_with("]alice:anyone there?"));
    lurker.expect_silence().await?;

    server.server.stop().await?;
    Ok(())
}

// ============================================================================
// Chat Tests
// ============================================================================

#[tokio::test]
async fn test_join_hello_disconnect() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;
    let mut bob = server.login("bob").await?;

    assert!(alice.recv_text().await?.ends_with("]bob joined the server"));

    alice.send_text("hello").await?;
    for client in [&mut alice, &mut bob] {
        let line = client.recv_text().await?;
        assert!(line.starts_with('['), "unexpected line {line:?}");
        assert!(line.ends_with("]alice:hello"), "unexpected line {line:?}");
    }

    drop(bob);
    server.logs.wait_for("user [bob] disconnected").await?;
    server.wait_for_connections(1).await?;

    assert!(server.logs.contains("logged in as alice"));
    assert!(server.logs.contains("[alice]:hello"));

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unnamed_client_uses_address() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = server.connect().await?;

    client.send_text("hi").await?;
    let line = client.recv_text().await?;

    assert!(line.contains("]127.0.0.1:"), "unexpected line {line:?}");
    assert!(line.ends_with(":hi"), "unexpected line {line:?}");
    let name = &line[line.find(']').unwrap_or(0) + 1..line.len() - ":hi".len()];
    assert!(name.contains('#'), "unexpected name {name:?}");

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_fragment_produces_no_event() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;

    alice.send_raw(&fragment_frame("secret")).await?;
    alice.expect_silence().await?;

    alice.send_text("after").await?;
    assert!(alice.recv_text().await?.ends_with("]alice:after"));

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_ping_is_dropped() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;

    alice.send_raw(&ping_frame()).await?;
    alice.expect_silence().await?;

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_broadcast_order_is_shared() -> Result<()> {
    const PER_CLIENT: usize = 20;

    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;
    let mut bob = server.login("bob").await?;
    let mut carol = server.login("carol").await?;

    // Join lines of later clients
    alice.recv_text().await?;
    alice.recv_text().await?;
    bob.recv_text().await?;

    for i in 0..PER_CLIENT {
        alice.send_text(&format!("a{i}")).await?;
        bob.send_text(&format!("b{i}")).await?;
    }

    let mut seen = Vec::new();
    for client in [&mut alice, &mut bob, &mut carol] {
        let mut lines = Vec::new();
        for _ in 0..PER_CLIENT * 2 {
            let line = client.recv_text().await?;
            let body = line[line.find(']').unwrap_or(0) + 1..].to_string();
            lines.push(body);
        }
        seen.push(lines);
    }

    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[1], seen[2]);

    for (name, prefix) in [("alice", 'a'), ("bob", 'b')] {
        let ordered: Vec<String> = seen[0]
            .iter()
            .filter_map(|line| line.strip_prefix(&format!("{name}:")))
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = (0..PER_CLIENT).map(|i| format!("{prefix}{i}")).collect();
        assert_eq!(ordered, expected);
    }

    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_long_message_uses_extended_length() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;

    let text = "x".repeat(70_000);
    alice.send_text(&text).await?;

    let line = alice.recv_text().await?;
    assert!(line.ends_with(&format!("]alice:{text}")));

    server.server.stop().await?;
    Ok(())
}

// ============================================================================
// Close Tests
// ============================================================================

#[tokio::test]
async fn test_client_close_is_echoed() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;

    alice.send_close().await?;
    assert_eq!(alice.recv_close().await?, 1000);
    alice.expect_eof().await?;

    server.wait_for_connections(0).await?;
    server.server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() -> Result<()> {
    let config = GatewayConfig {
        max_frame_bytes: 64,
        ..test_config()
    };
    let server = TestServer::start_with_config(config).await?;
    let mut alice = server.login("alice").await?;

    alice.send_text(&"y".repeat(200)).await?;
    assert_eq!(alice.recv_close().await?, 1009);
    alice.expect_eof().await?;

    server.wait_for_connections(0).await?;
    assert!(server
        .logs
        .lines()
        .iter()
        .any(|(s, m)| *s == Severity::Warning && m.contains("Payload too large")));

    server.server.stop().await?;
    Ok(())
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_stop_closes_clients() -> Result<()> {
    let server = TestServer::start().await?;
    let mut alice = server.login("alice").await?;
    let state = server.state().await?;

    server.server.stop().await?;

    assert_eq!(alice.recv_close().await?, 1001);
    alice.expect_eof().await?;
    assert_eq!(state.connection_manager().connection_count(), 0);
    assert!(state.queue().is_empty());
    assert!(server.logs.contains("Server stopped"));
    Ok(())
}

#[tokio::test]
async fn test_stop_with_unresponsive_client() -> Result<()> {
    let server = TestServer::start().await?;
    let mut stuck = server.login("stuck").await?;
    let state = server.state().await?;

    // Every message is broadcast back to a client that never reads, so both directions
    // of the socket fill up and the server blocks writing to it
    let flood = tokio::spawn(async move {
        let payload = "z".repeat(60_000);
        for _ in 0..400 {
            if stuck.send_text(&payload).await.is_err() {
                break;
            }
        }
    });
    tokio::time::sleep(Duration::from_secs(2)).await;

    tokio::time::timeout(Duration::from_secs(5), server.server.stop()).await??;

    flood.abort();
    assert_eq!(state.connection_manager().connection_count(), 0);
    assert!(server.logs.contains("Server stopped"));
    Ok(())
}

#[tokio::test]
async fn test_restart_on_same_port() -> Result<()> {
    let server = TestServer::start().await?;
    let port = server.addr.port();

    server.server.stop().await?;
    assert!(matches!(
        server.server.stop().await,
        Err(GatewayError::NotRunning)
    ));

    let addr = server.server.start(port).await?;
    assert_eq!(addr.port(), port);
    assert!(matches!(
        server.server.start(port).await,
        Err(GatewayError::AlreadyRunning(_))
    ));

    server.server.stop().await?;
    Ok(())
}
