//! Opening handshake
//!
//! Turns a client's HTTP Upgrade request into the `101 Switching Protocols` response.

use crate::error::{ProtocolError, ProtocolResult};
use base64::prelude::*;
use sha1::{Digest, Sha1};

/// GUID appended to the client key before hashing (RFC 6455 section 1.3)
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Header name and separator; the colon keeps longer header names from matching
const KEY_HEADER: &str = "Sec-WebSocket-Key:";

/// Derive the `Sec-WebSocket-Accept` value for a client key
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Extract the key value from the request text
///
/// The header name match is case-sensitive. The value runs to the end of the line and is
/// trimmed.
fn extract_key(request: &str) -> Option<&str> {
    let start = request.find(KEY_HEADER)? + KEY_HEADER.len();
    let rest = &request[start..];
    let end = rest.find('\n').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Build the handshake response for a raw Upgrade request
///
/// Returns [`ProtocolError::NotAHandshake`] if the request has no `Sec-WebSocket-Key`
/// header; the caller ignores such bytes.
pub fn compute_accept(request: &[u8]) -> ProtocolResult<Vec<u8>> {
    let request = String::from_utf8_lossy(request);
    let key = extract_key(&request).ok_or(ProtocolError::NotAHandshake)?;

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(key)
    );

    Ok(response.into_bytes())
}
