//! Frame codec
//!
//! Decodes masked client frames and encodes unmasked server frames.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               | Masking-key, if MASK set to 1 |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use super::{CloseCode, OpCode};
use crate::error::{ProtocolError, ProtocolResult};

/// Largest payload accepted or produced unless configured otherwise (1 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_BITS: u8 = 0x0F;
const LENGTH_BITS: u8 = 0x7F;

/// Base length value announcing a 16-bit extended length
const LENGTH_16: u8 = 126;
/// Base length value announcing a 64-bit extended length
const LENGTH_64: u8 = 127;

const MASK_LEN: usize = 4;

/// A decoded single-frame message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: OpCode,
    pub payload: String,
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    fin: bool,
    masked: bool,
    opcode: u8,
    payload_len: u64,
    /// Bytes before the payload, mask included
    header_len: usize,
}

impl FrameHeader {
    fn mask_offset(&self) -> usize {
        self.header_len - MASK_LEN
    }

    /// Offset one past the payload, or `PayloadTooLarge` if it does not fit in `usize`
    fn frame_end(&self, payload_len: usize, max: usize) -> ProtocolResult<usize> {
        self.header_len
            .checked_add(payload_len)
            .ok_or(ProtocolError::PayloadTooLarge {
                len: self.payload_len,
                max,
            })
    }
}

fn parse_header(buf: &[u8]) -> ProtocolResult<FrameHeader> {
    let truncated = |needed: usize| ProtocolError::Truncated {
        needed,
        available: buf.len(),
    };

    let (&byte0, &byte1) = match buf {
        [b0, b1, ..] => (b0, b1),
        _ => return Err(truncated(2)),
    };

    let masked = byte1 & MASK_BIT != 0;
    let (payload_len, extended) = match byte1 & LENGTH_BITS {
        LENGTH_16 => {
            let bytes = buf.get(2..4).ok_or_else(|| truncated(4))?;
            (u64::from(u16::from_be_bytes([bytes[0], bytes[1]])), 2)
        }
        LENGTH_64 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(buf.get(2..10).ok_or_else(|| truncated(10))?);
            (u64::from_be_bytes(bytes), 8)
        }
        len => (u64::from(len), 0),
    };

    Ok(FrameHeader {
        fin: byte0 & FIN_BIT != 0,
        masked,
        opcode: byte0 & OPCODE_BITS,
        payload_len,
        header_len: 2 + extended + if masked { MASK_LEN } else { 0 },
    })
}

/// XOR `payload` in place with the 4-byte masking key
fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % MASK_LEN];
    }
}

/// Append the first two bytes and any extended length for a payload of `len` bytes
fn write_header(out: &mut Vec<u8>, first: u8, mask_bit: u8, len: usize) {
    out.push(first);
    if len < usize::from(LENGTH_16) {
        out.push(mask_bit | len as u8);
    } else if let Ok(len16) = u16::try_from(len) {
        out.push(mask_bit | LENGTH_16);
        out.extend_from_slice(&len16.to_be_bytes());
    } else {
        out.push(mask_bit | LENGTH_64);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Frame encoder/decoder with a payload size envelope
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl FrameCodec {
    /// Create a codec accepting payloads up to `max_frame_bytes`
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Get the payload size envelope
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn check_len(&self, len: u64) -> ProtocolResult<usize> {
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.max_frame_bytes)
            .ok_or(ProtocolError::PayloadTooLarge {
                len,
                max: self.max_frame_bytes,
            })
    }

    /// Total size of the frame at the front of `buf`
    ///
    /// Returns `Ok(None)` while the header itself is still incomplete. The returned size may
    /// exceed `buf.len()`; the caller keeps reading until it has that many bytes.
    pub fn frame_len(&self, buf: &[u8]) -> ProtocolResult<Option<usize>> {
        match parse_header(buf) {
            Ok(header) => {
                let payload_len = self.check_len(header.payload_len)?;
                Ok(Some(header.frame_end(payload_len, self.max_frame_bytes)?))
            }
            Err(ProtocolError::Truncated { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decode one masked client frame
    ///
    /// Fragments (FIN unset) and unmasked frames are rejected; the caller drops them.
    /// Payload bytes are read as UTF-8 with invalid sequences replaced.
    pub fn decode(&self, buf: &[u8]) -> ProtocolResult<Frame> {
        let header = parse_header(buf)?;
        let payload_len = self.check_len(header.payload_len)?;

        if !header.fin {
            return Err(ProtocolError::Fragmented);
        }
        if !header.masked {
            return Err(ProtocolError::Unmasked);
        }

        let end = header.frame_end(payload_len, self.max_frame_bytes)?;
        if buf.len() < end {
            return Err(ProtocolError::Truncated {
                needed: end,
                available: buf.len(),
            });
        }

        let opcode =
            OpCode::from_u8(header.opcode).ok_or(ProtocolError::UnknownOpCode(header.opcode))?;

        let mut mask = [0u8; MASK_LEN];
        mask.copy_from_slice(&buf[header.mask_offset()..header.header_len]);

        let mut payload = buf[header.header_len..end].to_vec();
        apply_mask(&mut payload, mask);

        Ok(Frame {
            opcode,
            payload: String::from_utf8_lossy(&payload).into_owned(),
        })
    }

    /// Encode a text message as an unmasked, final server frame
    pub fn encode_text(&self, text: &str) -> ProtocolResult<Vec<u8>> {
        self.encode(OpCode::Text, text.as_bytes())
    }

    /// Encode an unmasked, final server frame
    pub fn encode(&self, opcode: OpCode, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        self.check_len(payload.len() as u64)?;

        let mut out = Vec::with_capacity(payload.len() + 10);
        write_header(&mut out, FIN_BIT | opcode.as_u8(), 0, payload.len());
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Close frame carrying the given status code
    #[must_use]
    pub fn close_frame(code: CloseCode) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        write_header(&mut out, FIN_BIT | OpCode::Close.as_u8(), 0, 2);
        out.extend_from_slice(&code.as_u16().to_be_bytes());
        out
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

/// Encode a masked, final frame the way a browser client does
#[must_use]
pub fn encode_client_frame(opcode: OpCode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    write_header(&mut out, FIN_BIT | opcode.as_u8(), MASK_BIT, payload.len());
    out.extend_from_slice(&mask);

    let start = out.len();
    out.extend_from_slice(payload);
    apply_mask(&mut out[start..], mask);
    out
}

/// Decode an unmasked server frame the way a standard client does
///
/// Returns the frame and the number of bytes it occupied, or `Ok(None)` if `buf` does not
/// hold a complete frame yet.
pub fn decode_server_frame(buf: &[u8]) -> ProtocolResult<Option<(Frame, usize)>> {
    let header = match parse_header(buf) {
        Ok(header) => header,
        Err(ProtocolError::Truncated { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let payload_len = usize::try_from(header.payload_len).map_err(|_| {
        ProtocolError::PayloadTooLarge {
            len: header.payload_len,
            max: usize::MAX,
        }
    })?;
    let end = header.frame_end(payload_len, usize::MAX)?;
    if buf.len() < end {
        return Ok(None);
    }

    let opcode =
        OpCode::from_u8(header.opcode).ok_or(ProtocolError::UnknownOpCode(header.opcode))?;
    let mut payload = buf[header.header_len..end].to_vec();
    if header.masked {
        let mut mask = [0u8; MASK_LEN];
        mask.copy_from_slice(&buf[header.mask_offset()..header.header_len]);
        apply_mask(&mut payload, mask);
    }

    Ok(Some((
        Frame {
            opcode,
            payload: String::from_utf8_lossy(&payload).into_owned(),
        },
        end,
    )))
}
