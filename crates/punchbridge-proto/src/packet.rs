//! ZK packet framing.
//!
//! Every request and response travels in a two-layer envelope; all integers
//! are little-endian:
//!
//! ```text
//! TCP layer (8 bytes):   magic1=0x5050 | magic2=0x8282 | body_len (u32)
//! Command layer (8+N):   command (u16) | checksum (u16) | session (u16) | reply (u16) | payload[N]
//! ```
//!
//! The checksum covers the whole command layer with its own two bytes
//! treated as zero.

use crate::error::ProtocolError;

pub const MAGIC_1: u16 = 0x5050;
pub const MAGIC_2: u16 = 0x8282;

/// Size of the TCP-layer header.
pub const TCP_HEADER_LEN: usize = 8;
/// Size of the command-layer header (before the payload).
pub const CMD_HEADER_LEN: usize = 8;

/// One command-layer frame, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: u16,
    pub session_id: u16,
    pub reply_id: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(command: u16, session_id: u16, reply_id: u16, payload: Vec<u8>) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload,
        }
    }
}

/// Checksum over a command layer.
///
/// Sums all 16-bit little-endian words with unsigned wrap-around (the
/// checksum field itself counts as zero), adds an odd trailing byte as its
/// low byte, and returns the two's-complement negation truncated to 16 bits.
pub fn checksum(command_layer: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    let mut i = 0;
    while i + 1 < command_layer.len() {
        // Bytes 2..4 are the checksum field and count as zero.
        if i != 2 {
            let word = u16::from_le_bytes([command_layer[i], command_layer[i + 1]]);
            sum = sum.wrapping_add(word);
        }
        i += 2;
    }
    if i < command_layer.len() {
        sum = sum.wrapping_add(u16::from(command_layer[i]));
    }
    (!sum).wrapping_add(1)
}

/// Encode a packet into its full wire form (TCP layer + command layer).
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let body_len = CMD_HEADER_LEN + packet.payload.len();
    let mut buf = Vec::with_capacity(TCP_HEADER_LEN + body_len);

    buf.extend_from_slice(&MAGIC_1.to_le_bytes());
    buf.extend_from_slice(&MAGIC_2.to_le_bytes());
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());

    buf.extend_from_slice(&packet.command.to_le_bytes());
    buf.extend_from_slice(&[0, 0]); // checksum, patched below
    buf.extend_from_slice(&packet.session_id.to_le_bytes());
    buf.extend_from_slice(&packet.reply_id.to_le_bytes());
    buf.extend_from_slice(&packet.payload);

    let sum = checksum(&buf[TCP_HEADER_LEN..]);
    buf[TCP_HEADER_LEN + 2..TCP_HEADER_LEN + 4].copy_from_slice(&sum.to_le_bytes());

    buf
}

/// Parse the 8-byte TCP-layer header, returning the body length.
pub fn parse_header(buf: &[u8]) -> Result<usize, ProtocolError> {
    if buf.len() < TCP_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            needed: TCP_HEADER_LEN,
            have: buf.len(),
        });
    }
    let m1 = u16::from_le_bytes([buf[0], buf[1]]);
    let m2 = u16::from_le_bytes([buf[2], buf[3]]);
    if m1 != MAGIC_1 || m2 != MAGIC_2 {
        return Err(ProtocolError::BadMagic(m1, m2));
    }
    Ok(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize)
}

/// Parse a command layer (everything after the TCP header), verifying the
/// checksum.
pub fn parse_command_layer(buf: &[u8]) -> Result<Packet, ProtocolError> {
    if buf.len() < CMD_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            needed: CMD_HEADER_LEN,
            have: buf.len(),
        });
    }
    let carried = u16::from_le_bytes([buf[2], buf[3]]);
    let computed = checksum(buf);
    if carried != computed {
        return Err(ProtocolError::BadChecksum { carried, computed });
    }
    Ok(Packet {
        command: u16::from_le_bytes([buf[0], buf[1]]),
        session_id: u16::from_le_bytes([buf[4], buf[5]]),
        reply_id: u16::from_le_bytes([buf[6], buf[7]]),
        payload: buf[CMD_HEADER_LEN..].to_vec(),
    })
}

/// Decode a complete frame (TCP layer + command layer) from one buffer.
pub fn decode_packet(buf: &[u8]) -> Result<Packet, ProtocolError> {
    let body_len = parse_header(buf)?;
    let body =
        buf.get(TCP_HEADER_LEN..TCP_HEADER_LEN + body_len)
            .ok_or(ProtocolError::Truncated {
                needed: TCP_HEADER_LEN + body_len,
                have: buf.len(),
            })?;
    parse_command_layer(body)
}
