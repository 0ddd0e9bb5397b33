//! Attendance record layouts.
//!
//! Devices return punch logs as a flat buffer of fixed-size records. Two
//! layouts exist in the field:
//!
//! *40-byte "new" format:* three 16-bit ordinals, a 9-byte NUL-padded ASCII
//! user code, the packed timestamp at offset 24, status/punch bytes, and a
//! 16-bit uid at offset 32.
//!
//! *16-byte "old" format:* 16-bit uid, user code at offset 2, packed
//! timestamp at offset 4, status/punch bytes. The declared user-code field
//! (bytes 2..6) overlaps the timestamp (bytes 4..8); parsing stops at the
//! first non-printable byte so timestamp bytes never leak into the code,
//! and an empty code falls back to the decimal uid.
//!
//! The layout is chosen by buffer size: 40-byte records when the buffer
//! holds at least one, 16-byte records otherwise. Records that fail to
//! parse (empty user code, impossible date) are dropped individually.

use chrono::NaiveDateTime;

use crate::timestamp::{decode_timestamp, encode_timestamp};

/// Size of a "new"-format record.
pub const RECORD_LEN_NEW: usize = 40;
/// Size of an "old"-format record.
pub const RECORD_LEN_OLD: usize = 16;

/// One decoded punch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    /// Opaque ordinals echoed from the 40-byte layout (zero on the old one).
    pub order_id: u16,
    pub order_id2: u16,
    pub order_id3: u16,
    pub uid: u16,
    /// User code as punched on the terminal, max 9 ASCII bytes.
    pub user_id: String,
    /// Naive wall-clock on the terminal.
    pub timestamp: NaiveDateTime,
    /// Event kind: 0=check-in, 1=check-out, 2=break-out, 3=break-in,
    /// 4=overtime-in, 5=overtime-out, other=unknown.
    pub status: u8,
    /// Verification method (fingerprint/card/password); opaque here.
    pub punch: u8,
}

/// Split a device buffer into records, dropping the ones that fail to parse.
pub fn parse_attendance_buffer(buf: &[u8]) -> Vec<AttendanceRecord> {
    let record_len = if buf.len() >= RECORD_LEN_NEW {
        RECORD_LEN_NEW
    } else {
        RECORD_LEN_OLD
    };
    buf.chunks_exact(record_len)
        .filter_map(|chunk| {
            if record_len == RECORD_LEN_NEW {
                parse_record_40(chunk)
            } else {
                parse_record_16(chunk)
            }
        })
        .collect()
}

fn parse_record_40(chunk: &[u8]) -> Option<AttendanceRecord> {
    let user_id = ascii_field(&chunk[6..15]);
    if user_id.is_empty() {
        return None;
    }
    let packed = u32::from_le_bytes(chunk[24..28].try_into().ok()?);
    Some(AttendanceRecord {
        order_id: u16::from_le_bytes([chunk[0], chunk[1]]),
        order_id2: u16::from_le_bytes([chunk[2], chunk[3]]),
        order_id3: u16::from_le_bytes([chunk[4], chunk[5]]),
        uid: u16::from_le_bytes([chunk[32], chunk[33]]),
        user_id,
        timestamp: decode_timestamp(packed)?,
        status: chunk[28],
        punch: chunk[29],
    })
}

fn parse_record_16(chunk: &[u8]) -> Option<AttendanceRecord> {
    let uid = u16::from_le_bytes([chunk[0], chunk[1]]);
    let mut user_id = ascii_field(&chunk[2..6]);
    if user_id.is_empty() {
        user_id = uid.to_string();
    }
    let packed = u32::from_le_bytes(chunk[4..8].try_into().ok()?);
    Some(AttendanceRecord {
        order_id: 0,
        order_id2: 0,
        order_id3: 0,
        uid,
        user_id,
        timestamp: decode_timestamp(packed)?,
        status: chunk[8],
        punch: chunk[9],
    })
}

/// Encode a record in the 40-byte layout.
pub fn encode_record_40(record: &AttendanceRecord) -> [u8; RECORD_LEN_NEW] {
    let mut buf = [0u8; RECORD_LEN_NEW];
    buf[0..2].copy_from_slice(&record.order_id.to_le_bytes());
    buf[2..4].copy_from_slice(&record.order_id2.to_le_bytes());
    buf[4..6].copy_from_slice(&record.order_id3.to_le_bytes());
    let user = record.user_id.as_bytes();
    let n = user.len().min(9);
    buf[6..6 + n].copy_from_slice(&user[..n]);
    buf[24..28].copy_from_slice(&encode_timestamp(&record.timestamp).to_le_bytes());
    buf[28] = record.status;
    buf[29] = record.punch;
    buf[32..34].copy_from_slice(&record.uid.to_le_bytes());
    buf
}

/// Encode a record in the 16-byte layout.
///
/// The user-code and timestamp fields overlap on the wire; the timestamp
/// wins, so only codes of up to two bytes (or the empty code with its uid
/// fallback) survive a round trip.
pub fn encode_record_16(record: &AttendanceRecord) -> [u8; RECORD_LEN_OLD] {
    let mut buf = [0u8; RECORD_LEN_OLD];
    buf[0..2].copy_from_slice(&record.uid.to_le_bytes());
    let user = record.user_id.as_bytes();
    let n = user.len().min(4);
    buf[2..2 + n].copy_from_slice(&user[..n]);
    buf[4..8].copy_from_slice(&encode_timestamp(&record.timestamp).to_le_bytes());
    buf[8] = record.status;
    buf[9] = record.punch;
    buf
}

/// Leading printable-ASCII run of a NUL-padded field, trimmed.
fn ascii_field(bytes: &[u8]) -> String {
    let text: String = bytes
        .iter()
        .take_while(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| char::from(b))
        .collect();
    text.trim().to_string()
}
