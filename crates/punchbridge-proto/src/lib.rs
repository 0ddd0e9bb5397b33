//! ZK wire protocol for ESSL/ZKTeco attendance terminals.
//!
//! The "ZK" protocol is a little-endian binary protocol spoken over TCP
//! (port 4370 by default) with a two-layer envelope, a 16-bit
//! one's-complement checksum, and a session/reply handshake. This crate
//! holds the pure codecs:
//! - Packet framing and checksum ([`packet`])
//! - Command words ([`commands`])
//! - Packed base-2000 timestamps ([`timestamp`])
//! - Attendance record layouts ([`record`])
//!
//! Everything here operates on byte buffers; socket ownership and the
//! request/response sequencing live in the daemon's device session.

pub mod commands;
pub mod error;
pub mod packet;
pub mod record;
pub mod timestamp;

pub use error::ProtocolError;
pub use packet::Packet;
pub use record::AttendanceRecord;
