//! Protocol-level error type.

use thiserror::Error;

use crate::commands;

/// Errors raised while framing or deframing ZK packets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("bad frame magic: {0:#06x} {1:#06x}")]
    BadMagic(u16, u16),

    #[error("checksum mismatch: frame carries {carried:#06x}, computed {computed:#06x}")]
    BadChecksum { carried: u16, computed: u16 },

    #[error("unexpected command {got} ({})", commands::name(*.got))]
    UnexpectedCommand { got: u16 },
}
