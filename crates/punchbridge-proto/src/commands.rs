//! Command words of the ZK protocol (u16, little-endian on the wire).

pub const CMD_CONNECT: u16 = 1000;
pub const CMD_EXIT: u16 = 1001;
pub const CMD_ENABLE_DEVICE: u16 = 1002;
pub const CMD_DISABLE_DEVICE: u16 = 1003;

pub const CMD_GET_USERS: u16 = 9;
pub const CMD_GET_DEVICE_INFO: u16 = 11;
pub const CMD_GET_ATTENDANCE: u16 = 13;
pub const CMD_CLEAR_ATTENDANCE: u16 = 15;

pub const CMD_PREPARE_DATA: u16 = 1500;
pub const CMD_DATA: u16 = 1501;
pub const CMD_FREE_DATA: u16 = 1502;

pub const ACK_OK: u16 = 2000;
pub const ACK_ERROR: u16 = 2001;
pub const ACK_DATA: u16 = 2002;

/// Human-readable name of a command word, for log and error messages.
pub const fn name(command: u16) -> &'static str {
    match command {
        CMD_CONNECT => "CONNECT",
        CMD_EXIT => "EXIT",
        CMD_ENABLE_DEVICE => "ENABLE_DEVICE",
        CMD_DISABLE_DEVICE => "DISABLE_DEVICE",
        CMD_GET_USERS => "GET_USERS",
        CMD_GET_DEVICE_INFO => "GET_DEVICE_INFO",
        CMD_GET_ATTENDANCE => "GET_ATTENDANCE",
        CMD_CLEAR_ATTENDANCE => "CLEAR_ATTENDANCE",
        CMD_PREPARE_DATA => "PREPARE_DATA",
        CMD_DATA => "DATA",
        CMD_FREE_DATA => "FREE_DATA",
        ACK_OK => "ACK_OK",
        ACK_ERROR => "ACK_ERROR",
        ACK_DATA => "ACK_DATA",
        _ => "UNKNOWN",
    }
}
