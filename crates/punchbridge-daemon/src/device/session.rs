//! One TCP session to one ZK terminal.
//!
//! A session owns its socket for its whole lifetime and serialises the
//! request/response exchange: one outbound command, one matching reply
//! (frames with a stale reply id are discarded), then the next command.
//! Any I/O error, timeout, or protocol violation tears the socket down;
//! later commands fail fast with [`DeviceError::NotConnected`].

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use punchbridge_proto::record::parse_attendance_buffer;
use punchbridge_proto::{commands, packet, AttendanceRecord, Packet, ProtocolError};

use super::error::DeviceError;

/// Deadline for opening the TCP connection and completing `CONNECT`.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-frame deadline for every later command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort device identity, parsed from `key=value` option replies.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub serial_number: String,
}

/// A client session against one terminal.
pub struct DeviceSession {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    session_id: u16,
    reply_id: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl DeviceSession {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            session_id: 0,
            reply_id: 0,
            connect_timeout: CONNECT_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    /// Override the default deadlines (tests use short ones).
    pub fn with_timeouts(mut self, connect: Duration, command: Duration) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Session id assigned by the device on `CONNECT` (0 before connect).
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Open the socket and perform the `CONNECT` handshake.
    ///
    /// The device's `ACK_OK` reply carries the session id echoed on every
    /// later frame.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| DeviceError::ConnectTimeout(self.connect_timeout))?
        .map_err(DeviceError::Connect)?;

        self.stream = Some(stream);
        self.session_id = 0;

        let reply = self.send_command(commands::CMD_CONNECT, &[]).await?;
        if reply.command != commands::ACK_OK {
            self.teardown();
            return Err(ProtocolError::UnexpectedCommand { got: reply.command }.into());
        }

        self.session_id = reply.session_id;
        debug!(
            host = %self.host,
            port = self.port,
            session_id = self.session_id,
            "Device session established"
        );
        Ok(())
    }

    /// Pull the attendance log.
    ///
    /// Small logs come back inline in an `ACK_OK`; large ones arrive through
    /// the chunked `PREPARE_DATA`/`DATA` flow. Records that fail to decode
    /// are dropped individually.
    pub async fn get_attendance(&mut self) -> Result<Vec<AttendanceRecord>, DeviceError> {
        let raw = self.read_chunked(commands::CMD_GET_ATTENDANCE).await?;
        let records = parse_attendance_buffer(&raw);
        debug!(
            host = %self.host,
            bytes = raw.len(),
            records = records.len(),
            "Attendance log fetched"
        );
        Ok(records)
    }

    /// Query the device's serial number. Best-effort: field failures come
    /// back as empty strings rather than propagating.
    pub async fn get_device_info(&mut self) -> Result<DeviceInfo, DeviceError> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        Ok(DeviceInfo {
            serial_number: self.read_option("~SerialNumber").await,
        })
    }

    /// Erase the attendance log on the device.
    pub async fn clear_attendance(&mut self) -> Result<(), DeviceError> {
        self.simple_command(commands::CMD_CLEAR_ATTENDANCE).await
    }

    /// Re-enable the terminal for punching.
    pub async fn enable(&mut self) -> Result<(), DeviceError> {
        self.simple_command(commands::CMD_ENABLE_DEVICE).await
    }

    /// Lock the terminal against punching.
    pub async fn disable(&mut self) -> Result<(), DeviceError> {
        self.simple_command(commands::CMD_DISABLE_DEVICE).await
    }

    /// Send `EXIT` (best effort, errors ignored) and close the socket.
    /// Safe to call in any state, any number of times.
    pub async fn disconnect(&mut self) {
        if self.stream.is_some() {
            let _ = self.send_command(commands::CMD_EXIT, &[]).await;
        }
        self.teardown();
    }

    /// Issue one command and wait for the matching reply, bounded by the
    /// per-frame deadline. A timeout or I/O error closes the socket.
    pub async fn send_command(
        &mut self,
        command: u16,
        payload: &[u8],
    ) -> Result<Packet, DeviceError> {
        if self.stream.is_none() {
            return Err(DeviceError::NotConnected);
        }

        self.reply_id = self.reply_id.wrapping_add(1);
        let frame = packet::encode_packet(&Packet::new(
            command,
            self.session_id,
            self.reply_id,
            payload.to_vec(),
        ));

        let timeout = self.command_timeout;
        match tokio::time::timeout(timeout, self.exchange(&frame)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                self.teardown();
                Err(e)
            }
            Err(_) => {
                self.teardown();
                Err(DeviceError::CommandTimeout { command, timeout })
            }
        }
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<Packet, DeviceError> {
        let want = self.reply_id;
        let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;
        stream.write_all(frame).await?;

        loop {
            let reply = read_frame(stream).await?;
            if reply.reply_id == want {
                return Ok(reply);
            }
            trace!(
                got = reply.reply_id,
                want,
                "Discarding frame with stale reply id"
            );
        }
    }

    /// Retrieve a possibly-chunked payload.
    ///
    /// The device either answers inline with `ACK_OK { bytes }`, or opens
    /// the large-payload flow with `PREPARE_DATA { total_size }` followed by
    /// `DATA` frames on request. The read loop ends when the accumulated
    /// bytes reach the announced size or the device answers `ACK_OK`,
    /// whichever comes first; `FREE_DATA` is then sent exactly once.
    /// Inline replies skip `FREE_DATA`, matching what devices expect.
    async fn read_chunked(&mut self, command: u16) -> Result<Vec<u8>, DeviceError> {
        let reply = self.send_command(command, &[]).await?;

        match reply.command {
            commands::ACK_OK => Ok(reply.payload),
            commands::CMD_PREPARE_DATA => {
                if reply.payload.len() < 4 {
                    self.teardown();
                    return Err(ProtocolError::Truncated {
                        needed: 4,
                        have: reply.payload.len(),
                    }
                    .into());
                }
                let total =
                    u32::from_le_bytes([reply.payload[0], reply.payload[1], reply.payload[2], reply.payload[3]])
                        as usize;

                let mut data = Vec::with_capacity(total);
                while data.len() < total {
                    let chunk = self.send_command(commands::CMD_DATA, &[]).await?;
                    match chunk.command {
                        commands::CMD_DATA => data.extend_from_slice(&chunk.payload),
                        commands::ACK_OK => break,
                        other => {
                            self.teardown();
                            return Err(ProtocolError::UnexpectedCommand { got: other }.into());
                        }
                    }
                }

                self.send_command(commands::CMD_FREE_DATA, &[]).await?;
                Ok(data)
            }
            other => {
                self.teardown();
                Err(ProtocolError::UnexpectedCommand { got: other }.into())
            }
        }
    }

    async fn simple_command(&mut self, command: u16) -> Result<(), DeviceError> {
        let reply = self.send_command(command, &[]).await?;
        match reply.command {
            commands::ACK_OK => Ok(()),
            commands::ACK_ERROR => Err(DeviceError::Rejected(command)),
            other => {
                self.teardown();
                Err(ProtocolError::UnexpectedCommand { got: other }.into())
            }
        }
    }

    /// Query one `key=value` device option; empty string on any failure.
    async fn read_option(&mut self, name: &str) -> String {
        let mut payload = name.as_bytes().to_vec();
        payload.push(0);
        match self.send_command(commands::CMD_GET_DEVICE_INFO, &payload).await {
            Ok(reply) if reply.command == commands::ACK_OK => parse_option_value(&reply.payload),
            _ => String::new(),
        }
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.session_id = 0;
    }
}

async fn read_frame(stream: &mut TcpStream) -> Result<Packet, DeviceError> {
    let mut header = [0u8; packet::TCP_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let body_len = packet::parse_header(&header)?;

    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).await?;
    Ok(packet::parse_command_layer(&body)?)
}

/// Pull the value out of a NUL-terminated `key=value` option reply.
fn parse_option_value(payload: &[u8]) -> String {
    let text: String = payload
        .iter()
        .filter(|b| **b != 0)
        .map(|&b| char::from(b))
        .collect();
    text.split_once('=')
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}
