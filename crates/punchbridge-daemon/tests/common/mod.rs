//! Scripted ZK fake terminal for integration tests.
//!
//! Listens on an ephemeral localhost port and answers the subset of the
//! protocol the agent speaks. Behavior is fixed up front via
//! [`FakeDeviceConfig`]; counters expose what the client actually did.

#![allow(dead_code)] // not every test binary uses every helper

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use punchbridge_proto::{commands, packet, Packet};

/// How the fake answers `GET_ATTENDANCE`.
#[derive(Clone)]
pub enum AttendanceReply {
    /// `ACK_OK` with the payload inline (the small-payload path).
    Inline(Vec<u8>),
    /// `PREPARE_DATA { total }`, then one `DATA` frame per chunk, then
    /// `ACK_OK` to any further `DATA` request.
    Chunked { total: u32, chunks: Vec<Vec<u8>> },
}

#[derive(Clone)]
pub struct FakeDeviceConfig {
    /// Session id handed out on `CONNECT`.
    pub session_id: u16,
    pub attendance: AttendanceReply,
    /// Accept connections but never answer any frame.
    pub mute: bool,
    /// Delay before every reply.
    pub response_delay: Option<Duration>,
    /// Send a junk frame with a wrong reply id before every real reply.
    pub stale_first: bool,
    /// Answer enable/disable/clear with `ACK_ERROR`.
    pub reject_maintenance: bool,
}

impl Default for FakeDeviceConfig {
    fn default() -> Self {
        Self {
            session_id: 0x1234,
            attendance: AttendanceReply::Inline(Vec::new()),
            mute: false,
            response_delay: None,
            stale_first: false,
            reject_maintenance: false,
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicU32,
    pub free_data: AtomicU32,
}

pub struct FakeDevice {
    addr: SocketAddr,
    pub counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn spawn(config: FakeDeviceConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let counters = Arc::new(Counters::default());

        let accept_counters = Arc::clone(&counters);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve_conn(
                    stream,
                    config.clone(),
                    Arc::clone(&accept_counters),
                ));
            }
        });

        Self {
            addr,
            counters,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn free_data_count(&self) -> u32 {
        self.counters.free_data.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> u32 {
        self.counters.connects.load(Ordering::SeqCst)
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_conn(mut stream: TcpStream, config: FakeDeviceConfig, counters: Arc<Counters>) {
    let mut session_id = 0u16;
    let mut chunk_idx = 0usize;

    loop {
        let Ok(request) = read_frame(&mut stream).await else {
            return;
        };

        if config.mute {
            continue;
        }
        if let Some(delay) = config.response_delay {
            tokio::time::sleep(delay).await;
        }

        let reply = match request.command {
            commands::CMD_CONNECT => {
                session_id = config.session_id;
                counters.connects.fetch_add(1, Ordering::SeqCst);
                Packet::new(commands::ACK_OK, session_id, request.reply_id, Vec::new())
            }
            commands::CMD_GET_ATTENDANCE => match &config.attendance {
                AttendanceReply::Inline(data) => {
                    Packet::new(commands::ACK_OK, session_id, request.reply_id, data.clone())
                }
                AttendanceReply::Chunked { total, .. } => Packet::new(
                    commands::CMD_PREPARE_DATA,
                    session_id,
                    request.reply_id,
                    total.to_le_bytes().to_vec(),
                ),
            },
            commands::CMD_DATA => match &config.attendance {
                AttendanceReply::Chunked { chunks, .. } if chunk_idx < chunks.len() => {
                    let chunk = chunks[chunk_idx].clone();
                    chunk_idx += 1;
                    Packet::new(commands::CMD_DATA, session_id, request.reply_id, chunk)
                }
                _ => Packet::new(commands::ACK_OK, session_id, request.reply_id, Vec::new()),
            },
            commands::CMD_FREE_DATA => {
                counters.free_data.fetch_add(1, Ordering::SeqCst);
                Packet::new(commands::ACK_OK, session_id, request.reply_id, Vec::new())
            }
            commands::CMD_GET_DEVICE_INFO => Packet::new(
                commands::ACK_OK,
                session_id,
                request.reply_id,
                b"~SerialNumber=FAKE-001\0".to_vec(),
            ),
            commands::CMD_ENABLE_DEVICE
            | commands::CMD_DISABLE_DEVICE
            | commands::CMD_CLEAR_ATTENDANCE
                if config.reject_maintenance =>
            {
                Packet::new(commands::ACK_ERROR, session_id, request.reply_id, Vec::new())
            }
            // EXIT and the maintenance commands all ack.
            _ => Packet::new(commands::ACK_OK, session_id, request.reply_id, Vec::new()),
        };

        if config.stale_first {
            let stale = Packet::new(
                commands::ACK_OK,
                session_id,
                request.reply_id.wrapping_add(1000),
                Vec::new(),
            );
            if stream
                .write_all(&packet::encode_packet(&stale))
                .await
                .is_err()
            {
                return;
            }
        }

        if stream
            .write_all(&packet::encode_packet(&reply))
            .await
            .is_err()
        {
            return;
        }
    }
}

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Packet> {
    let mut header = [0u8; packet::TCP_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let body_len = packet::parse_header(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).await?;
    packet::parse_command_layer(&body)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
