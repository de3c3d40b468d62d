//! Source RCON client
//!
//! Packets are little-endian: `size:i32 | id:i32 | type:i32 | body | \0 \0`,
//! where `size` counts everything after itself. Long responses may be split
//! over several packets, so every command is followed by an empty
//! `RESPONSE_VALUE` packet whose echo marks the end of the output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::CommandSession;
use crate::connection::{ConnectParams, Connector, PooledSession, next_session_id};
use crate::error::{ProtocolError, ProtocolResult};
use crate::tracing::span_names;

/// RCON packet types
pub mod packet_type {
    /// Authentication request
    pub const AUTH: i32 = 3;
    /// Authentication result (same value as `EXECCOMMAND`)
    pub const AUTH_RESPONSE: i32 = 2;
    /// Command execution request
    pub const EXECCOMMAND: i32 = 2;
    /// Command output
    pub const RESPONSE_VALUE: i32 = 0;
}

/// Smallest valid `size` field: id + type + two terminators
const MIN_PACKET_SIZE: i32 = 10;

/// Upper bound accepted for a single packet
const MAX_PACKET_SIZE: i32 = 64 * 1024;

/// One RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    /// Request id echoed by the server
    pub id: i32,
    /// Packet type, see [`packet_type`]
    pub kind: i32,
    /// Body text
    pub body: String,
}

impl RconPacket {
    /// Creates a packet
    #[must_use]
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Encodes the packet for the wire
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let size = (body.len() + MIN_PACKET_SIZE as usize) as i32;
        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Decodes a packet from its payload (everything after the size field)
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the payload is too short.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        if payload.len() < MIN_PACKET_SIZE as usize {
            return Err(ProtocolError::Malformed(format!(
                "RCON packet too short ({} bytes)",
                payload.len()
            )));
        }
        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let body = &payload[8..];
        let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(&body[..end]).into_owned(),
        })
    }
}

async fn write_packet(stream: &mut TcpStream, packet: &RconPacket) -> ProtocolResult<()> {
    stream.write_all(&packet.encode()).await?;
    Ok(())
}

async fn read_packet(stream: &mut TcpStream) -> ProtocolResult<RconPacket> {
    let size = stream.read_i32_le().await?;
    if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
        return Err(ProtocolError::Malformed(format!("invalid RCON packet size {size}")));
    }
    let mut payload = vec![0u8; size as usize];
    stream.read_exact(&mut payload).await?;
    RconPacket::decode(&payload)
}

async fn with_timeout<T>(
    operation: &'static str,
    after: Duration,
    fut: impl std::future::Future<Output = ProtocolResult<T>>,
) -> ProtocolResult<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| ProtocolError::timeout(operation, after))?
}

/// Authenticated RCON connection
pub struct RconSession {
    id: u64,
    address: String,
    stream: Mutex<TcpStream>,
    next_request: AtomicI32,
    alive: AtomicBool,
    io_timeout: Duration,
}

impl std::fmt::Debug for RconSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconSession")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RconSession {
    /// Connects to `params.address()` and authenticates
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Auth`] if the password is rejected, or the
    /// connect/timeout error.
    pub async fn connect(params: &ConnectParams) -> ProtocolResult<Self> {
        let address = params.address();
        let stream = tokio::time::timeout(params.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ProtocolError::timeout("RCON connect", params.timeout))?
            .map_err(|e| ProtocolError::connect(&address, e))?;
        let _ = stream.set_nodelay(true);

        let session = Self {
            id: next_session_id(),
            address,
            stream: Mutex::new(stream),
            next_request: AtomicI32::new(1),
            alive: AtomicBool::new(true),
            io_timeout: params.timeout,
        };
        session.authenticate(params.password.expose_secret()).await?;
        Ok(session)
    }

    fn allocate_id(&self) -> i32 {
        // Ids wrap within the positive range; -1 is the server's auth failure marker
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        if id >= i32::MAX - 2 {
            self.next_request.store(1, Ordering::Relaxed);
        }
        id.max(1)
    }

    async fn authenticate(&self, password: &str) -> ProtocolResult<()> {
        let auth_id = self.allocate_id();
        let mut stream = self.stream.lock().await;

        let result = with_timeout("RCON auth", self.io_timeout, async {
            write_packet(&mut stream, &RconPacket::new(auth_id, packet_type::AUTH, password))
                .await?;
            loop {
                let packet = read_packet(&mut stream).await?;
                if packet.kind != packet_type::AUTH_RESPONSE {
                    // Servers send an empty RESPONSE_VALUE before the auth result
                    continue;
                }
                if packet.id == -1 {
                    return Err(ProtocolError::Auth("RCON password rejected".into()));
                }
                if packet.id == auth_id {
                    return Ok(());
                }
            }
        })
        .await;

        if result.is_err() {
            self.alive.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn exchange(&self, command: &str) -> ProtocolResult<String> {
        let command_id = self.allocate_id();
        let sentinel_id = self.allocate_id();
        let mut stream = self.stream.lock().await;

        with_timeout("RCON command", self.io_timeout, async {
            write_packet(
                &mut stream,
                &RconPacket::new(command_id, packet_type::EXECCOMMAND, command),
            )
            .await?;
            write_packet(
                &mut stream,
                &RconPacket::new(sentinel_id, packet_type::RESPONSE_VALUE, ""),
            )
            .await?;

            let mut output = String::new();
            loop {
                let packet = read_packet(&mut stream).await?;
                if packet.id == sentinel_id {
                    return Ok(output);
                }
                if packet.id == command_id && packet.kind == packet_type::RESPONSE_VALUE {
                    output.push_str(&packet.body);
                }
                // Anything else is a leftover from an earlier exchange
            }
        })
        .await
    }
}

#[async_trait]
impl PooledSession for RconSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let mut stream = self.stream.lock().await;
        let _ = stream.shutdown().await;
    }
}

#[async_trait]
impl CommandSession for RconSession {
    async fn send_command(&self, command: &str) -> ProtocolResult<String> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ProtocolError::Closed);
        }
        let span = tracing::debug_span!(span_names::RCON_EXECUTE, session_id = self.id);
        let result = self.exchange(command).instrument(span).await;
        if let Err(ref e) = result {
            if e.is_fatal_to_session() {
                tracing::debug!(session_id = self.id, error = %e, "RCON session marked dead");
                self.alive.store(false, Ordering::SeqCst);
            }
        }
        result
    }
}

/// Opens authenticated RCON sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct RconConnector;

#[async_trait]
impl Connector<dyn CommandSession> for RconConnector {
    async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<dyn CommandSession>> {
        let session = RconSession::connect(params).await?;
        Ok(Arc::new(session))
    }
}
