//! A2S_INFO status query over UDP
//!
//! Servers that enforce challenges answer the first request with
//! `S2C_CHALLENGE` (0x41); the request is then repeated with the challenge
//! appended. Modern servers reply with 0x49, GoldSrc-era servers with the
//! obsolete 0x6D layout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use super::InfoSession;
use crate::connection::{ConnectParams, Connector, PooledSession, next_session_id};
use crate::error::{ProtocolError, ProtocolResult};

/// Payload of an A2S_INFO request without challenge
pub const A2S_INFO_REQUEST: &[u8] = b"\xFF\xFF\xFF\xFFTSource Engine Query\0";

const SINGLE_PACKET_HEADER: [u8; 4] = [0xFF; 4];
const S2C_CHALLENGE: u8 = 0x41;
const S2A_INFO_SRC: u8 = 0x49;
const S2A_INFO_DETAILED: u8 = 0x6D;
const MAX_DATAGRAM: usize = 1400;
const MAX_CHALLENGE_ROUNDS: usize = 3;

/// Server details reported by A2S_INFO
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server hostname
    pub hostname: String,
    /// Current map
    pub map: String,
    /// Game directory (e.g. `csgo`)
    pub folder: String,
    /// Game description
    pub game: String,
    /// Players connected (bots included)
    pub players: u32,
    /// Player capacity
    pub max_players: u32,
    /// Bots connected
    pub bots: u32,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> ProtocolResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| ProtocolError::Malformed("A2S_INFO reply truncated".into()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn skip(&mut self, n: usize) -> ProtocolResult<()> {
        if self.pos + n > self.data.len() {
            return Err(ProtocolError::Malformed("A2S_INFO reply truncated".into()));
        }
        self.pos += n;
        Ok(())
    }

    fn cstring(&mut self) -> ProtocolResult<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| ProtocolError::Malformed("unterminated string in A2S_INFO".into()))?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(value)
    }
}

/// Parses an A2S_INFO reply datagram (including the `FF FF FF FF` header)
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for unknown or truncated replies.
pub fn parse_info_response(datagram: &[u8]) -> ProtocolResult<ServerInfo> {
    let payload = datagram
        .strip_prefix(&SINGLE_PACKET_HEADER)
        .ok_or_else(|| ProtocolError::Malformed("split or unknown A2S packet header".into()))?;
    let mut reader = Reader::new(payload);

    match reader.u8()? {
        S2A_INFO_SRC => {
            let _protocol = reader.u8()?;
            let hostname = reader.cstring()?;
            let map = reader.cstring()?;
            let folder = reader.cstring()?;
            let game = reader.cstring()?;
            reader.skip(2)?; // app id
            let players = u32::from(reader.u8()?);
            let max_players = u32::from(reader.u8()?);
            let bots = u32::from(reader.u8()?);
            Ok(ServerInfo {
                hostname,
                map,
                folder,
                game,
                players,
                max_players,
                bots,
            })
        }
        S2A_INFO_DETAILED => {
            let _address = reader.cstring()?;
            let hostname = reader.cstring()?;
            let map = reader.cstring()?;
            let folder = reader.cstring()?;
            let game = reader.cstring()?;
            let players = u32::from(reader.u8()?);
            let max_players = u32::from(reader.u8()?);
            Ok(ServerInfo {
                hostname,
                map,
                folder,
                game,
                players,
                max_players,
                bots: 0,
            })
        }
        other => Err(ProtocolError::Malformed(format!(
            "unexpected A2S reply type 0x{other:02X}"
        ))),
    }
}

fn challenge_request(challenge: &[u8]) -> Vec<u8> {
    let mut request = A2S_INFO_REQUEST.to_vec();
    request.extend_from_slice(challenge);
    request
}

/// UDP socket connected to one server's query port
pub struct QuerySession {
    id: u64,
    socket: Mutex<UdpSocket>,
    alive: AtomicBool,
    timeout: Duration,
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl QuerySession {
    /// Binds a local socket and connects it to `params.address()`
    ///
    /// # Errors
    ///
    /// Returns a connect error if the address cannot be resolved or bound.
    pub async fn connect(params: &ConnectParams) -> ProtocolResult<Self> {
        let address = params.address();
        let target = tokio::net::lookup_host(&address)
            .await
            .map_err(|e| ProtocolError::connect(&address, e))?
            .next()
            .ok_or_else(|| ProtocolError::connect(&address, "no addresses found"))?;
        let local: std::net::SocketAddr = if target.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| ProtocolError::connect(&address, e))?;
        socket
            .connect(target)
            .await
            .map_err(|e| ProtocolError::connect(&address, e))?;
        Ok(Self {
            id: next_session_id(),
            socket: Mutex::new(socket),
            alive: AtomicBool::new(true),
            timeout: params.timeout,
        })
    }

    async fn query(&self) -> ProtocolResult<ServerInfo> {
        let socket = self.socket.lock().await;
        let mut request = A2S_INFO_REQUEST.to_vec();
        let mut buf = [0u8; MAX_DATAGRAM];

        for _ in 0..MAX_CHALLENGE_ROUNDS {
            socket.send(&request).await?;
            let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
                .await
                .map_err(|_| ProtocolError::timeout("A2S_INFO query", self.timeout))??;
            let reply = &buf[..len];

            if reply.len() >= 9 && reply[..4] == SINGLE_PACKET_HEADER && reply[4] == S2C_CHALLENGE
            {
                request = challenge_request(&reply[5..9]);
                continue;
            }
            return parse_info_response(reply);
        }

        Err(ProtocolError::Malformed(
            "server kept answering with challenges".into(),
        ))
    }
}

#[async_trait]
impl PooledSession for QuerySession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl InfoSession for QuerySession {
    async fn get_info(&self) -> ProtocolResult<ServerInfo> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ProtocolError::Closed);
        }
        let result = self.query().await;
        if matches!(result, Err(ref e) if e.is_fatal_to_session()) {
            self.alive.store(false, Ordering::SeqCst);
        }
        result
    }
}

/// Opens A2S query sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryConnector;

#[async_trait]
impl Connector<dyn InfoSession> for QueryConnector {
    async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<dyn InfoSession>> {
        Ok(Arc::new(QuerySession::connect(params).await?))
    }
}
