//! FTP/FTPS client
//!
//! A blocking client over `std::net` and `native-tls`, driven from async
//! code through `spawn_blocking`. Supports implicit and explicit TLS
//! (`AUTH TLS`, `PBSZ 0`, `PROT P`), passive data connections (`EPSV` with
//! `PASV` fallback) and `MLSD` listings with a `LIST` fallback.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use native_tls::{HandshakeError, TlsConnector, TlsStream};
use regex::Regex;
use secrecy::ExposeSecret;
use zeroize::Zeroizing;

use super::{FileTransferSession, RemoteEntry};
use crate::connection::{
    ConnectParams, Connector, FtpEncryption, PooledSession, TlsSettings, next_session_id,
};
use crate::error::{ProtocolError, ProtocolResult};

/// Minimum I/O timeout on data connections
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

static UNIX_LIST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([\-dlbcps])\S*\s+\d+\s+\S+\s+(?:\S+\s+)?(\d+)\s+([A-Za-z]{3})\s+(\d{1,2})\s+(\d{1,2}:\d{2}|\d{4})\s+(.+)$",
    )
    .expect("UNIX_LIST_REGEX is a valid regex pattern")
});

static DOS_LIST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})-(\d{2})-(\d{2,4})\s+(\d{1,2}):(\d{2})(AM|PM)\s+(<DIR>|\d+)\s+(.+)$")
        .expect("DOS_LIST_REGEX is a valid regex pattern")
});

/// One (possibly multi-line) server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    /// Three-digit reply code
    pub code: u16,
    /// Reply text without the code
    pub text: String,
}

impl FtpReply {
    /// 1xx: the server will send another reply
    #[must_use]
    pub const fn is_preliminary(&self) -> bool {
        self.code >= 100 && self.code < 200
    }

    fn into_error(self) -> ProtocolError {
        ProtocolError::Remote {
            code: self.code,
            message: self.text,
        }
    }
}

/// Splits a reply line into code, whether it ends the reply, and text
pub(crate) fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = line[..3].parse().ok()?;
    match bytes.get(3) {
        None => Some((code, true, "")),
        Some(b' ') => Some((code, true, &line[4..])),
        Some(b'-') => Some((code, false, &line[4..])),
        Some(_) => None,
    }
}

/// Extracts the port from a `229 Entering Extended Passive Mode (|||port|)` reply
pub(crate) fn parse_epsv(text: &str) -> ProtocolResult<u16> {
    let malformed = || ProtocolError::Malformed(format!("bad EPSV reply: {text}"));
    let start = text.find('(').ok_or_else(malformed)?;
    let end = text[start..].find(')').ok_or_else(malformed)? + start;
    let inner = &text[start + 1..end];
    let delimiter = inner.chars().next().ok_or_else(malformed)?;
    inner
        .split(delimiter)
        .find(|part| !part.is_empty())
        .and_then(|port| port.parse().ok())
        .ok_or_else(malformed)
}

/// Extracts host and port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
pub(crate) fn parse_pasv(text: &str) -> ProtocolResult<(std::net::Ipv4Addr, u16)> {
    let malformed = || ProtocolError::Malformed(format!("bad PASV reply: {text}"));
    let start = text.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
    let numbers: Vec<u8> = text[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .take(6)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| malformed())?;
    if numbers.len() != 6 {
        return Err(malformed());
    }
    let ip = std::net::Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = u16::from(numbers[4]) << 8 | u16::from(numbers[5]);
    Ok((ip, port))
}

/// Extracts the quoted directory from a `257 "<dir>"` reply
pub(crate) fn parse_pwd(text: &str) -> ProtocolResult<String> {
    let start = text
        .find('"')
        .ok_or_else(|| ProtocolError::Malformed(format!("bad PWD reply: {text}")))?;
    let mut dir = String::new();
    let mut chars = text[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                dir.push('"');
                chars.next();
            } else {
                return Ok(dir);
            }
        } else {
            dir.push(c);
        }
    }
    Err(ProtocolError::Malformed(format!("bad PWD reply: {text}")))
}

/// Parses one `MLSD` line; `.` and `..` entries yield `None`
pub(crate) fn parse_mlsd_line(line: &str) -> Option<RemoteEntry> {
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    let mut entry = RemoteEntry {
        name: name.to_string(),
        is_directory: false,
        size: 0,
        modified: None,
    };
    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => match value.to_ascii_lowercase().as_str() {
                "dir" => entry.is_directory = true,
                "cdir" | "pdir" => return None,
                _ => {}
            },
            "size" => entry.size = value.parse().unwrap_or(0),
            "modify" => {
                entry.modified = value
                    .get(..14)
                    .and_then(|ts| NaiveDateTime::parse_from_str(ts, "%Y%m%d%H%M%S").ok())
                    .map(|naive| Utc.from_utc_datetime(&naive));
            }
            _ => {}
        }
    }
    if entry.is_directory {
        entry.size = 0;
    }
    Some(entry)
}

fn month_number(abbr: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = abbr.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

/// Parses one `LIST` line in Unix or DOS format; `.` and `..` yield `None`
pub(crate) fn parse_list_line(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    if let Some(caps) = UNIX_LIST_REGEX.captures(line) {
        let is_directory = &caps[1] == "d";
        let mut name = caps[6].to_string();
        if &caps[1] == "l" {
            if let Some((link, _target)) = name.split_once(" -> ") {
                name = link.to_string();
            }
        }
        if name == "." || name == ".." {
            return None;
        }

        let month = month_number(&caps[3]);
        let day: u32 = caps[4].parse().ok()?;
        let modified = month.and_then(|month| {
            let stamp = &caps[5];
            if let Some((hour, minute)) = stamp.split_once(':') {
                // No year means within the last six months
                let mut year = now.year();
                let build = |year: i32| {
                    NaiveDate::from_ymd_opt(year, month, day)?
                        .and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
                        .map(|naive| Utc.from_utc_datetime(&naive))
                };
                let candidate = build(year)?;
                if candidate > now + chrono::Duration::days(1) {
                    year -= 1;
                    return build(year);
                }
                Some(candidate)
            } else {
                NaiveDate::from_ymd_opt(stamp.parse().ok()?, month, day)?
                    .and_hms_opt(0, 0, 0)
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }
        });

        return Some(RemoteEntry {
            name,
            is_directory,
            size: if is_directory { 0 } else { caps[2].parse().unwrap_or(0) },
            modified,
        });
    }

    if let Some(caps) = DOS_LIST_REGEX.captures(line) {
        let name = caps[8].to_string();
        if name == "." || name == ".." {
            return None;
        }
        let is_directory = &caps[7] == "<DIR>";
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += if year < 70 { 2000 } else { 1900 };
        }
        let mut hour: u32 = caps[4].parse().ok()?;
        if &caps[6] == "PM" && hour < 12 {
            hour += 12;
        } else if &caps[6] == "AM" && hour == 12 {
            hour = 0;
        }
        let modified = NaiveDate::from_ymd_opt(year, caps[1].parse().ok()?, caps[2].parse().ok()?)
            .and_then(|d| d.and_hms_opt(hour, caps[5].parse().ok()?, 0))
            .map(|naive| Utc.from_utc_datetime(&naive));
        return Some(RemoteEntry {
            name,
            is_directory,
            size: if is_directory { 0 } else { caps[7].parse().unwrap_or(0) },
            modified,
        });
    }

    None
}

enum FtpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Closed,
}

impl FtpStream {
    fn shutdown(&mut self) {
        match self {
            Self::Plain(tcp) => {
                let _ = tcp.shutdown(Shutdown::Both);
            }
            Self::Tls(tls) => {
                let _ = tls.shutdown();
                let _ = tls.get_ref().shutdown(Shutdown::Both);
            }
            Self::Closed => {}
        }
        *self = Self::Closed;
    }
}

impl Read for FtpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(tcp) => tcp.read(buf),
            Self::Tls(tls) => tls.read(buf),
            Self::Closed => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }
}

impl Write for FtpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(tcp) => tcp.write(buf),
            Self::Tls(tls) => tls.write(buf),
            Self::Closed => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(tcp) => tcp.flush(),
            Self::Tls(tls) => tls.flush(),
            Self::Closed => Ok(()),
        }
    }
}

fn tls_error<S>(err: HandshakeError<S>) -> ProtocolError {
    match err {
        HandshakeError::Failure(e) => ProtocolError::Tls(e.to_string()),
        HandshakeError::WouldBlock(_) => ProtocolError::Tls("TLS handshake interrupted".into()),
    }
}

/// Owned login details for the blocking client
pub(crate) struct FtpLogin {
    host: String,
    port: u16,
    username: String,
    password: Zeroizing<String>,
    root_directory: String,
    timeout: Duration,
    tls: TlsSettings,
}

impl FtpLogin {
    fn from_params(params: &ConnectParams) -> Self {
        Self {
            host: params.host.clone(),
            port: params.port,
            username: params.username.clone(),
            password: Zeroizing::new(params.password.expose_secret().to_owned()),
            root_directory: params.root_directory.clone(),
            timeout: params.timeout,
            tls: params.tls,
        }
    }
}

/// Blocking FTP control connection
pub(crate) struct FtpClient {
    control: BufReader<FtpStream>,
    host: String,
    peer: IpAddr,
    timeout: Duration,
    data_tls: Option<TlsConnector>,
    epsv: bool,
    mlsd: bool,
}

impl FtpClient {
    pub(crate) fn connect(login: &FtpLogin) -> ProtocolResult<Self> {
        let address = format!("{}:{}", login.host, login.port);
        let target: SocketAddr = address
            .to_socket_addrs()
            .map_err(|e| ProtocolError::connect(&address, e))?
            .next()
            .ok_or_else(|| ProtocolError::connect(&address, "no addresses found"))?;
        let tcp = TcpStream::connect_timeout(&target, login.timeout)
            .map_err(|e| ProtocolError::connect(&address, e))?;
        tcp.set_read_timeout(Some(login.timeout))?;
        tcp.set_write_timeout(Some(login.timeout))?;

        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(login.tls.accept_invalid_certificates)
            .danger_accept_invalid_hostnames(login.tls.accept_invalid_certificates)
            .build()
            .map_err(|e| ProtocolError::Tls(e.to_string()))?;

        let stream = if login.tls.encryption == FtpEncryption::Implicit {
            FtpStream::Tls(Box::new(
                connector.connect(&login.host, tcp).map_err(tls_error)?,
            ))
        } else {
            FtpStream::Plain(tcp)
        };

        let mut client = Self {
            control: BufReader::new(stream),
            host: login.host.clone(),
            peer: target.ip(),
            timeout: login.timeout,
            data_tls: None,
            epsv: true,
            mlsd: true,
        };

        let greeting = client.read_reply()?;
        if greeting.code != 220 {
            return Err(greeting.into_error());
        }

        match login.tls.encryption {
            FtpEncryption::None => {}
            FtpEncryption::Implicit => client.protect_data_channel(connector)?,
            FtpEncryption::Explicit | FtpEncryption::Auto => {
                let reply = client.command("AUTH TLS")?;
                if reply.code == 234 {
                    client.upgrade_control(&connector)?;
                    client.protect_data_channel(connector)?;
                } else if login.tls.encryption == FtpEncryption::Explicit {
                    return Err(ProtocolError::Tls(format!(
                        "server refused AUTH TLS: {} {}",
                        reply.code, reply.text
                    )));
                } else {
                    tracing::debug!(host = %login.host, "Server does not offer TLS, continuing in plain FTP");
                }
            }
        }

        client.login(&login.username, &login.password)?;
        client.expect("TYPE I", &[200])?;
        if !login.root_directory.is_empty() {
            client.change_directory(&login.root_directory)?;
        }
        Ok(client)
    }

    fn upgrade_control(&mut self, connector: &TlsConnector) -> ProtocolResult<()> {
        if !self.control.buffer().is_empty() {
            return Err(ProtocolError::Malformed(
                "unexpected data after AUTH TLS".into(),
            ));
        }
        match std::mem::replace(self.control.get_mut(), FtpStream::Closed) {
            FtpStream::Plain(tcp) => {
                let tls = connector.connect(&self.host, tcp).map_err(tls_error)?;
                *self.control.get_mut() = FtpStream::Tls(Box::new(tls));
                Ok(())
            }
            other => {
                *self.control.get_mut() = other;
                Ok(())
            }
        }
    }

    fn protect_data_channel(&mut self, connector: TlsConnector) -> ProtocolResult<()> {
        self.expect("PBSZ 0", &[200])?;
        self.expect("PROT P", &[200])?;
        self.data_tls = Some(connector);
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> ProtocolResult<()> {
        let user = if username.is_empty() { "anonymous" } else { username };
        let reply = self.command(&format!("USER {user}"))?;
        let reply = match reply.code {
            230 => return Ok(()),
            331 => self.command(&format!("PASS {password}"))?,
            530 => return Err(ProtocolError::Auth(reply.text)),
            _ => return Err(reply.into_error()),
        };
        match reply.code {
            230 | 202 => Ok(()),
            530 | 332 => Err(ProtocolError::Auth(reply.text)),
            _ => Err(reply.into_error()),
        }
    }

    fn send_line(&mut self, line: &str) -> ProtocolResult<()> {
        if line.starts_with("PASS ") {
            tracing::trace!("FTP > PASS ***");
        } else {
            tracing::trace!("FTP > {line}");
        }
        let stream = self.control.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> ProtocolResult<String> {
        let mut line = String::new();
        let read = self.control.read_line(&mut line).map_err(|e| {
            if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                ProtocolError::timeout("FTP reply", self.timeout)
            } else {
                ProtocolError::Io(e)
            }
        })?;
        if read == 0 {
            return Err(ProtocolError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn read_reply(&mut self) -> ProtocolResult<FtpReply> {
        let first = self.read_line()?;
        let (code, done, text) = parse_reply_line(&first)
            .ok_or_else(|| ProtocolError::Malformed(format!("bad FTP reply: {first}")))?;
        let mut text = text.to_string();
        if !done {
            loop {
                let line = self.read_line()?;
                match parse_reply_line(&line) {
                    Some((c, true, last)) if c == code => {
                        text.push('\n');
                        text.push_str(last);
                        break;
                    }
                    _ => {
                        text.push('\n');
                        text.push_str(line.trim_start());
                    }
                }
            }
        }
        tracing::trace!("FTP < {code} {text}");
        Ok(FtpReply { code, text })
    }

    fn command(&mut self, line: &str) -> ProtocolResult<FtpReply> {
        self.send_line(line)?;
        self.read_reply()
    }

    fn expect(&mut self, line: &str, codes: &[u16]) -> ProtocolResult<FtpReply> {
        let reply = self.command(line)?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    fn open_data(&mut self) -> ProtocolResult<TcpStream> {
        let mut port = None;
        if self.epsv {
            let reply = self.command("EPSV")?;
            if reply.code == 229 {
                port = Some(parse_epsv(&reply.text)?);
            } else {
                self.epsv = false;
            }
        }
        let port = match port {
            Some(port) => port,
            None => {
                let reply = self.expect("PASV", &[227])?;
                // Use the control peer instead of the advertised host, which is
                // often a private address behind NAT
                parse_pasv(&reply.text)?.1
            }
        };

        let addr = SocketAddr::new(self.peer, port);
        let data = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| ProtocolError::connect(addr.to_string(), e))?;
        let io_timeout = Some(self.timeout.max(TRANSFER_TIMEOUT));
        data.set_read_timeout(io_timeout)?;
        data.set_write_timeout(io_timeout)?;
        Ok(data)
    }

    fn secure_data(&self, data: TcpStream) -> ProtocolResult<FtpStream> {
        match &self.data_tls {
            Some(connector) => Ok(FtpStream::Tls(Box::new(
                connector.connect(&self.host, data).map_err(tls_error)?,
            ))),
            None => Ok(FtpStream::Plain(data)),
        }
    }

    fn start_transfer(&mut self, line: &str) -> ProtocolResult<FtpStream> {
        let data = self.open_data()?;
        let reply = self.command(line)?;
        if !reply.is_preliminary() {
            return Err(reply.into_error());
        }
        self.secure_data(data)
    }

    fn finish_transfer(&mut self) -> ProtocolResult<()> {
        let reply = self.read_reply()?;
        if matches!(reply.code, 226 | 250) {
            Ok(())
        } else {
            Err(reply.into_error())
        }
    }

    fn retrieve_lines(&mut self, line: &str) -> ProtocolResult<Vec<String>> {
        let mut data = self.start_transfer(line)?;
        let mut raw = Vec::new();
        data.read_to_end(&mut raw)?;
        data.shutdown();
        self.finish_transfer()?;
        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::to_string)
            .filter(|l| !l.trim().is_empty())
            .collect())
    }

    pub(crate) fn working_directory(&mut self) -> ProtocolResult<String> {
        let reply = self.expect("PWD", &[257])?;
        parse_pwd(&reply.text)
    }

    pub(crate) fn change_directory(&mut self, path: &str) -> ProtocolResult<()> {
        self.expect(&format!("CWD {path}"), &[250, 200])?;
        Ok(())
    }

    pub(crate) fn directory_exists(&mut self, path: &str) -> ProtocolResult<bool> {
        let current = self.working_directory()?;
        let reply = self.command(&format!("CWD {path}"))?;
        match reply.code {
            250 | 200 => {
                self.change_directory(&current)?;
                Ok(true)
            }
            500..=599 => Ok(false),
            _ => Err(reply.into_error()),
        }
    }

    pub(crate) fn make_directory(&mut self, path: &str) -> ProtocolResult<()> {
        self.expect(&format!("MKD {path}"), &[257, 250])?;
        Ok(())
    }

    pub(crate) fn upload(&mut self, local: &Path, remote: &str) -> ProtocolResult<u64> {
        let mut file = std::fs::File::open(local)
            .map_err(|e| ProtocolError::LocalFile(format!("{}: {e}", local.display())))?;
        let mut data = self.start_transfer(&format!("STOR {remote}"))?;
        let sent = io::copy(&mut file, &mut data)?;
        data.flush()?;
        data.shutdown();
        self.finish_transfer()?;
        Ok(sent)
    }

    pub(crate) fn list(&mut self, path: &str) -> ProtocolResult<Vec<RemoteEntry>> {
        let suffix = if path.is_empty() {
            String::new()
        } else {
            format!(" {path}")
        };

        if self.mlsd {
            match self.retrieve_lines(&format!("MLSD{suffix}")) {
                Ok(lines) => return Ok(lines.iter().filter_map(|l| parse_mlsd_line(l)).collect()),
                Err(ProtocolError::Remote { code: 500 | 502 | 504, .. }) => {
                    tracing::debug!("MLSD not supported, falling back to LIST");
                    self.mlsd = false;
                }
                Err(e) => return Err(e),
            }
        }

        let now = Utc::now();
        let lines = self.retrieve_lines(&format!("LIST{suffix}"))?;
        Ok(lines
            .iter()
            .filter_map(|l| parse_list_line(l, now))
            .collect())
    }

    pub(crate) fn noop(&mut self) -> ProtocolResult<()> {
        self.expect("NOOP", &[200])?;
        Ok(())
    }

    pub(crate) fn quit(&mut self) {
        let _ = self.command("QUIT");
        self.control.get_mut().shutdown();
    }
}

/// Pooled FTP/FTPS session
pub struct FtpSession {
    id: u64,
    client: Arc<Mutex<FtpClient>>,
    alive: AtomicBool,
}

impl std::fmt::Debug for FtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSession")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn join_error(e: tokio::task::JoinError) -> ProtocolError {
    ProtocolError::Io(io::Error::other(e))
}

impl FtpSession {
    /// Connects, logs in and changes into the root directory
    ///
    /// # Errors
    ///
    /// Returns connect, TLS, authentication or reply errors.
    pub async fn connect(params: &ConnectParams) -> ProtocolResult<Self> {
        let login = FtpLogin::from_params(params);
        let client = tokio::task::spawn_blocking(move || FtpClient::connect(&login))
            .await
            .map_err(join_error)??;
        Ok(Self {
            id: next_session_id(),
            client: Arc::new(Mutex::new(client)),
            alive: AtomicBool::new(true),
        })
    }

    async fn run<T, F>(&self, op: F) -> ProtocolResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpClient) -> ProtocolResult<T> + Send + 'static,
    {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ProtocolError::Closed);
        }
        let client = Arc::clone(&self.client);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = client.lock().map_err(|_| ProtocolError::Closed)?;
            op(&mut guard)
        })
        .await
        .map_err(join_error)
        .and_then(|r| r);

        if matches!(result, Err(ref e) if e.is_fatal_to_session()) {
            self.alive.store(false, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl PooledSession for FtpSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        self.run(FtpClient::noop).await.is_ok()
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let client = Arc::clone(&self.client);
        let _ = tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = client.lock() {
                guard.quit();
            }
        })
        .await;
    }
}

#[async_trait]
impl FileTransferSession for FtpSession {
    async fn working_directory(&self) -> ProtocolResult<String> {
        self.run(FtpClient::working_directory).await
    }

    async fn set_working_directory(&self, path: &str) -> ProtocolResult<()> {
        let path = path.to_string();
        self.run(move |c| c.change_directory(&path)).await
    }

    async fn directory_exists(&self, path: &str) -> ProtocolResult<bool> {
        let path = path.to_string();
        self.run(move |c| c.directory_exists(&path)).await
    }

    async fn make_directory(&self, path: &str) -> ProtocolResult<()> {
        let path = path.to_string();
        self.run(move |c| c.make_directory(&path)).await
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> ProtocolResult<u64> {
        let local: PathBuf = local.to_path_buf();
        let remote = remote.to_string();
        self.run(move |c| c.upload(&local, &remote)).await
    }

    async fn list(&self, path: &str) -> ProtocolResult<Vec<RemoteEntry>> {
        let path = path.to_string();
        self.run(move |c| c.list(&path)).await
    }
}

/// Opens FTP/FTPS sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

#[async_trait]
impl Connector<dyn FileTransferSession> for FtpConnector {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> ProtocolResult<Arc<dyn FileTransferSession>> {
        Ok(Arc::new(FtpSession::connect(params).await?))
    }
}
