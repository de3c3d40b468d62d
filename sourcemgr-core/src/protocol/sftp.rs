//! SFTP client
//!
//! Wraps a blocking `ssh2` session. SFTP has no server-side working
//! directory, so the session tracks one and resolves relative paths
//! against it.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use ssh2::{ErrorCode, HashType, Session, Sftp};
use zeroize::Zeroizing;

use super::{FileTransferSession, RemoteEntry};
use crate::connection::{ConnectParams, Connector, PooledSession, next_session_id};
use crate::error::{ProtocolError, ProtocolResult};

/// Minimum I/O timeout once the session is established
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

const DIRECTORY_MODE: i32 = 0o755;

fn ssh_error(err: ssh2::Error) -> ProtocolError {
    match err.code() {
        ErrorCode::SFTP(code) => ProtocolError::Remote {
            code: u16::try_from(code).unwrap_or_default(),
            message: err.message().to_string(),
        },
        ErrorCode::Session(_) => ProtocolError::Ssh(err.to_string()),
    }
}

struct SftpClient {
    session: Session,
    sftp: Sftp,
    cwd: String,
}

impl SftpClient {
    fn connect(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        root: &str,
        timeout: Duration,
    ) -> ProtocolResult<Self> {
        let address = format!("{host}:{port}");
        let target: SocketAddr = address
            .to_socket_addrs()
            .map_err(|e| ProtocolError::connect(&address, e))?
            .next()
            .ok_or_else(|| ProtocolError::connect(&address, "no addresses found"))?;
        let tcp = TcpStream::connect_timeout(&target, timeout)
            .map_err(|e| ProtocolError::connect(&address, e))?;
        let io_timeout = timeout.max(TRANSFER_TIMEOUT);
        tcp.set_read_timeout(Some(io_timeout))?;
        tcp.set_write_timeout(Some(io_timeout))?;

        let mut session = Session::new().map_err(ssh_error)?;
        session.set_timeout(u32::try_from(io_timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(ssh_error)?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            tracing::debug!(host = %address, fingerprint = %hex::encode(hash), "SSH host key");
        }

        session
            .userauth_password(username, password)
            .map_err(|e| ProtocolError::Auth(e.message().to_string()))?;
        if !session.authenticated() {
            return Err(ProtocolError::Auth(format!(
                "server rejected password for '{username}'"
            )));
        }

        let sftp = session.sftp().map_err(ssh_error)?;
        let cwd = sftp
            .realpath(Path::new("."))
            .map_err(ssh_error)?
            .to_string_lossy()
            .into_owned();

        let mut client = Self { session, sftp, cwd };
        if !root.is_empty() {
            client.change_directory(root)?;
        }
        Ok(client)
    }

    fn resolve(&self, path: &str) -> String {
        if path.is_empty() {
            self.cwd.clone()
        } else if path.starts_with('/') {
            path.to_string()
        } else if self.cwd.ends_with('/') {
            format!("{}{path}", self.cwd)
        } else {
            format!("{}/{path}", self.cwd)
        }
    }

    fn change_directory(&mut self, path: &str) -> ProtocolResult<()> {
        let target = self.resolve(path);
        let real = self.sftp.realpath(Path::new(&target)).map_err(ssh_error)?;
        let stat = self.sftp.stat(&real).map_err(ssh_error)?;
        if !stat.is_dir() {
            return Err(ProtocolError::Remote {
                code: 550,
                message: format!("{target} is not a directory"),
            });
        }
        self.cwd = real.to_string_lossy().into_owned();
        Ok(())
    }

    fn directory_exists(&self, path: &str) -> ProtocolResult<bool> {
        match self.sftp.stat(Path::new(&self.resolve(path))) {
            Ok(stat) => Ok(stat.is_dir()),
            Err(e) if matches!(e.code(), ErrorCode::SFTP(_)) => Ok(false),
            Err(e) => Err(ssh_error(e)),
        }
    }

    fn make_directory(&self, path: &str) -> ProtocolResult<()> {
        self.sftp
            .mkdir(Path::new(&self.resolve(path)), DIRECTORY_MODE)
            .map_err(ssh_error)
    }

    fn upload(&self, local: &Path, remote: &str) -> ProtocolResult<u64> {
        let mut source = std::fs::File::open(local)
            .map_err(|e| ProtocolError::LocalFile(format!("{}: {e}", local.display())))?;
        let mut target = self
            .sftp
            .create(Path::new(&self.resolve(remote)))
            .map_err(ssh_error)?;
        Ok(io::copy(&mut source, &mut target)?)
    }

    fn list(&self, path: &str) -> ProtocolResult<Vec<RemoteEntry>> {
        let entries = self
            .sftp
            .readdir(Path::new(&self.resolve(path)))
            .map_err(ssh_error)?;
        Ok(entries
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                let is_directory = stat.is_dir();
                Some(RemoteEntry {
                    name,
                    is_directory,
                    size: if is_directory { 0 } else { stat.size.unwrap_or(0) },
                    modified: stat
                        .mtime
                        .and_then(|t| i64::try_from(t).ok())
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
                })
            })
            .collect())
    }

    fn ping(&self) -> ProtocolResult<()> {
        self.sftp.realpath(Path::new(".")).map_err(ssh_error)?;
        Ok(())
    }

    fn close(&self) {
        let _ = self.session.disconnect(None, "closing", None);
    }
}

/// Pooled SFTP session
pub struct SftpSession {
    id: u64,
    client: Arc<Mutex<SftpClient>>,
    alive: AtomicBool,
}

impl std::fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSession")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn join_error(e: tokio::task::JoinError) -> ProtocolError {
    ProtocolError::Io(io::Error::other(e))
}

impl SftpSession {
    /// Connects, authenticates with a password and opens the SFTP subsystem
    ///
    /// # Errors
    ///
    /// Returns connect, handshake, authentication or SFTP errors.
    pub async fn connect(params: &ConnectParams) -> ProtocolResult<Self> {
        let host = params.host.clone();
        let port = params.port;
        let username = params.username.clone();
        let password = Zeroizing::new(params.password.expose_secret().to_owned());
        let root = params.root_directory.clone();
        let timeout = params.timeout;

        let client = tokio::task::spawn_blocking(move || {
            SftpClient::connect(&host, port, &username, &password, &root, timeout)
        })
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
        F: FnOnce(&mut SftpClient) -> ProtocolResult<T> + Send + 'static,
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
impl PooledSession for SftpSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        self.run(|c| c.ping()).await.is_ok()
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let client = Arc::clone(&self.client);
        let _ = tokio::task::spawn_blocking(move || {
            if let Ok(guard) = client.lock() {
                guard.close();
            }
        })
        .await;
    }
}

#[async_trait]
impl FileTransferSession for SftpSession {
    async fn working_directory(&self) -> ProtocolResult<String> {
        self.run(|c| Ok(c.cwd.clone())).await
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

/// Opens SFTP sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct SftpConnector;

#[async_trait]
impl Connector<dyn FileTransferSession> for SftpConnector {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> ProtocolResult<Arc<dyn FileTransferSession>> {
        Ok(Arc::new(SftpSession::connect(params).await?))
    }
}
