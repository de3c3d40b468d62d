//! In-memory protocol backends shared by the integration tests

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sourcemgr_core::connection::next_session_id;
use sourcemgr_core::{
    CommandSession, ConnectParams, Connector, FileTransferSession, InfoSession, PooledSession,
    ProbeError, ProbeResult, ProtocolError, ProtocolResult, ReachabilityProbe, RemoteEntry,
    ServerInfo,
};
use tokio::sync::Semaphore;

/// Probe failing for a fixed set of hosts
#[derive(Default)]
pub struct ListProbe {
    pub down: HashSet<String>,
}

impl ListProbe {
    pub fn down(hosts: &[&str]) -> Self {
        Self {
            down: hosts.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for ListProbe {
    async fn probe(&self, host: &str, _port: u16) -> ProbeResult<()> {
        if self.down.contains(host) {
            return Err(ProbeError::Unreachable {
                host: host.to_string(),
                reason: "no route to host".to_string(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "list"
    }
}

/// Console session echoing commands back
pub struct EchoSession {
    id: u64,
    pub alive: AtomicBool,
    pub disconnected: AtomicBool,
}

#[async_trait]
impl PooledSession for EchoSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandSession for EchoSession {
    async fn send_command(&self, command: &str) -> ProtocolResult<String> {
        Ok(format!("> {command}"))
    }
}

/// Connector for [`EchoSession`]s.
///
/// Hosts starting with `slow` wait for a permit on `gate`; the password
/// `wrong` is rejected.
pub struct EchoConnector {
    pub connects: AtomicUsize,
    pub sessions: Mutex<Vec<Arc<EchoSession>>>,
    pub gate: Semaphore,
}

impl Default for EchoConnector {
    fn default() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }
}

impl EchoConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Arc<EchoSession> {
        Arc::clone(self.sessions.lock().unwrap().last().unwrap())
    }
}

#[async_trait]
impl Connector<dyn CommandSession> for EchoConnector {
    async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<dyn CommandSession>> {
        if params.host.starts_with("slow") {
            let _permit = self.gate.acquire().await.map_err(|_| ProtocolError::Closed)?;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        if params.password.expose_secret() == "wrong" {
            return Err(ProtocolError::Auth("bad rcon password".into()));
        }
        let session = Arc::new(EchoSession {
            id: next_session_id(),
            alive: AtomicBool::new(true),
            disconnected: AtomicBool::new(false),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

struct StaticInfo {
    id: u64,
    host: String,
}

#[async_trait]
impl PooledSession for StaticInfo {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn disconnect(&self) {}
}

#[async_trait]
impl InfoSession for StaticInfo {
    async fn get_info(&self) -> ProtocolResult<ServerInfo> {
        if self.host.starts_with("mute") {
            return Err(ProtocolError::Malformed("empty datagram".into()));
        }
        Ok(ServerInfo {
            hostname: format!("{} server", self.host),
            map: "de_nuke".into(),
            players: 10,
            max_players: 16,
            ..ServerInfo::default()
        })
    }
}

/// Query connector answering for every host except those starting with `mute`
#[derive(Default)]
pub struct StaticInfoConnector;

#[async_trait]
impl Connector<dyn InfoSession> for StaticInfoConnector {
    async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<dyn InfoSession>> {
        Ok(Arc::new(StaticInfo {
            id: next_session_id(),
            host: params.host.clone(),
        }))
    }
}

/// Remote file tree shared by every session of a [`TreeConnector`]
#[derive(Default)]
pub struct RemoteTree {
    pub dirs: Mutex<BTreeSet<String>>,
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub mkdir_calls: AtomicUsize,
}

impl RemoteTree {
    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

struct TreeSession {
    id: u64,
    cwd: Mutex<String>,
    tree: Arc<RemoteTree>,
}

impl TreeSession {
    fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            let cwd = self.cwd.lock().unwrap().clone();
            if cwd == "/" {
                format!("/{path}")
            } else {
                format!("{cwd}/{path}")
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        path == "/" || self.tree.has_dir(path)
    }
}

#[async_trait]
impl PooledSession for TreeSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn disconnect(&self) {}
}

#[async_trait]
impl FileTransferSession for TreeSession {
    async fn working_directory(&self) -> ProtocolResult<String> {
        Ok(self.cwd.lock().unwrap().clone())
    }

    async fn set_working_directory(&self, path: &str) -> ProtocolResult<()> {
        let path = self.absolute(path);
        if !self.exists(&path) {
            return Err(ProtocolError::Remote {
                code: 550,
                message: format!("{path}: No such directory"),
            });
        }
        *self.cwd.lock().unwrap() = path;
        Ok(())
    }

    async fn directory_exists(&self, path: &str) -> ProtocolResult<bool> {
        Ok(self.exists(&self.absolute(path)))
    }

    async fn make_directory(&self, path: &str) -> ProtocolResult<()> {
        self.tree.mkdir_calls.fetch_add(1, Ordering::SeqCst);
        let path = self.absolute(path);
        let mut dirs = self.tree.dirs.lock().unwrap();
        if !dirs.insert(path.clone()) {
            return Err(ProtocolError::Remote {
                code: 550,
                message: format!("{path}: File exists"),
            });
        }
        Ok(())
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> ProtocolResult<u64> {
        let data = std::fs::read(local).map_err(|e| ProtocolError::LocalFile(e.to_string()))?;
        let len = data.len() as u64;
        let remote = self.absolute(remote);
        self.tree.files.lock().unwrap().insert(remote, data);
        Ok(len)
    }

    async fn list(&self, path: &str) -> ProtocolResult<Vec<RemoteEntry>> {
        let base = if path.is_empty() {
            self.cwd.lock().unwrap().clone()
        } else {
            self.absolute(path)
        };
        let prefix = if base == "/" { base } else { format!("{base}/") };
        let child = |p: &str| {
            p.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        };

        let mut entries: Vec<RemoteEntry> = self
            .tree
            .dirs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| child(d))
            .map(|name| RemoteEntry {
                name,
                is_directory: true,
                size: 0,
                modified: None,
            })
            .collect();
        for (path, data) in self.tree.files.lock().unwrap().iter() {
            if let Some(name) = child(path) {
                entries.push(RemoteEntry {
                    name,
                    is_directory: false,
                    size: data.len() as u64,
                    modified: None,
                });
            }
        }
        Ok(entries)
    }
}

/// File-transfer connector over a shared [`RemoteTree`]; sessions start in
/// the root directory from the connect parameters, else `/home/steam`.
#[derive(Default)]
pub struct TreeConnector {
    pub tree: Arc<RemoteTree>,
    pub connects: AtomicUsize,
}

#[async_trait]
impl Connector<dyn FileTransferSession> for TreeConnector {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> ProtocolResult<Arc<dyn FileTransferSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if params.username.is_empty() {
            return Err(ProtocolError::Auth("530 Login incorrect".into()));
        }
        let home = "/home/steam".to_string();
        {
            let mut dirs = self.tree.dirs.lock().unwrap();
            dirs.insert("/home".into());
            dirs.insert(home.clone());
        }
        let session = TreeSession {
            id: next_session_id(),
            cwd: Mutex::new(home),
            tree: Arc::clone(&self.tree),
        };
        if !params.root_directory.is_empty() {
            session.set_working_directory(&params.root_directory).await?;
        }
        Ok(Arc::new(session))
    }
}
