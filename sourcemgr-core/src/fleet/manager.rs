//! Fleet manager: owned state behind every user-facing operation
//!
//! The manager holds the vault, the endpoint registry, one session pool per
//! protocol and the status poller. Nothing here is global; the CLI builds
//! one manager per process and shuts it down before exiting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use super::backends::Backends;
use super::edit::EndpointEdit;
use super::report::{
    CommandOutcome, FleetPoolStats, RCON_ERROR_PREFIX, SecretStatus, UploadFailure, UploadReport,
    describe_error, transfer_error_prefix,
};
use crate::config::{AppSettings, ConfigPaths, ConfigStore};
use crate::connection::{ConnectParams, ConnectionKey, PooledSession, SessionPool};
use crate::error::{ConfigError, ProtocolError, ProtocolResult, SourceMgrError, SourceMgrResult};
use crate::models::{Endpoint, EndpointStatus, FileTransferProtocol, ManagedEndpoint};
use crate::protocol::{
    self, CommandSession, FileTransferSession, InfoSession, RconParse, RemoteEntry,
    format_listing, join_remote, normalize_path,
};
use crate::secret::{CredentialVault, MigrationReport, migrate_endpoints};
use crate::status::{PollResult, PollSummary, StatusPoller, probe_for};
use crate::tracing::span_names;

/// Shortest interval accepted by the periodic refresh task
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Summaries buffered for a slow consumer of the refresh task
const REFRESH_CHANNEL_CAPACITY: usize = 8;

/// Pool keys an endpoint's sessions live under
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKeys {
    rcon: ConnectionKey,
    query: ConnectionKey,
    transfer: (FileTransferProtocol, ConnectionKey),
}

impl SessionKeys {
    fn of(endpoint: &Endpoint) -> Self {
        let host = endpoint.ip_address.trim();
        Self {
            rcon: ConnectionKey::address(host, endpoint.rcon_port),
            query: ConnectionKey::address(host, endpoint.effective_query_port()),
            transfer: (
                endpoint.ftp_protocol,
                ConnectionKey::account(
                    endpoint.transfer_host().trim(),
                    endpoint.ftp_port,
                    endpoint.ftp_username.clone(),
                ),
            ),
        }
    }
}

/// Handle of the running periodic refresh task
#[derive(Debug)]
struct RefreshHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signals the task and waits for it to finish its current round
    async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Refresh task ended abnormally");
        }
    }
}

/// Owns the endpoint registry, the vault, the session pools and the poller
pub struct FleetManager {
    settings: AppSettings,
    vault: CredentialVault,
    store: ConfigStore,
    load_report: MigrationReport,
    endpoints: RwLock<Vec<Arc<ManagedEndpoint>>>,
    rcon_pool: Arc<SessionPool<dyn CommandSession>>,
    query_pool: Arc<SessionPool<dyn InfoSession>>,
    ftp_pool: Arc<SessionPool<dyn FileTransferSession>>,
    sftp_pool: Arc<SessionPool<dyn FileTransferSession>>,
    poller: StatusPoller,
    persist_lock: Mutex<()>,
    refresh: Mutex<Option<RefreshHandle>>,
}

impl std::fmt::Debug for FleetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetManager")
            .field("store", &self.store)
            .field("vault", &self.vault)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

/// Evicts `key` unless a fatal error left the session usable
async fn settle<S, T>(
    pool: &SessionPool<S>,
    key: &ConnectionKey,
    result: ProtocolResult<T>,
) -> SourceMgrResult<T>
where
    S: ?Sized + PooledSession + 'static,
{
    if let Err(e) = &result {
        if e.is_fatal_to_session() {
            tracing::debug!(pool = pool.name(), key = %key, error = %e, "Dropping failed session");
            pool.evict(key).await;
        }
    }
    Ok(result?)
}

/// Files under `root` with their `/`-separated relative paths, sorted
async fn collect_files(root: &Path) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push((entry.path(), relative));
            } else if file_type.is_file() {
                files.push((entry.path(), relative));
            }
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

async fn labels(endpoints: &[Arc<ManagedEndpoint>]) -> Vec<String> {
    let mut labels = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        labels.push(endpoint.config().read().await.label.clone());
    }
    labels
}

fn invalid(message: String) -> SourceMgrError {
    ConfigError::Invalid(message).into()
}

impl FleetManager {
    /// Opens the vault, loads (and migrates) the endpoint list and builds
    /// the pools and the poller.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint list cannot be read or
    /// the migrated list cannot be written back.
    pub async fn open(
        settings: AppSettings,
        paths: &ConfigPaths,
        backends: Backends,
    ) -> SourceMgrResult<Self> {
        let vault = CredentialVault::open(backends.key_store.as_ref());
        if !vault.is_available() {
            tracing::warn!("Credential vault unavailable, secrets will be stored unsealed");
        }

        let store = ConfigStore::new(paths.servers_file());
        let loaded = store.load(&vault).await?;

        let retry = settings.connection.retry_config();
        let rcon_pool = Arc::new(SessionPool::new("rcon", backends.rcon, retry.clone()));
        let query_pool = Arc::new(SessionPool::new("query", backends.query, retry.clone()));
        let ftp_pool = Arc::new(SessionPool::new("ftp", backends.ftp, retry.clone()));
        let sftp_pool = Arc::new(SessionPool::new("sftp", backends.sftp, retry));

        let probe = backends.probe.unwrap_or_else(|| {
            probe_for(settings.polling.probe, settings.polling.probe_timeout())
        });
        let poller = StatusPoller::new(probe, Arc::clone(&query_pool))
            .with_query_timeout(settings.polling.query_timeout())
            .with_concurrency(settings.polling.concurrency);

        let endpoints = loaded
            .endpoints
            .into_iter()
            .map(|endpoint| Arc::new(ManagedEndpoint::new(endpoint)))
            .collect::<Vec<_>>();
        tracing::info!(
            item_count = endpoints.len(),
            path = %store.path().display(),
            "Fleet opened"
        );

        Ok(Self {
            settings,
            vault,
            store,
            load_report: loaded.migration,
            endpoints: RwLock::new(endpoints),
            rcon_pool,
            query_pool,
            ftp_pool,
            sftp_pool,
            poller,
            persist_lock: Mutex::new(()),
            refresh: Mutex::new(None),
        })
    }

    /// Settings the fleet was opened with
    #[must_use]
    pub const fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Credential vault
    #[must_use]
    pub const fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Secret migration performed while loading
    #[must_use]
    pub const fn load_report(&self) -> &MigrationReport {
        &self.load_report
    }

    /// Backing endpoint file
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.store.path()
    }

    fn connect_timeout(&self) -> Duration {
        self.settings.connection.connect_timeout()
    }

    fn transfer_pool(
        &self,
        protocol: FileTransferProtocol,
    ) -> &Arc<SessionPool<dyn FileTransferSession>> {
        match protocol {
            FileTransferProtocol::Ftp => &self.ftp_pool,
            FileTransferProtocol::Sftp => &self.sftp_pool,
        }
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    /// All endpoints in configuration order
    pub async fn endpoints(&self) -> Vec<Arc<ManagedEndpoint>> {
        self.endpoints.read().await.clone()
    }

    /// Number of endpoints
    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// Returns true if no endpoint is configured
    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }

    /// Endpoint with the given runtime id
    pub async fn get(&self, id: Uuid) -> Option<Arc<ManagedEndpoint>> {
        self.endpoints
            .read()
            .await
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    async fn require(&self, id: Uuid) -> SourceMgrResult<Arc<ManagedEndpoint>> {
        self.get(id)
            .await
            .ok_or_else(|| SourceMgrError::EndpointNotFound(id.to_string()))
    }

    /// Finds an endpoint by id, label or display name (case-insensitive),
    /// or by a unique id prefix of at least four characters.
    ///
    /// # Errors
    ///
    /// Returns [`SourceMgrError::EndpointNotFound`] or
    /// [`SourceMgrError::AmbiguousEndpoint`].
    pub async fn find(&self, query: &str) -> SourceMgrResult<Arc<ManagedEndpoint>> {
        let query = query.trim();
        if let Ok(id) = Uuid::parse_str(query) {
            if let Some(endpoint) = self.get(id).await {
                return Ok(endpoint);
            }
        }

        let endpoints = self.endpoints().await;
        let mut matches = Vec::new();
        for endpoint in &endpoints {
            let config = endpoint.config().read().await;
            if config.label.eq_ignore_ascii_case(query)
                || config.display_name().eq_ignore_ascii_case(query)
            {
                matches.push(Arc::clone(endpoint));
            }
        }

        if matches.is_empty() && query.len() >= 4 {
            let prefix = query.to_ascii_lowercase();
            matches = endpoints
                .iter()
                .filter(|e| e.id().to_string().starts_with(&prefix))
                .cloned()
                .collect();
        }

        match matches.len() {
            0 => Err(SourceMgrError::EndpointNotFound(query.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(SourceMgrError::AmbiguousEndpoint(query.to_string())),
        }
    }

    /// Writes the current endpoint list to disk
    ///
    /// # Errors
    ///
    /// Returns the store's serialization or I/O error.
    pub async fn persist(&self) -> SourceMgrResult<()> {
        let _guard = self.persist_lock.lock().await;
        let endpoints = self.endpoints().await;
        let mut snapshot = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            snapshot.push(endpoint.snapshot().await);
        }
        self.store.save(&snapshot).await?;
        Ok(())
    }

    /// Adds an endpoint and persists the list. Returns its runtime id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable endpoint, or the
    /// persistence error.
    pub async fn insert_endpoint(&self, endpoint: Endpoint) -> SourceMgrResult<Uuid> {
        endpoint.validate().map_err(invalid)?;
        let managed = Arc::new(ManagedEndpoint::new(endpoint));
        let id = managed.id();
        self.endpoints.write().await.push(managed);
        tracing::info!(endpoint_id = %id, "Endpoint added");
        self.persist().await?;
        Ok(id)
    }

    /// Creates an endpoint from defaults plus `edit` and persists the list
    ///
    /// # Errors
    ///
    /// See [`Self::insert_endpoint`].
    pub async fn add_endpoint(&self, edit: EndpointEdit) -> SourceMgrResult<Uuid> {
        let mut endpoint = Endpoint::default();
        edit.apply(&mut endpoint, &self.vault);
        self.insert_endpoint(endpoint).await
    }

    /// Applies `edit` to an endpoint. Returns false if nothing changed.
    ///
    /// Sessions opened with the old address or credentials are evicted
    /// unless another endpoint still uses them.
    ///
    /// # Errors
    ///
    /// Returns not-found, [`ConfigError::Invalid`] (the endpoint is left
    /// untouched) or the persistence error.
    pub async fn update_endpoint(&self, id: Uuid, edit: EndpointEdit) -> SourceMgrResult<bool> {
        let endpoint = self.require(id).await?;

        let stale_keys = {
            let mut config = endpoint.config().write().await;
            let mut edited = config.clone();
            if !edit.apply(&mut edited, &self.vault) {
                return Ok(false);
            }
            edited.validate().map_err(invalid)?;

            let old_keys = SessionKeys::of(&config);
            let new_keys = SessionKeys::of(&edited);
            let credentials_changed = config.stored_rcon_password()
                != edited.stored_rcon_password()
                || config.stored_ftp_password() != edited.stored_ftp_password()
                || config.ftp_root_directory != edited.ftp_root_directory;
            let address_changed = old_keys != new_keys;
            if config.control_address() != edited.control_address()
                || config.effective_query_port() != edited.effective_query_port()
            {
                edited.forget_hostname();
            }
            *config = edited;

            if address_changed {
                endpoint.publish(EndpointStatus::offline());
            }
            (address_changed || credentials_changed).then_some(old_keys)
        };

        if let Some(keys) = stale_keys {
            self.evict_unshared(&keys, Some(id)).await;
        }
        tracing::info!(endpoint_id = %id, "Endpoint updated");
        self.persist().await?;
        Ok(true)
    }

    /// Removes an endpoint, evicts its sessions and persists the list.
    ///
    /// A session key still used by another endpoint is kept.
    ///
    /// # Errors
    ///
    /// Returns not-found or the persistence error.
    pub async fn remove_endpoint(&self, id: Uuid) -> SourceMgrResult<Endpoint> {
        let removed = {
            let mut list = self.endpoints.write().await;
            let position = list
                .iter()
                .position(|e| e.id() == id)
                .ok_or_else(|| SourceMgrError::EndpointNotFound(id.to_string()))?;
            list.remove(position)
        };

        let snapshot = removed.snapshot().await;
        removed.publish(EndpointStatus::offline());
        self.evict_unshared(&SessionKeys::of(&snapshot), None).await;
        tracing::info!(endpoint_id = %id, "Endpoint removed");
        self.persist().await?;
        Ok(snapshot)
    }

    /// Copies an endpoint under a "(Copy)" label and persists the list
    ///
    /// # Errors
    ///
    /// Returns not-found or the persistence error.
    pub async fn duplicate_endpoint(&self, id: Uuid) -> SourceMgrResult<Uuid> {
        let copy = self.require(id).await?.snapshot().await.duplicate();
        let managed = Arc::new(ManagedEndpoint::new(copy));
        let new_id = managed.id();
        self.endpoints.write().await.push(managed);
        self.persist().await?;
        Ok(new_id)
    }

    async fn evict_unshared(&self, keys: &SessionKeys, exclude: Option<Uuid>) {
        let mut remaining = Vec::new();
        for endpoint in self.endpoints().await {
            if Some(endpoint.id()) != exclude {
                remaining.push(SessionKeys::of(&*endpoint.config().read().await));
            }
        }

        if !remaining.iter().any(|r| r.rcon == keys.rcon) {
            self.rcon_pool.evict(&keys.rcon).await;
        }
        if !remaining.iter().any(|r| r.query == keys.query) {
            self.query_pool.evict(&keys.query).await;
        }
        if !remaining.iter().any(|r| r.transfer == keys.transfer) {
            let (protocol, key) = &keys.transfer;
            self.transfer_pool(*protocol).evict(key).await;
        }
    }

    // ---------------------------------------------------------------------
    // Secrets
    // ---------------------------------------------------------------------

    /// Counts sealed, plaintext and empty secrets
    pub async fn secret_status(&self) -> SecretStatus {
        let mut status = SecretStatus {
            vault_available: self.vault.is_available(),
            ..SecretStatus::default()
        };
        for endpoint in self.endpoints().await {
            let config = endpoint.config().read().await;
            for stored in [config.stored_rcon_password(), config.stored_ftp_password()] {
                if stored.is_empty() {
                    status.empty += 1;
                } else if self.vault.is_sealed(stored.as_stored()) {
                    status.sealed += 1;
                } else {
                    status.plaintext += 1;
                }
            }
        }
        status
    }

    /// Reseals plaintext secrets of the loaded endpoints and persists the
    /// list if anything changed.
    ///
    /// # Errors
    ///
    /// Returns the persistence error.
    pub async fn migrate_secrets(&self) -> SourceMgrResult<MigrationReport> {
        let endpoints = self.endpoints().await;
        let mut guards = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            guards.push(endpoint.config().write().await);
        }

        let mut working: Vec<Endpoint> = guards.iter().map(|g| (**g).clone()).collect();
        let report = migrate_endpoints(&self.vault, &mut working);
        if report.needs_persist() {
            for (guard, migrated) in guards.iter_mut().zip(working) {
                **guard = migrated;
            }
        }
        drop(guards);

        if report.needs_persist() {
            self.persist().await?;
        }
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // RCON
    // ---------------------------------------------------------------------

    async fn rcon_session(
        &self,
        id: Uuid,
    ) -> SourceMgrResult<(Arc<dyn CommandSession>, ConnectionKey)> {
        let endpoint = self.require(id).await?.snapshot().await;
        endpoint.validate().map_err(invalid)?;

        let keys = SessionKeys::of(&endpoint);
        let params = ConnectParams::new(
            endpoint.ip_address.trim(),
            endpoint.rcon_port,
            self.connect_timeout(),
        )
        .with_credentials("", endpoint.rcon_password(&self.vault));
        let session = self.rcon_pool.acquire(&keys.rcon, &params).await?;
        Ok((session, keys.rcon))
    }

    /// Runs a console command and returns its output
    ///
    /// # Errors
    ///
    /// Returns not-found, invalid-endpoint or the protocol error.
    pub async fn try_execute(&self, id: Uuid, command: &str) -> SourceMgrResult<String> {
        let (session, key) = self.rcon_session(id).await?;
        let result = session.send_command(command).await;
        settle(&self.rcon_pool, &key, result).await
    }

    /// Runs a console command and parses its output
    ///
    /// # Errors
    ///
    /// As [`Self::try_execute`], plus a malformed-response error when the
    /// output does not parse.
    pub async fn try_execute_typed<T: RconParse>(
        &self,
        id: Uuid,
        command: &str,
    ) -> SourceMgrResult<T> {
        let (session, key) = self.rcon_session(id).await?;
        let result = session.execute_typed::<T>(command).await;
        settle(&self.rcon_pool, &key, result).await
    }

    /// Runs a console command; failures come back as `"RCON Error: ..."`
    pub async fn execute_command(&self, id: Uuid, command: &str) -> String {
        match self.try_execute(id, command).await {
            Ok(output) => output,
            Err(e) => describe_error(RCON_ERROR_PREFIX, &e),
        }
    }

    /// Runs a command on several endpoints concurrently.
    ///
    /// Outcomes keep the order of `ids`; one endpoint's failure does not
    /// affect the others.
    pub async fn execute_on(&self, ids: &[Uuid], command: &str) -> Vec<CommandOutcome> {
        let runs: Vec<_> = ids
            .iter()
            .copied()
            .map(|id| async move {
                let name = match self.get(id).await {
                    Some(endpoint) => endpoint.config().read().await.display_name().to_string(),
                    None => id.to_string(),
                };
                let result = self.try_execute(id, command).await;
                CommandOutcome { id, name, result }
            })
            .collect();
        stream::iter(runs)
            .buffered(self.settings.polling.concurrency.max(1))
            .collect()
            .await
    }

    // ---------------------------------------------------------------------
    // File transfer
    // ---------------------------------------------------------------------

    async fn transfer_session(
        &self,
        endpoint: &Endpoint,
    ) -> SourceMgrResult<(Arc<dyn FileTransferSession>, ConnectionKey)> {
        endpoint.validate().map_err(invalid)?;

        let (protocol, key) = SessionKeys::of(endpoint).transfer;
        let params = ConnectParams::new(
            endpoint.transfer_host().trim(),
            endpoint.ftp_port,
            self.connect_timeout(),
        )
        .with_credentials(endpoint.ftp_username.clone(), endpoint.ftp_password(&self.vault))
        .with_root_directory(endpoint.ftp_root_directory.clone())
        .with_tls(self.settings.connection.tls_settings());
        let session = self.transfer_pool(protocol).acquire(&key, &params).await?;
        Ok((session, key))
    }

    async fn error_prefix(&self, id: Uuid) -> &'static str {
        match self.get(id).await {
            Some(endpoint) => transfer_error_prefix(endpoint.config().read().await.ftp_protocol),
            None => "Error",
        }
    }

    /// Uploads one file, creating the remote parent directory first.
    /// Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns not-found, a local-file error or the protocol error.
    pub async fn try_upload(&self, id: Uuid, local: &Path, remote: &str) -> SourceMgrResult<u64> {
        let span = tracing::debug_span!(span_names::TRANSFER_UPLOAD, endpoint_id = %id, remote);
        async {
            let endpoint = self.require(id).await?.snapshot().await;
            let is_file = tokio::fs::metadata(local)
                .await
                .is_ok_and(|m| m.is_file());
            if !is_file {
                return Err(ProtocolError::LocalFile(format!(
                    "{} is not a readable file",
                    local.display()
                ))
                .into());
            }

            let (session, key) = self.transfer_session(&endpoint).await?;
            let result = protocol::upload(session.as_ref(), local, remote).await;
            let bytes = settle(self.transfer_pool(endpoint.ftp_protocol), &key, result).await?;
            tracing::info!(bytes, "Upload complete");
            Ok(bytes)
        }
        .instrument(span)
        .await
    }

    /// Uploads one file; returns a confirmation or `"FTP Error: ..."` /
    /// `"SFTP Error: ..."`
    pub async fn upload(&self, id: Uuid, local: &Path, remote: &str) -> String {
        match self.try_upload(id, local, remote).await {
            Ok(_) => format!("File uploaded successfully to {}", normalize_path(remote)),
            Err(e) => describe_error(self.error_prefix(id).await, &e),
        }
    }

    /// Uploads every file under `local_dir` into `remote_dir`, keeping the
    /// relative layout.
    ///
    /// Per-file failures are collected in the report and do not stop the
    /// upload; a failed session is replaced for the next file.
    ///
    /// # Errors
    ///
    /// Returns not-found, an error reading `local_dir`, or the protocol
    /// error raised while creating `remote_dir`.
    pub async fn upload_tree(
        &self,
        id: Uuid,
        local_dir: &Path,
        remote_dir: &str,
    ) -> SourceMgrResult<UploadReport> {
        let span = tracing::info_span!(span_names::TRANSFER_UPLOAD, endpoint_id = %id, remote = remote_dir);
        async {
            let endpoint = self.require(id).await?.snapshot().await;
            let is_dir = tokio::fs::metadata(local_dir)
                .await
                .is_ok_and(|m| m.is_dir());
            if !is_dir {
                return Err(SourceMgrError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a directory", local_dir.display()),
                )));
            }
            let files = collect_files(local_dir).await?;
            let pool = self.transfer_pool(endpoint.ftp_protocol);
            let remote_root = normalize_path(remote_dir);

            let (session, key) = self.transfer_session(&endpoint).await?;
            let created = protocol::create_directory(session.as_ref(), &remote_root, true).await;
            settle(pool, &key, created).await?;

            let mut report = UploadReport {
                remote_root: remote_root.clone(),
                ..UploadReport::default()
            };
            for (local, relative) in files {
                let remote = join_remote(&remote_root, &relative);
                let outcome = match self.transfer_session(&endpoint).await {
                    Ok((session, key)) => {
                        let result = protocol::upload(session.as_ref(), &local, &remote).await;
                        settle(pool, &key, result).await
                    }
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(bytes) => {
                        report.files += 1;
                        report.bytes += bytes;
                    }
                    Err(e) => {
                        tracing::warn!(file = %local.display(), error = %e, "File upload failed");
                        report.failures.push(UploadFailure {
                            local,
                            remote,
                            error: e.to_string(),
                        });
                    }
                }
            }

            tracing::info!(
                files = report.files,
                bytes = report.bytes,
                failed = report.failures.len(),
                "Folder upload complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Creates a remote directory and any missing parents
    ///
    /// # Errors
    ///
    /// Returns not-found or the protocol error.
    pub async fn try_create_directory(&self, id: Uuid, path: &str) -> SourceMgrResult<()> {
        let endpoint = self.require(id).await?.snapshot().await;
        let (session, key) = self.transfer_session(&endpoint).await?;
        let result = protocol::create_directory(session.as_ref(), path, true).await;
        settle(self.transfer_pool(endpoint.ftp_protocol), &key, result).await
    }

    /// Creates a remote directory; returns a confirmation or a prefixed error
    pub async fn create_directory(&self, id: Uuid, path: &str) -> String {
        match self.try_create_directory(id, path).await {
            Ok(()) => format!("Directory created: {}", normalize_path(path)),
            Err(e) => describe_error(self.error_prefix(id).await, &e),
        }
    }

    /// Lists a remote directory and returns the path shown for it: the
    /// normalized request, or the working directory for an empty path
    ///
    /// # Errors
    ///
    /// Returns not-found or the protocol error.
    pub async fn browse(
        &self,
        id: Uuid,
        path: &str,
    ) -> SourceMgrResult<(String, Vec<RemoteEntry>)> {
        let endpoint = self.require(id).await?.snapshot().await;
        let (session, key) = self.transfer_session(&endpoint).await?;
        let pool = self.transfer_pool(endpoint.ftp_protocol);

        let shown = if path.trim().is_empty() {
            let cwd = session.working_directory().await;
            settle(pool, &key, cwd).await?
        } else {
            normalize_path(path)
        };
        let result = protocol::list_directory(session.as_ref(), path).await;
        let entries = settle(pool, &key, result).await?;
        Ok((shown, entries))
    }

    /// Lists a remote directory; an empty path lists the working directory
    ///
    /// # Errors
    ///
    /// Returns not-found or the protocol error.
    pub async fn list_entries(&self, id: Uuid, path: &str) -> SourceMgrResult<Vec<RemoteEntry>> {
        Ok(self.browse(id, path).await?.1)
    }

    /// Lists a remote directory as text, or a prefixed error
    pub async fn list_directory(&self, id: Uuid, path: &str) -> String {
        match self.browse(id, path).await {
            Ok((shown, entries)) => format_listing(&shown, &entries),
            Err(e) => describe_error(self.error_prefix(id).await, &e),
        }
    }

    /// Default remote path for `local` under the endpoint's root directory
    ///
    /// # Errors
    ///
    /// Returns not-found.
    pub async fn suggest_remote_path(&self, id: Uuid, local: &Path) -> SourceMgrResult<String> {
        let endpoint = self.require(id).await?;
        let root = endpoint.config().read().await.ftp_root_directory.clone();
        Ok(protocol::suggest_remote_path(local, &root))
    }

    // ---------------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------------

    /// Polls one endpoint; persists the list if its label was adopted from
    /// the server hostname.
    ///
    /// # Errors
    ///
    /// Returns not-found or the persistence error.
    pub async fn refresh(&self, id: Uuid) -> SourceMgrResult<PollResult> {
        let endpoint = self.require(id).await?;
        let before = endpoint.config().read().await.label.clone();
        let result = self.poller.poll(&endpoint).await;
        if endpoint.config().read().await.label != before {
            self.persist().await?;
        }
        Ok(result)
    }

    /// Polls every endpoint concurrently
    ///
    /// # Errors
    ///
    /// Returns the persistence error if adopted labels could not be saved.
    pub async fn refresh_all(&self) -> SourceMgrResult<PollSummary> {
        let endpoints = self.endpoints().await;
        let before = labels(&endpoints).await;
        let summary = self.poller.poll_all(&endpoints).await;
        if labels(&endpoints).await != before {
            self.persist().await?;
        }
        Ok(summary)
    }

    /// Starts polling the fleet every `interval` (first round immediately).
    ///
    /// Replaces a task already running. Each round's summary is offered on
    /// the returned channel; rounds are dropped while the consumer lags.
    pub async fn start_auto_refresh(
        self: &Arc<Self>,
        interval: Duration,
    ) -> mpsc::Receiver<PollSummary> {
        self.stop_auto_refresh().await;

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (summary_tx, summary_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        let fleet = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => {
                        let Some(fleet) = fleet.upgrade() else { break };
                        match fleet.refresh_all().await {
                            Ok(summary) => {
                                if summary_tx.try_send(summary).is_err() {
                                    tracing::debug!("Refresh summary dropped");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Periodic refresh failed"),
                        }
                    }
                }
            }
            tracing::debug!("Refresh task stopped");
        });

        tracing::info!(interval_secs = interval.as_secs(), "Periodic refresh started");
        *self.refresh.lock().await = Some(RefreshHandle { stop_tx, task });
        summary_rx
    }

    /// Stops the periodic refresh task, if running
    pub async fn stop_auto_refresh(&self) -> bool {
        let handle = self.refresh.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    /// Returns true while the periodic refresh task runs
    pub async fn is_auto_refreshing(&self) -> bool {
        self.refresh
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Counters of the four pools
    #[must_use]
    pub fn pool_stats(&self) -> FleetPoolStats {
        FleetPoolStats {
            rcon: self.rcon_pool.stats().snapshot(),
            query: self.query_pool.stats().snapshot(),
            ftp: self.ftp_pool.stats().snapshot(),
            sftp: self.sftp_pool.stats().snapshot(),
        }
    }

    /// Sessions currently held across all pools
    pub async fn open_sessions(&self) -> usize {
        self.rcon_pool.len().await
            + self.query_pool.len().await
            + self.ftp_pool.len().await
            + self.sftp_pool.len().await
    }

    /// Orderly shutdown: stops the refresh task, persists the list and
    /// disconnects every pooled session. Returns the number of sessions
    /// closed.
    ///
    /// The pools are drained even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after the drain completes.
    pub async fn shutdown(&self) -> SourceMgrResult<usize> {
        let span = tracing::info_span!(span_names::FLEET_SHUTDOWN);
        async {
            self.stop_auto_refresh().await;
            let persisted = self.persist().await;
            if let Err(e) = &persisted {
                tracing::error!(error = %e, "Failed to persist endpoints during shutdown");
            }

            let (rcon, query, ftp, sftp) = tokio::join!(
                self.rcon_pool.evict_all(),
                self.query_pool.evict_all(),
                self.ftp_pool.evict_all(),
                self.sftp_pool.evict_all(),
            );
            let closed = rcon + query + ftp + sftp;
            tracing::info!(closed, "Fleet shut down");

            persisted.map(|()| closed)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::connection::{Connector, next_session_id};
    use crate::error::{ProbeResult, ProtocolResult};
    use crate::protocol::{ServerInfo, StatusReport};
    use crate::secret::StaticKeyStore;
    use crate::status::ReachabilityProbe;

    struct UpProbe;

    #[async_trait]
    impl ReachabilityProbe for UpProbe {
        async fn probe(&self, _host: &str, _port: u16) -> ProbeResult<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "up"
        }
    }

    struct FakeRcon {
        id: u64,
        password: String,
        alive: AtomicBool,
    }

    #[async_trait]
    impl PooledSession for FakeRcon {
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
    impl CommandSession for FakeRcon {
        async fn send_command(&self, command: &str) -> ProtocolResult<String> {
            if command == "status" {
                return Ok("hostname: Fake Arena\nmap     : de_dust2\nplayers : 2 humans, 0 bots (16/0 max) (not hibernating)\n".into());
            }
            if command == "drop" {
                self.alive.store(false, Ordering::SeqCst);
                return Err(ProtocolError::Closed);
            }
            Ok(format!("{} ran {command}", self.password))
        }
    }

    #[derive(Default)]
    struct FakeRconConnector {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl Connector<dyn CommandSession> for FakeRconConnector {
        async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<dyn CommandSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if params.host.starts_with("down") {
                return Err(ProtocolError::connect(params.address(), "refused"));
            }
            let password = params.password.expose_secret().to_string();
            if password == "wrong" {
                return Err(ProtocolError::Auth("bad rcon password".into()));
            }
            Ok(Arc::new(FakeRcon {
                id: next_session_id(),
                password,
                alive: AtomicBool::new(true),
            }))
        }
    }

    struct FakeInfo(u64);

    #[async_trait]
    impl PooledSession for FakeInfo {
        fn session_id(&self) -> u64 {
            self.0
        }
        async fn is_alive(&self) -> bool {
            true
        }
        async fn disconnect(&self) {}
    }

    #[async_trait]
    impl InfoSession for FakeInfo {
        async fn get_info(&self) -> ProtocolResult<ServerInfo> {
            Ok(ServerInfo {
                hostname: "Queried Name".into(),
                map: "cs_office".into(),
                players: 4,
                max_players: 12,
                ..ServerInfo::default()
            })
        }
    }

    struct FakeInfoConnector;

    #[async_trait]
    impl Connector<dyn InfoSession> for FakeInfoConnector {
        async fn connect(&self, _params: &ConnectParams) -> ProtocolResult<Arc<dyn InfoSession>> {
            Ok(Arc::new(FakeInfo(next_session_id())))
        }
    }

    /// Shared in-memory remote tree
    #[derive(Default)]
    struct RemoteTree {
        dirs: StdMutex<BTreeSet<String>>,
        files: StdMutex<BTreeMap<String, Vec<u8>>>,
    }

    struct FakeTransfer {
        id: u64,
        tree: Arc<RemoteTree>,
    }

    #[async_trait]
    impl PooledSession for FakeTransfer {
        fn session_id(&self) -> u64 {
            self.id
        }
        async fn is_alive(&self) -> bool {
            true
        }
        async fn disconnect(&self) {}
    }

    #[async_trait]
    impl FileTransferSession for FakeTransfer {
        async fn working_directory(&self) -> ProtocolResult<String> {
            Ok("/".into())
        }
        async fn set_working_directory(&self, _path: &str) -> ProtocolResult<()> {
            Ok(())
        }
        async fn directory_exists(&self, path: &str) -> ProtocolResult<bool> {
            Ok(path == "/" || self.tree.dirs.lock().unwrap().contains(path))
        }
        async fn make_directory(&self, path: &str) -> ProtocolResult<()> {
            self.tree.dirs.lock().unwrap().insert(path.to_string());
            Ok(())
        }
        async fn upload_file(&self, local: &Path, remote: &str) -> ProtocolResult<u64> {
            let data = std::fs::read(local).map_err(|e| ProtocolError::LocalFile(e.to_string()))?;
            let len = data.len() as u64;
            self.tree.files.lock().unwrap().insert(remote.to_string(), data);
            Ok(len)
        }
        async fn list(&self, path: &str) -> ProtocolResult<Vec<RemoteEntry>> {
            let base = if path.is_empty() { "/".to_string() } else { path.to_string() };
            let prefix = if base == "/" { base.clone() } else { format!("{base}/") };
            let direct = |p: &String| {
                p.strip_prefix(&prefix)
                    .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                    .map(str::to_string)
            };
            let mut entries: Vec<RemoteEntry> = self
                .tree
                .dirs
                .lock()
                .unwrap()
                .iter()
                .filter_map(direct)
                .map(|name| RemoteEntry { name, is_directory: true, size: 0, modified: None })
                .collect();
            entries.extend(self.tree.files.lock().unwrap().iter().filter_map(|(p, data)| {
                direct(p).map(|name| RemoteEntry {
                    name,
                    is_directory: false,
                    size: data.len() as u64,
                    modified: None,
                })
            }));
            Ok(entries)
        }
    }

    struct FakeTransferConnector {
        tree: Arc<RemoteTree>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl Connector<dyn FileTransferSession> for FakeTransferConnector {
        async fn connect(
            &self,
            params: &ConnectParams,
        ) -> ProtocolResult<Arc<dyn FileTransferSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if params.password.expose_secret() != "files" {
                return Err(ProtocolError::Auth("530 Login incorrect".into()));
            }
            Ok(Arc::new(FakeTransfer {
                id: next_session_id(),
                tree: Arc::clone(&self.tree),
            }))
        }
    }

    struct Harness {
        fleet: Arc<FleetManager>,
        rcon: Arc<FakeRconConnector>,
        sftp_tree: Arc<RemoteTree>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path().join("config"), dir.path().join("data"));
        let rcon = Arc::new(FakeRconConnector::default());
        let sftp_tree = Arc::new(RemoteTree::default());
        let backends = Backends::network(&paths)
            .with_key_store(Arc::new(StaticKeyStore::new([9; 32])))
            .with_rcon(Arc::clone(&rcon) as Arc<dyn Connector<dyn CommandSession>>)
            .with_query(Arc::new(FakeInfoConnector))
            .with_ftp(Arc::new(FakeTransferConnector {
                tree: Arc::new(RemoteTree::default()),
                connects: AtomicUsize::new(0),
            }))
            .with_sftp(Arc::new(FakeTransferConnector {
                tree: Arc::clone(&sftp_tree),
                connects: AtomicUsize::new(0),
            }))
            .with_probe(Arc::new(UpProbe));
        let mut settings = AppSettings::default();
        settings.connection.retry_attempts = 1;
        let fleet = FleetManager::open(settings, &paths, backends).await.unwrap();
        Harness {
            fleet: Arc::new(fleet),
            rcon,
            sftp_tree,
            _dir: dir,
        }
    }

    fn server(label: &str, ip: &str, password: &str) -> EndpointEdit {
        EndpointEdit {
            label: Some(label.into()),
            ip_address: Some(ip.into()),
            rcon_password: Some(SecretString::from(password.to_string())),
            ..EndpointEdit::default()
        }
    }

    #[tokio::test]
    async fn test_add_persists_sealed_secret() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "hunter2")).await.unwrap();

        let on_disk = std::fs::read_to_string(h.fleet.config_path()).unwrap();
        assert!(on_disk.contains("\"name\": \"Alpha\""));
        assert!(!on_disk.contains("hunter2"));

        let endpoint = h.fleet.get(id).await.unwrap().snapshot().await;
        assert_eq!(endpoint.rcon_password(h.fleet.vault()).expose_secret(), "hunter2");
        assert_eq!(h.fleet.secret_status().await.sealed, 1);
    }

    #[tokio::test]
    async fn test_add_rejects_missing_address() {
        let h = harness().await;
        let err = h.fleet.add_endpoint(EndpointEdit::default()).await.unwrap_err();
        assert!(matches!(err, SourceMgrError::Config(ConfigError::Invalid(_))));
        assert!(h.fleet.is_empty().await);
    }

    #[tokio::test]
    async fn test_execute_reuses_session() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();

        assert_eq!(h.fleet.execute_command(id, "echo 1").await, "pw ran echo 1");
        assert_eq!(h.fleet.execute_command(id, "echo 2").await, "pw ran echo 2");
        assert_eq!(h.rcon.connects.load(Ordering::SeqCst), 1);
        assert_eq!(h.fleet.pool_stats().rcon.reuses, 1);
    }

    #[tokio::test]
    async fn test_execute_reports_errors_as_text() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "wrong")).await.unwrap();
        assert_eq!(
            h.fleet.execute_command(id, "status").await,
            "RCON Error: Authentication failed: bad rcon password"
        );
        assert!(
            h.fleet
                .execute_command(Uuid::new_v4(), "status")
                .await
                .starts_with("RCON Error: Endpoint not found")
        );
    }

    #[tokio::test]
    async fn test_fatal_error_evicts_session() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();
        assert!(h.fleet.try_execute(id, "drop").await.is_err());
        assert_eq!(h.fleet.open_sessions().await, 0);
        assert!(h.fleet.try_execute(id, "echo").await.is_ok());
        assert_eq!(h.rcon.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_typed_status() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();
        let report: StatusReport = h.fleet.try_execute_typed(id, "status").await.unwrap();
        assert_eq!(report.hostname, "Fake Arena");
        assert_eq!(report.map, "de_dust2");
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failures() {
        let h = harness().await;
        let a = h.fleet.add_endpoint(server("A", "10.0.0.1", "pw")).await.unwrap();
        let b = h.fleet.add_endpoint(server("B", "down.example", "pw")).await.unwrap();
        let c = h.fleet.add_endpoint(server("C", "10.0.0.3", "pw")).await.unwrap();

        let outcomes = h.fleet.execute_on(&[a, b, c], "say hi").await;
        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].message().starts_with("RCON Error: Connection to down.example"));
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn test_remove_keeps_shared_session() {
        let h = harness().await;
        let a = h.fleet.add_endpoint(server("A", "10.0.0.1", "pw")).await.unwrap();
        let b = h.fleet.add_endpoint(server("B", "10.0.0.1", "pw")).await.unwrap();
        h.fleet.try_execute(a, "x").await.unwrap();

        h.fleet.remove_endpoint(a).await.unwrap();
        assert_eq!(h.fleet.open_sessions().await, 1);

        h.fleet.remove_endpoint(b).await.unwrap();
        assert_eq!(h.fleet.open_sessions().await, 0);
        assert!(matches!(
            h.fleet.remove_endpoint(b).await,
            Err(SourceMgrError::EndpointNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_password_evicts_session() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("A", "10.0.0.1", "pw")).await.unwrap();
        h.fleet.try_execute(id, "x").await.unwrap();

        let edit = EndpointEdit {
            rcon_password: Some(SecretString::from("pw2".to_string())),
            ..EndpointEdit::default()
        };
        assert!(h.fleet.update_endpoint(id, edit).await.unwrap());
        assert_eq!(h.fleet.open_sessions().await, 0);
        assert_eq!(h.fleet.execute_command(id, "x").await, "pw2 ran x");

        let relabel = EndpointEdit {
            label: Some("Renamed".into()),
            ..EndpointEdit::default()
        };
        assert!(h.fleet.update_endpoint(id, relabel).await.unwrap());
        assert_eq!(h.fleet.open_sessions().await, 1);
        assert!(!h.fleet.update_endpoint(id, EndpointEdit::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_moving_endpoint_forgets_learned_hostname() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("A", "10.0.0.1", "pw")).await.unwrap();
        h.fleet.refresh(id).await.unwrap();
        let endpoint = h.fleet.get(id).await.unwrap();
        assert_eq!(endpoint.snapshot().await.display_name(), "Queried Name");

        let relabel = EndpointEdit {
            label: Some("B".into()),
            ..EndpointEdit::default()
        };
        h.fleet.update_endpoint(id, relabel).await.unwrap();
        assert_eq!(endpoint.snapshot().await.display_name(), "Queried Name");

        let moved = EndpointEdit {
            ip_address: Some("10.0.0.2".into()),
            ..EndpointEdit::default()
        };
        h.fleet.update_endpoint(id, moved).await.unwrap();
        let snapshot = endpoint.snapshot().await;
        assert_eq!(snapshot.learned_hostname(), None);
        assert_eq!(snapshot.display_name(), "B");
    }

    #[tokio::test]
    async fn test_find_by_name_and_prefix() {
        let h = harness().await;
        let a = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();
        h.fleet.add_endpoint(server("Twin", "10.0.0.2", "pw")).await.unwrap();
        h.fleet.add_endpoint(server("twin", "10.0.0.3", "pw")).await.unwrap();

        assert_eq!(h.fleet.find("alpha").await.unwrap().id(), a);
        assert_eq!(h.fleet.find(&a.to_string()).await.unwrap().id(), a);
        assert_eq!(h.fleet.find(&a.to_string()[..8]).await.unwrap().id(), a);
        assert!(matches!(h.fleet.find("TWIN").await, Err(SourceMgrError::AmbiguousEndpoint(_))));
        assert!(matches!(h.fleet.find("nope").await, Err(SourceMgrError::EndpointNotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_copies_credentials() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();
        let copy = h.fleet.duplicate_endpoint(id).await.unwrap();
        let snapshot = h.fleet.get(copy).await.unwrap().snapshot().await;
        assert_eq!(snapshot.label, "Alpha (Copy)");
        assert_eq!(snapshot.rcon_password(h.fleet.vault()).expose_secret(), "pw");
        assert_eq!(h.fleet.len().await, 2);
    }

    #[tokio::test]
    async fn test_sftp_upload_and_listing() {
        let h = harness().await;
        let edit = EndpointEdit {
            ftp_protocol: Some(FileTransferProtocol::Sftp),
            ftp_username: Some("steam".into()),
            ftp_password: Some(SecretString::from("files".to_string())),
            ftp_root_directory: Some("/srv/game".into()),
            ..server("Alpha", "10.0.0.1", "pw")
        };
        let id = h.fleet.add_endpoint(edit).await.unwrap();

        let local_dir = tempfile::tempdir().unwrap();
        let local = local_dir.path().join("server.cfg");
        std::fs::write(&local, b"hostname test").unwrap();

        let remote = h.fleet.suggest_remote_path(id, &local).await.unwrap();
        assert_eq!(remote, "/srv/game/server.cfg");
        assert_eq!(
            h.fleet.upload(id, &local, "\\srv\\game\\cfg\\server.cfg").await,
            "File uploaded successfully to /srv/game/cfg/server.cfg"
        );
        assert!(h.sftp_tree.dirs.lock().unwrap().contains("/srv/game/cfg"));

        let listing = h.fleet.list_directory(id, "/srv/game/cfg").await;
        assert!(listing.starts_with("Directory listing for /srv/game/cfg:\n"));
        assert!(listing.contains("[FILE] server.cfg - -"));

        assert_eq!(
            h.fleet.create_directory(id, "/srv/game/maps").await,
            "Directory created: /srv/game/maps"
        );
        let entries = h.fleet.list_entries(id, "/srv/game").await.unwrap();
        assert_eq!(entries[0].name, "cfg");
        assert!(entries.iter().all(|e| e.is_directory));
    }

    #[tokio::test]
    async fn test_transfer_errors_are_prefixed() {
        let h = harness().await;
        let id = h.fleet.add_endpoint(server("Alpha", "10.0.0.1", "pw")).await.unwrap();
        let message = h.fleet.create_directory(id, "/x").await;
        assert_eq!(message, "FTP Error: Authentication failed: 530 Login incorrect");

        let missing = h.fleet.upload(id, Path::new("/no/such/file.cfg"), "/x").await;
        assert!(missing.starts_with("FTP Error: Local file error:"));
    }

    #[tokio::test]
    async fn test_upload_tree_keeps_layout() {
        let h = harness().await;
        let edit = EndpointEdit {
            ftp_protocol: Some(FileTransferProtocol::Sftp),
            ftp_password: Some(SecretString::from("files".to_string())),
            ..server("Alpha", "10.0.0.1", "pw")
        };
        let id = h.fleet.add_endpoint(edit).await.unwrap();

        let local = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(local.path().join("maps/workshop")).unwrap();
        std::fs::write(local.path().join("a.cfg"), b"12345").unwrap();
        std::fs::write(local.path().join("maps/workshop/b.bsp"), b"123").unwrap();

        let report = h.fleet.upload_tree(id, local.path(), "/upload").await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.files, 2);
        assert_eq!(report.bytes, 8);

        let files = h.sftp_tree.files.lock().unwrap();
        assert!(files.contains_key("/upload/a.cfg"));
        assert!(files.contains_key("/upload/maps/workshop/b.bsp"));
    }

    #[tokio::test]
    async fn test_refresh_adopts_and_persists_hostname() {
        let h = harness().await;
        let edit = EndpointEdit {
            ip_address: Some("10.0.0.1".into()),
            ..EndpointEdit::default()
        };
        let id = h.fleet.add_endpoint(edit).await.unwrap();

        let summary = h.fleet.refresh_all().await.unwrap();
        assert!(summary.all_online());
        let on_disk = std::fs::read_to_string(h.fleet.config_path()).unwrap();
        assert!(on_disk.contains("Queried Name"));

        let result = h.fleet.refresh(id).await.unwrap();
        assert_eq!(result.status.player_map_info(), "4/12 - cs_office");
    }

    #[tokio::test]
    async fn test_auto_refresh_and_shutdown() {
        let h = harness().await;
        h.fleet.add_endpoint(server("A", "10.0.0.1", "pw")).await.unwrap();
        h.fleet.try_execute(h.fleet.endpoints().await[0].id(), "x").await.unwrap();

        let mut rx = h.fleet.start_auto_refresh(Duration::from_secs(60)).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.online, 1);
        assert!(h.fleet.is_auto_refreshing().await);

        let closed = h.fleet.shutdown().await.unwrap();
        assert_eq!(closed, 2);
        assert!(!h.fleet.is_auto_refreshing().await);
        assert_eq!(h.fleet.open_sessions().await, 0);
        assert!(rx.recv().await.is_none());
    }
}
