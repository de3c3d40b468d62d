//! Fleet manager end to end over in-memory backends

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sourcemgr_core::{
    AppSettings, Backends, CommandSession, ConfigPaths, Connector, EndpointEdit,
    FileTransferProtocol, FileTransferSession, FleetManager, StaticKeyStore, StatusTier,
    format_broadcast,
};

use super::support::{EchoConnector, ListProbe, StaticInfoConnector, TreeConnector};

struct TestFleet {
    fleet: Arc<FleetManager>,
    rcon: Arc<EchoConnector>,
    ftp: Arc<TreeConnector>,
    paths: ConfigPaths,
    _dir: tempfile::TempDir,
}

fn backends(paths: &ConfigPaths, down: &[&str]) -> (Backends, Arc<EchoConnector>, Arc<TreeConnector>) {
    let rcon = Arc::new(EchoConnector::default());
    let ftp = Arc::new(TreeConnector::default());
    let backends = Backends::network(paths)
        .with_key_store(Arc::new(StaticKeyStore::new([42; 32])))
        .with_rcon(Arc::clone(&rcon) as Arc<dyn Connector<dyn CommandSession>>)
        .with_query(Arc::new(StaticInfoConnector))
        .with_ftp(Arc::clone(&ftp) as Arc<dyn Connector<dyn FileTransferSession>>)
        .with_sftp(Arc::new(TreeConnector::default()))
        .with_probe(Arc::new(ListProbe::down(down)));
    (backends, rcon, ftp)
}

async fn open(dir: tempfile::TempDir, down: &[&str]) -> TestFleet {
    let paths = ConfigPaths::new(dir.path().join("config"), dir.path().join("data"));
    let (backends, rcon, ftp) = backends(&paths, down);
    let mut settings = AppSettings::default();
    settings.connection.retry_attempts = 1;
    let fleet = FleetManager::open(settings, &paths, backends).await.unwrap();
    TestFleet {
        fleet: Arc::new(fleet),
        rcon,
        ftp,
        paths,
        _dir: dir,
    }
}

fn endpoint(label: &str, ip: &str) -> EndpointEdit {
    EndpointEdit {
        label: Some(label.into()),
        ip_address: Some(ip.into()),
        rcon_password: Some(SecretString::from("secret".to_string())),
        ftp_username: Some("steam".into()),
        ftp_password: Some(SecretString::from("files".to_string())),
        ..EndpointEdit::default()
    }
}

#[tokio::test]
async fn legacy_configuration_is_migrated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(
        config.join("servers.json"),
        r#"[{"name":"Old","ipAddress":"10.0.0.9","rconPort":27015,"rconPassword":"hunter2"}]"#,
    )
    .unwrap();

    let t = open(dir, &[]).await;
    assert_eq!(t.fleet.load_report().resealed, 1);

    let on_disk = std::fs::read_to_string(t.paths.servers_file()).unwrap();
    assert!(!on_disk.contains("hunter2"));

    let status = t.fleet.secret_status().await;
    assert_eq!(status.sealed, 1);
    assert_eq!(status.plaintext, 0);

    let old = t.fleet.find("old").await.unwrap().snapshot().await;
    assert_eq!(old.rcon_password(t.fleet.vault()).expose_secret(), "hunter2");
}

#[tokio::test]
async fn endpoints_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let t = open(dir, &[]).await;
    t.fleet.add_endpoint(endpoint("Alpha", "10.0.0.1")).await.unwrap();
    t.fleet.add_endpoint(endpoint("Beta", "10.0.0.2")).await.unwrap();
    let paths = t.paths.clone();
    t.fleet.shutdown().await.unwrap();

    let (backends, _, _) = backends(&paths, &[]);
    let reopened = FleetManager::open(AppSettings::default(), &paths, backends)
        .await
        .unwrap();
    let names: Vec<String> = {
        let mut names = Vec::new();
        for endpoint in reopened.endpoints().await {
            names.push(endpoint.snapshot().await.label);
        }
        names
    };
    assert_eq!(names, ["Alpha", "Beta"]);
    assert!(root.join("config").join("servers.json").exists());
}

#[tokio::test]
async fn broadcast_reuses_sessions_per_endpoint() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    let a = t.fleet.add_endpoint(endpoint("Alpha", "10.0.0.1")).await.unwrap();
    let b = t.fleet.add_endpoint(endpoint("Beta", "10.0.0.2")).await.unwrap();

    for _ in 0..3 {
        let outcomes = t.fleet.execute_on(&[a, b], "sv_cheats 0").await;
        assert!(outcomes.iter().all(|o| o.is_ok()));
    }
    assert_eq!(t.rcon.connects(), 2);

    let outcomes = t.fleet.execute_on(&[a, b], "status").await;
    let text = format_broadcast(&outcomes);
    assert!(text.contains("=== Alpha ===\n> status"));
    assert!(text.contains("=== Beta ===\n> status"));
}

#[tokio::test]
async fn directory_creation_is_idempotent() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    let id = t.fleet.add_endpoint(endpoint("Alpha", "10.0.0.1")).await.unwrap();

    assert_eq!(
        t.fleet.create_directory(id, "/srv/csgo/cfg").await,
        "Directory created: /srv/csgo/cfg"
    );
    let after_first = t.ftp.tree.mkdir_calls.load(Ordering::SeqCst);
    assert_eq!(
        t.fleet.create_directory(id, "/srv/csgo/cfg").await,
        "Directory created: /srv/csgo/cfg"
    );
    assert_eq!(t.ftp.tree.mkdir_calls.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn relative_directories_start_at_working_directory() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    let id = t.fleet.add_endpoint(endpoint("Alpha", "10.0.0.1")).await.unwrap();

    t.fleet.try_create_directory(id, "addons\\sourcemod").await.unwrap();
    assert!(t.ftp.tree.has_dir("/home/steam/addons"));
    assert!(t.ftp.tree.has_dir("/home/steam/addons/sourcemod"));

    let listing = t.fleet.list_directory(id, "").await;
    assert!(listing.starts_with("Directory listing for /home/steam:\n"));
    assert!(listing.contains("[DIR] addons"));
}

#[tokio::test]
async fn root_directory_is_applied_on_connect() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    t.ftp.tree.dirs.lock().unwrap().insert("/srv".into());
    let edit = EndpointEdit {
        ftp_root_directory: Some("/srv".into()),
        ..endpoint("Alpha", "10.0.0.1")
    };
    let id = t.fleet.add_endpoint(edit).await.unwrap();

    let local = tempfile::tempdir().unwrap();
    let file = local.path().join("motd.txt");
    std::fs::write(&file, b"welcome").unwrap();

    let remote = t.fleet.suggest_remote_path(id, &file).await.unwrap();
    assert_eq!(remote, "/srv/motd.txt");
    t.fleet.try_upload(id, &file, "motd.txt").await.unwrap();
    assert_eq!(t.ftp.tree.file("/srv/motd.txt").unwrap(), b"welcome");
}

#[tokio::test]
async fn missing_credentials_surface_as_ftp_error() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    let edit = EndpointEdit {
        ftp_username: Some(String::new()),
        ..endpoint("Alpha", "10.0.0.1")
    };
    let id = t.fleet.add_endpoint(edit).await.unwrap();
    assert_eq!(
        t.fleet.list_directory(id, "/").await,
        "FTP Error: Authentication failed: 530 Login incorrect"
    );

    let sftp = EndpointEdit {
        ftp_protocol: Some(FileTransferProtocol::Sftp),
        ..EndpointEdit::default()
    };
    t.fleet.update_endpoint(id, sftp).await.unwrap();
    assert!(t.fleet.list_directory(id, "/").await.starts_with("SFTP Error: "));
}

#[tokio::test]
async fn refresh_all_isolates_unreachable_endpoint() {
    let t = open(tempfile::tempdir().unwrap(), &["10.0.0.3"]).await;
    for (label, ip) in [("A", "10.0.0.1"), ("B", "10.0.0.2"), ("C", "10.0.0.3")] {
        t.fleet.add_endpoint(endpoint(label, ip)).await.unwrap();
    }

    let summary = t.fleet.refresh_all().await.unwrap();
    let tiers: Vec<_> = summary.results.iter().map(|r| r.tier()).collect();
    assert_eq!(tiers, [StatusTier::Online, StatusTier::Online, StatusTier::Offline]);
    assert_eq!(summary.results[0].name, "10.0.0.1 server");
}

#[tokio::test]
async fn shutdown_drains_every_pool() {
    let t = open(tempfile::tempdir().unwrap(), &[]).await;
    let id = t.fleet.add_endpoint(endpoint("Alpha", "10.0.0.1")).await.unwrap();
    t.fleet.try_execute(id, "status").await.unwrap();
    t.fleet.try_create_directory(id, "/x").await.unwrap();
    t.fleet.refresh(id).await.unwrap();
    assert_eq!(t.fleet.open_sessions().await, 3);

    let _summaries = t.fleet.start_auto_refresh(Duration::from_secs(3600)).await;
    let closed = t.fleet.shutdown().await.unwrap();
    assert_eq!(closed, 3);
    assert_eq!(t.fleet.open_sessions().await, 0);
    assert!(t.rcon.last_session().disconnected.load(Ordering::SeqCst));
    assert!(!t.fleet.is_auto_refreshing().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_refresh_runs_on_worker_threads() {
    let t = open(tempfile::tempdir().unwrap(), &["10.0.0.2"]).await;
    t.fleet.add_endpoint(endpoint("A", "10.0.0.1")).await.unwrap();
    t.fleet.add_endpoint(endpoint("B", "10.0.0.2")).await.unwrap();

    let fleet = Arc::clone(&t.fleet);
    let spawned = tokio::spawn(async move { fleet.refresh_all().await });
    let summary = spawned.await.unwrap().unwrap();
    assert_eq!((summary.online, summary.offline), (1, 1));

    let mut summaries = t.fleet.start_auto_refresh(Duration::from_secs(3600)).await;
    let first = tokio::time::timeout(Duration::from_secs(5), summaries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(first.online, 1);

    t.fleet.shutdown().await.unwrap();
    assert!(summaries.recv().await.is_none());
}
