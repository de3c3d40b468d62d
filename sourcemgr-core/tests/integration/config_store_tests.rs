//! Endpoint persistence with sealed secrets

use secrecy::ExposeSecret;
use sourcemgr_core::{ConfigStore, CredentialVault, Endpoint, MachineKeyStore};

fn vault_in(dir: &std::path::Path) -> CredentialVault {
    CredentialVault::open(&MachineKeyStore::with_identity(
        dir,
        "test-machine",
        "test-user",
    ))
}

#[tokio::test]
async fn saved_password_is_sealed_on_disk_and_readable_after_load() {
    let dir = tempfile::tempdir().unwrap();
    let vault = vault_in(&dir.path().join("data"));
    let store = ConfigStore::new(dir.path().join("servers.json"));

    let mut endpoint = Endpoint::new("Arena", "10.0.0.5", 27015);
    endpoint.set_rcon_password(&vault, "secret");
    store.save(&[endpoint]).await.unwrap();

    let loaded = store.load(&vault).await.unwrap();
    let endpoint = &loaded.endpoints[0];
    assert_ne!(endpoint.stored_rcon_password().as_stored(), "secret");
    assert!(vault.is_sealed(endpoint.stored_rcon_password().as_stored()));
    assert_eq!(endpoint.rcon_password(&vault).expose_secret(), "secret");
    assert!(!loaded.persisted);
}

#[tokio::test]
async fn legacy_plaintext_is_resealed_and_persisted_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.json");
    std::fs::write(
        &path,
        r#"[
  {
    "name": "Legacy",
    "ipAddress": "10.0.0.9",
    "rconPort": 27015,
    "rconPassword": "hunter2",
    "ftpHost": "",
    "ftpPort": 21,
    "ftpUsername": "steam",
    "ftpPassword": "files",
    "ftpRootDirectory": "",
    "ftpProtocol": 0
  }
]"#,
    )
    .unwrap();

    let vault = vault_in(&dir.path().join("data"));
    let store = ConfigStore::new(&path);

    let first = store.load(&vault).await.unwrap();
    assert!(first.persisted);
    assert_eq!(first.migration.modified, 1);
    assert_eq!(first.migration.resealed, 2);

    let endpoint = &first.endpoints[0];
    assert!(vault.is_sealed(endpoint.stored_rcon_password().as_stored()));
    assert_eq!(endpoint.rcon_password(&vault).expose_secret(), "hunter2");
    assert_eq!(endpoint.ftp_password(&vault).expose_secret(), "files");

    let after_first = std::fs::read_to_string(&path).unwrap();
    assert!(!after_first.contains("hunter2"));
    assert!(after_first.contains("\"ftpProtocol\": \"FTP\""));

    // A second pass finds nothing to do and leaves the file untouched
    let second = store.load(&vault).await.unwrap();
    assert!(!second.persisted);
    assert_eq!(second.migration.modified, 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
}

#[tokio::test]
async fn sealed_values_do_not_open_on_another_machine() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let here = vault_in(&data);
    let elsewhere = CredentialVault::open(&MachineKeyStore::with_identity(
        &data,
        "other-machine",
        "test-user",
    ));

    let sealed = here.seal("secret").unwrap();
    assert!(here.is_sealed(&sealed));
    assert!(!elsewhere.is_sealed(&sealed));
    assert_eq!(elsewhere.unseal(&sealed).expose_secret(), "");
}

#[cfg(unix)]
#[tokio::test]
async fn key_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let vault = vault_in(&data);
    assert!(vault.is_available());

    let mode = std::fs::metadata(data.join(sourcemgr_core::secret::KEY_FILE_NAME))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
