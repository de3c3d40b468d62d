//! Property-based tests for legacy secret migration

use proptest::prelude::*;
use secrecy::ExposeSecret;
use sourcemgr_core::{CredentialVault, Endpoint, StaticKeyStore, migrate_endpoints};

/// Strategy for one legacy record: label, RCON password, FTP password.
/// Empty passwords are allowed and must stay empty.
fn arb_legacy() -> impl Strategy<Value = (String, String, String)> {
    ("[A-Za-z ]{1,12}", "[ -~]{0,16}", "[ -~]{0,16}")
}

fn legacy_endpoint(label: &str, rcon: &str, ftp: &str) -> Endpoint {
    serde_json::from_value(serde_json::json!({
        "name": label,
        "ipAddress": "10.0.0.1",
        "rconPassword": rcon,
        "ftpPassword": ftp,
    }))
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After migration every secret is sealed or empty, reveals to its
    /// original value, and a second pass changes nothing
    #[test]
    fn prop_migration_seals_and_is_idempotent(records in prop::collection::vec(arb_legacy(), 0..6)) {
        let vault = CredentialVault::open(&StaticKeyStore::new([3; 32]));
        let mut endpoints: Vec<Endpoint> = records
            .iter()
            .map(|(label, rcon, ftp)| legacy_endpoint(label, rcon, ftp))
            .collect();

        let first = migrate_endpoints(&vault, &mut endpoints);
        prop_assert_eq!(first.examined, records.len());
        prop_assert!(first.failures.is_empty());

        let expected_resealed = records
            .iter()
            .map(|(_, rcon, ftp)| usize::from(!rcon.is_empty()) + usize::from(!ftp.is_empty()))
            .sum::<usize>();
        prop_assert_eq!(first.resealed, expected_resealed);

        for (endpoint, (_, rcon, ftp)) in endpoints.iter().zip(&records) {
            let stored = endpoint.stored_rcon_password().as_stored();
            prop_assert_eq!(stored.is_empty(), rcon.is_empty());
            prop_assert!(stored.is_empty() || vault.is_sealed(stored));
            let rcon_secret = endpoint.rcon_password(&vault);
            prop_assert_eq!(rcon_secret.expose_secret(), rcon.as_str());
            let ftp_secret = endpoint.ftp_password(&vault);
            prop_assert_eq!(ftp_secret.expose_secret(), ftp.as_str());
        }

        let snapshot = endpoints.clone();
        let second = migrate_endpoints(&vault, &mut endpoints);
        prop_assert_eq!(second.modified, 0);
        prop_assert_eq!(second.resealed, 0);
        prop_assert_eq!(endpoints, snapshot);
    }
}
