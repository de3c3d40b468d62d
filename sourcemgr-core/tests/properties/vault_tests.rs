//! Property-based tests for the credential vault

use proptest::prelude::*;
use secrecy::ExposeSecret;
use sourcemgr_core::{CredentialVault, StaticKeyStore};

fn vault(seed: u8) -> CredentialVault {
    CredentialVault::open(&StaticKeyStore::new([seed; 32]))
}

/// Strategy for secrets as users type them, including non-ASCII text
fn arb_secret() -> impl Strategy<Value = String> {
    "\\PC{1,48}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sealing then unsealing returns the original secret
    #[test]
    fn prop_seal_unseal_preserves_secret(secret in arb_secret()) {
        let vault = vault(7);
        let sealed = vault.seal(&secret).unwrap();
        prop_assert_ne!(&sealed, &secret);
        prop_assert!(vault.is_sealed(&sealed));
        let unsealed = vault.unseal(&sealed);
        prop_assert_eq!(unsealed.expose_secret(), secret.as_str());
    }

    /// Two seals of the same secret never produce the same text
    #[test]
    fn prop_sealing_uses_fresh_nonce(secret in arb_secret()) {
        let vault = vault(7);
        let first = vault.seal(&secret).unwrap();
        let second = vault.seal(&secret).unwrap();
        prop_assert_ne!(first, second);
    }

    /// Values sealed under one key are legacy plaintext to another
    #[test]
    fn prop_foreign_key_cannot_unseal(secret in arb_secret()) {
        let sealed = vault(1).seal(&secret).unwrap();
        let other = vault(2);
        prop_assert!(!other.is_sealed(&sealed));
        let unsealed = other.unseal(&sealed);
        prop_assert_eq!(unsealed.expose_secret(), "");
    }

    /// Short typed passwords are never mistaken for sealed values
    #[test]
    fn prop_plaintext_is_not_sealed(secret in "[a-zA-Z0-9!@#$%^&*]{1,24}") {
        let vault = vault(7);
        prop_assert!(!vault.is_sealed(&secret));
        let stored = sourcemgr_core::StoredSecret::from_stored(secret.clone());
        let revealed = vault.reveal(&stored);
        prop_assert_eq!(revealed.expose_secret(), secret.as_str());
    }
}
