//! Property-based tests for remote path handling

use proptest::prelude::*;
use sourcemgr_core::protocol::{join_remote, normalize_path, parent_directory};

/// Strategy for user-typed remote paths mixing both separator styles
fn arb_remote_path() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z0-9_.]{1,8}",
            Just("/".to_string()),
            Just("\\".to_string()),
            Just("//".to_string()),
        ],
        0..10,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Normalized paths use only `/`, never repeat it and never end in it
    /// unless they are the root
    #[test]
    fn prop_normalize_path_shape(path in arb_remote_path()) {
        let normalized = normalize_path(&path);
        prop_assert!(!normalized.contains('\\'));
        prop_assert!(!normalized.contains("//"));
        prop_assert!(normalized == "/" || !normalized.ends_with('/'));
    }

    /// Normalizing twice gives the same result as normalizing once
    #[test]
    fn prop_normalize_path_idempotent(path in arb_remote_path()) {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once.clone());
    }

    /// Absolute paths stay absolute
    #[test]
    fn prop_normalize_keeps_leading_separator(path in arb_remote_path()) {
        let absolute = format!("/{path}");
        prop_assert!(normalize_path(&absolute).starts_with('/'));
    }

    /// The parent of a joined path is the base it was joined to
    #[test]
    fn prop_join_then_parent(base in "(/[a-z]{1,6}){1,4}", name in "[a-z0-9_.]{1,8}") {
        let joined = join_remote(&base, &name);
        prop_assert_eq!(parent_directory(&joined), Some(base.clone()));
        prop_assert!(joined.ends_with(&name));
    }
}
