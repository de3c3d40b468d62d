//! Property-based tests for application settings

use std::path::Path;

use proptest::prelude::*;
use sourcemgr_core::AppSettings;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Settings with in-range values survive a TOML round trip unchanged
    #[test]
    fn prop_settings_toml_round_trip(
        interval in 1u64..3600,
        concurrency in 1usize..64,
        retries in 0u32..10,
    ) {
        let mut settings = AppSettings::default();
        settings.polling.interval_secs = interval;
        settings.polling.concurrency = concurrency;
        settings.connection.retry_attempts = retries;

        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed = AppSettings::from_toml(&text, Path::new("settings.toml")).unwrap();
        prop_assert_eq!(parsed, settings);
    }

    /// A zero polling interval is always rejected
    #[test]
    fn prop_zero_interval_rejected(concurrency in 1usize..64) {
        let mut settings = AppSettings::default();
        settings.polling.interval_secs = 0;
        settings.polling.concurrency = concurrency;
        prop_assert!(settings.validate().is_err());
    }
}
