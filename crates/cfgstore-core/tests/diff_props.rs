//! Property tests tying the live change log to the full snapshot diff
//!
//! Run with: cargo test --package cfgstore-core --test diff_props

use cfgstore_core::{full_diff, StoredConfigurationModifier};
use cfgstore_model::value::StringValue;
use cfgstore_test_utils::{sample_config, setting_key};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn diff_and_change_log_agree(first in "[A-Za-z0-9]{1,40}", second in "[A-Za-z0-9]{1,40}") {
        let base = sample_config();
        let title = setting_key(&base, "display.title", None);
        let modifier = StoredConfigurationModifier::new(base.clone());

        modifier.write_setting(&title, StringValue::new(first.as_str()).into_ref(), None).unwrap();
        modifier.write_setting(&title, StringValue::new(second.as_str()).into_ref(), None).unwrap();

        let diff = full_diff(&base, &modifier.snapshot());
        let changed = second != "Acme Self Service";
        prop_assert_eq!(diff.contains(&title), changed);
        prop_assert_eq!(modifier.changed_keys().contains(&title), changed);
        prop_assert_eq!(diff.len(), usize::from(changed));
    }

    #[test]
    fn writing_back_the_original_is_clean(other in "[A-Za-z0-9]{1,40}") {
        let base = sample_config();
        let title = setting_key(&base, "display.title", None);
        let modifier = StoredConfigurationModifier::new(base);

        modifier.write_setting(&title, StringValue::new(other.as_str()).into_ref(), None).unwrap();
        modifier.write_setting(&title, StringValue::new("Acme Self Service").into_ref(), None).unwrap();

        prop_assert!(!modifier.is_modified());
        prop_assert!(full_diff(modifier.base(), &modifier.snapshot()).is_empty());
    }
}
