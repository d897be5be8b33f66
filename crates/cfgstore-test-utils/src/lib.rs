//! Testing utilities for the cfgstore workspace
//!
//! Shared catalog fixture, snapshot builders and key helpers.

#![allow(missing_docs)]

use cfgstore_core::{StoredConfiguration, StoredConfigurationModifier};
use cfgstore_model::value::{FileAttachment, FileValue, PasswordValue, StringArrayValue, StringValue};
use cfgstore_model::{Catalog, ConfigKey, DomainId, ProfileId, SyntaxRegistry, UserIdentity};
use std::collections::BTreeMap;
use std::sync::Arc;

/// JSON source of the test catalog
pub const CATALOG_JSON: &str = include_str!("../fixtures/catalog.json");

/// Fixed create time so encrypted values are reproducible across runs
pub const CREATE_TIME: &str = "2024-03-01T12:00:00Z";

pub fn test_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_json(CATALOG_JSON).unwrap())
}

pub fn test_registry() -> Arc<SyntaxRegistry> {
    Arc::new(SyntaxRegistry::with_defaults())
}

pub fn empty_config() -> StoredConfiguration {
    StoredConfiguration::builder(test_catalog(), test_registry())
        .create_time(CREATE_TIME)
        .build()
        .unwrap()
}

pub fn admin() -> UserIdentity {
    UserIdentity::new("admin")
}

/// Key of a system-domain setting
pub fn setting_key(config: &StoredConfiguration, name: &str, profile: Option<&str>) -> ConfigKey {
    ConfigKey::for_setting(
        config.catalog(),
        DomainId::system(),
        name,
        profile.map(ProfileId::new),
    )
    .unwrap()
}

pub fn pem_file() -> FileAttachment {
    FileAttachment::new(
        "root-ca.pem",
        "application/x-pem-file",
        b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_vec(),
    )
}

/// A representative configuration touching every syntax family
pub fn sample_config() -> StoredConfiguration {
    let modifier = StoredConfigurationModifier::new(empty_config());
    let snapshot = modifier.snapshot();
    let actor = admin();
    let key = |name: &str, profile: Option<&str>| setting_key(&snapshot, name, profile);

    modifier
        .write_setting(&key("display.title", None), StringValue::new("Acme Self Service").into_ref(), Some(&actor))
        .unwrap();
    modifier
        .write_setting(&key("ldap.profiles", None), Arc::new(StringArrayValue::profiles(["default"])), Some(&actor))
        .unwrap();
    modifier
        .write_setting(
            &key("ldap.serverUrls", Some("default")),
            Arc::new(StringArrayValue::new(["ldaps://dc1.acme.test:636", "ldaps://dc2.acme.test:636"])),
            Some(&actor),
        )
        .unwrap();
    modifier
        .write_setting(
            &key("ldap.proxy.password", Some("default")),
            Arc::new(PasswordValue::new("pr0xy-s3cret")),
            Some(&actor),
        )
        .unwrap();
    modifier
        .write_setting(&key("security.certificates", None), Arc::new(FileValue::single(pem_file())), Some(&actor))
        .unwrap();
    modifier
        .write_config_property(cfgstore_core::property::SCHEMA_VERSION, "5")
        .unwrap();
    modifier
        .write_locale_bundle_map(
            &DomainId::system(),
            "Display",
            "Welcome",
            BTreeMap::from([
                (String::new(), "Welcome to Acme".to_string()),
                ("de".to_string(), "Willkommen bei Acme".to_string()),
            ]),
            Some(&actor),
        )
        .unwrap();

    (*modifier.into_snapshot()).clone()
}
