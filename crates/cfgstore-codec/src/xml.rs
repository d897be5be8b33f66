//! XML document codec
//!
//! Layout is described in [`cfgstore_model::wire`]. Settings are written in
//! canonical key order; deprecated settings are never written. A setting
//! whose value should fall back to its default carries an empty `<default/>`
//! element instead of values.

use crate::codec::{effective_mode, ConfigCodec, ReadContext};
use crate::error::CodecError;
use crate::format::ConfigFormat;
use crate::load::finish_load;
use cfgstore_core::StoredConfiguration;
use cfgstore_model::value::StringValue;
use cfgstore_model::{
    wire, ConfigKey, DecodeContext, DomainId, EncodeContext, EncodingMode, NativeValue, ProfileId,
    RecordType, StoreError, StoreResult, Syntax, UserIdentity, ValueMetaData, ValueSecret,
    XmlDocument, XmlElement, XrefStore,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;

/// Single-document XML format
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl ConfigCodec for XmlCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Xml
    }

    fn read(&self, bytes: &[u8], ctx: &ReadContext) -> StoreResult<StoredConfiguration> {
        let document = XmlDocument::parse_bytes(bytes).map_err(CodecError::from)?;
        decode_document(document, ctx, None)
    }

    fn write(&self, config: &StoredConfiguration, mode: EncodingMode) -> StoreResult<Vec<u8>> {
        let document = encode_document(config, mode, None)?;
        let text = document.to_xml_string().map_err(CodecError::from)?;
        Ok(text.into_bytes())
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::format(format!("invalid timestamp '{text}': {e}")))
}

fn with_metadata(mut element: XmlElement, metadata: Option<&ValueMetaData>) -> XmlElement {
    let Some(metadata) = metadata else {
        return element;
    };
    if let Some(date) = metadata.modify_date {
        element.set_attr(wire::ATTR_MODIFY_TIME, format_time(date));
    }
    if let Some(user) = &metadata.user_identity {
        element.set_attr(wire::ATTR_USER, user.user_id.as_str());
        if let Some(profile) = &user.profile_id {
            element.set_attr(wire::ATTR_USER_PROFILE, profile.as_str());
        }
        if let Some(domain) = &user.domain {
            element.set_attr(wire::ATTR_USER_DOMAIN, domain.as_str());
        }
    }
    element
}

fn read_metadata(element: &XmlElement) -> StoreResult<Option<ValueMetaData>> {
    let modify_date = element.attr(wire::ATTR_MODIFY_TIME).map(parse_time).transpose()?;
    let user_identity = element.attr(wire::ATTR_USER).map(|user| {
        let mut identity = UserIdentity::new(user);
        if let Some(profile) = element.attr(wire::ATTR_USER_PROFILE) {
            identity = identity.with_profile(ProfileId::new(profile));
        }
        if let Some(domain) = element.attr(wire::ATTR_USER_DOMAIN) {
            identity = identity.with_domain(DomainId::new(domain));
        }
        identity
    });
    let metadata = ValueMetaData {
        modify_date,
        user_identity,
    };
    Ok((!metadata.is_empty()).then_some(metadata))
}

fn domain_of(element: &XmlElement) -> DomainId {
    element
        .attr(wire::ATTR_DOMAIN)
        .filter(|d| !d.is_empty())
        .map_or_else(DomainId::system, DomainId::new)
}

fn value_error(key: &ConfigKey, e: cfgstore_model::ValueError) -> StoreError {
    StoreError::validation(key.clone(), e)
}

/// Snapshot → document
pub(crate) fn encode_document(
    config: &StoredConfiguration,
    mode: EncodingMode,
    blobs: Option<&XrefStore>,
) -> StoreResult<XmlDocument> {
    let mode = effective_mode(config, mode);
    let mut ctx = EncodeContext::new(mode, config.secret());
    if let Some(blobs) = blobs {
        ctx = ctx.with_blobs(blobs);
    }
    let catalog = config.catalog();

    let mut root = XmlElement::new(wire::ROOT)
        .with_attr(wire::ATTR_CREATE_TIME, config.create_time())
        .with_attr(wire::ATTR_MODIFY_TIME, format_time(config.modify_time()))
        .with_attr(wire::ATTR_XML_VERSION, wire::XML_VERSION);

    // values plus metadata-only entries left behind by resets
    let mut keys: Vec<ConfigKey> = config
        .stored_keys()
        .chain(config.metadata_keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    ConfigKey::sort(&mut keys, catalog);

    let mut properties = XmlElement::new(wire::PROPERTIES).with_attr(wire::ATTR_TYPE, wire::PROPERTIES_CONFIG);
    let mut settings = XmlElement::new(wire::SETTINGS);
    let mut bundles = Vec::new();
    for key in &keys {
        let value = config.read_stored_value(key);
        let metadata = config.read_metadata(key);
        match key.record_type() {
            RecordType::Property => {
                let Some(NativeValue::String(text)) = value.map(|v| v.to_native()) else {
                    continue;
                };
                properties.push(
                    XmlElement::new(wire::PROPERTY)
                        .with_attr(wire::ATTR_KEY, key.record_id())
                        .with_text(text),
                );
            }
            RecordType::Setting => {
                let Some(def) = catalog.setting(key.record_id()) else {
                    tracing::warn!(%key, "setting unknown to the catalog, not written");
                    continue;
                };
                if def.deprecated {
                    continue;
                }
                let mut element = XmlElement::new(wire::SETTING)
                    .with_attr(wire::ATTR_KEY, key.record_id())
                    .with_attr(wire::ATTR_SYNTAX, def.syntax.as_str())
                    .with_attr(wire::ATTR_DOMAIN, key.domain().as_str());
                if let Some(profile) = key.profile() {
                    element.set_attr(wire::ATTR_PROFILE, profile.as_str());
                }
                element = with_metadata(element, metadata);
                element.push(XmlElement::new(wire::LABEL).with_text(def.label.as_str()));
                let values = match &value {
                    Some(value) => value.to_xml_values(&ctx).map_err(|e| value_error(key, e))?,
                    None => Vec::new(),
                };
                // stripped confidential values read back as defaults
                if values.is_empty() && (value.is_none() || def.is_confidential()) {
                    element.push(XmlElement::new(wire::DEFAULT));
                }
                for v in values {
                    element.push(v);
                }
                settings.push(element);
            }
            RecordType::LocaleBundle => {
                let Some(value) = value else {
                    continue;
                };
                let mut element = XmlElement::new(wire::LOCALE_BUNDLE)
                    .with_attr(wire::ATTR_BUNDLE, key.record_id())
                    .with_attr(wire::ATTR_KEY, key.profile().map(ProfileId::as_str).unwrap_or_default())
                    .with_attr(wire::ATTR_DOMAIN, key.domain().as_str());
                element = with_metadata(element, metadata);
                for v in value.to_xml_values(&ctx).map_err(|e| value_error(key, e))? {
                    element.push(v);
                }
                bundles.push(element);
            }
        }
    }

    root.push(properties);
    root.push(settings);
    for bundle in bundles {
        root.push(bundle);
    }
    Ok(XmlDocument::new(root))
}

/// Document → migrated, validated snapshot
pub(crate) fn decode_document(
    mut document: XmlDocument,
    ctx: &ReadContext,
    blobs: Option<&XrefStore>,
) -> StoreResult<StoredConfiguration> {
    let _span = tracing::info_span!("load", format = "xml").entered();
    if document.root.name != wire::ROOT {
        return Err(StoreError::format(format!(
            "expected <{}> root element, found <{}>",
            wire::ROOT,
            document.root.name
        )));
    }
    let catalog = ctx.catalog();
    let report = ctx.migrations().migrate_document(&mut document, catalog);
    tracing::debug!(changes = report.total_changes(), "document migrated");

    let root = &document.root;
    let create_time = match root.attr(wire::ATTR_CREATE_TIME) {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => {
            tracing::warn!("document has no createTime, using the current time");
            format_time(cfgstore_model::now_seconds())
        }
    };
    let secret = ValueSecret::derive(&create_time)
        .map_err(|e| StoreError::format(format!("cannot derive value secret: {e}")))?;
    let mut decode_ctx = DecodeContext::new(&secret);
    if let Some(blobs) = blobs {
        decode_ctx = decode_ctx.with_blobs(blobs);
    }

    let mut builder = StoredConfiguration::builder(ctx.catalog().clone(), ctx.registry().clone())
        .create_time(create_time.as_str());
    if let Some(modified) = root.attr(wire::ATTR_MODIFY_TIME) {
        builder = builder.modify_time(parse_time(modified)?);
    }

    for block in root.children_named(wire::PROPERTIES) {
        if block.attr(wire::ATTR_TYPE) != Some(wire::PROPERTIES_CONFIG) {
            tracing::debug!(kind = ?block.attr(wire::ATTR_TYPE), "ignoring properties block");
            continue;
        }
        for property in block.children_named(wire::PROPERTY) {
            let Some(name) = property.attr(wire::ATTR_KEY) else {
                continue;
            };
            let text = property.text();
            if text.trim().is_empty() {
                continue;
            }
            builder.insert_value(ConfigKey::for_property(name), StringValue::new(text).into_ref());
        }
    }

    for setting in root.children_named(wire::SETTINGS).flat_map(|s| s.children_named(wire::SETTING)) {
        let Some(name) = setting.attr(wire::ATTR_KEY) else {
            return Err(StoreError::format("setting element without key"));
        };
        let Some(def) = catalog.setting(name) else {
            tracing::warn!(setting = name, "setting unknown to the catalog, ignored");
            continue;
        };
        if let Some(written) = setting.attr(wire::ATTR_SYNTAX) {
            if written.parse::<Syntax>().ok() != Some(def.syntax) {
                tracing::warn!(setting = name, written, expected = %def.syntax, "syntax changed, decoding as current syntax");
            }
        }
        let profile = setting
            .attr(wire::ATTR_PROFILE)
            .filter(|p| !p.is_empty())
            .map(ProfileId::new);
        let key = ConfigKey::unchecked(domain_of(setting), RecordType::Setting, name, profile);
        if let Some(metadata) = read_metadata(setting)? {
            builder.insert_metadata(key.clone(), metadata);
        }
        if setting.child(wire::DEFAULT).is_some() {
            continue;
        }
        let values: Vec<&XmlElement> = setting.children_named(wire::VALUE).collect();
        let value = ctx
            .registry()
            .decode_xml(def.syntax, &values, &decode_ctx)
            .map_err(|e| value_error(&key, e))?;
        builder.insert_value(key, value);
    }

    for bundle in root.children_named(wire::LOCALE_BUNDLE) {
        let (Some(name), Some(entry)) = (bundle.attr(wire::ATTR_BUNDLE), bundle.attr(wire::ATTR_KEY)) else {
            return Err(StoreError::format("localeBundle element without bundle or key"));
        };
        let key = match ConfigKey::for_locale_bundle(catalog, domain_of(bundle), name, entry) {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(bundle = name, key = entry, %error, "locale bundle entry ignored");
                continue;
            }
        };
        let values: Vec<&XmlElement> = bundle.children_named(wire::VALUE).collect();
        let value = ctx
            .registry()
            .decode_xml(Syntax::LocalizedStringMap, &values, &decode_ctx)
            .map_err(|e| value_error(&key, e))?;
        if let Some(metadata) = read_metadata(bundle)? {
            builder.insert_metadata(key.clone(), metadata);
        }
        builder.insert_value(key, value);
    }

    finish_load(builder, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_core::StoredConfigurationModifier;
    use cfgstore_model::ErrorKind;
    use cfgstore_test_utils::{empty_config, sample_config, setting_key, test_catalog, test_registry};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx() -> ReadContext {
        ReadContext::new(test_catalog(), test_registry())
    }

    fn read(xml: &str) -> StoreResult<StoredConfiguration> {
        XmlCodec.read(xml.as_bytes(), &ctx())
    }

    #[test]
    fn encoded_output_hides_passwords() {
        let config = sample_config();
        let bytes = XmlCodec.write(&config, EncodingMode::Encoded).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("pr0xy-s3cret"));
        assert!(text.contains("<label>Site Title</label>"));
    }

    #[test]
    fn plain_output_needs_the_opt_in() {
        let config = sample_config();
        let text = String::from_utf8(XmlCodec.write(&config, EncodingMode::Plain).unwrap()).unwrap();
        assert!(!text.contains("pr0xy-s3cret"));

        let modifier = StoredConfigurationModifier::new(config);
        modifier
            .write_config_property(cfgstore_core::property::STORE_PLAINTEXT_VALUES, "true")
            .unwrap();
        let text = String::from_utf8(XmlCodec.write(&modifier.snapshot(), EncodingMode::Plain).unwrap()).unwrap();
        assert!(text.contains("pr0xy-s3cret"));
    }

    #[test]
    fn stripped_passwords_read_back_as_defaults() {
        let config = sample_config();
        let bytes = XmlCodec.write(&config, EncodingMode::Stripped).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(!text.contains("pr0xy-s3cret"));

        let restored = XmlCodec.read(&bytes, &ctx()).unwrap();
        let password = setting_key(&restored, "ldap.proxy.password", Some("default"));
        assert!(restored.read_stored_value(&password).is_none());
        let title = setting_key(&restored, "display.title", None);
        assert_eq!(restored.value_hash(&title), config.value_hash(&title));
    }

    #[test]
    fn reset_settings_keep_their_stamp() {
        let modifier = StoredConfigurationModifier::new(sample_config());
        let title = setting_key(&modifier.snapshot(), "display.title", None);
        modifier
            .reset_setting(&title, Some(&UserIdentity::new("auditor")))
            .unwrap();
        let bytes = XmlCodec.write(&modifier.snapshot(), EncodingMode::Encoded).unwrap();

        let restored = XmlCodec.read(&bytes, &ctx()).unwrap();
        assert!(restored.read_stored_value(&title).is_none());
        let stamp = restored.read_metadata(&title).unwrap();
        assert_eq!(stamp.user_identity.as_ref().unwrap().user_id, "auditor");
    }

    #[test]
    fn deprecated_settings_are_not_written() {
        let modifier = StoredConfigurationModifier::new(empty_config());
        let key = ConfigKey::unchecked(
            DomainId::system(),
            RecordType::Setting,
            "webservices.healthStats.makePublic",
            None,
        );
        modifier
            .apply("inject", |edit| {
                edit.put_value(key.clone(), Arc::new(cfgstore_model::value::BooleanValue(true)));
                Ok(())
            })
            .unwrap();
        let text = String::from_utf8(XmlCodec.write(&modifier.snapshot(), EncodingMode::Encoded).unwrap()).unwrap();
        assert!(!text.contains("healthStats"));
    }

    #[test]
    fn legacy_document_is_migrated_on_read() {
        let config = read(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<StoredConfiguration createTime="2015-02-03T04:05:06Z" modifyTime="2016-01-01T00:00:00Z">
  <properties>
    <property key="siteUrl">https://legacy.example</property>
    <property key="notes">migrated notes</property>
  </properties>
  <properties type="app">
    <property key="http.timeout">30</property>
  </properties>
  <settings>
    <setting key="display.title" syntax="STRING"><default><value>Old Portal</value></default></setting>
    <setting key="password.profiles" syntax="PROFILE"><value>default</value></setting>
    <setting key="password.policy.ADComplexity" syntax="BOOLEAN"><value>true</value></setting>
    <setting key="obsolete.setting" syntax="STRING"><value>ignored</value></setting>
  </settings>
</StoredConfiguration>"#,
        )
        .unwrap();

        let native = |name: &str, profile: Option<&str>| {
            config
                .read_stored_value(&setting_key(&config, name, profile))
                .map(|v| v.to_native())
        };
        assert_eq!(native("pwm.selfURL", None), Some(NativeValue::String("https://legacy.example".into())));
        assert_eq!(native("notes.noteText", None), Some(NativeValue::String("migrated notes".into())));
        assert_eq!(native("display.title", None), Some(NativeValue::String("Old Portal".into())));
        assert_eq!(
            native("pwm.appProperty.overrides", None),
            Some(NativeValue::List(vec!["http.timeout=30".into()]))
        );
        assert_eq!(
            native("password.policy.ADComplexityLevel", Some("default")),
            Some(NativeValue::String("AD2003".into()))
        );
        assert!(config.read_config_property("siteUrl").is_none());
        assert_eq!(config.create_time(), "2015-02-03T04:05:06Z");
    }

    #[test]
    fn property_name_with_key_separator_is_refused() {
        let err = read(
            r#"<StoredConfiguration createTime="2015-02-03T04:05:06Z">
  <properties type="config"><property key="ldap#extra">v</property></properties>
</StoredConfiguration>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn removed_setting_aborts_the_load() {
        let err = read(
            r#"<StoredConfiguration createTime="2015-02-03T04:05:06Z">
  <settings><setting key="legacy.wordlistUrl" syntax="STRING"><value>http://x</value></setting></settings>
</StoredConfiguration>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn invalid_value_aborts_the_load() {
        let long = "x".repeat(80);
        let err = read(&format!(
            r#"<StoredConfiguration createTime="2015-02-03T04:05:06Z">
  <settings><setting key="display.title" syntax="STRING"><value>{long}</value></setting></settings>
</StoredConfiguration>"#
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn wrong_root_is_a_format_error() {
        let err = read("<Configuration/>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn password_written_with_another_secret_fails() {
        let config = sample_config();
        let text = String::from_utf8(XmlCodec.write(&config, EncodingMode::Encoded).unwrap()).unwrap();
        let tampered = text.replace(config.create_time(), "1999-01-01T00:00:00Z");
        assert_eq!(read(&tampered).unwrap_err().kind(), ErrorKind::Validation);
    }
}
