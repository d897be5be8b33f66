//! Pre-decode passes
//!
//! These run on the raw document tree, so they see legacy structure that no
//! decoder understands any more.

use crate::legacy;
use cfgstore_model::value::value_element;
use cfgstore_model::{wire, Catalog, DomainId, StoreResult, XmlDocument, XmlElement};
use std::fmt::Debug;

/// Rewrite of the raw document before any value is decoded
pub trait DocumentPass: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `document` in place, returning the number of changed items
    ///
    /// # Errors
    /// Returns error only when the whole pass cannot run
    fn apply(&self, document: &mut XmlDocument, catalog: &Catalog) -> StoreResult<usize>;
}

fn is_properties(e: &XmlElement, kind: Option<&str>) -> bool {
    e.name == wire::PROPERTIES && e.attr(wire::ATTR_TYPE) == kind
}

fn property_key(e: &XmlElement) -> &str {
    e.attr(wire::ATTR_KEY).unwrap_or_default()
}

/// System-domain, unprofiled setting element for `key`
fn is_plain_setting(e: &XmlElement, key: &str) -> bool {
    e.name == wire::SETTING
        && e.attr(wire::ATTR_KEY) == Some(key)
        && e.attr(wire::ATTR_DOMAIN).map_or(true, |d| d == DomainId::SYSTEM)
        && e.attr(wire::ATTR_PROFILE).map_or(true, str::is_empty)
}

fn settings_block(root: &mut XmlElement) -> &mut XmlElement {
    root.child_or_insert_with(|e| e.name == wire::SETTINGS, || XmlElement::new(wire::SETTINGS))
}

fn config_block(root: &mut XmlElement) -> &mut XmlElement {
    root.child_or_insert_with(
        |e| is_properties(e, Some(wire::PROPERTIES_CONFIG)),
        || XmlElement::new(wire::PROPERTIES).with_attr(wire::ATTR_TYPE, wire::PROPERTIES_CONFIG),
    )
}

fn new_setting(catalog: &Catalog, key: &str) -> XmlElement {
    let syntax = catalog
        .setting(key)
        .map(|d| d.syntax.as_str())
        .unwrap_or_default();
    XmlElement::new(wire::SETTING)
        .with_attr(wire::ATTR_KEY, key)
        .with_attr(wire::ATTR_SYNTAX, syntax)
        .with_attr(wire::ATTR_DOMAIN, DomainId::SYSTEM)
}

/// Collapse values nested inside a legacy `<default>` element
///
/// Old writers sometimes emitted `<default><value>..</value></default>` next
/// to, or instead of, the real values. Direct values win; otherwise the
/// nested ones are lifted out.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeDefaultValues;

impl DocumentPass for MergeDefaultValues {
    fn name(&self) -> &'static str {
        "merge-default-values"
    }

    fn apply(&self, document: &mut XmlDocument, _catalog: &Catalog) -> StoreResult<usize> {
        let Some(settings) = document.root.child_mut(wire::SETTINGS) else {
            return Ok(0);
        };
        let mut changed = 0;
        for setting in settings.elements_mut().filter(|e| e.name == wire::SETTING) {
            let nested: Vec<XmlElement> = setting
                .children_named(wire::DEFAULT)
                .flat_map(|d| d.children_named(wire::VALUE).cloned())
                .collect();
            if nested.is_empty() {
                continue;
            }
            let has_direct = setting.child(wire::VALUE).is_some();
            setting.retain_elements(|e| e.name != wire::DEFAULT);
            if !has_direct {
                for value in nested {
                    setting.push(value);
                }
            }
            changed += 1;
            tracing::info!(key = property_key(setting), lifted = !has_direct, "merged value nested in default");
        }
        Ok(changed)
    }
}

/// Fold untyped `<properties>` blocks holding config properties into the
/// typed config block
///
/// Keys already present in the config block keep their value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeUntypedProperties;

impl DocumentPass for MergeUntypedProperties {
    fn name(&self) -> &'static str {
        "merge-untyped-properties"
    }

    fn apply(&self, document: &mut XmlDocument, catalog: &Catalog) -> StoreResult<usize> {
        let mut moved: Vec<XmlElement> = Vec::new();
        document.root.retain_elements(|e| {
            let legacy = is_properties(e, None)
                && e
                    .children_named(wire::PROPERTY)
                    .any(|p| catalog.is_config_property(property_key(p)));
            if legacy {
                moved.extend(e.children_named(wire::PROPERTY).cloned());
            }
            !legacy
        });
        if moved.is_empty() {
            return Ok(0);
        }

        let block = config_block(&mut document.root);
        let mut changed = 0;
        for property in moved {
            let key = property_key(&property).to_string();
            if block.children_named(wire::PROPERTY).any(|p| property_key(p) == key) {
                tracing::warn!(%key, "untyped property shadowed by config property, dropped");
                continue;
            }
            block.push(property);
            changed += 1;
            tracing::info!(%key, "moved untyped property into config properties");
        }
        Ok(changed)
    }
}

/// Rewrite `<properties type="app">` entries as `name=value` lines of the
/// application property override setting
///
/// Entries are appended to the setting's existing values; an entry that is
/// already present is not repeated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppPropertyOverrides;

impl DocumentPass for AppPropertyOverrides {
    fn name(&self) -> &'static str {
        "app-property-overrides"
    }

    fn apply(&self, document: &mut XmlDocument, catalog: &Catalog) -> StoreResult<usize> {
        if catalog.setting(legacy::APP_PROPERTY_OVERRIDES).is_none() {
            tracing::debug!(setting = legacy::APP_PROPERTY_OVERRIDES, "not in catalog, pass skipped");
            return Ok(0);
        }
        let mut entries: Vec<String> = Vec::new();
        document.root.retain_elements(|e| {
            if !is_properties(e, Some(wire::PROPERTIES_APP)) {
                return true;
            }
            entries.extend(
                e.children_named(wire::PROPERTY)
                    .map(|p| format!("{}={}", property_key(p), p.text())),
            );
            false
        });
        if entries.is_empty() {
            return Ok(0);
        }

        let settings = settings_block(&mut document.root);
        let setting = settings.child_or_insert_with(
            |e| is_plain_setting(e, legacy::APP_PROPERTY_OVERRIDES),
            || new_setting(catalog, legacy::APP_PROPERTY_OVERRIDES),
        );
        setting.retain_elements(|e| e.name != wire::DEFAULT);
        let mut existing: Vec<String> = setting.children_named(wire::VALUE).map(XmlElement::text).collect();
        let mut changed = 0;
        for entry in entries {
            if existing.contains(&entry) {
                continue;
            }
            tracing::info!(%entry, "app property moved into overrides");
            setting.push(value_element(entry.clone()));
            existing.push(entry);
            changed += 1;
        }
        Ok(changed)
    }
}

/// Move the `notes` and `siteUrl` config properties into their settings
///
/// An explicit setting value already present in the document wins and the
/// property is simply dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyConfigProperties;

impl LegacyConfigProperties {
    const MOVES: [(&'static str, &'static str); 2] = [
        (legacy::NOTES_PROPERTY, legacy::NOTE_TEXT_SETTING),
        (legacy::SITE_URL_PROPERTY, legacy::SELF_URL_SETTING),
    ];
}

impl DocumentPass for LegacyConfigProperties {
    fn name(&self) -> &'static str {
        "legacy-config-properties"
    }

    fn apply(&self, document: &mut XmlDocument, catalog: &Catalog) -> StoreResult<usize> {
        let mut changed = 0;
        for (property, setting_key) in Self::MOVES {
            if catalog.setting(setting_key).is_none() {
                tracing::debug!(setting = setting_key, "not in catalog, item skipped");
                continue;
            }
            let mut text: Option<String> = None;
            for block in document
                .root
                .elements_mut()
                .filter(|e| is_properties(e, Some(wire::PROPERTIES_CONFIG)))
            {
                block.retain_elements(|p| {
                    if p.name == wire::PROPERTY && property_key(p) == property {
                        text.get_or_insert_with(|| p.text());
                        false
                    } else {
                        true
                    }
                });
            }
            let Some(text) = text else {
                continue;
            };
            changed += 1;
            if text.trim().is_empty() {
                tracing::info!(property, "dropped blank legacy property");
                continue;
            }

            let settings = settings_block(&mut document.root);
            let has_value = settings
                .elements()
                .any(|e| is_plain_setting(e, setting_key) && e.child(wire::VALUE).is_some());
            if has_value {
                tracing::warn!(property, setting = setting_key, "setting already set, legacy property dropped");
                continue;
            }
            settings.retain_elements(|e| !is_plain_setting(e, setting_key));
            settings.push(new_setting(catalog, setting_key).with_child(value_element(text)));
            tracing::info!(property, setting = setting_key, "moved legacy property into setting");
        }
        Ok(changed)
    }
}

/// Mark `<properties>` blocks without a `type` as config properties
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillPropertyType;

impl DocumentPass for BackfillPropertyType {
    fn name(&self) -> &'static str {
        "backfill-property-type"
    }

    fn apply(&self, document: &mut XmlDocument, _catalog: &Catalog) -> StoreResult<usize> {
        let mut changed = 0;
        for block in document.root.elements_mut().filter(|e| is_properties(e, None)) {
            block.set_attr(wire::ATTR_TYPE, wire::PROPERTIES_CONFIG);
            changed += 1;
        }
        if changed > 0 {
            tracing::info!(blocks = changed, "backfilled properties type");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_test_utils::test_catalog;
    use pretty_assertions::assert_eq;

    fn doc(body: &str) -> XmlDocument {
        XmlDocument::parse(&format!(
            r#"<StoredConfiguration createTime="2020-01-01T00:00:00Z">{body}</StoredConfiguration>"#
        ))
        .unwrap()
    }

    fn run_twice(pass: &dyn DocumentPass, document: &mut XmlDocument) -> (usize, usize) {
        let catalog = test_catalog();
        let first = pass.apply(document, &catalog).unwrap();
        let second = pass.apply(document, &catalog).unwrap();
        (first, second)
    }

    fn values(setting: &XmlElement) -> Vec<String> {
        setting.children_named(wire::VALUE).map(XmlElement::text).collect()
    }

    #[test]
    fn nested_default_values_are_lifted_or_dropped() {
        let mut document = doc(
            r#"<settings>
                <setting key="display.title" syntax="STRING"><default><value>old</value></default></setting>
                <setting key="pwm.selfURL" syntax="STRING"><default><value>a</value></default><value>b</value></setting>
            </settings>"#,
        );
        assert_eq!(run_twice(&MergeDefaultValues, &mut document), (2, 0));

        let settings = document.root.child(wire::SETTINGS).unwrap();
        let all: Vec<&XmlElement> = settings.elements().collect();
        assert_eq!(values(all[0]), vec!["old"]);
        assert_eq!(values(all[1]), vec!["b"]);
        assert!(all.iter().all(|s| s.child(wire::DEFAULT).is_none()));
    }

    #[test]
    fn untyped_config_properties_are_merged() {
        let mut document = doc(
            r#"<properties type="config"><property key="schemaVersion">5</property></properties>
               <properties><property key="configPasswordHash">h</property><property key="schemaVersion">4</property></properties>"#,
        );
        assert_eq!(run_twice(&MergeUntypedProperties, &mut document), (1, 0));

        let blocks: Vec<&XmlElement> = document.root.children_named(wire::PROPERTIES).collect();
        assert_eq!(blocks.len(), 1);
        let props: Vec<(String, String)> = blocks[0]
            .children_named(wire::PROPERTY)
            .map(|p| (property_key(p).to_string(), p.text()))
            .collect();
        assert_eq!(
            props,
            vec![
                ("schemaVersion".to_string(), "5".to_string()),
                ("configPasswordHash".to_string(), "h".to_string()),
            ]
        );
    }

    #[test]
    fn app_properties_accumulate_into_overrides() {
        let mut document = doc(
            r#"<properties type="app"><property key="http.timeout">30</property><property key="a.b">c</property></properties>
               <settings><setting key="pwm.appProperty.overrides" syntax="STRING_ARRAY"><value>a.b=c</value></setting></settings>"#,
        );
        assert_eq!(run_twice(&AppPropertyOverrides, &mut document), (1, 0));

        assert!(document.root.children_named(wire::PROPERTIES).next().is_none());
        let setting = document.root.child(wire::SETTINGS).unwrap().child(wire::SETTING).unwrap();
        assert_eq!(values(setting), vec!["a.b=c", "http.timeout=30"]);
    }

    #[test]
    fn app_properties_create_the_setting() {
        let mut document = doc(r#"<properties type="app"><property key="x">1</property></properties>"#);
        assert_eq!(run_twice(&AppPropertyOverrides, &mut document), (1, 0));
        let setting = document.root.child(wire::SETTINGS).unwrap().child(wire::SETTING).unwrap();
        assert_eq!(setting.attr(wire::ATTR_SYNTAX), Some("STRING_ARRAY"));
        assert_eq!(values(setting), vec!["x=1"]);
    }

    #[test]
    fn legacy_properties_become_settings() {
        let mut document = doc(
            r#"<properties type="config">
                 <property key="notes">remember the milk</property>
                 <property key="siteUrl">https://old.example</property>
               </properties>
               <settings><setting key="pwm.selfURL" syntax="STRING"><value>https://new.example</value></setting></settings>"#,
        );
        assert_eq!(run_twice(&LegacyConfigProperties, &mut document), (2, 0));

        let block = document.root.child(wire::PROPERTIES).unwrap();
        assert!(block.child(wire::PROPERTY).is_none());
        let settings = document.root.child(wire::SETTINGS).unwrap();
        let url = settings.elements().find(|e| is_plain_setting(e, "pwm.selfURL")).unwrap();
        assert_eq!(values(url), vec!["https://new.example"]);
        let notes = settings.elements().find(|e| is_plain_setting(e, "notes.noteText")).unwrap();
        assert_eq!(notes.attr(wire::ATTR_SYNTAX), Some("TEXT"));
        assert_eq!(values(notes), vec!["remember the milk"]);
    }

    #[test]
    fn missing_property_type_is_backfilled() {
        let mut document = doc(r#"<properties><property key="custom">1</property></properties>"#);
        assert_eq!(run_twice(&BackfillPropertyType, &mut document), (1, 0));
        let block = document.root.child(wire::PROPERTIES).unwrap();
        assert_eq!(block.attr(wire::ATTR_TYPE), Some(wire::PROPERTIES_CONFIG));
    }
}
