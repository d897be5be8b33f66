//! Free-text setting search
//!
//! A query is split on whitespace; a setting matches when every token is
//! found, case-insensitively, in at least one of its searchable fields. The
//! key name, label, description and menu location are always searchable. The
//! current value and option texts are searchable only for settings that are
//! not confidential. Hidden settings never match.

use crate::snapshot::StoredConfiguration;
use cfgstore_model::{ConfigKey, DomainId, RecordType, SettingDef};
use rayon::prelude::*;

/// Search parameters
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    /// Restrict to one domain
    pub domain: Option<DomainId>,
    /// Locale used for value debug strings
    pub locale: Option<String>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: None,
            locale: None,
        }
    }

    #[must_use]
    pub fn in_domain(mut self, domain: DomainId) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    fn tokens(&self) -> Vec<String> {
        self.text.split_whitespace().map(str::to_lowercase).collect()
    }
}

/// Every addressable setting key, with profiled settings expanded per profile
#[must_use]
pub fn addressable_keys(config: &StoredConfiguration, domain: Option<&DomainId>) -> Vec<ConfigKey> {
    let catalog = config.catalog();
    let domains: Vec<DomainId> = match domain {
        Some(d) => vec![d.clone()],
        None => config.domain_ids().into_iter().collect(),
    };
    let mut keys = Vec::new();
    for domain in &domains {
        for def in catalog.settings().filter(|d| !d.removed) {
            if catalog.is_profiled(def) {
                for profile in config.profile_ids(domain, &def.category) {
                    keys.push(ConfigKey::unchecked(
                        domain.clone(),
                        RecordType::Setting,
                        &def.key,
                        Some(profile),
                    ));
                }
            } else {
                keys.push(ConfigKey::unchecked(domain.clone(), RecordType::Setting, &def.key, None));
            }
        }
    }
    keys
}

/// Keys of matching settings, in canonical order
///
/// An empty query matches nothing.
#[must_use]
pub fn search(config: &StoredConfiguration, query: &SearchQuery) -> Vec<ConfigKey> {
    let tokens = query.tokens();
    if tokens.is_empty() {
        return Vec::new();
    }
    let keys = addressable_keys(config, query.domain.as_ref());
    let mut matches: Vec<ConfigKey> = keys
        .into_par_iter()
        .filter(|key| matches_all(config, key, &tokens, query.locale.as_deref()))
        .collect();
    ConfigKey::sort(&mut matches, config.catalog());
    tracing::debug!(query = %query.text, results = matches.len(), "search");
    matches
}

fn matches_all(config: &StoredConfiguration, key: &ConfigKey, tokens: &[String], locale: Option<&str>) -> bool {
    let catalog = config.catalog();
    let Some(def) = catalog.setting(key.record_id()) else {
        return false;
    };
    if catalog.is_hidden(def) {
        return false;
    }
    let menu = catalog.menu_location(def, key.profile().map(|p| p.as_str()));
    // the value debug string is computed at most once per key
    let mut value_text: Option<String> = None;
    tokens.iter().all(|token| {
        matches_metadata(def, &menu, token)
            || (!def.is_confidential() && matches_value(config, key, def, token, locale, &mut value_text))
    })
}

fn contains(haystack: &str, token: &str) -> bool {
    haystack.to_lowercase().contains(token)
}

fn matches_metadata(def: &SettingDef, menu: &str, token: &str) -> bool {
    contains(&def.key, token)
        || contains(&def.label, token)
        || contains(&def.description, token)
        || contains(menu, token)
}

fn matches_value(
    config: &StoredConfiguration,
    key: &ConfigKey,
    def: &SettingDef,
    token: &str,
    locale: Option<&str>,
    cache: &mut Option<String>,
) -> bool {
    if cache.is_none() {
        let text = match config.read_setting(key) {
            Ok(value) => value.debug_string(locale),
            Err(error) => {
                tracing::debug!(%key, %error, "value not searchable");
                String::new()
            }
        };
        *cache = Some(text.to_lowercase());
    }
    if cache.as_deref().is_some_and(|text| text.contains(token)) {
        return true;
    }
    def.syntax.is_enumerated()
        && def
            .options
            .iter()
            .any(|(option, display)| contains(option, token) || contains(display, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::StoredConfigurationModifier;
    use cfgstore_model::value::{PasswordValue, StringArrayValue, StringValue};
    use cfgstore_model::{Catalog, CatalogBuilder, CategoryDef, ProfileId, Syntax, SyntaxRegistry};
    use std::sync::Arc;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            CatalogBuilder::new()
                .category(CategoryDef::new("general").with_label("General"))
                .category(CategoryDef::new("internal").hidden())
                .category(
                    CategoryDef::new("ldap")
                        .with_label("LDAP")
                        .with_profile_setting("ldap.profiles"),
                )
                .setting(SettingDef::new("site.title", "general", Syntax::String).with_label("Site Title"))
                .setting(
                    SettingDef::new("smtp.password", "general", Syntax::Password)
                        .with_label("Mail Server Password"),
                )
                .setting(
                    SettingDef::new("mode", "general", Syntax::Select)
                        .with_label("Mode")
                        .with_option("FAST", "Quick processing"),
                )
                .setting(SettingDef::new("secret.flag", "internal", Syntax::String))
                .setting(SettingDef::new("ldap.profiles", "general", Syntax::Profile))
                .setting(SettingDef::new("ldap.url", "ldap", Syntax::String).with_label("Server URL"))
                .build()
                .unwrap(),
        )
    }

    fn config() -> StoredConfigurationModifier {
        let m = StoredConfigurationModifier::new(
            StoredConfiguration::new_empty(catalog(), Arc::new(SyntaxRegistry::with_defaults())).unwrap(),
        );
        let key = |name: &str, profile: Option<&str>| {
            ConfigKey::for_setting(m.snapshot().catalog(), DomainId::system(), name, profile.map(ProfileId::new))
                .unwrap()
        };
        m.write_setting(&key("site.title", None), StringValue::new("Acme Portal").into_ref(), None)
            .unwrap();
        m.write_setting(&key("smtp.password", None), Arc::new(PasswordValue::new("acme-secret")), None)
            .unwrap();
        m.write_setting(&key("secret.flag", None), StringValue::new("acme").into_ref(), None)
            .unwrap();
        m.write_setting(&key("ldap.profiles", None), Arc::new(StringArrayValue::profiles(["a", "b"])), None)
            .unwrap();
        m.write_setting(&key("ldap.url", Some("b")), StringValue::new("ldap://acme").into_ref(), None)
            .unwrap();
        m
    }

    fn ids(keys: &[ConfigKey]) -> Vec<String> {
        keys.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn confidential_values_are_not_searched() {
        let snapshot = config().snapshot();
        let by_value = search(&snapshot, &SearchQuery::new("acme-secret"));
        assert!(by_value.is_empty());
        let by_label = search(&snapshot, &SearchQuery::new("mail server"));
        assert_eq!(ids(&by_label), vec!["system/setting/smtp.password"]);
    }

    #[test]
    fn hidden_settings_never_match() {
        let snapshot = config().snapshot();
        let results = search(&snapshot, &SearchQuery::new("secret.flag"));
        assert!(results.is_empty());
    }

    #[test]
    fn every_token_must_match() {
        let snapshot = config().snapshot();
        let results = search(&snapshot, &SearchQuery::new("ACME title"));
        assert_eq!(ids(&results), vec!["system/setting/site.title"]);
        assert!(search(&snapshot, &SearchQuery::new("acme nonexistent")).is_empty());
    }

    #[test]
    fn profiles_expand_and_order_canonically() {
        let snapshot = config().snapshot();
        let results = search(&snapshot, &SearchQuery::new("server url"));
        assert_eq!(
            ids(&results),
            vec!["system/setting/ldap.url#a", "system/setting/ldap.url#b"]
        );
        let by_value = search(&snapshot, &SearchQuery::new("ldap://acme"));
        assert_eq!(ids(&by_value), vec!["system/setting/ldap.url#b"]);
    }

    #[test]
    fn option_text_is_searchable() {
        let snapshot = config().snapshot();
        let results = search(&snapshot, &SearchQuery::new("quick"));
        assert_eq!(ids(&results), vec!["system/setting/mode"]);
    }

    #[test]
    fn blank_query_matches_nothing() {
        let snapshot = config().snapshot();
        assert!(search(&snapshot, &SearchQuery::new("   ")).is_empty());
    }
}
