//! Configuration keys
//!
//! A [`ConfigKey`] addresses exactly one stored item: a setting value, a
//! locale-bundle override, or a config property. Keys are plain value objects;
//! equality and hashing are structural.
//!
//! Profile cardinality is enforced by the checked constructors:
//!
//! | Record type | Profile |
//! |---|---|
//! | `Setting` | required iff the setting's category is profile-scoped |
//! | `LocaleBundle` | required, must name a key of the bundle |
//! | `Property` | never |

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Kind of record a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordType {
    Setting,
    LocaleBundle,
    Property,
}

impl RecordType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::LocaleBundle => "localeBundle",
            Self::Property => "property",
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setting" => Ok(Self::Setting),
            "localeBundle" => Ok(Self::LocaleBundle),
            "property" => Ok(Self::Property),
            other => Err(KeyError::Parse(format!("unknown record type '{other}'"))),
        }
    }
}

/// Domain a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    /// Name of the domain holding system-wide records
    pub const SYSTEM: &'static str = "system";

    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The system domain
    #[inline]
    #[must_use]
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::system()
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Profile identifier (or locale-bundle key, for bundle records)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Address of one stored record
///
/// The derived `Ord` is structural and only useful for ordered containers;
/// the canonical order used for serialization and search results is
/// [`ConfigKey::compare`], which needs the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigKey {
    domain: DomainId,
    record_type: RecordType,
    record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<ProfileId>,
}

impl ConfigKey {
    /// Key for a setting value, validated against the catalog
    ///
    /// # Errors
    /// Returns error if the setting is unknown, or if a profile is given for
    /// an unprofiled setting or missing for a profiled one.
    pub fn for_setting(
        catalog: &Catalog,
        domain: DomainId,
        setting: &str,
        profile: Option<ProfileId>,
    ) -> Result<Self, KeyError> {
        let def = catalog
            .setting(setting)
            .ok_or_else(|| KeyError::UnknownSetting(setting.to_string()))?;
        match (catalog.is_profiled(def), &profile) {
            (true, None) => return Err(KeyError::ProfileRequired(setting.to_string())),
            (false, Some(p)) => {
                return Err(KeyError::ProfileNotAllowed {
                    record: setting.to_string(),
                    profile: p.to_string(),
                })
            }
            _ => {}
        }
        Ok(Self {
            domain,
            record_type: RecordType::Setting,
            record_id: setting.to_string(),
            profile,
        })
    }

    /// Key for a locale-bundle override
    ///
    /// # Errors
    /// Returns error if the bundle is unknown or does not define `key`
    pub fn for_locale_bundle(
        catalog: &Catalog,
        domain: DomainId,
        bundle: &str,
        key: &str,
    ) -> Result<Self, KeyError> {
        let def = catalog
            .locale_bundle(bundle)
            .ok_or_else(|| KeyError::UnknownLocaleBundle(bundle.to_string()))?;
        if !def.keys.contains(key) {
            return Err(KeyError::UnknownBundleKey {
                bundle: bundle.to_string(),
                key: key.to_string(),
            });
        }
        Ok(Self {
            domain,
            record_type: RecordType::LocaleBundle,
            record_id: bundle.to_string(),
            profile: Some(ProfileId::new(key)),
        })
    }

    /// Whether `name` can be used as a property name
    ///
    /// `/` and `#` are separators in the string form of a key, so a name
    /// holding either would not parse back to the same key.
    #[inline]
    #[must_use]
    pub fn is_valid_property_name(name: &str) -> bool {
        !name.trim().is_empty() && !name.contains(['/', '#'])
    }

    /// Key for a config property (always in the system domain)
    ///
    /// The name is not checked; see [`ConfigKey::is_valid_property_name`].
    #[must_use]
    pub fn for_property(name: impl Into<String>) -> Self {
        Self {
            domain: DomainId::system(),
            record_type: RecordType::Property,
            record_id: name.into(),
            profile: None,
        }
    }

    /// Build a key without consulting the catalog
    ///
    /// Decoders use this for records as they were persisted, which may break
    /// the current profile rules until migration has run.
    #[must_use]
    pub fn unchecked(
        domain: DomainId,
        record_type: RecordType,
        record_id: impl Into<String>,
        profile: Option<ProfileId>,
    ) -> Self {
        Self {
            domain,
            record_type,
            record_id: record_id.into(),
            profile,
        }
    }

    #[inline]
    #[must_use]
    pub fn domain(&self) -> &DomainId {
        &self.domain
    }

    #[inline]
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    #[inline]
    #[must_use]
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    #[inline]
    #[must_use]
    pub fn profile(&self) -> Option<&ProfileId> {
        self.profile.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_setting(&self) -> bool {
        self.record_type == RecordType::Setting
    }

    /// Same record under another profile
    #[must_use]
    pub fn with_profile(&self, profile: Option<ProfileId>) -> Self {
        Self {
            profile,
            ..self.clone()
        }
    }

    /// Whether the key satisfies the catalog's profile rules
    #[must_use]
    pub fn is_valid(&self, catalog: &Catalog) -> bool {
        match self.record_type {
            RecordType::Property => {
                self.profile.is_none() && Self::is_valid_property_name(&self.record_id)
            }
            RecordType::Setting => catalog
                .setting(&self.record_id)
                .is_some_and(|def| catalog.is_profiled(def) == self.profile.is_some()),
            RecordType::LocaleBundle => match (&self.profile, catalog.locale_bundle(&self.record_id)) {
                (Some(key), Some(bundle)) => bundle.keys.contains(key.as_str()),
                _ => false,
            },
        }
    }

    /// Canonical total order
    ///
    /// Domain, then record type, then settings by catalog menu position (other
    /// records by id), then profile with the unprofiled key last.
    #[must_use]
    pub fn compare(&self, other: &Self, catalog: &Catalog) -> Ordering {
        self.domain
            .cmp(&other.domain)
            .then(self.record_type.cmp(&other.record_type))
            .then_with(|| match self.record_type {
                RecordType::Setting => {
                    // unknown settings sort after every known one
                    let a = catalog.menu_position(&self.record_id).unwrap_or(usize::MAX);
                    let b = catalog.menu_position(&other.record_id).unwrap_or(usize::MAX);
                    a.cmp(&b).then_with(|| self.record_id.cmp(&other.record_id))
                }
                RecordType::LocaleBundle | RecordType::Property => {
                    self.record_id.cmp(&other.record_id)
                }
            })
            .then_with(|| match (&self.profile, &other.profile) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }

    /// Sort keys into canonical order
    pub fn sort(keys: &mut [Self], catalog: &Catalog) {
        keys.sort_by(|a, b| a.compare(b, catalog));
    }
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.record_type, self.record_id)?;
        if let Some(profile) = &self.profile {
            write!(f, "#{profile}")?;
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = KeyError;

    /// Parse the `domain/recordType/recordId[#profile]` form
    ///
    /// The result is unchecked; call [`ConfigKey::is_valid`] against a catalog.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(domain), Some(record_type), Some(rest)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::Parse(format!("expected domain/type/id, got '{s}'")));
        };
        if domain.is_empty() || rest.is_empty() {
            return Err(KeyError::Parse(format!("empty segment in '{s}'")));
        }
        let record_type = record_type.parse()?;
        let (record_id, profile) = match rest.split_once('#') {
            Some((id, profile)) if !profile.is_empty() => (id, Some(ProfileId::new(profile))),
            Some((id, _)) => (id, None),
            None => (rest, None),
        };
        Ok(Self::unchecked(DomainId::new(domain), record_type, record_id, profile))
    }
}

/// Key construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("setting '{0}' is profile-scoped and needs a profile id")]
    ProfileRequired(String),

    #[error("'{record}' is not profile-scoped but profile '{profile}' was given")]
    ProfileNotAllowed { record: String, profile: String },

    #[error("unknown locale bundle '{0}'")]
    UnknownLocaleBundle(String),

    #[error("locale bundle '{bundle}' has no key '{key}'")]
    UnknownBundleKey { bundle: String, key: String },

    #[error("invalid key: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, CategoryDef, LocaleBundleDef, SettingDef};
    use crate::syntax::Syntax;
    use proptest::prelude::*;

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .category(CategoryDef::new("general"))
            .category(CategoryDef::new("ldap").with_profile_setting("ldap.profiles"))
            .setting(SettingDef::new("zeta.first", "general", Syntax::String))
            .setting(SettingDef::new("ldap.profiles", "general", Syntax::Profile))
            .setting(SettingDef::new("alpha.last", "general", Syntax::String))
            .setting(SettingDef::new("ldap.url", "ldap", Syntax::String))
            .locale_bundle(LocaleBundleDef {
                name: "Display".to_string(),
                keys: ["Title".to_string()].into_iter().collect(),
            })
            .build()
            .unwrap()
    }

    #[test]
    fn profiled_setting_requires_profile() {
        let catalog = catalog();
        let err = ConfigKey::for_setting(&catalog, DomainId::system(), "ldap.url", None);
        assert_eq!(err, Err(KeyError::ProfileRequired("ldap.url".into())));

        let ok = ConfigKey::for_setting(
            &catalog,
            DomainId::system(),
            "ldap.url",
            Some(ProfileId::new("default")),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn unprofiled_setting_rejects_profile() {
        let catalog = catalog();
        let err = ConfigKey::for_setting(
            &catalog,
            DomainId::system(),
            "zeta.first",
            Some(ProfileId::new("p")),
        );
        assert!(matches!(err, Err(KeyError::ProfileNotAllowed { .. })));
    }

    #[test]
    fn locale_bundle_key_is_schema_checked() {
        let catalog = catalog();
        assert!(ConfigKey::for_locale_bundle(&catalog, DomainId::system(), "Display", "Title").is_ok());
        assert!(matches!(
            ConfigKey::for_locale_bundle(&catalog, DomainId::system(), "Display", "Nope"),
            Err(KeyError::UnknownBundleKey { .. })
        ));
    }

    #[test]
    fn settings_order_by_menu_position_not_name() {
        let catalog = catalog();
        let first = ConfigKey::for_setting(&catalog, DomainId::system(), "zeta.first", None).unwrap();
        let last = ConfigKey::for_setting(&catalog, DomainId::system(), "alpha.last", None).unwrap();
        assert_eq!(first.compare(&last, &catalog), Ordering::Less);
    }

    #[test]
    fn unprofiled_sorts_after_profiled() {
        let catalog = catalog();
        let raw = ConfigKey::unchecked(DomainId::system(), RecordType::Setting, "ldap.url", None);
        let profiled = raw.with_profile(Some(ProfileId::new("a")));
        assert_eq!(profiled.compare(&raw, &catalog), Ordering::Less);
    }

    #[test]
    fn domain_precedes_record_type() {
        let catalog = catalog();
        let property = ConfigKey::for_property("a");
        let other_domain =
            ConfigKey::for_setting(&catalog, DomainId::new("acme"), "zeta.first", None).unwrap();
        assert_eq!(other_domain.compare(&property, &catalog), Ordering::Less);
    }

    #[test]
    fn display_parse_round_trip() {
        let key = ConfigKey::unchecked(
            DomainId::system(),
            RecordType::Setting,
            "ldap.url",
            Some(ProfileId::new("corp")),
        );
        assert_eq!(key.to_string(), "system/setting/ldap.url#corp");
        assert_eq!(key.to_string().parse::<ConfigKey>().unwrap(), key);
        assert!("system/unknown/x".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn property_names_with_separators_are_invalid() {
        let catalog = catalog();
        assert!(ConfigKey::for_property("ldap.extra").is_valid(&catalog));
        assert!(!ConfigKey::for_property("ldap#extra").is_valid(&catalog));
        assert!(!ConfigKey::for_property("a/b").is_valid(&catalog));
        assert!(!ConfigKey::for_property(" ").is_valid(&catalog));

        let reparsed: ConfigKey = ConfigKey::for_property("ldap#extra").to_string().parse().unwrap();
        assert_eq!(reparsed.record_id(), "ldap");
        assert!(!reparsed.is_valid(&catalog));
    }

    fn arb_key() -> impl Strategy<Value = ConfigKey> {
        (
            prop::sample::select(vec!["system", "acme"]),
            prop::sample::select(vec![RecordType::Setting, RecordType::Property]),
            prop::sample::select(vec!["zeta.first", "alpha.last", "ldap.url", "other"]),
            prop::option::of(prop::sample::select(vec!["a", "b"])),
        )
            .prop_map(|(d, t, id, p)| {
                ConfigKey::unchecked(DomainId::new(d), t, id, p.map(ProfileId::new))
            })
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in arb_key(), b in arb_key()) {
            let catalog = catalog();
            prop_assert_eq!(a.compare(&b, &catalog), b.compare(&a, &catalog).reverse());
        }

        #[test]
        fn compare_equal_iff_structurally_equal(a in arb_key(), b in arb_key()) {
            let catalog = catalog();
            prop_assert_eq!(a.compare(&b, &catalog) == Ordering::Equal, a == b);
        }
    }
}
