//! Immutable configuration snapshots
//!
//! A [`StoredConfiguration`] is the single source of truth for every read. It
//! is never mutated: edits go through [`SnapshotEdit`], which shares structure
//! with its base (persistent `im` maps) and produces a brand-new snapshot.

use crate::template::compute_template_sets;
use cfgstore_model::value::LocalizedStringMapValue;
use cfgstore_model::{
    Catalog, ConfigKey, ContentHash, DecodeContext, DomainId, NativeValue, ProfileId, RecordType,
    StoreError, StoreResult, SyntaxRegistry, TemplateSet, ValueMetaData, ValueRef, ValueSecret,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rs_merkle::algorithms::Sha256 as MerkleSha256;
use rs_merkle::MerkleTree;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One immutable instance of the full configuration state
#[derive(Debug, Clone)]
pub struct StoredConfiguration {
    catalog: Arc<Catalog>,
    registry: Arc<SyntaxRegistry>,
    create_time: String,
    modify_time: DateTime<Utc>,
    secret: ValueSecret,
    values: im::HashMap<ConfigKey, ValueRef>,
    metadata: im::HashMap<ConfigKey, ValueMetaData>,
    template_sets: BTreeMap<DomainId, TemplateSet>,
}

impl StoredConfiguration {
    /// Fresh, empty configuration created now
    ///
    /// # Errors
    /// Returns error if the value secret cannot be derived
    pub fn new_empty(catalog: Arc<Catalog>, registry: Arc<SyntaxRegistry>) -> StoreResult<Self> {
        Self::builder(catalog, registry).build()
    }

    /// Builder used by codecs to assemble a decoded snapshot
    #[must_use]
    pub fn builder(catalog: Arc<Catalog>, registry: Arc<SyntaxRegistry>) -> SnapshotBuilder {
        let now = cfgstore_model::now_seconds();
        SnapshotBuilder {
            catalog,
            registry,
            create_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            modify_time: now,
            values: im::HashMap::new(),
            metadata: im::HashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<SyntaxRegistry> {
        &self.registry
    }

    /// Opaque creation stamp; also the seed of the value secret
    #[inline]
    #[must_use]
    pub fn create_time(&self) -> &str {
        &self.create_time
    }

    #[inline]
    #[must_use]
    pub fn modify_time(&self) -> DateTime<Utc> {
        self.modify_time
    }

    #[inline]
    #[must_use]
    pub fn secret(&self) -> &ValueSecret {
        &self.secret
    }

    /// Context for decoding values of this snapshot
    #[inline]
    #[must_use]
    pub fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext::new(&self.secret)
    }

    /// Number of stored values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stored value without default fallback
    #[inline]
    #[must_use]
    pub fn read_stored_value(&self, key: &ConfigKey) -> Option<ValueRef> {
        self.values.get(key).cloned()
    }

    /// Stored keys in no particular order
    pub fn stored_keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.values.keys()
    }

    /// Keys that carry metadata, in no particular order
    pub fn metadata_keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.metadata.keys()
    }

    /// All stored keys in canonical order
    #[must_use]
    pub fn keys(&self) -> Vec<ConfigKey> {
        let mut keys: Vec<ConfigKey> = self.values.keys().cloned().collect();
        ConfigKey::sort(&mut keys, &self.catalog);
        keys
    }

    /// Effective setting value: stored, or the default for the domain's templates
    ///
    /// # Errors
    /// Returns error if `key` is not a setting known to the catalog, or if the
    /// declared default does not decode
    pub fn read_setting(&self, key: &ConfigKey) -> StoreResult<ValueRef> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }
        self.default_value(key)
    }

    /// Default value of a setting key under its domain's template set
    ///
    /// # Errors
    /// Returns error if `key` is not a known setting or its default does not decode
    pub fn default_value(&self, key: &ConfigKey) -> StoreResult<ValueRef> {
        if key.record_type() != RecordType::Setting {
            return Err(StoreError::config_state(format!("{key} is not a setting")));
        }
        let def = self
            .catalog
            .setting(key.record_id())
            .ok_or_else(|| StoreError::config_state(format!("unknown setting {}", key.record_id())))?;
        let templates = self.template_set(key.domain());
        self.registry
            .default_value(def, &templates, &self.decode_context())
            .map_err(|e| StoreError::validation(key.clone(), e))
    }

    /// Whether the key holds no value or a value equal to its default
    ///
    /// # Errors
    /// Returns error if the default cannot be computed
    pub fn is_default_value(&self, key: &ConfigKey) -> StoreResult<bool> {
        match self.values.get(key) {
            None => Ok(true),
            Some(stored) => Ok(stored.value_hash() == self.default_value(key)?.value_hash()),
        }
    }

    /// Templates active in `domain`
    #[must_use]
    pub fn template_set(&self, domain: &DomainId) -> TemplateSet {
        self.template_sets.get(domain).cloned().unwrap_or_default()
    }

    /// Domains known to this snapshot: system, the configured domain list and
    /// every domain holding a value
    #[must_use]
    pub fn domain_ids(&self) -> BTreeSet<DomainId> {
        let mut domains = BTreeSet::from([DomainId::system()]);
        if let Some(def) = self.catalog.domain_list_setting() {
            let key = ConfigKey::unchecked(DomainId::system(), RecordType::Setting, &def.key, None);
            if let Some(NativeValue::List(ids)) = self.values.get(&key).map(|v| v.to_native()) {
                domains.extend(ids.into_iter().map(DomainId::new));
            }
        }
        domains.extend(self.values.keys().map(|k| k.domain().clone()));
        domains
    }

    /// Profiles of a profile-scoped category in `domain`
    ///
    /// Empty if the category is not profile-scoped.
    #[must_use]
    pub fn profile_ids(&self, domain: &DomainId, category: &str) -> Vec<ProfileId> {
        let Some(def) = self.catalog.profile_setting_for_category(category) else {
            return Vec::new();
        };
        let key = ConfigKey::unchecked(domain.clone(), RecordType::Setting, &def.key, None);
        match self.values.get(&key).map(|v| v.to_native()) {
            Some(NativeValue::List(ids)) => ids.into_iter().map(ProfileId::new).collect(),
            _ => Vec::new(),
        }
    }

    /// Value of a config property
    #[must_use]
    pub fn read_config_property(&self, name: &str) -> Option<String> {
        match self.values.get(&ConfigKey::for_property(name))?.to_native() {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Locale → text overrides of one bundle key
    ///
    /// # Errors
    /// Returns error if the bundle or key is not in the catalog
    pub fn read_locale_bundle_map(
        &self,
        domain: &DomainId,
        bundle: &str,
        key: &str,
    ) -> StoreResult<Option<BTreeMap<String, String>>> {
        let key = ConfigKey::for_locale_bundle(&self.catalog, domain.clone(), bundle, key)?;
        Ok(match self.values.get(&key).map(|v| v.to_native()) {
            Some(NativeValue::Map(map)) => Some(map),
            _ => None,
        })
    }

    #[inline]
    #[must_use]
    pub fn read_metadata(&self, key: &ConfigKey) -> Option<&ValueMetaData> {
        self.metadata.get(key)
    }

    /// Content hash of the stored value, if any
    #[inline]
    #[must_use]
    pub fn value_hash(&self, key: &ConfigKey) -> Option<ContentHash> {
        self.values.get(key).map(|v| v.value_hash())
    }

    /// Merkle root over every `(key, value hash)` pair
    ///
    /// Equal digests mean equal stored values; metadata and stamps are not
    /// covered. The empty snapshot digests to the zero hash.
    #[must_use]
    pub fn content_digest(&self) -> ContentHash {
        let mut entries: Vec<(&ConfigKey, ContentHash)> =
            self.values.iter().map(|(k, v)| (k, v.value_hash())).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let leaves: Vec<[u8; 32]> = entries
            .iter()
            .map(|(k, h)| {
                let profile = k.profile().map_or("", |p| p.as_str());
                *ContentHash::compute_parts([
                    k.domain().as_str().as_bytes(),
                    k.record_type().as_str().as_bytes(),
                    k.record_id().as_bytes(),
                    profile.as_bytes(),
                    h.as_bytes().as_slice(),
                ])
                .as_bytes()
            })
            .collect();
        MerkleTree::<MerkleSha256>::from_leaves(&leaves)
            .root()
            .map_or(ContentHash::ZERO, ContentHash::new)
    }

    /// Start an edit based on this snapshot
    #[must_use]
    pub fn edit(&self) -> SnapshotEdit<'_> {
        SnapshotEdit {
            base: self,
            values: self.values.clone(),
            metadata: self.metadata.clone(),
            touched: BTreeSet::new(),
        }
    }

    /// Locale-bundle value wrapper shared by readers and writers
    pub(crate) fn bundle_value(map: BTreeMap<String, String>) -> ValueRef {
        Arc::new(LocalizedStringMapValue::new(map))
    }
}

/// Assembles a snapshot from decoded records
#[derive(Debug)]
pub struct SnapshotBuilder {
    catalog: Arc<Catalog>,
    registry: Arc<SyntaxRegistry>,
    create_time: String,
    modify_time: DateTime<Utc>,
    values: im::HashMap<ConfigKey, ValueRef>,
    metadata: im::HashMap<ConfigKey, ValueMetaData>,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn create_time(mut self, create_time: impl Into<String>) -> Self {
        self.create_time = create_time.into();
        self
    }

    #[must_use]
    pub fn modify_time(mut self, modify_time: DateTime<Utc>) -> Self {
        self.modify_time = modify_time;
        self
    }

    #[must_use]
    pub fn value(mut self, key: ConfigKey, value: ValueRef) -> Self {
        self.values.insert(key, value);
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: ConfigKey, metadata: ValueMetaData) -> Self {
        self.metadata.insert(key, metadata);
        self
    }

    pub fn insert_value(&mut self, key: ConfigKey, value: ValueRef) {
        self.values.insert(key, value);
    }

    pub fn insert_metadata(&mut self, key: ConfigKey, metadata: ValueMetaData) {
        self.metadata.insert(key, metadata);
    }

    /// Derive the secret and template sets and build
    ///
    /// # Errors
    /// Returns error if the value secret cannot be derived
    pub fn build(self) -> StoreResult<StoredConfiguration> {
        let secret = ValueSecret::derive(&self.create_time)
            .map_err(|e| StoreError::format(format!("cannot derive value secret: {e}")))?;
        let template_sets = compute_template_sets(&self.catalog, &self.registry, &secret, &self.values);
        Ok(StoredConfiguration {
            catalog: self.catalog,
            registry: self.registry,
            create_time: self.create_time,
            modify_time: self.modify_time,
            secret,
            values: self.values,
            metadata: self.metadata,
            template_sets,
        })
    }
}

/// Pending changes against a base snapshot
///
/// Reads through the edit see earlier writes of the same edit. Nothing is
/// visible to other readers until the modifier swaps the result in.
#[derive(Debug)]
pub struct SnapshotEdit<'a> {
    base: &'a StoredConfiguration,
    values: im::HashMap<ConfigKey, ValueRef>,
    metadata: im::HashMap<ConfigKey, ValueMetaData>,
    touched: BTreeSet<ConfigKey>,
}

impl<'a> SnapshotEdit<'a> {
    /// Snapshot the edit started from
    #[inline]
    #[must_use]
    pub fn base(&self) -> &'a StoredConfiguration {
        self.base
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &'a Catalog {
        &self.base.catalog
    }

    /// Value as of this edit
    #[inline]
    #[must_use]
    pub fn stored_value(&self, key: &ConfigKey) -> Option<&ValueRef> {
        self.values.get(key)
    }

    /// Keys holding a value as of this edit
    pub fn stored_keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.values.keys()
    }

    pub fn put_value(&mut self, key: ConfigKey, value: ValueRef) {
        self.touched.insert(key.clone());
        self.values.insert(key, value);
    }

    pub fn remove_value(&mut self, key: &ConfigKey) -> Option<ValueRef> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.touched.insert(key.clone());
        }
        removed
    }

    pub fn put_metadata(&mut self, key: ConfigKey, metadata: ValueMetaData) {
        self.touched.insert(key.clone());
        self.metadata.insert(key, metadata);
    }

    pub fn remove_metadata(&mut self, key: &ConfigKey) -> Option<ValueMetaData> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touched.insert(key.clone());
        }
        removed
    }

    #[inline]
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Keys written or removed so far
    #[inline]
    #[must_use]
    pub fn touched(&self) -> &BTreeSet<ConfigKey> {
        &self.touched
    }

    /// Build the new snapshot, re-stamping its modify time
    #[must_use]
    pub fn finish(self) -> (StoredConfiguration, BTreeSet<ConfigKey>) {
        let base = self.base;
        let template_sets =
            compute_template_sets(&base.catalog, &base.registry, &base.secret, &self.values);
        let config = StoredConfiguration {
            catalog: Arc::clone(&base.catalog),
            registry: Arc::clone(&base.registry),
            create_time: base.create_time.clone(),
            modify_time: cfgstore_model::now_seconds(),
            secret: base.secret.clone(),
            values: self.values,
            metadata: self.metadata,
            template_sets,
        };
        (config, self.touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_model::value::StringValue;
    use cfgstore_model::{CatalogBuilder, CategoryDef, SettingDef, Syntax};
    use serde_json::json;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            CatalogBuilder::new()
                .category(CategoryDef::new("general"))
                .category(CategoryDef::new("ldap").with_profile_setting("ldap.profiles"))
                .setting(SettingDef::new("template.ldap", "general", Syntax::Select)
                    .with_option("DEFAULT", "Default")
                    .with_option("AD", "Active Directory")
                    .with_default(json!("DEFAULT"))
                    .template())
                .setting(SettingDef::new("ldap.profiles", "general", Syntax::Profile))
                .setting(SettingDef::new("ldap.username", "ldap", Syntax::String)
                    .with_default(json!("cn"))
                    .with_template_default(["AD"], json!("sAMAccountName")))
                .build()
                .unwrap(),
        )
    }

    fn empty() -> StoredConfiguration {
        StoredConfiguration::new_empty(catalog(), Arc::new(SyntaxRegistry::with_defaults())).unwrap()
    }

    #[test]
    fn unset_setting_reads_template_default() {
        let config = empty();
        let template = ConfigKey::for_setting(config.catalog(), DomainId::system(), "template.ldap", None).unwrap();
        let key = ConfigKey::for_setting(
            config.catalog(),
            DomainId::system(),
            "ldap.username",
            Some(ProfileId::new("default")),
        )
        .unwrap();
        assert_eq!(config.read_setting(&key).unwrap().to_native(), NativeValue::String("cn".into()));

        let mut edit = config.edit();
        edit.put_value(template, Arc::new(cfgstore_model::value::SelectValue::new("AD")));
        let (ad, touched) = edit.finish();
        assert_eq!(touched.len(), 1);
        assert!(ad.template_set(&DomainId::system()).contains("AD"));
        assert_eq!(
            ad.read_setting(&key).unwrap().to_native(),
            NativeValue::String("sAMAccountName".into())
        );
    }

    #[test]
    fn edit_leaves_base_untouched() {
        let config = empty();
        let key = ConfigKey::for_property("p");
        let mut edit = config.edit();
        edit.put_value(key.clone(), StringValue::new("v").into_ref());
        let (next, _) = edit.finish();
        assert!(config.read_stored_value(&key).is_none());
        assert!(next.read_stored_value(&key).is_some());
        assert_eq!(next.create_time(), config.create_time());
    }

    #[test]
    fn digest_tracks_values_only() {
        let config = empty();
        assert!(config.content_digest().is_zero());

        let key = ConfigKey::for_property("p");
        let mut a = config.edit();
        a.put_value(key.clone(), StringValue::new("v").into_ref());
        let (a, _) = a.finish();
        let mut b = config.edit();
        b.put_value(key.clone(), StringValue::new("v").into_ref());
        b.put_metadata(key, ValueMetaData::now(None));
        let (b, _) = b.finish();

        assert_eq!(a.content_digest(), b.content_digest());
        assert_ne!(a.content_digest(), config.content_digest());
    }

    #[test]
    fn default_detection_uses_hashes() {
        let config = empty();
        let key = ConfigKey::for_setting(
            config.catalog(),
            DomainId::system(),
            "ldap.username",
            Some(ProfileId::new("p")),
        )
        .unwrap();
        let mut edit = config.edit();
        edit.put_value(key.clone(), StringValue::new("cn").into_ref());
        let (same, _) = edit.finish();
        assert!(same.is_default_value(&key).unwrap());

        let mut edit = same.edit();
        edit.put_value(key.clone(), StringValue::new("uid").into_ref());
        let (changed, _) = edit.finish();
        assert!(!changed.is_default_value(&key).unwrap());
    }

    #[test]
    fn profile_ids_come_from_profile_setting() {
        let config = empty();
        let list = ConfigKey::for_setting(config.catalog(), DomainId::system(), "ldap.profiles", None).unwrap();
        let mut edit = config.edit();
        edit.put_value(
            list,
            Arc::new(cfgstore_model::value::StringArrayValue::profiles(["a", "b"])),
        );
        let (config, _) = edit.finish();
        assert_eq!(
            config.profile_ids(&DomainId::system(), "ldap"),
            vec![ProfileId::new("a"), ProfileId::new("b")]
        );
        assert!(config.profile_ids(&DomainId::system(), "general").is_empty());
    }
}
