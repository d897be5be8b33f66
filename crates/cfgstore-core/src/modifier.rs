//! Transactional snapshot modifier
//!
//! [`StoredConfigurationModifier`] holds one atomically swappable reference to
//! the current snapshot. Every operation is a pure transform of a snapshot,
//! applied through a compare-and-swap retry loop: if another writer swapped in
//! a newer snapshot first, the transform runs again against it. Writers never
//! block each other and the last successful swap wins.
//!
//! Transforms may run more than once, so they must not have side effects.
//! Anything impure (password salting, clocks for the actor stamp) happens
//! before the loop.

use crate::change::ChangeLog;
use crate::password::{hash_password, DEFAULT_COST};
use crate::property::CONFIG_PASSWORD_HASH;
use crate::snapshot::{SnapshotEdit, StoredConfiguration};
use arc_swap::ArcSwap;
use cfgstore_model::value::{StringArrayValue, StringValue};
use cfgstore_model::{
    ConfigKey, ContentHash, DomainId, NativeValue, ProfileId, RecordType, StoreError, StoreResult,
    UserIdentity, ValueMetaData, ValueRef,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Copy-on-write editor over a [`StoredConfiguration`]
#[derive(Debug)]
pub struct StoredConfigurationModifier {
    base: Arc<StoredConfiguration>,
    current: ArcSwap<StoredConfiguration>,
    changes: Mutex<ChangeLog>,
}

impl StoredConfigurationModifier {
    /// Start an edit session
    #[must_use]
    pub fn new(config: StoredConfiguration) -> Self {
        Self::from_arc(Arc::new(config))
    }

    /// Start an edit session on a shared snapshot
    #[must_use]
    pub fn from_arc(config: Arc<StoredConfiguration>) -> Self {
        Self {
            current: ArcSwap::new(Arc::clone(&config)),
            base: config,
            changes: Mutex::new(ChangeLog::new()),
        }
    }

    /// Latest snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<StoredConfiguration> {
        self.current.load_full()
    }

    /// Snapshot the session started from
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Arc<StoredConfiguration> {
        &self.base
    }

    /// End the session, returning the latest snapshot
    #[must_use]
    pub fn into_snapshot(self) -> Arc<StoredConfiguration> {
        self.current.into_inner()
    }

    /// Keys whose value differs from the session start, as tracked live
    #[must_use]
    pub fn changed_keys(&self) -> BTreeSet<ConfigKey> {
        self.changes.lock().dirty_keys().clone()
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.changes.lock().is_empty()
    }

    /// Apply a pure transform with compare-and-swap retry
    ///
    /// The transform sees a fresh [`SnapshotEdit`] on every attempt. An edit
    /// that changes nothing leaves the current snapshot in place.
    ///
    /// # Errors
    /// Returns the transform's error; nothing is swapped in that case
    pub fn apply<F>(&self, operation: &str, transform: F) -> StoreResult<()>
    where
        F: Fn(&mut SnapshotEdit<'_>) -> StoreResult<()>,
    {
        let mut attempts = 0u32;
        let touched = loop {
            attempts += 1;
            let current = self.current.load_full();
            let mut edit = current.edit();
            transform(&mut edit)?;
            if !edit.is_changed() {
                tracing::trace!(operation, "transform made no changes");
                return Ok(());
            }
            let (next, touched) = edit.finish();
            let next = Arc::new(next);
            // swap and record under one lock so the log follows install order
            let mut changes = self.changes.lock();
            let previous = self.current.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&previous, &current) {
                for key in &touched {
                    changes.record(key, self.base.value_hash(key), next.value_hash(key));
                }
                break touched;
            }
            drop(changes);
            tracing::trace!(operation, attempts, "snapshot changed concurrently, retrying");
        };
        tracing::debug!(operation, attempts, keys = touched.len(), "applied");
        Ok(())
    }

    /// Store a setting value, stamping fresh metadata
    ///
    /// # Errors
    /// Returns ConfigState if the key breaks the profile rules, or Validation
    /// if the value fails its setting's rules
    pub fn write_setting(
        &self,
        key: &ConfigKey,
        value: ValueRef,
        actor: Option<&UserIdentity>,
    ) -> StoreResult<()> {
        let snapshot = self.snapshot();
        let catalog = snapshot.catalog();
        if key.record_type() != RecordType::Setting || !key.is_valid(catalog) {
            return Err(StoreError::config_state(format!("{key} is not a valid setting key")));
        }
        if let Some(def) = catalog.setting(key.record_id()) {
            if value.syntax() != def.syntax {
                return Err(StoreError::config_state(format!(
                    "{key} expects {} but got {}",
                    def.syntax,
                    value.syntax()
                )));
            }
            value
                .validate(def)
                .map_err(|e| StoreError::validation(key.clone(), e))?;
        }
        let metadata = ValueMetaData::now(actor.cloned());
        self.apply("write_setting", |edit| {
            edit.put_value(key.clone(), value.clone());
            edit.put_metadata(key.clone(), metadata.clone());
            Ok(())
        })
    }

    /// Store a config property; a blank value removes it
    ///
    /// # Errors
    /// Returns ConfigState if `name` is blank or holds `/` or `#`
    pub fn write_config_property(&self, name: &str, value: &str) -> StoreResult<()> {
        if !ConfigKey::is_valid_property_name(name) {
            return Err(StoreError::config_state(format!("invalid property name '{name}'")));
        }
        let key = ConfigKey::for_property(name);
        if value.trim().is_empty() {
            return self.apply("remove_config_property", |edit| {
                edit.remove_value(&key);
                edit.remove_metadata(&key);
                Ok(())
            });
        }
        let value = StringValue::new(value).into_ref();
        self.apply("write_config_property", |edit| {
            edit.put_value(key.clone(), value.clone());
            Ok(())
        })
    }

    /// Drop a stored setting value so the default applies again
    ///
    /// Unlike [`delete_key`](Self::delete_key), the metadata entry is kept and
    /// re-stamped with the resetting actor.
    ///
    /// # Errors
    /// Returns ConfigState if `key` is not a setting key
    pub fn reset_setting(&self, key: &ConfigKey, actor: Option<&UserIdentity>) -> StoreResult<()> {
        if key.record_type() != RecordType::Setting {
            return Err(StoreError::config_state(format!("{key} is not a setting")));
        }
        let metadata = ValueMetaData::now(actor.cloned());
        self.apply("reset_setting", |edit| {
            edit.remove_value(key);
            edit.put_metadata(key.clone(), metadata.clone());
            Ok(())
        })
    }

    /// Remove a record's value and metadata
    ///
    /// # Errors
    /// Never fails today; kept fallible like every other write
    pub fn delete_key(&self, key: &ConfigKey) -> StoreResult<()> {
        self.apply("delete_key", |edit| {
            edit.remove_value(key);
            edit.remove_metadata(key);
            Ok(())
        })
    }

    /// Duplicate a profile
    ///
    /// Copies every non-default value of `source` in `category` and its
    /// associated profile categories to `destination`, then appends
    /// `destination` to the profile list with one metadata stamp.
    ///
    /// # Errors
    /// Returns ConfigState if the category is not profile-scoped, `source`
    /// does not exist, or `destination` already exists
    pub fn copy_profile_id(
        &self,
        domain: &DomainId,
        category: &str,
        source: &ProfileId,
        destination: &ProfileId,
        actor: Option<&UserIdentity>,
    ) -> StoreResult<()> {
        let metadata = ValueMetaData::now(actor.cloned());
        self.apply("copy_profile_id", |edit| {
            let base = edit.base();
            let catalog = edit.catalog();
            let profile_def = catalog.profile_setting_for_category(category).ok_or_else(|| {
                StoreError::config_state(format!("category {category} is not profile-scoped"))
            })?;
            let profiles = base.profile_ids(domain, category);
            if !profiles.contains(source) {
                return Err(StoreError::config_state(format!("source profile '{source}' does not exist")));
            }
            if profiles.contains(destination) {
                return Err(StoreError::config_state(format!(
                    "destination profile '{destination}' already exists"
                )));
            }

            let categories = catalog.associated_profile_categories(category);
            let mut copies = Vec::new();
            for def in catalog.settings_in(&categories) {
                let from = ConfigKey::unchecked(domain.clone(), RecordType::Setting, &def.key, Some(source.clone()));
                let Some(value) = base.read_stored_value(&from) else {
                    continue;
                };
                if base.is_default_value(&from)? {
                    continue;
                }
                copies.push((from.with_profile(Some(destination.clone())), value));
            }
            for (to, value) in copies {
                edit.put_value(to, value);
            }

            let list_key = ConfigKey::unchecked(domain.clone(), RecordType::Setting, &profile_def.key, None);
            let mut ids: Vec<String> = profiles.iter().map(|p| p.as_str().to_string()).collect();
            ids.push(destination.as_str().to_string());
            edit.put_value(list_key.clone(), Arc::new(StringArrayValue::profiles(ids)));
            edit.put_metadata(list_key, metadata.clone());
            Ok(())
        })
    }

    /// Set the configuration password (stored as a bcrypt hash)
    ///
    /// # Errors
    /// Returns ConfigState for blank input
    pub fn set_password(&self, password: &str) -> StoreResult<()> {
        self.set_password_with_cost(password, DEFAULT_COST)
    }

    /// [`set_password`](Self::set_password) with an explicit bcrypt cost
    ///
    /// # Errors
    /// Returns ConfigState for blank input or an unusable cost
    pub fn set_password_with_cost(&self, password: &str, cost: u32) -> StoreResult<()> {
        let hash = hash_password(password, cost)?;
        self.write_config_property(CONFIG_PASSWORD_HASH, &hash)
    }

    /// Store locale overrides for one bundle key; an empty map removes them
    ///
    /// # Errors
    /// Returns ConfigState if the bundle or key is not in the catalog
    pub fn write_locale_bundle_map(
        &self,
        domain: &DomainId,
        bundle: &str,
        key: &str,
        map: BTreeMap<String, String>,
        actor: Option<&UserIdentity>,
    ) -> StoreResult<()> {
        let snapshot = self.snapshot();
        let key = ConfigKey::for_locale_bundle(snapshot.catalog(), domain.clone(), bundle, key)?;
        if map.is_empty() {
            return self.delete_key(&key);
        }
        let value = StoredConfiguration::bundle_value(map);
        let metadata = ValueMetaData::now(actor.cloned());
        self.apply("write_locale_bundle_map", |edit| {
            edit.put_value(key.clone(), value.clone());
            edit.put_metadata(key.clone(), metadata.clone());
            Ok(())
        })
    }

    /// Content hash of a key in the latest snapshot
    #[must_use]
    pub fn value_hash(&self, key: &ConfigKey) -> Option<ContentHash> {
        self.current.load().value_hash(key)
    }

    /// Profile list value of `domain`/`category` in the latest snapshot
    #[must_use]
    pub fn profile_ids(&self, domain: &DomainId, category: &str) -> Vec<ProfileId> {
        self.current.load().profile_ids(domain, category)
    }

    /// Native view of a stored value in the latest snapshot
    #[must_use]
    pub fn read_native(&self, key: &ConfigKey) -> Option<NativeValue> {
        self.current.load().read_stored_value(key).map(|v| v.to_native())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_model::value::{PasswordValue, SelectValue};
    use cfgstore_model::{
        Catalog, CatalogBuilder, CategoryDef, ErrorKind, LocaleBundleDef, SettingDef, Syntax,
        SyntaxRegistry,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            CatalogBuilder::new()
                .category(CategoryDef::new("general"))
                .category(CategoryDef::new("ldap").with_profile_setting("ldap.profiles"))
                .category(CategoryDef::new("ldap.login").with_parent("ldap"))
                .setting(SettingDef::new("site.title", "general", Syntax::String).with_length(None, Some(10)))
                .setting(SettingDef::new("ldap.profiles", "general", Syntax::Profile))
                .setting(SettingDef::new("ldap.url", "ldap", Syntax::String).with_default(json!("ldap://localhost")))
                .setting(SettingDef::new("ldap.bindPassword", "ldap", Syntax::Password))
                .setting(
                    SettingDef::new("ldap.login.mode", "ldap.login", Syntax::Select)
                        .with_option("BIND", "Bind")
                        .with_option("SEARCH", "Search")
                        .with_default(json!("BIND")),
                )
                .locale_bundle(LocaleBundleDef {
                    name: "Display".into(),
                    keys: ["Title".to_string()].into_iter().collect(),
                })
                .build()
                .unwrap(),
        )
    }

    fn modifier() -> StoredConfigurationModifier {
        let config =
            StoredConfiguration::new_empty(catalog(), Arc::new(SyntaxRegistry::with_defaults())).unwrap();
        StoredConfigurationModifier::new(config)
    }

    fn setting(m: &StoredConfigurationModifier, name: &str, profile: Option<&str>) -> ConfigKey {
        ConfigKey::for_setting(
            m.snapshot().catalog(),
            DomainId::system(),
            name,
            profile.map(ProfileId::new),
        )
        .unwrap()
    }

    #[test]
    fn write_setting_stamps_metadata() {
        let m = modifier();
        let key = setting(&m, "site.title", None);
        let actor = UserIdentity::new("admin");
        m.write_setting(&key, StringValue::new("Portal").into_ref(), Some(&actor)).unwrap();

        let snapshot = m.snapshot();
        let meta = snapshot.read_metadata(&key).unwrap();
        assert_eq!(meta.user_identity.as_ref(), Some(&actor));
        assert!(meta.modify_date.is_some());
        assert!(snapshot.modify_time() >= m.base().modify_time());
    }

    #[test]
    fn write_setting_validates() {
        let m = modifier();
        let key = setting(&m, "site.title", None);
        let err = m
            .write_setting(&key, StringValue::new("far too long a title").into_ref(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let wrong_syntax = m
            .write_setting(&key, Arc::new(SelectValue::new("x")), None)
            .unwrap_err();
        assert_eq!(wrong_syntax.kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn write_setting_rejects_bad_profile_cardinality() {
        let m = modifier();
        let raw = ConfigKey::unchecked(DomainId::system(), RecordType::Setting, "ldap.url", None);
        let err = m
            .write_setting(&raw, StringValue::new("ldap://x").into_ref(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn blank_property_value_removes_it() {
        let m = modifier();
        m.write_config_property("notes", "hello").unwrap();
        assert_eq!(m.snapshot().read_config_property("notes").as_deref(), Some("hello"));
        m.write_config_property("notes", "   ").unwrap();
        assert_eq!(m.snapshot().read_config_property("notes"), None);
        assert!(m.snapshot().read_stored_value(&ConfigKey::for_property("notes")).is_none());
    }

    #[test]
    fn retried_edit_records_the_value_it_installed() {
        let m = modifier();
        let key = setting(&m, "site.title", None);
        let first_attempt = std::sync::atomic::AtomicBool::new(true);
        m.apply("test", |edit| {
            if first_attempt.swap(false, std::sync::atomic::Ordering::SeqCst) {
                // a competing write lands between load and swap
                m.write_setting(&key, StringValue::new("Other").into_ref(), None)?;
            }
            edit.put_value(key.clone(), StringValue::new("Mine").into_ref());
            Ok(())
        })
        .unwrap();

        let stored = m.snapshot().read_stored_value(&key).unwrap();
        assert_eq!(stored.to_native(), NativeValue::String("Mine".into()));
        assert!(m.changed_keys().contains(&key));

        m.delete_key(&key).unwrap();
        assert!(!m.is_modified());
    }

    #[test]
    fn property_names_with_key_separators_are_rejected() {
        let m = modifier();
        for name in ["ldap#extra", "a/b", ""] {
            let err = m.write_config_property(name, "v").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigState, "{name}");
        }
        assert!(!m.is_modified());
    }

    #[test]
    fn reset_keeps_metadata_but_delete_clears_it() {
        let m = modifier();
        let key = setting(&m, "site.title", None);
        m.write_setting(&key, StringValue::new("A").into_ref(), None).unwrap();

        let resetter = UserIdentity::new("auditor");
        m.reset_setting(&key, Some(&resetter)).unwrap();
        let snapshot = m.snapshot();
        assert!(snapshot.read_stored_value(&key).is_none());
        assert_eq!(
            snapshot.read_metadata(&key).and_then(|meta| meta.user_identity.clone()),
            Some(resetter)
        );

        m.write_setting(&key, StringValue::new("B").into_ref(), None).unwrap();
        m.delete_key(&key).unwrap();
        let snapshot = m.snapshot();
        assert!(snapshot.read_stored_value(&key).is_none());
        assert!(snapshot.read_metadata(&key).is_none());
    }

    #[test]
    fn live_change_log_detects_revert() {
        let m = modifier();
        let key = setting(&m, "site.title", None);
        m.write_setting(&key, StringValue::new("x").into_ref(), None).unwrap();
        let session = StoredConfigurationModifier::from_arc(m.snapshot());

        session.write_setting(&key, StringValue::new("y").into_ref(), None).unwrap();
        assert_eq!(session.changed_keys(), BTreeSet::from([key.clone()]));

        session.write_setting(&key, StringValue::new("x").into_ref(), None).unwrap();
        assert!(session.changed_keys().is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn copy_profile_copies_only_non_default_values() {
        let m = modifier();
        let list = setting(&m, "ldap.profiles", None);
        m.write_setting(&list, Arc::new(StringArrayValue::profiles(["corp"])), None).unwrap();
        let url = setting(&m, "ldap.url", Some("corp"));
        let secret = setting(&m, "ldap.bindPassword", Some("corp"));
        let mode = setting(&m, "ldap.login.mode", Some("corp"));
        m.write_setting(&url, StringValue::new("ldaps://corp").into_ref(), None).unwrap();
        m.write_setting(&secret, Arc::new(PasswordValue::new("pw")), None).unwrap();
        // equal to the default, so not copied
        m.write_setting(&mode, Arc::new(SelectValue::new("BIND")), None).unwrap();

        let corp = ProfileId::new("corp");
        let lab = ProfileId::new("lab");
        m.copy_profile_id(&DomainId::system(), "ldap.login", &corp, &lab, None).unwrap();

        let snapshot = m.snapshot();
        assert_eq!(m.profile_ids(&DomainId::system(), "ldap"), vec![corp.clone(), lab.clone()]);
        assert_eq!(
            snapshot.value_hash(&url.with_profile(Some(lab.clone()))),
            snapshot.value_hash(&url)
        );
        assert!(snapshot.read_stored_value(&secret.with_profile(Some(lab.clone()))).is_some());
        assert!(snapshot.read_stored_value(&mode.with_profile(Some(lab.clone()))).is_none());
        assert!(snapshot.read_metadata(&list).is_some());

        let again = m.copy_profile_id(&DomainId::system(), "ldap", &corp, &lab, None).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn copy_profile_error_cases() {
        let m = modifier();
        let corp = ProfileId::new("corp");
        let lab = ProfileId::new("lab");
        let not_profiled = m.copy_profile_id(&DomainId::system(), "general", &corp, &lab, None);
        assert_eq!(not_profiled.unwrap_err().kind(), ErrorKind::ConfigState);
        let missing = m.copy_profile_id(&DomainId::system(), "ldap", &corp, &lab, None);
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn set_password_hashes_and_rejects_blank() {
        let m = modifier();
        assert_eq!(m.set_password_with_cost("  ", 4).unwrap_err().kind(), ErrorKind::ConfigState);
        m.set_password_with_cost("letmein", 4).unwrap();
        let snapshot = m.snapshot();
        let stored = snapshot.read_config_property(CONFIG_PASSWORD_HASH).unwrap();
        assert_ne!(stored, "letmein");
        assert!(crate::password::verify_password(&snapshot, "letmein"));
        assert!(!crate::password::verify_password(&snapshot, "wrong"));
    }

    #[test]
    fn locale_bundle_map_round_trip() {
        let m = modifier();
        let map = BTreeMap::from([("".to_string(), "Portal".to_string()), ("de".to_string(), "Portal DE".to_string())]);
        m.write_locale_bundle_map(&DomainId::system(), "Display", "Title", map.clone(), None).unwrap();
        let read = m.snapshot().read_locale_bundle_map(&DomainId::system(), "Display", "Title").unwrap();
        assert_eq!(read, Some(map));

        m.write_locale_bundle_map(&DomainId::system(), "Display", "Title", BTreeMap::new(), None).unwrap();
        let read = m.snapshot().read_locale_bundle_map(&DomainId::system(), "Display", "Title").unwrap();
        assert_eq!(read, None);

        let bad = m.write_locale_bundle_map(&DomainId::system(), "Display", "Nope", BTreeMap::new(), None);
        assert_eq!(bad.unwrap_err().kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn noop_transform_keeps_snapshot() {
        let m = modifier();
        let before = m.snapshot();
        m.delete_key(&ConfigKey::for_property("absent")).unwrap();
        assert!(Arc::ptr_eq(&before, &m.snapshot()));
    }
}
