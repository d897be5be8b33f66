//! Post-decode passes
//!
//! Each pass inspects the latest snapshot, then migrates one record at a time
//! through the modifier. A record that cannot be migrated is logged and left
//! alone; the rest of the pass carries on.

use crate::legacy;
use cfgstore_core::{StoredConfiguration, StoredConfigurationModifier};
use cfgstore_model::value::{OptionListValue, SelectValue};
use cfgstore_model::{ConfigKey, NativeValue, RecordType, StoreError, StoreResult, ValueRef};
use std::fmt::Debug;
use std::sync::Arc;

/// Rewrite of decoded settings
pub trait SettingsPass: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Migrate through `modifier`, returning the number of changed records
    ///
    /// # Errors
    /// Returns error only when the whole pass cannot run
    fn apply(&self, modifier: &StoredConfigurationModifier) -> StoreResult<usize>;
}

/// Stored setting keys with record id `setting`, in canonical order
fn stored_setting_keys(config: &StoredConfiguration, setting: &str) -> Vec<ConfigKey> {
    let mut keys: Vec<ConfigKey> = config
        .stored_keys()
        .filter(|k| k.is_setting() && k.record_id() == setting)
        .cloned()
        .collect();
    ConfigKey::sort(&mut keys, config.catalog());
    keys
}

fn stored_bool(config: &StoredConfiguration, key: &ConfigKey) -> Option<bool> {
    match config.read_stored_value(key)?.to_native() {
        NativeValue::Boolean(b) => Some(b),
        _ => None,
    }
}

/// Move `from` to `to` with a new value, carrying its metadata along
fn replace(modifier: &StoredConfigurationModifier, from: &ConfigKey, to: &ConfigKey, value: ValueRef) -> StoreResult<()> {
    let def = modifier
        .snapshot()
        .catalog()
        .setting(to.record_id())
        .cloned()
        .ok_or_else(|| StoreError::config_state(format!("unknown setting {}", to.record_id())))?;
    value.validate(&def).map_err(|e| StoreError::validation(to.clone(), e))?;
    modifier.apply("migrate_setting", |edit| {
        let metadata = edit.base().read_metadata(from).cloned();
        edit.remove_value(from);
        edit.remove_metadata(from);
        edit.put_value(to.clone(), value.clone());
        if let Some(metadata) = metadata {
            edit.put_metadata(to.clone(), metadata);
        }
        Ok(())
    })
}

fn log_outcome(pass: &str, key: &ConfigKey, result: StoreResult<()>, changed: &mut usize) {
    match result {
        Ok(()) => {
            *changed += 1;
            tracing::info!(pass, %key, "migrated");
        }
        Err(error) => tracing::warn!(pass, %key, %error, "migration of record failed, skipped"),
    }
}

/// Replace a deprecated boolean with a leveled select setting
#[derive(Debug, Clone)]
pub struct BooleanToSelect {
    name: &'static str,
    legacy: &'static str,
    replacement: &'static str,
    when_true: &'static str,
    when_false: &'static str,
}

impl BooleanToSelect {
    #[must_use]
    pub fn new(
        name: &'static str,
        legacy: &'static str,
        replacement: &'static str,
        when_true: &'static str,
        when_false: &'static str,
    ) -> Self {
        Self {
            name,
            legacy,
            replacement,
            when_true,
            when_false,
        }
    }

    /// `ADComplexity` → `ADComplexityLevel`
    #[must_use]
    pub fn ad_complexity() -> Self {
        Self::new(
            "ad-complexity-level",
            legacy::AD_COMPLEXITY,
            legacy::AD_COMPLEXITY_LEVEL,
            legacy::AD_COMPLEXITY_ON,
            legacy::OPTION_NONE,
        )
    }

    /// `minimumLifetime.enable` → `minimumLifetime.mode`
    #[must_use]
    pub fn minimum_lifetime() -> Self {
        Self::new(
            "minimum-lifetime-mode",
            legacy::MINIMUM_LIFETIME_ENABLE,
            legacy::MINIMUM_LIFETIME_MODE,
            legacy::MINIMUM_LIFETIME_ON,
            legacy::OPTION_NONE,
        )
    }
}

impl SettingsPass for BooleanToSelect {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, modifier: &StoredConfigurationModifier) -> StoreResult<usize> {
        let config = modifier.snapshot();
        let catalog = config.catalog();
        if catalog.setting(self.legacy).is_none() || catalog.setting(self.replacement).is_none() {
            tracing::debug!(pass = self.name, "settings not in catalog, pass skipped");
            return Ok(0);
        }
        let mut changed = 0;
        for from in stored_setting_keys(&config, self.legacy) {
            let Some(enabled) = stored_bool(&config, &from) else {
                tracing::warn!(pass = self.name, key = %from, "legacy value is not a boolean, skipped");
                continue;
            };
            let to = ConfigKey::unchecked(
                from.domain().clone(),
                RecordType::Setting,
                self.replacement,
                from.profile().cloned(),
            );
            // an explicit replacement value takes precedence
            let result = if config.read_stored_value(&to).is_some() {
                modifier.delete_key(&from)
            } else {
                let option = if enabled { self.when_true } else { self.when_false };
                replace(modifier, &from, &to, Arc::new(SelectValue::new(option)))
            };
            log_outcome(self.name, &from, result, &mut changed);
        }
        Ok(changed)
    }
}

/// Fold the deprecated public health-stats boolean into the public web
/// service option set
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthStatsPublic;

impl SettingsPass for HealthStatsPublic {
    fn name(&self) -> &'static str {
        "health-stats-public"
    }

    fn apply(&self, modifier: &StoredConfigurationModifier) -> StoreResult<usize> {
        let config = modifier.snapshot();
        let catalog = config.catalog();
        if catalog.setting(legacy::HEALTH_STATS_PUBLIC).is_none()
            || catalog.setting(legacy::PUBLIC_WEBSERVICES).is_none()
        {
            tracing::debug!(pass = self.name(), "settings not in catalog, pass skipped");
            return Ok(0);
        }
        let mut changed = 0;
        for from in stored_setting_keys(&config, legacy::HEALTH_STATS_PUBLIC) {
            let Some(enabled) = stored_bool(&config, &from) else {
                tracing::warn!(pass = self.name(), key = %from, "legacy value is not a boolean, skipped");
                continue;
            };
            let to = ConfigKey::unchecked(
                from.domain().clone(),
                RecordType::Setting,
                legacy::PUBLIC_WEBSERVICES,
                from.profile().cloned(),
            );
            let result = if enabled {
                config.read_setting(&to).and_then(|current| {
                    let mut options: Vec<String> = match current.to_native() {
                        NativeValue::List(options) => options,
                        _ => Vec::new(),
                    };
                    options.push(legacy::HEALTH_OPTION.to_string());
                    replace(modifier, &from, &to, Arc::new(OptionListValue::new(options)))
                })
            } else {
                modifier.delete_key(&from)
            };
            log_outcome(self.name(), &from, result, &mut changed);
        }
        Ok(changed)
    }
}

/// Spread values stored without a profile onto every profile of a category
/// that has since become profile-scoped
///
/// Existing profiled values are not overwritten. The unprofiled entry is
/// removed afterwards, also when the category has no profiles yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileUnprofiledValues;

impl SettingsPass for ProfileUnprofiledValues {
    fn name(&self) -> &'static str {
        "profile-unprofiled-values"
    }

    fn apply(&self, modifier: &StoredConfigurationModifier) -> StoreResult<usize> {
        let config = modifier.snapshot();
        let catalog = config.catalog();
        let mut keys: Vec<ConfigKey> = config
            .stored_keys()
            .filter(|k| k.is_setting() && k.profile().is_none())
            .filter(|k| catalog.setting(k.record_id()).is_some_and(|d| catalog.is_profiled(d)))
            .cloned()
            .collect();
        ConfigKey::sort(&mut keys, catalog);

        let mut changed = 0;
        for key in keys {
            let (Some(def), Some(value)) = (catalog.setting(key.record_id()), config.read_stored_value(&key)) else {
                continue;
            };
            let profiles = config.profile_ids(key.domain(), &def.category);
            let metadata = config.read_metadata(&key).cloned();
            let result = modifier.apply("profile_unprofiled_value", |edit| {
                for profile in &profiles {
                    let to = key.with_profile(Some(profile.clone()));
                    if edit.stored_value(&to).is_some() {
                        continue;
                    }
                    edit.put_value(to.clone(), value.clone());
                    if let Some(metadata) = &metadata {
                        edit.put_metadata(to, metadata.clone());
                    }
                }
                edit.remove_value(&key);
                edit.remove_metadata(&key);
                Ok(())
            });
            if result.is_ok() {
                tracing::debug!(%key, profiles = profiles.len(), "copied onto profiles");
            }
            log_outcome(self.name(), &key, result, &mut changed);
        }
        Ok(changed)
    }
}

/// Delete values stored under a profile that is not a current profile of
/// the setting's category
#[derive(Debug, Clone, Copy, Default)]
pub struct DropOrphanedProfileValues;

impl SettingsPass for DropOrphanedProfileValues {
    fn name(&self) -> &'static str {
        "drop-orphaned-profile-values"
    }

    fn apply(&self, modifier: &StoredConfigurationModifier) -> StoreResult<usize> {
        let config = modifier.snapshot();
        let catalog = config.catalog();
        let mut orphans: Vec<ConfigKey> = config
            .stored_keys()
            .filter(|k| k.is_setting())
            .filter(|k| {
                let (Some(profile), Some(def)) = (k.profile(), catalog.setting(k.record_id())) else {
                    return false;
                };
                !config.profile_ids(k.domain(), &def.category).contains(profile)
            })
            .cloned()
            .collect();
        ConfigKey::sort(&mut orphans, catalog);

        let mut changed = 0;
        for key in orphans {
            let result = modifier.delete_key(&key);
            log_outcome(self.name(), &key, result, &mut changed);
        }
        Ok(changed)
    }
}
