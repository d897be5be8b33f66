//! Change detection
//!
//! Two independent mechanisms, both keyed on value content hashes:
//!
//! - [`ChangeLog`]: live, per edit session. Remembers the original hash of
//!   every touched key so writing the original value back clears the key.
//! - [`full_diff`]: compares two snapshots key by key, in parallel.

use crate::snapshot::StoredConfiguration;
use cfgstore_model::{ConfigKey, ContentHash};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Incremental dirty tracking for one edit session
#[derive(Debug, Default, Clone)]
pub struct ChangeLog {
    originals: BTreeMap<ConfigKey, Option<ContentHash>>,
    dirty: BTreeSet<ConfigKey>,
}

impl ChangeLog {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` now hashes to `current`
    ///
    /// `original` is only kept on the first touch of the key.
    pub fn record(&mut self, key: &ConfigKey, original: Option<ContentHash>, current: Option<ContentHash>) {
        let original = *self.originals.entry(key.clone()).or_insert(original);
        if original == current {
            self.dirty.remove(key);
        } else {
            self.dirty.insert(key.clone());
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self, key: &ConfigKey) -> bool {
        self.dirty.contains(key)
    }

    /// Keys whose value differs from the session start
    #[inline]
    #[must_use]
    pub fn dirty_keys(&self) -> &BTreeSet<ConfigKey> {
        &self.dirty
    }

    /// Original hash of a touched key (`Some(None)` for a key that had no value)
    #[inline]
    #[must_use]
    pub fn original_hash(&self, key: &ConfigKey) -> Option<Option<ContentHash>> {
        self.originals.get(key).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn clear(&mut self) {
        self.originals.clear();
        self.dirty.clear();
    }
}

/// Keys whose stored value differs between two snapshots
///
/// A key counts as changed when its content hash differs, including when it
/// is present in only one snapshot. Results are in canonical order of
/// `after`'s catalog.
#[must_use]
pub fn full_diff(before: &StoredConfiguration, after: &StoredConfiguration) -> Vec<ConfigKey> {
    if before.content_digest() == after.content_digest() {
        return Vec::new();
    }
    let keys: BTreeSet<&ConfigKey> = before.stored_keys().chain(after.stored_keys()).collect();
    let keys: Vec<ConfigKey> = keys.into_iter().cloned().collect();
    diff_keys(before, after, &keys)
}

/// Which of `keys` differ between two snapshots
#[must_use]
pub fn diff_keys(
    before: &StoredConfiguration,
    after: &StoredConfiguration,
    keys: &[ConfigKey],
) -> Vec<ConfigKey> {
    let mut changed: Vec<ConfigKey> = keys
        .par_iter()
        .filter(|key| before.value_hash(key) != after.value_hash(key))
        .cloned()
        .collect();
    ConfigKey::sort(&mut changed, after.catalog());
    tracing::debug!(checked = keys.len(), changed = changed.len(), "snapshot diff");
    changed
}
