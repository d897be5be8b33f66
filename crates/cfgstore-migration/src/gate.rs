//! Post-migration validation gate

use cfgstore_core::StoredConfiguration;
use cfgstore_model::{StoreError, StoreResult};

/// Refuse configurations that still hold a hard-removed setting
///
/// # Errors
/// Returns a Format error naming every offending key
pub fn check_removed_settings(config: &StoredConfiguration) -> StoreResult<()> {
    let catalog = config.catalog();
    let removed: Vec<String> = config
        .keys()
        .into_iter()
        .filter(|k| k.is_setting() && catalog.setting(k.record_id()).is_some_and(|d| d.removed))
        .map(|k| k.to_string())
        .collect();
    if removed.is_empty() {
        return Ok(());
    }
    tracing::error!(keys = ?removed, "configuration holds removed settings");
    Err(StoreError::format(format!(
        "configuration holds settings that are no longer supported: {}",
        removed.join(", ")
    )))
}
