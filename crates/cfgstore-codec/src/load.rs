//! Shared tail of every read: migrate, gate, validate

use crate::codec::ReadContext;
use cfgstore_core::{SnapshotBuilder, StoredConfiguration, StoredConfigurationModifier};
use cfgstore_model::{StoreError, StoreResult};
use std::sync::Arc;

pub(crate) fn finish_load(builder: SnapshotBuilder, ctx: &ReadContext) -> StoreResult<StoredConfiguration> {
    let modifier = StoredConfigurationModifier::new(builder.build()?);
    let report = ctx.migrations().migrate_settings(&modifier);
    let config = modifier.into_snapshot();
    ctx.migrations().check(&config)?;
    validate_values(&config)?;
    tracing::debug!(
        values = config.len(),
        migrated = report.total_changes(),
        "configuration decoded"
    );
    Ok(Arc::try_unwrap(config).unwrap_or_else(|shared| (*shared).clone()))
}

/// Every stored setting must sit under a valid key and pass its rules
fn validate_values(config: &StoredConfiguration) -> StoreResult<()> {
    let catalog = config.catalog();
    for key in config.keys() {
        if !key.is_valid(catalog) {
            return Err(StoreError::format(format!("{key} is not a valid key after migration")));
        }
        if !key.is_setting() {
            continue;
        }
        let (Some(def), Some(value)) = (catalog.setting(key.record_id()), config.read_stored_value(&key)) else {
            continue;
        };
        value
            .validate(def)
            .map_err(|e| StoreError::validation(key.clone(), e))?;
    }
    Ok(())
}
