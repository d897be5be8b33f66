//! Ordered migration passes

use crate::document::{
    AppPropertyOverrides, BackfillPropertyType, DocumentPass, LegacyConfigProperties,
    MergeDefaultValues, MergeUntypedProperties,
};
use crate::gate::check_removed_settings;
use crate::settings::{
    BooleanToSelect, DropOrphanedProfileValues, HealthStatsPublic, ProfileUnprofiledValues,
    SettingsPass,
};
use cfgstore_core::{StoredConfiguration, StoredConfigurationModifier};
use cfgstore_model::{Catalog, StoreResult, XmlDocument};
use std::sync::Arc;

/// Result of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub pass: &'static str,
    pub changed: usize,
    /// Set when the pass as a whole failed and was skipped
    pub error: Option<String>,
}

/// What a pipeline stage did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub passes: Vec<PassOutcome>,
}

impl MigrationReport {
    /// Records changed across all passes
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.passes.iter().map(|p| p.changed).sum()
    }

    /// Passes that failed and were skipped
    pub fn failures(&self) -> impl Iterator<Item = &PassOutcome> {
        self.passes.iter().filter(|p| p.error.is_some())
    }

    fn record(&mut self, pass: &'static str, result: StoreResult<usize>) {
        let outcome = match result {
            Ok(changed) => {
                if changed > 0 {
                    tracing::info!(pass, changed, "migration pass applied");
                }
                PassOutcome { pass, changed, error: None }
            }
            Err(error) => {
                tracing::warn!(pass, %error, "migration pass failed, skipped");
                PassOutcome {
                    pass,
                    changed: 0,
                    error: Some(error.to_string()),
                }
            }
        };
        self.passes.push(outcome);
    }
}

/// Pre-decode and post-decode passes, run in registration order
#[derive(Debug, Clone, Default)]
pub struct MigrationPipeline {
    document_passes: Vec<Arc<dyn DocumentPass>>,
    settings_passes: Vec<Arc<dyn SettingsPass>>,
}

impl MigrationPipeline {
    /// Pipeline without passes
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with the built-in passes
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        pipeline.register_document_pass(MergeDefaultValues);
        pipeline.register_document_pass(MergeUntypedProperties);
        pipeline.register_document_pass(AppPropertyOverrides);
        pipeline.register_document_pass(LegacyConfigProperties);
        pipeline.register_document_pass(BackfillPropertyType);
        pipeline.register_settings_pass(BooleanToSelect::ad_complexity());
        pipeline.register_settings_pass(BooleanToSelect::minimum_lifetime());
        pipeline.register_settings_pass(HealthStatsPublic);
        pipeline.register_settings_pass(ProfileUnprofiledValues);
        pipeline.register_settings_pass(DropOrphanedProfileValues);
        pipeline
    }

    pub fn register_document_pass(&mut self, pass: impl DocumentPass + 'static) {
        self.document_passes.push(Arc::new(pass));
    }

    pub fn register_settings_pass(&mut self, pass: impl SettingsPass + 'static) {
        self.settings_passes.push(Arc::new(pass));
    }

    /// Names of the document passes, in run order
    #[must_use]
    pub fn document_pass_names(&self) -> Vec<&'static str> {
        self.document_passes.iter().map(|p| p.name()).collect()
    }

    /// Names of the settings passes, in run order
    #[must_use]
    pub fn settings_pass_names(&self) -> Vec<&'static str> {
        self.settings_passes.iter().map(|p| p.name()).collect()
    }

    /// Run every document pass over the raw tree
    pub fn migrate_document(&self, document: &mut XmlDocument, catalog: &Catalog) -> MigrationReport {
        let _span = tracing::info_span!("migrate", stage = "document").entered();
        let mut report = MigrationReport::default();
        for pass in &self.document_passes {
            report.record(pass.name(), pass.apply(document, catalog));
        }
        report
    }

    /// Run every settings pass through `modifier`
    pub fn migrate_settings(&self, modifier: &StoredConfigurationModifier) -> MigrationReport {
        let _span = tracing::info_span!("migrate", stage = "settings").entered();
        let mut report = MigrationReport::default();
        for pass in &self.settings_passes {
            report.record(pass.name(), pass.apply(modifier));
        }
        report
    }

    /// Final gate after all passes
    ///
    /// # Errors
    /// Returns a Format error if a removed setting survived migration
    pub fn check(&self, config: &StoredConfiguration) -> StoreResult<()> {
        check_removed_settings(config)
    }
}
