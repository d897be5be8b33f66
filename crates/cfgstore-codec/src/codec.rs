//! Codec contract

use crate::format::ConfigFormat;
use cfgstore_core::property::STORE_PLAINTEXT_VALUES;
use cfgstore_core::StoredConfiguration;
use cfgstore_migration::MigrationPipeline;
use cfgstore_model::{Catalog, EncodingMode, StoreResult, SyntaxRegistry};
use std::fmt::Debug;
use std::sync::Arc;

/// Everything a read needs besides the bytes
#[derive(Debug, Clone)]
pub struct ReadContext {
    catalog: Arc<Catalog>,
    registry: Arc<SyntaxRegistry>,
    migrations: Arc<MigrationPipeline>,
}

impl ReadContext {
    /// Context with the built-in migration passes
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, registry: Arc<SyntaxRegistry>) -> Self {
        Self {
            catalog,
            registry,
            migrations: Arc::new(MigrationPipeline::with_defaults()),
        }
    }

    #[must_use]
    pub fn with_migrations(mut self, migrations: MigrationPipeline) -> Self {
        self.migrations = Arc::new(migrations);
        self
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

    #[inline]
    #[must_use]
    pub fn migrations(&self) -> &MigrationPipeline {
        &self.migrations
    }
}

/// One on-disk format
pub trait ConfigCodec: Debug + Send + Sync {
    fn format(&self) -> ConfigFormat;

    /// Decode, migrate and validate a snapshot
    ///
    /// # Errors
    /// Returns Format for malformed or disallowed content and Validation for
    /// a value that fails its rules; no snapshot is produced in either case
    fn read(&self, bytes: &[u8], ctx: &ReadContext) -> StoreResult<StoredConfiguration>;

    /// Encode a snapshot
    ///
    /// # Errors
    /// Returns error if a value cannot be encoded
    fn write(&self, config: &StoredConfiguration, mode: EncodingMode) -> StoreResult<Vec<u8>>;
}

/// Mode actually used for writing `config`
///
/// Plain output needs the configuration's own opt-in; without it the
/// values are encoded.
#[must_use]
pub fn effective_mode(config: &StoredConfiguration, requested: EncodingMode) -> EncodingMode {
    if requested != EncodingMode::Plain {
        return requested;
    }
    let opted_in = config
        .read_config_property(STORE_PLAINTEXT_VALUES)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    if opted_in {
        EncodingMode::Plain
    } else {
        tracing::warn!(property = STORE_PLAINTEXT_VALUES, "plain output not enabled, writing encoded values");
        EncodingMode::Encoded
    }
}
