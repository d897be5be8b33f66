//! Configuration Migration
//!
//! Load-time upgrade of documents written by older releases. Runs once per
//! load, never on save.
//!
//! # Core Concepts
//!
//! - [`DocumentPass`]: rewrites the raw XML tree before any value is decoded
//! - [`SettingsPass`]: rewrites decoded settings through a
//!   [`StoredConfigurationModifier`](cfgstore_core::StoredConfigurationModifier)
//! - [`MigrationPipeline`]: ordered passes; a failing item or pass is logged
//!   and skipped
//! - [`check_removed_settings`]: final gate, aborts the load if a hard-removed
//!   setting is still present
//!
//! Every pass is idempotent: a second run finds nothing left to change.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod gate;
pub mod legacy;
mod pipeline;
mod settings;

pub use document::{
    AppPropertyOverrides, BackfillPropertyType, DocumentPass, LegacyConfigProperties,
    MergeDefaultValues, MergeUntypedProperties,
};
pub use gate::check_removed_settings;
pub use pipeline::{MigrationPipeline, MigrationReport, PassOutcome};
pub use settings::{BooleanToSelect, DropOrphanedProfileValues, HealthStatsPublic, ProfileUnprofiledValues, SettingsPass};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
