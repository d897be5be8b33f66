//! Configuration Store Core
//!
//! Immutable snapshots and the transactional machinery around them.
//!
//! # Core Concepts
//!
//! - [`StoredConfiguration`]: immutable key → value/metadata snapshot
//! - [`StoredConfigurationModifier`]: copy-on-write editor with a compare-and-swap retry loop
//! - [`ChangeLog`]: live dirty tracking inside one edit session
//! - [`full_diff`]: parallel content-hash diff of two snapshots
//! - [`search`]: tokenized free-text search over every addressable setting
//!
//! # Example
//!
//! ```rust,ignore
//! use cfgstore_core::{StoredConfiguration, StoredConfigurationModifier};
//!
//! let modifier = StoredConfigurationModifier::new(StoredConfiguration::new_empty(catalog, registry)?);
//! modifier.write_config_property("notes", "migrated by ops")?;
//! let snapshot = modifier.snapshot();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod change;
mod modifier;
mod password;
mod search;
mod snapshot;
mod template;

/// Well-known config property names
pub mod property;

pub use change::{diff_keys, full_diff, ChangeLog};
pub use modifier::StoredConfigurationModifier;
pub use password::{has_password, hash_password, verify_password, DEFAULT_COST};
pub use search::{addressable_keys, search, SearchQuery};
pub use snapshot::{SnapshotBuilder, SnapshotEdit, StoredConfiguration};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
