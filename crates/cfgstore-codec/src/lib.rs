//! Configuration Codecs
//!
//! Turns snapshots into bytes and back, and persists them safely.
//!
//! # Core Concepts
//!
//! - [`ConfigCodec`]: `read(bytes) -> snapshot` and `write(snapshot, mode) -> bytes`
//! - [`XmlCodec`], [`ZipJsonCodec`], [`ZipXmlCodec`]: the three on-disk formats
//! - [`ReadContext`]: catalog, syntax registry and migration pipeline used by
//!   every read
//! - [`CodecRegistry`]: format detection and codec lookup
//! - [`ConfigFileManager`]: atomic save with rotating backups, audit diff and
//!   optional verify-after-save
//! - [`StoreOptions`]: TOML-loadable persistence settings
//!
//! Every read migrates the document and validates every value before a
//! snapshot is returned. Nothing partial ever escapes a failed read.
//!
//! # Example
//!
//! ```rust,ignore
//! use cfgstore_codec::{ConfigFileManager, ReadContext, StoreOptions};
//!
//! let manager = ConfigFileManager::new("config.xml", ReadContext::new(catalog, registry), StoreOptions::default());
//! let config = manager.load()?;
//! manager.save(&config)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod archive;
mod codec;
mod error;
mod format;
mod load;
mod manager;
mod options;
mod registry;
mod xml;
mod zip_json;
mod zip_xml;

pub use codec::{effective_mode, ConfigCodec, ReadContext};
pub use error::CodecError;
pub use format::ConfigFormat;
pub use manager::ConfigFileManager;
pub use options::StoreOptions;
pub use registry::CodecRegistry;
pub use xml::XmlCodec;
pub use zip_json::ZipJsonCodec;
pub use zip_xml::ZipXmlCodec;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
