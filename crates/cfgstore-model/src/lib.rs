//! Configuration Store Model
//!
//! Value objects shared by every layer of the configuration store.
//!
//! # Core Concepts
//!
//! - [`ConfigKey`]: address of one stored record (setting, locale bundle or property)
//! - [`Catalog`]: external schema of settings, categories and locale bundles
//! - [`StoredValue`]: opaque, syntax-tagged value with hash/validate/encode capabilities
//! - [`SyntaxRegistry`]: decoders for every [`Syntax`]
//! - [`ContentHash`]: 32-byte SHA-256 used for value comparison and blob addressing
//! - [`StoreError`]: format / validation / config-state / I/O taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use cfgstore_model::{Catalog, ConfigKey, DomainId};
//!
//! let catalog = Catalog::from_json(&schema_json)?;
//! let key = ConfigKey::for_setting(&catalog, DomainId::system(), "pwm.selfURL", None)?;
//! println!("{key}");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod catalog;
mod document;
mod error;
mod hash;
mod key;
mod metadata;
mod secret;
mod syntax;

/// Stored values and their syntaxes
pub mod value;
pub mod wire;

pub use catalog::{
    Catalog, CatalogBuilder, CatalogError, CategoryDef, DefaultValue, LocaleBundleDef, SettingDef,
    TemplateSet, MENU_SEPARATOR,
};
pub use document::{DocumentError, XmlDocument, XmlElement, XmlNode};
pub use error::{ErrorKind, StoreError, StoreResult, ValueError};
pub use hash::{ContentHash, HashError};
pub use key::{ConfigKey, DomainId, KeyError, ProfileId, RecordType};
pub use metadata::{now_seconds, UserIdentity, ValueMetaData};
pub use secret::{ValueSecret, ENCRYPTED_PREFIX};
pub use syntax::{Syntax, UnknownSyntax};
pub use value::{
    DecodeContext, EncodeContext, EncodingMode, NativeValue, StoredValue, SyntaxRegistry,
    ValueDecoder, ValueRef, XrefStore,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
