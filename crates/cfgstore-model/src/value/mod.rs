//! Stored values
//!
//! A stored value is an opaque, syntax-tagged unit. The store only relies on
//! the capabilities of [`StoredValue`]: wire encoding (XML and JSON), a native
//! view, validation against a [`SettingDef`], a content hash and a debug
//! string. Decoding goes through the [`SyntaxRegistry`], which maps each
//! [`Syntax`] to a [`ValueDecoder`].
//!
//! # Core Concepts
//!
//! - [`ValueRef`]: shared handle to an immutable value
//! - [`EncodingMode`]: document-wide choice between encrypted, stripped and
//!   plain confidential values
//! - [`XrefStore`]: content-addressed blob table used by the zip codecs

use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::secret::ValueSecret;
use crate::syntax::Syntax;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

mod file;
mod list;
mod localized;
mod password;
mod registry;
mod scalar;
mod xref;

pub use file::{FileAttachment, FileDecoder, FileValue};
pub use list::{OptionListDecoder, OptionListValue, StringArrayDecoder, StringArrayValue};
pub use localized::{LocalizedStringMapDecoder, LocalizedStringMapValue};
pub use password::{PasswordDecoder, PasswordValue, MASK};
pub use registry::{empty_json, SyntaxRegistry, ValueDecoder};
pub use scalar::{
    BooleanDecoder, BooleanValue, NumericDecoder, NumericValue, SelectDecoder, SelectValue,
    StringDecoder, StringValue,
};
pub use xref::{XrefStore, XREF_SUFFIX};

/// Shared handle to an immutable stored value
pub type ValueRef = Arc<dyn StoredValue>;

/// Name of the element holding one wire value
pub const VALUE_ELEMENT: &str = "value";

/// How confidential values are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodingMode {
    /// Confidential values encrypted with the snapshot secret
    #[default]
    Encoded,
    /// Values omitted entirely
    Stripped,
    /// Confidential values in clear text
    Plain,
}

/// Context for encoding values
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub mode: EncodingMode,
    pub secret: &'a ValueSecret,
    /// When present, file contents go here and only their hash is written
    pub blobs: Option<&'a XrefStore>,
}

impl<'a> EncodeContext<'a> {
    #[inline]
    #[must_use]
    pub fn new(mode: EncodingMode, secret: &'a ValueSecret) -> Self {
        Self {
            mode,
            secret,
            blobs: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_blobs(mut self, blobs: &'a XrefStore) -> Self {
        self.blobs = Some(blobs);
        self
    }
}

/// Context for decoding values
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub secret: &'a ValueSecret,
    pub blobs: Option<&'a XrefStore>,
}

impl<'a> DecodeContext<'a> {
    #[inline]
    #[must_use]
    pub fn new(secret: &'a ValueSecret) -> Self {
        Self {
            secret,
            blobs: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_blobs(mut self, blobs: &'a XrefStore) -> Self {
        self.blobs = Some(blobs);
        self
    }
}

/// Plain-data view of a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeValue {
    String(String),
    Boolean(bool),
    Number(i64),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Files(Vec<FileAttachment>),
}

impl NativeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Capabilities every stored value provides
pub trait StoredValue: Debug + Send + Sync {
    /// Syntax tag written next to the value
    fn syntax(&self) -> Syntax;

    /// `<value>` elements for the XML document
    ///
    /// # Errors
    /// Returns error if a confidential value cannot be encrypted
    fn to_xml_values(&self, ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError>;

    /// JSON wire form for the zip+json codec
    ///
    /// # Errors
    /// Returns error if a confidential value cannot be encrypted
    fn to_json(&self, ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError>;

    /// Plain-data view
    fn to_native(&self) -> NativeValue;

    /// Check the value against its setting definition
    ///
    /// # Errors
    /// Returns [`ValueError::Invalid`] describing the first violated rule
    fn validate(&self, def: &SettingDef) -> Result<(), ValueError>;

    /// Content hash; two values are equal iff their hashes are
    fn value_hash(&self) -> ContentHash;

    /// Human-readable rendering; confidential values are masked
    fn debug_string(&self, locale: Option<&str>) -> String;
}

/// Plain `<value>` element carrying `text`
#[inline]
#[must_use]
pub fn value_element(text: impl Into<String>) -> XmlElement {
    XmlElement::new(VALUE_ELEMENT).with_text(text)
}

/// Exactly one `<value>` element, or a format error
pub(crate) fn single<'a>(
    syntax: Syntax,
    values: &[&'a XmlElement],
) -> Result<&'a XmlElement, ValueError> {
    match values {
        [one] => Ok(*one),
        [] => Err(ValueError::invalid_format(syntax, "missing value element")),
        _ => Err(ValueError::invalid_format(
            syntax,
            format!("expected one value element, found {}", values.len()),
        )),
    }
}

/// Shared length checks for string-shaped values
pub(crate) fn check_length(def: &SettingDef, value: &str) -> Result<(), ValueError> {
    let len = value.chars().count();
    if def.required && value.trim().is_empty() {
        return Err(ValueError::invalid(format!("{} is required", def.key)));
    }
    if let Some(min) = def.min_length {
        if len < min && !value.is_empty() {
            return Err(ValueError::invalid(format!(
                "{} must be at least {min} characters",
                def.key
            )));
        }
    }
    if let Some(max) = def.max_length {
        if len > max {
            return Err(ValueError::invalid(format!(
                "{} must be at most {max} characters",
                def.key
            )));
        }
    }
    Ok(())
}
