//! Error types for the configuration store
//!
//! Every failure surfaced to callers is a [`StoreError`], which carries one of
//! four kinds:
//! - **Format**: malformed or version-incompatible documents, removed legacy
//!   settings found after migration
//! - **Validation**: a value fails its syntax rules
//! - **ConfigState**: an illegal edit (profile cardinality, missing source
//!   profile, duplicate destination profile, blank password)
//! - **Io**: filesystem failures while reading, writing or renaming

use crate::catalog::CatalogError;
use crate::key::{ConfigKey, KeyError};
use std::path::PathBuf;

/// Store-wide error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed document or disallowed legacy content
    #[error("format error: {0}")]
    Format(String),

    /// A stored value failed validation
    #[error("invalid value for {key}: {source}")]
    Validation {
        key: ConfigKey,
        #[source]
        source: ValueError,
    },

    /// Illegal modifier operation
    #[error("illegal configuration state: {0}")]
    ConfigState(String),

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Validation,
    ConfigState,
    Io,
}

impl StoreError {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ConfigState(_) => ErrorKind::ConfigState,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    #[inline]
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    #[inline]
    pub fn config_state(msg: impl Into<String>) -> Self {
        Self::ConfigState(msg.into())
    }

    #[inline]
    pub fn validation(key: ConfigKey, source: ValueError) -> Self {
        Self::Validation { key, source }
    }

    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<KeyError> for StoreError {
    fn from(err: KeyError) -> Self {
        Self::ConfigState(err.to_string())
    }
}

impl From<CatalogError> for StoreError {
    fn from(err: CatalogError) -> Self {
        Self::Format(err.to_string())
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by individual value syntaxes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Wire form could not be decoded
    #[error("cannot decode {syntax} value: {reason}")]
    InvalidFormat { syntax: String, reason: String },

    /// Value decoded but violates the setting definition
    #[error("{0}")]
    Invalid(String),

    /// A file value references a blob that is not in the xref store
    #[error("missing xref blob {0}")]
    MissingBlob(String),

    /// Encryption or decryption of a confidential value failed
    #[error("crypto failure: {0}")]
    Crypto(String),
}

impl ValueError {
    #[inline]
    pub fn invalid_format(syntax: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            syntax: syntax.to_string(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_errors_are_config_state() {
        let err: StoreError = KeyError::ProfileRequired("x".into()).into();
        assert_eq!(err.kind(), ErrorKind::ConfigState);
    }

    #[test]
    fn validation_message_names_key() {
        let err = StoreError::validation(ConfigKey::for_property("p"), ValueError::invalid("too long"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("system/property/p"));
    }

    #[test]
    fn io_error_carries_path() {
        let err = StoreError::io(
            "/tmp/config.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/tmp/config.xml"));
    }
}
