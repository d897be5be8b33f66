//! Persistence options

use crate::error::CodecError;
use crate::format::ConfigFormat;
use cfgstore_model::{EncodingMode, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How configuration files are written
///
/// Loadable from TOML; every field is optional:
///
/// ```toml
/// format = "zip-json"
/// encoding = "ENCODED"
/// backup_count = 5
/// backup_dir = "/var/backups/cfgstore"
/// verify_after_save = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Format used when saving
    pub format: ConfigFormat,
    /// Treatment of confidential values when saving
    pub encoding: EncodingMode,
    /// Rotating backups kept after each save; 0 disables backups
    pub backup_count: usize,
    /// Backup location; defaults to the configuration file's directory
    pub backup_dir: Option<PathBuf>,
    /// Re-read every saved file and require it to match what was saved
    pub verify_after_save: bool,
    /// bcrypt cost for the configuration password
    pub password_cost: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            format: ConfigFormat::default(),
            encoding: EncodingMode::default(),
            backup_count: 3,
            backup_dir: None,
            verify_after_save: true,
            password_cost: cfgstore_core::DEFAULT_COST,
        }
    }
}

impl StoreOptions {
    /// Parse TOML text
    ///
    /// # Errors
    /// Returns a Format error for malformed TOML or unknown values
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| CodecError::Options(e).into())
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns an Io error if the file cannot be read, or a Format error if
    /// it does not parse
    pub fn from_toml_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingMode) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_backups(mut self, count: usize, dir: Option<PathBuf>) -> Self {
        self.backup_count = count;
        self.backup_dir = dir;
        self
    }

    #[must_use]
    pub fn with_verify_after_save(mut self, verify: bool) -> Self {
        self.verify_after_save = verify;
        self
    }

    #[must_use]
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let options = StoreOptions::from_toml_str("format = \"zip-xml\"\nbackup_count = 7\n").unwrap();
        assert_eq!(
            options,
            StoreOptions::default()
                .with_format(ConfigFormat::ZipXml)
                .with_backups(7, None)
        );
    }

    #[test]
    fn encoding_uses_wire_names() {
        let options = StoreOptions::from_toml_str("encoding = \"STRIPPED\"").unwrap();
        assert_eq!(options.encoding, EncodingMode::Stripped);
    }

    #[test]
    fn unknown_format_is_a_format_error() {
        let err = StoreOptions::from_toml_str("format = \"yaml\"").unwrap_err();
        assert_eq!(err.kind(), cfgstore_model::ErrorKind::Format);
    }
}
