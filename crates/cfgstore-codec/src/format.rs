//! On-disk format identification

use crate::archive::{ArchiveReader, CONFIGURATION_XML, VALUES_JSON};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// The three container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigFormat {
    /// Single XML document, blobs inline
    #[default]
    Xml,
    /// Zip of JSON records plus `<hash>.xref` blobs
    ZipJson,
    /// Zip of the XML document plus `<hash>.xref` blobs
    ZipXml,
}

impl ConfigFormat {
    pub const ALL: [Self; 3] = [Self::Xml, Self::ZipJson, Self::ZipXml];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::ZipJson => "zip-json",
            Self::ZipXml => "zip-xml",
        }
    }

    /// Conventional file extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::ZipJson | Self::ZipXml => "zip",
        }
    }

    /// Identify the format from content
    ///
    /// Zip archives are told apart by their entries.
    ///
    /// # Errors
    /// Returns [`CodecError::UnknownFormat`] for anything else
    pub fn detect(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.starts_with(ZIP_MAGIC) {
            let archive = ArchiveReader::open(bytes)?;
            if archive.contains(CONFIGURATION_XML) {
                return Ok(Self::ZipXml);
            }
            if archive.contains(VALUES_JSON) {
                return Ok(Self::ZipJson);
            }
            return Err(CodecError::UnknownFormat);
        }
        let text = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
        match text.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Ok(Self::Xml),
            _ => Err(CodecError::UnknownFormat),
        }
    }
}

impl Display for ConfigFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CodecError::UnknownFormatName(s.to_string()))
    }
}
