//! Codec error types

use cfgstore_model::{DocumentError, StoreError};

/// Failures while parsing or producing a container
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed document: {0}")]
    Document(#[from] DocumentError),

    #[error("malformed archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed JSON in {entry}: {source}")]
    Json {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive entry {0} is missing")]
    MissingEntry(String),

    #[error("archive entry could not be read: {0}")]
    Entry(#[from] std::io::Error),

    #[error("content is not a known configuration format")]
    UnknownFormat,

    #[error("unknown format name '{0}'")]
    UnknownFormatName(String),

    #[error("invalid options: {0}")]
    Options(#[from] toml::de::Error),
}

impl CodecError {
    pub(crate) fn json(entry: &str, source: serde_json::Error) -> Self {
        Self::Json {
            entry: entry.to_string(),
            source,
        }
    }
}

impl From<CodecError> for StoreError {
    fn from(e: CodecError) -> Self {
        StoreError::format(e.to_string())
    }
}
