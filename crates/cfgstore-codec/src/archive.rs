//! Zip container plumbing shared by the zip codecs

use crate::error::CodecError;
use cfgstore_model::XrefStore;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub(crate) const CONFIGURATION_XML: &str = "configuration.xml";
pub(crate) const HEADER_JSON: &str = "header.json";
pub(crate) const VALUES_JSON: &str = "values.json";
pub(crate) const METADATA_JSON: &str = "metadata.json";

/// In-memory zip being written
pub(crate) struct ArchiveWriter {
    inner: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    pub(crate) fn new() -> Self {
        Self {
            inner: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    pub(crate) fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner.start_file(name, self.options)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// One `<hash>.xref` entry per distinct blob
    pub(crate) fn add_blobs(&mut self, blobs: &XrefStore) -> Result<(), CodecError> {
        for (hash, bytes) in blobs.entries() {
            self.add(&XrefStore::entry_name(&hash), &bytes)?;
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Vec<u8>, CodecError> {
        Ok(self.inner.finish()?.into_inner())
    }
}

/// Fully read zip, entries keyed by name
#[derive(Debug)]
pub(crate) struct ArchiveReader {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveReader {
    pub(crate) fn open(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = BTreeMap::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            entries.insert(file.name().to_string(), content);
        }
        Ok(Self { entries })
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn entry(&self, name: &str) -> Result<&[u8], CodecError> {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CodecError::MissingEntry(name.to_string()))
    }

    /// Every `<hash>.xref` entry, checked against its name
    pub(crate) fn blobs(&self) -> Result<XrefStore, CodecError> {
        let store = XrefStore::new();
        for (name, bytes) in &self.entries {
            let Some(hash) = XrefStore::parse_entry_name(name) else {
                continue;
            };
            store
                .insert_verified(hash, Arc::from(bytes.as_slice()))
                .map_err(|e| CodecError::MissingEntry(format!("{name} ({e})")))?;
        }
        Ok(store)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_a_round_trip() {
        let blobs = XrefStore::new();
        blobs.put(Arc::from(&b"blob"[..]));
        let mut writer = ArchiveWriter::new();
        writer.add("a.json", b"{}").unwrap();
        writer.add_blobs(&blobs).unwrap();
        let bytes = writer.finish().unwrap();

        let reader = ArchiveReader::open(&bytes).unwrap();
        assert_eq!(reader.entry("a.json").unwrap(), b"{}");
        assert_eq!(reader.names().count(), 2);
        assert_eq!(reader.blobs().unwrap().len(), 1);
        assert!(matches!(reader.entry("b.json"), Err(CodecError::MissingEntry(_))));
    }

    #[test]
    fn tampered_blob_is_rejected() {
        let mut writer = ArchiveWriter::new();
        let name = XrefStore::entry_name(&cfgstore_model::ContentHash::compute(b"original"));
        writer.add(&name, b"tampered").unwrap();
        let reader = ArchiveReader::open(&writer.finish().unwrap()).unwrap();
        assert!(reader.blobs().is_err());
    }
}
