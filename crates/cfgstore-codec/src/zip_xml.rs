//! Zip archive wrapping the XML document
//!
//! `configuration.xml` holds the same document the XML codec writes, except
//! that file contents are replaced by `xref` hashes pointing at sibling
//! `<hash>.xref` entries.

use crate::archive::{ArchiveReader, ArchiveWriter, CONFIGURATION_XML};
use crate::codec::{ConfigCodec, ReadContext};
use crate::error::CodecError;
use crate::format::ConfigFormat;
use crate::xml::{decode_document, encode_document};
use cfgstore_core::StoredConfiguration;
use cfgstore_model::{EncodingMode, StoreResult, XmlDocument, XrefStore};

/// Zip archive of the XML document plus blobs
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipXmlCodec;

impl ConfigCodec for ZipXmlCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::ZipXml
    }

    fn read(&self, bytes: &[u8], ctx: &ReadContext) -> StoreResult<StoredConfiguration> {
        let archive = ArchiveReader::open(bytes)?;
        let document = XmlDocument::parse_bytes(archive.entry(CONFIGURATION_XML)?).map_err(CodecError::from)?;
        let blobs = archive.blobs()?;
        decode_document(document, ctx, Some(&blobs))
    }

    fn write(&self, config: &StoredConfiguration, mode: EncodingMode) -> StoreResult<Vec<u8>> {
        let blobs = XrefStore::new();
        let document = encode_document(config, mode, Some(&blobs))?;
        let text = document.to_xml_string().map_err(CodecError::from)?;

        let mut archive = ArchiveWriter::new();
        archive.add(CONFIGURATION_XML, text.as_bytes())?;
        archive.add_blobs(&blobs)?;
        Ok(archive.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_test_utils::{sample_config, test_catalog, test_registry};

    #[test]
    fn document_references_blobs_by_hash() {
        let bytes = ZipXmlCodec.write(&sample_config(), EncodingMode::Encoded).unwrap();
        let archive = ArchiveReader::open(&bytes).unwrap();
        let xml = String::from_utf8(archive.entry(CONFIGURATION_XML).unwrap().to_vec()).unwrap();
        let blob = archive.names().find(|n| n.ends_with(".xref")).unwrap().to_string();
        let hash = blob.trim_end_matches(".xref");
        assert!(xml.contains(&format!("xref=\"{hash}\"")));
        assert!(!xml.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn missing_document_is_an_error() {
        let mut archive = ArchiveWriter::new();
        archive.add("other.txt", b"x").unwrap();
        let ctx = ReadContext::new(test_catalog(), test_registry());
        assert!(ZipXmlCodec.read(&archive.finish().unwrap(), &ctx).is_err());
    }
}
