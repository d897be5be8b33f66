//! Codec lookup by format

use crate::codec::{ConfigCodec, ReadContext};
use crate::format::ConfigFormat;
use crate::xml::XmlCodec;
use crate::zip_json::ZipJsonCodec;
use crate::zip_xml::ZipXmlCodec;
use cfgstore_core::StoredConfiguration;
use cfgstore_model::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Codecs keyed by the format they handle
#[derive(Debug, Default, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<ConfigFormat, Arc<dyn ConfigCodec>>,
}

impl CodecRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry with the three built-in codecs
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(XmlCodec);
        registry.register(ZipJsonCodec);
        registry.register(ZipXmlCodec);
        registry
    }

    /// Register a codec, replacing any codec for the same format
    pub fn register(&mut self, codec: impl ConfigCodec + 'static) {
        self.codecs.insert(codec.format(), Arc::new(codec));
    }

    #[must_use]
    pub fn get(&self, format: ConfigFormat) -> Option<&Arc<dyn ConfigCodec>> {
        self.codecs.get(&format)
    }

    /// Codec for `format`
    ///
    /// # Errors
    /// Returns a Format error when no codec is registered for it
    pub fn codec(&self, format: ConfigFormat) -> StoreResult<&Arc<dyn ConfigCodec>> {
        self.get(format)
            .ok_or_else(|| StoreError::format(format!("no codec registered for {format}")))
    }

    /// Formats with a registered codec, in [`ConfigFormat::ALL`] order
    #[must_use]
    pub fn formats(&self) -> Vec<ConfigFormat> {
        ConfigFormat::ALL
            .into_iter()
            .filter(|f| self.codecs.contains_key(f))
            .collect()
    }

    /// Detect the format of `bytes` and read them with the matching codec
    ///
    /// # Errors
    /// Returns a Format error for unrecognized content, otherwise whatever
    /// the codec returns
    pub fn read(&self, bytes: &[u8], ctx: &ReadContext) -> StoreResult<(ConfigFormat, StoredConfiguration)> {
        let format = ConfigFormat::detect(bytes)?;
        tracing::debug!(%format, bytes = bytes.len(), "format detected");
        let config = self.codec(format)?.read(bytes, ctx)?;
        Ok((format, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_model::{EncodingMode, ErrorKind};
    use cfgstore_test_utils::{sample_config, test_catalog, test_registry};

    #[test]
    fn defaults_cover_every_format() {
        let registry = CodecRegistry::with_defaults();
        assert_eq!(registry.formats(), ConfigFormat::ALL.to_vec());
        assert!(CodecRegistry::new().get(ConfigFormat::Xml).is_none());
    }

    #[test]
    fn read_detects_each_format() {
        let registry = CodecRegistry::with_defaults();
        let ctx = ReadContext::new(test_catalog(), test_registry());
        let config = sample_config();
        for format in ConfigFormat::ALL {
            let bytes = registry
                .codec(format)
                .unwrap()
                .write(&config, EncodingMode::Encoded)
                .unwrap();
            let (detected, restored) = registry.read(&bytes, &ctx).unwrap();
            assert_eq!(detected, format);
            assert_eq!(restored.content_digest(), config.content_digest());
        }
    }

    #[test]
    fn unknown_content_is_rejected() {
        let registry = CodecRegistry::with_defaults();
        let ctx = ReadContext::new(test_catalog(), test_registry());
        let err = registry.read(b"{\"json\": true}", &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
