//! File attachment values
//!
//! Each attachment is written as one `<value>` element (or JSON object)
//! carrying its name and content type. The bytes are inlined as base64,
//! unless the encoder has an [`XrefStore`](super::XrefStore), in which case
//! only their SHA-256 address is written and the bytes go to the store.

use super::{DecodeContext, EncodeContext, NativeValue, StoredValue, ValueDecoder, ValueRef, VALUE_ELEMENT};
use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::syntax::Syntax;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One attached file
#[derive(Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub content_type: String,
    pub content: Arc<[u8]>,
}

impl fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAttachment")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

impl FileAttachment {
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::compute(&self.content)
    }
}

/// Wire shape shared by the JSON form and the XML attributes
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    name: String,
    #[serde(default)]
    content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xref: Option<ContentHash>,
}

impl WireFile {
    fn encode(file: &FileAttachment, ctx: &EncodeContext<'_>) -> Self {
        let (content, xref) = match ctx.blobs {
            Some(blobs) => (None, Some(blobs.put(Arc::clone(&file.content)))),
            None => (Some(STANDARD.encode(&file.content)), None),
        };
        Self {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            content,
            xref,
        }
    }

    fn decode(self, ctx: &DecodeContext<'_>) -> Result<FileAttachment, ValueError> {
        let content: Arc<[u8]> = match (self.xref, self.content) {
            (Some(hash), _) => ctx
                .blobs
                .and_then(|blobs| blobs.get(&hash))
                .ok_or_else(|| ValueError::MissingBlob(hash.to_hex()))?,
            (None, Some(b64)) => STANDARD
                .decode(b64.trim())
                .map_err(|e| ValueError::invalid_format(Syntax::File, format!("bad base64: {e}")))?
                .into(),
            (None, None) => Arc::from(Vec::new()),
        };
        Ok(FileAttachment {
            name: self.name,
            content_type: self.content_type,
            content,
        })
    }
}

/// One or more attached files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileValue(Vec<FileAttachment>);

impl FileValue {
    #[must_use]
    pub fn new(files: Vec<FileAttachment>) -> Self {
        Self(files)
    }

    #[must_use]
    pub fn single(file: FileAttachment) -> Self {
        Self(vec![file])
    }

    #[inline]
    #[must_use]
    pub fn files(&self) -> &[FileAttachment] {
        &self.0
    }
}

impl StoredValue for FileValue {
    fn syntax(&self) -> Syntax {
        Syntax::File
    }

    fn to_xml_values(&self, ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(self
            .0
            .iter()
            .map(|file| {
                let wire = WireFile::encode(file, ctx);
                let mut element = XmlElement::new(VALUE_ELEMENT)
                    .with_attr("name", wire.name)
                    .with_attr("contentType", wire.content_type);
                if let Some(hash) = wire.xref {
                    element.set_attr("xref", hash.to_hex());
                }
                if let Some(content) = wire.content {
                    element.set_text(content);
                }
                element
            })
            .collect())
    }

    fn to_json(&self, ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        let wire: Vec<WireFile> = self.0.iter().map(|f| WireFile::encode(f, ctx)).collect();
        serde_json::to_value(wire).map_err(|e| ValueError::invalid_format(Syntax::File, e.to_string()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::Files(self.0.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if def.required && self.0.is_empty() {
            return Err(ValueError::invalid(format!("{} needs a file", def.key)));
        }
        if let Some(file) = self.0.iter().find(|f| f.name.trim().is_empty()) {
            return Err(ValueError::invalid(format!(
                "attachment of {} bytes has no file name",
                file.content.len()
            )));
        }
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        let mut parts: Vec<Vec<u8>> = vec![Syntax::File.as_str().as_bytes().to_vec()];
        for file in &self.0 {
            parts.push(file.name.as_bytes().to_vec());
            parts.push(file.content_type.as_bytes().to_vec());
            parts.push(file.content_hash().as_bytes().to_vec());
        }
        ContentHash::compute_parts(parts)
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.0
            .iter()
            .map(|f| {
                format!(
                    "{} ({}, {} bytes, sha256 {})",
                    f.name,
                    f.content_type,
                    f.content.len(),
                    f.content_hash().short()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decoder for [`FileValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl ValueDecoder for FileDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::File
    }

    fn from_xml(&self, values: &[&XmlElement], ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let mut files = Vec::with_capacity(values.len());
        for value in values {
            let name = value
                .attr("name")
                .ok_or_else(|| ValueError::invalid_format(Syntax::File, "file value without name"))?;
            let xref = value
                .attr("xref")
                .map(str::parse::<ContentHash>)
                .transpose()
                .map_err(|e| ValueError::invalid_format(Syntax::File, e.to_string()))?;
            let text = value.text();
            let wire = WireFile {
                name: name.to_string(),
                content_type: value.attr("contentType").unwrap_or_default().to_string(),
                content: (!text.trim().is_empty()).then_some(text),
                xref,
            };
            files.push(wire.decode(ctx)?);
        }
        Ok(Arc::new(FileValue(files)))
    }

    fn from_json(&self, json: &serde_json::Value, ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let wire: Vec<WireFile> = serde_json::from_value(json.clone())
            .map_err(|e| ValueError::invalid_format(Syntax::File, e.to_string()))?;
        let files = wire
            .into_iter()
            .map(|w| w.decode(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(FileValue(files)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ValueSecret;
    use crate::value::{EncodingMode, XrefStore};

    fn cert() -> FileAttachment {
        FileAttachment::new("ca.pem", "application/x-pem-file", b"-----BEGIN-----".to_vec())
    }

    #[test]
    fn inline_xml_round_trip() {
        let secret = ValueSecret::derive("t").unwrap();
        let value = FileValue::single(cert());
        let xml = value
            .to_xml_values(&EncodeContext::new(EncodingMode::Encoded, &secret))
            .unwrap();
        assert!(xml[0].attr("xref").is_none());
        let refs: Vec<&XmlElement> = xml.iter().collect();
        let decoded = FileDecoder.from_xml(&refs, &DecodeContext::new(&secret)).unwrap();
        assert_eq!(decoded.to_native(), NativeValue::Files(vec![cert()]));
    }

    #[test]
    fn xref_json_round_trip() {
        let secret = ValueSecret::derive("t").unwrap();
        let blobs = XrefStore::new();
        let value = FileValue::single(cert());
        let json = value
            .to_json(&EncodeContext::new(EncodingMode::Encoded, &secret).with_blobs(&blobs))
            .unwrap();
        assert!(json[0].get("content").is_none());
        assert_eq!(json[0]["xref"], cert().content_hash().to_hex());

        let decoded = FileDecoder
            .from_json(&json, &DecodeContext::new(&secret).with_blobs(&blobs))
            .unwrap();
        assert_eq!(decoded.value_hash(), value.value_hash());
    }

    #[test]
    fn missing_blob_is_reported() {
        let secret = ValueSecret::derive("t").unwrap();
        let blobs = XrefStore::new();
        let json = FileValue::single(cert())
            .to_json(&EncodeContext::new(EncodingMode::Encoded, &secret).with_blobs(&blobs))
            .unwrap();
        let empty = XrefStore::new();
        let err = FileDecoder
            .from_json(&json, &DecodeContext::new(&secret).with_blobs(&empty))
            .unwrap_err();
        assert!(matches!(err, ValueError::MissingBlob(_)));
    }
}
