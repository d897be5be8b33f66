//! Zip archive of JSON records
//!
//! Entries:
//! - `header.json`: `{ "createTime", "modifyTime", "formatVersion" }`
//! - `values.json`: `[{ "key", "syntax", "value" }]` in canonical key order
//! - `metadata.json`: `[{ "key", "metadata" }]` in canonical key order
//! - `<hash>.xref`: one entry per distinct file content
//!
//! Keys are written in their `domain/recordType/recordId[#profile]` form.

use crate::archive::{ArchiveReader, ArchiveWriter, HEADER_JSON, METADATA_JSON, VALUES_JSON};
use crate::codec::{effective_mode, ConfigCodec, ReadContext};
use crate::error::CodecError;
use crate::format::ConfigFormat;
use crate::load::finish_load;
use cfgstore_core::StoredConfiguration;
use cfgstore_model::value::StringValue;
use cfgstore_model::{
    ConfigKey, DecodeContext, EncodeContext, EncodingMode, RecordType, StoreError, StoreResult,
    Syntax, ValueMetaData, ValueSecret, XrefStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    create_time: String,
    modify_time: DateTime<Utc>,
    format_version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ValueRecord {
    key: String,
    syntax: Syntax,
    value: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataRecord {
    key: String,
    metadata: ValueMetaData,
}

/// Zip archive of JSON records
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipJsonCodec;

fn to_json<T: Serialize>(entry: &str, value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec_pretty(value).map_err(|e| CodecError::json(entry, e))
}

fn from_json<'a, T: Deserialize<'a>>(archive: &'a ArchiveReader, entry: &str) -> Result<T, CodecError> {
    serde_json::from_slice(archive.entry(entry)?).map_err(|e| CodecError::json(entry, e))
}

fn parse_key(text: &str) -> StoreResult<ConfigKey> {
    text.parse()
        .map_err(|e| StoreError::format(format!("invalid key '{text}': {e}")))
}

impl ConfigCodec for ZipJsonCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::ZipJson
    }

    fn read(&self, bytes: &[u8], ctx: &ReadContext) -> StoreResult<StoredConfiguration> {
        let _span = tracing::info_span!("load", format = "zip-json").entered();
        let archive = ArchiveReader::open(bytes)?;
        let header: Header = from_json(&archive, HEADER_JSON)?;
        if header.format_version > FORMAT_VERSION {
            return Err(StoreError::format(format!(
                "archive format version {} is newer than supported version {FORMAT_VERSION}",
                header.format_version
            )));
        }
        let values: Vec<ValueRecord> = from_json(&archive, VALUES_JSON)?;
        let metadata: Vec<MetadataRecord> = if archive.contains(METADATA_JSON) {
            from_json(&archive, METADATA_JSON)?
        } else {
            Vec::new()
        };
        let blobs = archive.blobs()?;

        let secret = ValueSecret::derive(&header.create_time)
            .map_err(|e| StoreError::format(format!("cannot derive value secret: {e}")))?;
        let decode_ctx = DecodeContext::new(&secret).with_blobs(&blobs);
        let catalog = ctx.catalog();
        let mut builder = StoredConfiguration::builder(catalog.clone(), ctx.registry().clone())
            .create_time(header.create_time.as_str())
            .modify_time(header.modify_time);

        for record in values {
            let key = parse_key(&record.key)?;
            let value = match key.record_type() {
                RecordType::Property => match record.value {
                    serde_json::Value::String(text) => StringValue::new(text).into_ref(),
                    _ => return Err(StoreError::format(format!("property {key} is not a string"))),
                },
                RecordType::Setting => {
                    let Some(def) = catalog.setting(key.record_id()) else {
                        tracing::warn!(%key, "setting unknown to the catalog, ignored");
                        continue;
                    };
                    if def.syntax != record.syntax {
                        tracing::warn!(%key, written = %record.syntax, expected = %def.syntax, "syntax changed, decoding as current syntax");
                    }
                    ctx.registry()
                        .decode_json(def.syntax, &record.value, &decode_ctx)
                        .map_err(|e| StoreError::validation(key.clone(), e))?
                }
                RecordType::LocaleBundle => ctx
                    .registry()
                    .decode_json(Syntax::LocalizedStringMap, &record.value, &decode_ctx)
                    .map_err(|e| StoreError::validation(key.clone(), e))?,
            };
            builder.insert_value(key, value);
        }
        for record in metadata {
            let key = parse_key(&record.key)?;
            if key.is_setting() && catalog.setting(key.record_id()).is_none() {
                continue;
            }
            builder.insert_metadata(key, record.metadata);
        }
        finish_load(builder, ctx)
    }

    fn write(&self, config: &StoredConfiguration, mode: EncodingMode) -> StoreResult<Vec<u8>> {
        let mode = effective_mode(config, mode);
        let blobs = XrefStore::new();
        let ctx = EncodeContext::new(mode, config.secret()).with_blobs(&blobs);
        let catalog = config.catalog();

        let mut values = Vec::new();
        for key in config.keys() {
            let Some(value) = config.read_stored_value(&key) else {
                continue;
            };
            if key.is_setting() {
                let Some(def) = catalog.setting(key.record_id()) else {
                    continue;
                };
                if def.deprecated {
                    continue;
                }
            }
            let json = value
                .to_json(&ctx)
                .map_err(|e| StoreError::validation(key.clone(), e))?;
            // stripped confidential values are simply absent
            if json.is_null() {
                continue;
            }
            values.push(ValueRecord {
                key: key.to_string(),
                syntax: value.syntax(),
                value: json,
            });
        }

        let mut metadata_keys: Vec<ConfigKey> = config.metadata_keys().cloned().collect();
        ConfigKey::sort(&mut metadata_keys, catalog);
        let metadata: Vec<MetadataRecord> = metadata_keys
            .into_iter()
            .filter_map(|key| {
                let metadata = config.read_metadata(&key)?.clone();
                Some(MetadataRecord {
                    key: key.to_string(),
                    metadata,
                })
            })
            .collect();

        let header = Header {
            create_time: config.create_time().to_string(),
            modify_time: config.modify_time(),
            format_version: FORMAT_VERSION,
        };

        let mut archive = ArchiveWriter::new();
        archive.add(HEADER_JSON, &to_json(HEADER_JSON, &header)?)?;
        archive.add(VALUES_JSON, &to_json(VALUES_JSON, &values)?)?;
        archive.add(METADATA_JSON, &to_json(METADATA_JSON, &metadata)?)?;
        archive.add_blobs(&blobs)?;
        tracing::debug!(values = values.len(), blobs = blobs.len(), "zip-json archive written");
        Ok(archive.finish()?)
    }
}
