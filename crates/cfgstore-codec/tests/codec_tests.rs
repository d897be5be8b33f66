//! Codec round trips and container layout against the shared test catalog
//!
//! Run with: cargo test --package cfgstore-codec --test codec_tests

use cfgstore_codec::{CodecRegistry, ConfigCodec, ConfigFormat, ReadContext, ZipJsonCodec};
use cfgstore_core::{full_diff, StoredConfigurationModifier};
use cfgstore_model::value::{FileValue, StringValue};
use cfgstore_model::{EncodingMode, NativeValue};
use cfgstore_test_utils::{admin, empty_config, pem_file, sample_config, setting_key, test_catalog, test_registry};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;

fn ctx() -> ReadContext {
    ReadContext::new(test_catalog(), test_registry())
}

#[test]
fn simple_string_survives_every_codec() {
    let modifier = StoredConfigurationModifier::new(empty_config());
    let title = setting_key(&modifier.snapshot(), "display.title", None);
    modifier
        .write_setting(&title, StringValue::new("v").into_ref(), Some(&admin()))
        .unwrap();
    let config = modifier.snapshot();

    let codecs = CodecRegistry::with_defaults();
    for format in ConfigFormat::ALL {
        let codec = codecs.codec(format).unwrap();
        let bytes = codec.write(&config, EncodingMode::Encoded).unwrap();
        let restored = codec.read(&bytes, &ctx()).unwrap();
        assert_eq!(
            restored.read_setting(&title).unwrap().to_native(),
            NativeValue::String("v".into()),
            "{format}"
        );
        assert_eq!(restored.read_metadata(&title), config.read_metadata(&title), "{format}");
    }
}

#[test]
fn sample_configuration_survives_every_codec() {
    let config = sample_config();
    let codecs = CodecRegistry::with_defaults();
    for format in ConfigFormat::ALL {
        let codec = codecs.codec(format).unwrap();
        let bytes = codec.write(&config, EncodingMode::Encoded).unwrap();
        let restored = codec.read(&bytes, &ctx()).unwrap();
        assert!(full_diff(&config, &restored).is_empty(), "{format}");
        assert_eq!(restored.create_time(), config.create_time());
        assert_eq!(restored.modify_time(), config.modify_time());
    }
}

#[test]
fn punctuated_property_names_survive_every_codec() {
    let modifier = StoredConfigurationModifier::new(empty_config());
    modifier.write_config_property("ldap.extra-option_1", "v").unwrap();
    assert!(modifier.write_config_property("ldap#extra", "v").is_err());
    let config = modifier.snapshot();

    let codecs = CodecRegistry::with_defaults();
    for format in ConfigFormat::ALL {
        let codec = codecs.codec(format).unwrap();
        let bytes = codec.write(&config, EncodingMode::Encoded).unwrap();
        let restored = codec.read(&bytes, &ctx()).unwrap();
        assert_eq!(
            restored.read_config_property("ldap.extra-option_1").as_deref(),
            Some("v"),
            "{format}"
        );
        assert!(full_diff(&config, &restored).is_empty(), "{format}");
    }
}

#[test]
fn identical_files_share_one_blob() {
    let modifier = StoredConfigurationModifier::new(empty_config());
    let snapshot = modifier.snapshot();
    let certificates = setting_key(&snapshot, "security.certificates", None);
    let logo = setting_key(&snapshot, "security.logo", None);
    for key in [&certificates, &logo] {
        modifier
            .write_setting(key, Arc::new(FileValue::single(pem_file())), None)
            .unwrap();
    }

    let bytes = ZipJsonCodec.write(&modifier.snapshot(), EncodingMode::Encoded).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let xrefs = archive.file_names().filter(|n| n.ends_with(".xref")).count();
    assert_eq!(xrefs, 1);

    let restored = ZipJsonCodec.read(&bytes, &ctx()).unwrap();
    for key in [&certificates, &logo] {
        let NativeValue::Files(files) = restored.read_setting(key).unwrap().to_native() else {
            panic!("{key} is not a file value");
        };
        assert_eq!(files.len(), 1);
        assert_eq!(&*files[0].content, &*pem_file().content);
    }
}

#[test]
fn formats_convert_into_each_other() {
    let config = sample_config();
    let codecs = CodecRegistry::with_defaults();
    let mut bytes = codecs.codec(ConfigFormat::Xml).unwrap().write(&config, EncodingMode::Encoded).unwrap();
    for format in [ConfigFormat::ZipJson, ConfigFormat::ZipXml, ConfigFormat::Xml] {
        let (_, current) = codecs.read(&bytes, &ctx()).unwrap();
        bytes = codecs.codec(format).unwrap().write(&current, EncodingMode::Encoded).unwrap();
        assert_eq!(ConfigFormat::detect(&bytes).unwrap(), format);
    }
    let (_, last) = codecs.read(&bytes, &ctx()).unwrap();
    assert_eq!(last.content_digest(), config.content_digest());
}

#[test]
fn plain_output_round_trips_when_enabled() {
    let modifier = StoredConfigurationModifier::new(sample_config());
    modifier
        .write_config_property(cfgstore_core::property::STORE_PLAINTEXT_VALUES, "true")
        .unwrap();
    let config = modifier.snapshot();
    let codecs = CodecRegistry::with_defaults();
    for format in ConfigFormat::ALL {
        let codec = codecs.codec(format).unwrap();
        let bytes = codec.write(&config, EncodingMode::Plain).unwrap();
        let restored = codec.read(&bytes, &ctx()).unwrap();
        assert!(full_diff(&config, &restored).is_empty(), "{format}");
    }
}
