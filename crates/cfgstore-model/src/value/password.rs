//! Confidential password values

use super::{
    check_length, single, value_element, DecodeContext, EncodeContext, EncodingMode, NativeValue,
    StoredValue, ValueDecoder, ValueRef,
};
use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::secret::ValueSecret;
use crate::syntax::Syntax;
use std::fmt;
use std::sync::Arc;

/// Replacement text shown instead of confidential values
pub const MASK: &str = "********";

/// Secret held in clear text in memory, encrypted on the wire
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordValue(String);

impl fmt::Debug for PasswordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PasswordValue").field(&MASK).finish()
    }
}

impl PasswordValue {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Clear-text secret
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn wire(&self, ctx: &EncodeContext<'_>) -> Result<Option<String>, ValueError> {
        match ctx.mode {
            EncodingMode::Encoded => ctx.secret.encrypt(&self.0).map(Some),
            EncodingMode::Plain => Ok(Some(self.0.clone())),
            EncodingMode::Stripped => Ok(None),
        }
    }
}

impl StoredValue for PasswordValue {
    fn syntax(&self) -> Syntax {
        Syntax::Password
    }

    fn to_xml_values(&self, ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(self.wire(ctx)?.map(value_element).into_iter().collect())
    }

    fn to_json(&self, ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(self
            .wire(ctx)?
            .map_or(serde_json::Value::Null, serde_json::Value::String))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::String(self.0.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        check_length(def, &self.0)
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts([Syntax::Password.as_str(), self.0.as_str()])
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        MASK.to_string()
    }
}

fn decode_secret(secret: &ValueSecret, wire: &str) -> Result<PasswordValue, ValueError> {
    if ValueSecret::is_encrypted(wire) {
        secret.decrypt(wire).map(PasswordValue)
    } else {
        Ok(PasswordValue(wire.to_string()))
    }
}

/// Decoder for [`PasswordValue`]; accepts encrypted and plain wire forms
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordDecoder;

impl ValueDecoder for PasswordDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::Password
    }

    fn from_xml(&self, values: &[&XmlElement], ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let value = single(Syntax::Password, values)?;
        Ok(Arc::new(decode_secret(ctx.secret, value.text().trim())?))
    }

    fn from_json(&self, json: &serde_json::Value, ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let wire = json
            .as_str()
            .ok_or_else(|| ValueError::invalid_format(Syntax::Password, "expected a JSON string"))?;
        Ok(Arc::new(decode_secret(ctx.secret, wire)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_wire_hides_secret() {
        let secret = ValueSecret::derive("2024").unwrap();
        let value = PasswordValue::new("s3cr3t");
        let ctx = EncodeContext::new(EncodingMode::Encoded, &secret);
        let xml = value.to_xml_values(&ctx).unwrap();
        assert_eq!(xml.len(), 1);
        assert!(!xml[0].text().contains("s3cr3t"));

        let decoded = PasswordDecoder
            .from_xml(&[&xml[0]], &DecodeContext::new(&secret))
            .unwrap();
        assert_eq!(decoded.value_hash(), value.value_hash());
    }

    #[test]
    fn plain_and_stripped_modes() {
        let secret = ValueSecret::derive("2024").unwrap();
        let value = PasswordValue::new("pw");
        let plain = value
            .to_json(&EncodeContext::new(EncodingMode::Plain, &secret))
            .unwrap();
        assert_eq!(plain, serde_json::json!("pw"));
        let stripped = value
            .to_xml_values(&EncodeContext::new(EncodingMode::Stripped, &secret))
            .unwrap();
        assert!(stripped.is_empty());
    }

    #[test]
    fn debug_output_is_masked() {
        let value = PasswordValue::new("hunter2");
        assert_eq!(value.debug_string(None), MASK);
        assert!(!format!("{value:?}").contains("hunter2"));
    }
}
