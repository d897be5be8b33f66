//! Locale → text maps used by locale-bundle overrides

use super::{DecodeContext, EncodeContext, NativeValue, StoredValue, ValueDecoder, ValueRef, VALUE_ELEMENT};
use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::syntax::Syntax;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Text per locale; the empty locale is the fallback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedStringMapValue(BTreeMap<String, String>);

impl LocalizedStringMapValue {
    #[must_use]
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    #[inline]
    #[must_use]
    pub fn map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Text for `locale`, falling back to its language and then to the default
    #[must_use]
    pub fn lookup(&self, locale: Option<&str>) -> Option<&str> {
        let locale = locale.unwrap_or_default();
        let language = locale.split(['_', '-']).next().unwrap_or_default();
        [locale, language, ""]
            .into_iter()
            .find_map(|l| self.0.get(l))
            .map(String::as_str)
    }
}

impl StoredValue for LocalizedStringMapValue {
    fn syntax(&self) -> Syntax {
        Syntax::LocalizedStringMap
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(self
            .0
            .iter()
            .map(|(locale, text)| {
                let element = XmlElement::new(VALUE_ELEMENT).with_text(text.as_str());
                if locale.is_empty() {
                    element
                } else {
                    element.with_attr("locale", locale.as_str())
                }
            })
            .collect())
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        serde_json::to_value(&self.0)
            .map_err(|e| ValueError::invalid_format(Syntax::LocalizedStringMap, e.to_string()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::Map(self.0.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if def.required && self.0.values().all(|v| v.trim().is_empty()) {
            return Err(ValueError::invalid(format!("{} needs a value", def.key)));
        }
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        let parts = std::iter::once(Syntax::LocalizedStringMap.as_str())
            .chain(self.0.iter().flat_map(|(k, v)| [k.as_str(), v.as_str()]));
        ContentHash::compute_parts(parts)
    }

    fn debug_string(&self, locale: Option<&str>) -> String {
        match locale {
            Some(_) => self.lookup(locale).unwrap_or_default().to_string(),
            None => self
                .0
                .iter()
                .map(|(l, v)| if l.is_empty() { v.clone() } else { format!("{l}: {v}") })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Decoder for [`LocalizedStringMapValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalizedStringMapDecoder;

impl ValueDecoder for LocalizedStringMapDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::LocalizedStringMap
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let map = values
            .iter()
            .map(|v| (v.attr("locale").unwrap_or_default().to_string(), v.text()))
            .collect();
        Ok(Arc::new(LocalizedStringMapValue(map)))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let map: BTreeMap<String, String> = serde_json::from_value(json.clone())
            .map_err(|e| ValueError::invalid_format(Syntax::LocalizedStringMap, e.to_string()))?;
        Ok(Arc::new(LocalizedStringMapValue(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocalizedStringMapValue {
        LocalizedStringMapValue::new(
            [("", "Welcome"), ("de", "Willkommen"), ("fr_CA", "Bienvenue")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn lookup_falls_back_to_language_then_default() {
        let value = sample();
        assert_eq!(value.lookup(Some("de_AT")), Some("Willkommen"));
        assert_eq!(value.lookup(Some("fr_CA")), Some("Bienvenue"));
        assert_eq!(value.lookup(Some("ja")), Some("Welcome"));
        assert_eq!(value.lookup(None), Some("Welcome"));
    }

    #[test]
    fn default_locale_has_no_attribute() {
        let secret = crate::secret::ValueSecret::derive("t").unwrap();
        let ctx = EncodeContext::new(crate::value::EncodingMode::Encoded, &secret);
        let xml = sample().to_xml_values(&ctx).unwrap();
        assert_eq!(xml[0].attr("locale"), None);
        assert_eq!(xml[1].attr("locale"), Some("de"));
    }
}
