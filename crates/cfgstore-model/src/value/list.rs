//! Multi-valued syntaxes: option lists, string arrays and profile lists

use super::{value_element, DecodeContext, EncodeContext, NativeValue, StoredValue, ValueDecoder, ValueRef};
use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::syntax::Syntax;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Subset of the setting's option keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionListValue(BTreeSet<String>);

impl OptionListValue {
    #[must_use]
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(options.into_iter().map(Into::into).collect())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, option: &str) -> bool {
        self.0.contains(option)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Copy with `option` added
    #[must_use]
    pub fn with(&self, option: impl Into<String>) -> Self {
        let mut next = self.0.clone();
        next.insert(option.into());
        Self(next)
    }
}

impl StoredValue for OptionListValue {
    fn syntax(&self) -> Syntax {
        Syntax::OptionList
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(self.0.iter().map(|o| value_element(o.as_str())).collect())
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::from(self.0.iter().cloned().collect::<Vec<_>>()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::List(self.0.iter().cloned().collect())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if let Some(unknown) = self.0.iter().find(|o| !def.options.contains_key(*o)) {
            return Err(ValueError::invalid(format!("'{unknown}' is not an option of {}", def.key)));
        }
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts(
            std::iter::once(Syntax::OptionList.as_str()).chain(self.0.iter().map(String::as_str)),
        )
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Decoder for [`OptionListValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionListDecoder;

impl ValueDecoder for OptionListDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::OptionList
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        Ok(Arc::new(OptionListValue(
            values
                .iter()
                .map(|v| v.text().trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        Ok(Arc::new(OptionListValue(
            string_list(Syntax::OptionList, json)?.into_iter().collect(),
        )))
    }
}

/// Ordered list of strings; also used for profile-id lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringArrayValue {
    syntax: Syntax,
    values: Vec<String>,
}

impl StringArrayValue {
    #[must_use]
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            syntax: Syntax::StringArray,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Profile-id list
    #[must_use]
    pub fn profiles<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            syntax: Syntax::Profile,
            values: ids.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Copy with `value` appended
    #[must_use]
    pub fn appended(&self, value: impl Into<String>) -> Self {
        let mut values = self.values.clone();
        values.push(value.into());
        Self {
            syntax: self.syntax,
            values,
        }
    }
}

impl StoredValue for StringArrayValue {
    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(self.values.iter().map(|v| value_element(v.as_str())).collect())
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::from(self.values.clone()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::List(self.values.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if def.required && self.values.is_empty() {
            return Err(ValueError::invalid(format!("{} needs at least one value", def.key)));
        }
        if let Some(max) = def.max_length {
            if let Some(long) = self.values.iter().find(|v| v.chars().count() > max) {
                return Err(ValueError::invalid(format!(
                    "'{long}' exceeds {max} characters in {}",
                    def.key
                )));
            }
        }
        if self.syntax == Syntax::Profile {
            let mut seen = BTreeSet::new();
            for id in &self.values {
                if id.trim().is_empty() || id.contains(['/', '#']) {
                    return Err(ValueError::invalid(format!("'{id}' is not a valid profile id")));
                }
                if !seen.insert(id.as_str()) {
                    return Err(ValueError::invalid(format!("duplicate profile id '{id}'")));
                }
            }
        }
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts(
            std::iter::once(self.syntax.as_str()).chain(self.values.iter().map(String::as_str)),
        )
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.values.join("\n")
    }
}

/// Decoder for [`StringArrayValue`]
#[derive(Debug, Clone, Copy)]
pub struct StringArrayDecoder {
    syntax: Syntax,
}

impl StringArrayDecoder {
    #[must_use]
    pub const fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }
}

impl ValueDecoder for StringArrayDecoder {
    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        Ok(Arc::new(StringArrayValue {
            syntax: self.syntax,
            values: values.iter().map(|v| v.text()).collect(),
        }))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        Ok(Arc::new(StringArrayValue {
            syntax: self.syntax,
            values: string_list(self.syntax, json)?,
        }))
    }
}

fn string_list(syntax: Syntax, json: &serde_json::Value) -> Result<Vec<String>, ValueError> {
    let items = json
        .as_array()
        .ok_or_else(|| ValueError::invalid_format(syntax, "expected a JSON array"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ValueError::invalid_format(syntax, "array items must be strings"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ValueSecret;
    use serde_json::json;

    #[test]
    fn option_list_hash_ignores_insertion_order() {
        let a = OptionListValue::new(["B", "A"]);
        let b = OptionListValue::new(["A", "B"]);
        assert_eq!(a.value_hash(), b.value_hash());
    }

    #[test]
    fn option_list_rejects_unknown_option() {
        let def = SettingDef::new("o", "c", Syntax::OptionList).with_option("HEALTH", "Health");
        assert!(OptionListValue::new(["HEALTH"]).validate(&def).is_ok());
        assert!(OptionListValue::new(["NOPE"]).validate(&def).is_err());
    }

    #[test]
    fn string_array_order_matters() {
        let a = StringArrayValue::new(["x", "y"]);
        let b = StringArrayValue::new(["y", "x"]);
        assert_ne!(a.value_hash(), b.value_hash());
    }

    #[test]
    fn profile_list_rejects_duplicates() {
        let def = SettingDef::new("p", "c", Syntax::Profile);
        assert!(StringArrayValue::profiles(["a", "b"]).validate(&def).is_ok());
        assert!(StringArrayValue::profiles(["a", "a"]).validate(&def).is_err());
        assert!(StringArrayValue::profiles(["a/b"]).validate(&def).is_err());
    }

    #[test]
    fn json_items_must_be_strings() {
        let secret = ValueSecret::derive("t").unwrap();
        let ctx = DecodeContext::new(&secret);
        let decoder = StringArrayDecoder::new(Syntax::StringArray);
        assert!(decoder.from_json(&json!(["a", "b"]), &ctx).is_ok());
        assert!(decoder.from_json(&json!(["a", 1]), &ctx).is_err());
        assert!(decoder.from_json(&json!("a"), &ctx).is_err());
    }

    #[test]
    fn appended_keeps_syntax() {
        let list = StringArrayValue::profiles(["a"]).appended("b");
        assert_eq!(list.syntax(), Syntax::Profile);
        assert_eq!(list.values(), ["a".to_string(), "b".to_string()]);
    }
}
