//! Single-valued syntaxes: strings, booleans, numbers and selects

use super::{
    check_length, single, value_element, DecodeContext, EncodeContext, NativeValue, StoredValue,
    ValueDecoder, ValueRef,
};
use crate::catalog::SettingDef;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::hash::ContentHash;
use crate::syntax::Syntax;
use std::sync::Arc;

/// String or multi-line text value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringValue {
    syntax: Syntax,
    value: String,
}

impl StringValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            syntax: Syntax::String,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            syntax: Syntax::Text,
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn into_ref(self) -> ValueRef {
        Arc::new(self)
    }
}

impl StoredValue for StringValue {
    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(vec![value_element(self.value.as_str())])
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::String(self.value.clone()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::String(self.value.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if self.syntax == Syntax::String && self.value.contains('\n') {
            return Err(ValueError::invalid(format!("{} must be a single line", def.key)));
        }
        check_length(def, &self.value)
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts([self.syntax.as_str(), self.value.as_str()])
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.value.clone()
    }
}

/// Decoder for [`StringValue`]
#[derive(Debug, Clone, Copy)]
pub struct StringDecoder {
    syntax: Syntax,
}

impl StringDecoder {
    #[must_use]
    pub const fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }
}

impl ValueDecoder for StringDecoder {
    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let text = values.first().map(|v| v.text()).unwrap_or_default();
        Ok(Arc::new(StringValue {
            syntax: self.syntax,
            value: text,
        }))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let value = json
            .as_str()
            .ok_or_else(|| ValueError::invalid_format(self.syntax, "expected a JSON string"))?;
        Ok(Arc::new(StringValue {
            syntax: self.syntax,
            value: value.to_string(),
        }))
    }
}

/// Boolean flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanValue(pub bool);

impl StoredValue for BooleanValue {
    fn syntax(&self) -> Syntax {
        Syntax::Boolean
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(vec![value_element(self.0.to_string())])
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::Bool(self.0))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::Boolean(self.0)
    }

    fn validate(&self, _def: &SettingDef) -> Result<(), ValueError> {
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts([Syntax::Boolean.as_str(), if self.0 { "true" } else { "false" }])
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        let text = if self.0 { "True" } else { "False" };
        text.to_string()
    }
}

fn parse_bool(text: &str) -> Result<bool, ValueError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(ValueError::invalid_format(Syntax::Boolean, format!("'{other}' is not a boolean"))),
    }
}

/// Decoder for [`BooleanValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanDecoder;

impl ValueDecoder for BooleanDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::Boolean
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let value = single(Syntax::Boolean, values)?;
        Ok(Arc::new(BooleanValue(parse_bool(&value.text())?)))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let flag = match json {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => parse_bool(s)?,
            _ => return Err(ValueError::invalid_format(Syntax::Boolean, "expected a boolean")),
        };
        Ok(Arc::new(BooleanValue(flag)))
    }
}

/// Signed integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericValue(pub i64);

impl StoredValue for NumericValue {
    fn syntax(&self) -> Syntax {
        Syntax::Numeric
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(vec![value_element(self.0.to_string())])
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::from(self.0))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::Number(self.0)
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if let Some(min) = def.minimum {
            if self.0 < min {
                return Err(ValueError::invalid(format!("{} must be at least {min}", def.key)));
            }
        }
        if let Some(max) = def.maximum {
            if self.0 > max {
                return Err(ValueError::invalid(format!("{} must be at most {max}", def.key)));
            }
        }
        Ok(())
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts([
            Syntax::Numeric.as_str().as_bytes(),
            self.0.to_be_bytes().as_slice(),
        ])
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.0.to_string()
    }
}

fn parse_number(text: &str) -> Result<i64, ValueError> {
    text.trim()
        .parse::<i64>()
        .map_err(|e| ValueError::invalid_format(Syntax::Numeric, format!("'{text}': {e}")))
}

/// Decoder for [`NumericValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericDecoder;

impl ValueDecoder for NumericDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::Numeric
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let value = single(Syntax::Numeric, values)?;
        Ok(Arc::new(NumericValue(parse_number(&value.text())?)))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let number = match json {
            serde_json::Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| ValueError::invalid_format(Syntax::Numeric, format!("{n} is not an integer")))?,
            serde_json::Value::String(s) => parse_number(s)?,
            _ => return Err(ValueError::invalid_format(Syntax::Numeric, "expected a number")),
        };
        Ok(Arc::new(NumericValue(number)))
    }
}

/// One key of the setting's option set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectValue(pub String);

impl SelectValue {
    #[must_use]
    pub fn new(option: impl Into<String>) -> Self {
        Self(option.into())
    }
}

impl StoredValue for SelectValue {
    fn syntax(&self) -> Syntax {
        Syntax::Select
    }

    fn to_xml_values(&self, _ctx: &EncodeContext<'_>) -> Result<Vec<XmlElement>, ValueError> {
        Ok(vec![value_element(self.0.as_str())])
    }

    fn to_json(&self, _ctx: &EncodeContext<'_>) -> Result<serde_json::Value, ValueError> {
        Ok(serde_json::Value::String(self.0.clone()))
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::String(self.0.clone())
    }

    fn validate(&self, def: &SettingDef) -> Result<(), ValueError> {
        if def.options.contains_key(&self.0) {
            Ok(())
        } else {
            Err(ValueError::invalid(format!("'{}' is not an option of {}", self.0, def.key)))
        }
    }

    fn value_hash(&self) -> ContentHash {
        ContentHash::compute_parts([Syntax::Select.as_str(), self.0.as_str()])
    }

    fn debug_string(&self, _locale: Option<&str>) -> String {
        self.0.clone()
    }
}

/// Decoder for [`SelectValue`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectDecoder;

impl ValueDecoder for SelectDecoder {
    fn syntax(&self) -> Syntax {
        Syntax::Select
    }

    fn from_xml(&self, values: &[&XmlElement], _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let value = single(Syntax::Select, values)?;
        Ok(Arc::new(SelectValue(value.text().trim().to_string())))
    }

    fn from_json(&self, json: &serde_json::Value, _ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError> {
        let option = json
            .as_str()
            .ok_or_else(|| ValueError::invalid_format(Syntax::Select, "expected a JSON string"))?;
        Ok(Arc::new(SelectValue(option.to_string())))
    }
}
