//! Syntax registry
//!
//! Maps every [`Syntax`] to the [`ValueDecoder`] that turns wire forms back
//! into [`ValueRef`]s. Additional syntaxes can be registered at runtime.

use super::{
    BooleanDecoder, DecodeContext, FileDecoder, LocalizedStringMapDecoder, NumericDecoder,
    OptionListDecoder, PasswordDecoder, SelectDecoder, StringArrayDecoder, StringDecoder, ValueRef,
};
use crate::catalog::{SettingDef, TemplateSet};
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::syntax::Syntax;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Decodes wire forms of one syntax
pub trait ValueDecoder: Debug + Send + Sync {
    /// Syntax this decoder handles
    fn syntax(&self) -> Syntax;

    /// Decode the `<value>` children of a setting element
    ///
    /// # Errors
    /// Returns error on malformed content, undecryptable secrets or missing blobs
    fn from_xml(&self, values: &[&XmlElement], ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError>;

    /// Decode the JSON wire form
    ///
    /// # Errors
    /// Returns error on malformed content, undecryptable secrets or missing blobs
    fn from_json(&self, json: &serde_json::Value, ctx: &DecodeContext<'_>) -> Result<ValueRef, ValueError>;
}

/// Registry of value decoders keyed by syntax
#[derive(Debug, Clone, Default)]
pub struct SyntaxRegistry {
    decoders: HashMap<Syntax, Arc<dyn ValueDecoder>>,
}

impl SyntaxRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Create registry with every built-in syntax
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StringDecoder::new(Syntax::String));
        registry.register(StringDecoder::new(Syntax::Text));
        registry.register(BooleanDecoder);
        registry.register(NumericDecoder);
        registry.register(SelectDecoder);
        registry.register(OptionListDecoder);
        registry.register(StringArrayDecoder::new(Syntax::StringArray));
        registry.register(StringArrayDecoder::new(Syntax::Profile));
        registry.register(PasswordDecoder);
        registry.register(FileDecoder);
        registry.register(LocalizedStringMapDecoder);
        registry
    }

    /// Register (or replace) the decoder for its syntax
    pub fn register(&mut self, decoder: impl ValueDecoder + 'static) {
        self.decoders.insert(decoder.syntax(), Arc::new(decoder));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, syntax: Syntax) -> Option<&Arc<dyn ValueDecoder>> {
        self.decoders.get(&syntax)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, syntax: Syntax) -> bool {
        self.decoders.contains_key(&syntax)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    fn decoder(&self, syntax: Syntax) -> Result<&Arc<dyn ValueDecoder>, ValueError> {
        self.decoders
            .get(&syntax)
            .ok_or_else(|| ValueError::invalid_format(syntax, "no decoder registered"))
    }

    /// Decode `<value>` elements
    ///
    /// # Errors
    /// Returns error if no decoder is registered or decoding fails
    pub fn decode_xml(
        &self,
        syntax: Syntax,
        values: &[&XmlElement],
        ctx: &DecodeContext<'_>,
    ) -> Result<ValueRef, ValueError> {
        self.decoder(syntax)?.from_xml(values, ctx)
    }

    /// Decode a JSON wire value
    ///
    /// # Errors
    /// Returns error if no decoder is registered or decoding fails
    pub fn decode_json(
        &self,
        syntax: Syntax,
        json: &serde_json::Value,
        ctx: &DecodeContext<'_>,
    ) -> Result<ValueRef, ValueError> {
        self.decoder(syntax)?.from_json(json, ctx)
    }

    /// Default value of a setting under `templates`
    ///
    /// Settings without a matching declared default get the empty value of
    /// their syntax.
    ///
    /// # Errors
    /// Returns error if the declared default does not decode
    pub fn default_value(
        &self,
        def: &SettingDef,
        templates: &TemplateSet,
        ctx: &DecodeContext<'_>,
    ) -> Result<ValueRef, ValueError> {
        match def.default_for(templates) {
            Some(json) => self.decode_json(def.syntax, json, ctx),
            None => self.decode_json(def.syntax, &empty_json(def.syntax), ctx),
        }
    }
}

/// JSON wire form of the empty value of `syntax`
#[must_use]
pub fn empty_json(syntax: Syntax) -> serde_json::Value {
    match syntax {
        Syntax::String | Syntax::Text | Syntax::Select | Syntax::Password => {
            serde_json::Value::String(String::new())
        }
        Syntax::Boolean => serde_json::Value::Bool(false),
        Syntax::Numeric => serde_json::Value::from(0),
        Syntax::OptionList | Syntax::StringArray | Syntax::Profile | Syntax::File => {
            serde_json::Value::Array(Vec::new())
        }
        Syntax::LocalizedStringMap => serde_json::Value::Object(serde_json::Map::new()),
    }
}
