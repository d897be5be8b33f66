//! Setting catalog
//!
//! The catalog is the versioned schema the store is edited against: which
//! settings exist, which category they live in, which categories are
//! profile-scoped, and which locale bundles may be overridden. The store never
//! hard-codes this schema; it is supplied as data (JSON) or built in code with
//! [`CatalogBuilder`].
//!
//! Settings are kept in insertion order, which is also their menu order.

use crate::syntax::Syntax;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Separator used when rendering menu locations
pub const MENU_SEPARATOR: &str = " \u{27a4} ";

/// Default value of a setting, selected by template membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultValue {
    /// Templates that must all be active for this default to apply
    #[serde(default)]
    pub templates: BTreeSet<String>,
    /// Wire (JSON) form of the default value
    pub value: serde_json::Value,
}

/// Definition of one setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingDef {
    pub key: String,
    pub category: String,
    pub syntax: Syntax,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
    /// Explicitly confidential; password syntaxes are always confidential
    #[serde(default)]
    pub confidential: bool,
    /// Still decodable but never written back out
    #[serde(default)]
    pub deprecated: bool,
    /// Removed from the product; a stored value aborts the load
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub required: bool,
    /// Template-type setting; its value selects the domain's template set
    #[serde(default)]
    pub template: bool,
    /// Option key → display text, for enumerated syntaxes
    #[serde(default)]
    pub options: IndexMap<String, String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub minimum: Option<i64>,
    #[serde(default)]
    pub maximum: Option<i64>,
    #[serde(default)]
    pub defaults: Vec<DefaultValue>,
}

impl SettingDef {
    /// Create a minimal definition
    #[must_use]
    pub fn new(key: impl Into<String>, category: impl Into<String>, syntax: Syntax) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            category: category.into(),
            syntax,
            description: String::new(),
            hidden: false,
            confidential: false,
            deprecated: false,
            removed: false,
            required: false,
            template: false,
            options: IndexMap::new(),
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            defaults: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, display: impl Into<String>) -> Self {
        self.options.insert(key.into(), display.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.defaults.push(DefaultValue {
            templates: BTreeSet::new(),
            value,
        });
        self
    }

    #[must_use]
    pub fn with_template_default<I, S>(mut self, templates: I, value: serde_json::Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults.push(DefaultValue {
            templates: templates.into_iter().map(Into::into).collect(),
            value,
        });
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    #[must_use]
    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn template(mut self) -> Self {
        self.template = true;
        self
    }

    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    #[must_use]
    pub fn with_range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Whether the value must be hidden from search and debug output
    #[inline]
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.confidential || self.syntax.is_confidential()
    }

    /// Pick the default that applies under `templates`
    ///
    /// The most specific matching default (most required templates) wins;
    /// ties go to the first declared.
    #[must_use]
    pub fn default_for(&self, templates: &TemplateSet) -> Option<&serde_json::Value> {
        let mut best: Option<&DefaultValue> = None;
        for candidate in &self.defaults {
            if !candidate.templates.iter().all(|t| templates.contains(t)) {
                continue;
            }
            match best {
                Some(current) if current.templates.len() >= candidate.templates.len() => {}
                _ => best = Some(candidate),
            }
        }
        best.map(|d| &d.value)
    }
}

/// Definition of one settings category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDef {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    /// Key of the profile-list setting that makes this category profile-scoped
    #[serde(default)]
    pub profile_setting: Option<String>,
}

impl CategoryDef {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            description: String::new(),
            parent: None,
            hidden: false,
            profile_setting: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_profile_setting(mut self, setting: impl Into<String>) -> Self {
        self.profile_setting = Some(setting.into());
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Overridable display strings of one locale bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleBundleDef {
    pub name: String,
    #[serde(default)]
    pub keys: BTreeSet<String>,
}

/// Set of active templates for one domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateSet(BTreeSet<String>);

impl TemplateSet {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, template: impl Into<String>) {
        self.0.insert(template.into());
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, template: &str) -> bool {
        self.0.contains(template)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Display for TemplateSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", joined.join(","))
    }
}

/// Serialized catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    categories: Vec<CategoryDef>,
    #[serde(default)]
    settings: Vec<SettingDef>,
    #[serde(default)]
    locale_bundles: Vec<LocaleBundleDef>,
    #[serde(default)]
    domain_list_setting: Option<String>,
    #[serde(default)]
    config_properties: BTreeSet<String>,
}

/// Validated, immutable setting catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: IndexMap<String, CategoryDef>,
    settings: IndexMap<String, SettingDef>,
    bundles: BTreeMap<String, LocaleBundleDef>,
    domain_list_setting: Option<String>,
    config_properties: BTreeSet<String>,
}

impl Catalog {
    /// Parse and validate a JSON catalog
    ///
    /// # Errors
    /// Returns error on malformed JSON or dangling references
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        let mut builder = CatalogBuilder::new();
        for category in doc.categories {
            builder = builder.category(category);
        }
        for setting in doc.settings {
            builder = builder.setting(setting);
        }
        for bundle in doc.locale_bundles {
            builder = builder.locale_bundle(bundle);
        }
        if let Some(setting) = doc.domain_list_setting {
            builder = builder.domain_list_setting(setting);
        }
        for property in doc.config_properties {
            builder = builder.config_property(property);
        }
        builder.build()
    }

    /// Serialize back to JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let doc = CatalogDocument {
            categories: self.categories.values().cloned().collect(),
            settings: self.settings.values().cloned().collect(),
            locale_bundles: self.bundles.values().cloned().collect(),
            domain_list_setting: self.domain_list_setting.clone(),
            config_properties: self.config_properties.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    #[inline]
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&SettingDef> {
        self.settings.get(key)
    }

    #[inline]
    #[must_use]
    pub fn category(&self, key: &str) -> Option<&CategoryDef> {
        self.categories.get(key)
    }

    #[inline]
    #[must_use]
    pub fn locale_bundle(&self, name: &str) -> Option<&LocaleBundleDef> {
        self.bundles.get(name)
    }

    /// Settings in menu order
    #[inline]
    pub fn settings(&self) -> impl Iterator<Item = &SettingDef> {
        self.settings.values()
    }

    #[inline]
    pub fn categories(&self) -> impl Iterator<Item = &CategoryDef> {
        self.categories.values()
    }

    #[inline]
    pub fn locale_bundles(&self) -> impl Iterator<Item = &LocaleBundleDef> {
        self.bundles.values()
    }

    /// Setting holding the list of configured domains, if the schema has one
    #[inline]
    #[must_use]
    pub fn domain_list_setting(&self) -> Option<&SettingDef> {
        self.domain_list_setting
            .as_deref()
            .and_then(|key| self.settings.get(key))
    }

    /// Whether `name` is a recognised config property
    #[inline]
    #[must_use]
    pub fn is_config_property(&self, name: &str) -> bool {
        self.config_properties.contains(name)
    }

    /// Menu position of a setting (insertion order)
    #[inline]
    #[must_use]
    pub fn menu_position(&self, key: &str) -> Option<usize> {
        self.settings.get_index_of(key)
    }

    /// Category chain from the root down to `category`
    #[must_use]
    pub fn category_path(&self, category: &str) -> Vec<&CategoryDef> {
        let mut path = Vec::new();
        let mut current = self.categories.get(category);
        while let Some(def) = current {
            // build() rejects parent cycles
            path.push(def);
            current = def.parent.as_deref().and_then(|p| self.categories.get(p));
        }
        path.reverse();
        path
    }

    /// Profile-list setting that scopes `category`, inherited from ancestors
    #[must_use]
    pub fn profile_setting_for_category(&self, category: &str) -> Option<&SettingDef> {
        self.category_path(category)
            .iter()
            .rev()
            .find_map(|c| c.profile_setting.as_deref())
            .and_then(|key| self.settings.get(key))
    }

    /// Whether a setting is stored once per profile
    #[inline]
    #[must_use]
    pub fn is_profiled(&self, setting: &SettingDef) -> bool {
        self.profile_setting_for_category(&setting.category).is_some()
    }

    /// Whether `category` is profile-scoped
    #[inline]
    #[must_use]
    pub fn is_profiled_category(&self, category: &str) -> bool {
        self.profile_setting_for_category(category).is_some()
    }

    /// Categories sharing the profile-list setting of `category`
    ///
    /// Includes `category` itself. Empty if it is not profile-scoped.
    #[must_use]
    pub fn associated_profile_categories(&self, category: &str) -> Vec<&CategoryDef> {
        let Some(profile_setting) = self.profile_setting_for_category(category) else {
            return Vec::new();
        };
        self.categories
            .values()
            .filter(|c| {
                self.profile_setting_for_category(&c.key)
                    .is_some_and(|p| p.key == profile_setting.key)
            })
            .collect()
    }

    /// Settings whose category is one of `categories`
    pub fn settings_in<'a>(
        &'a self,
        categories: &'a [&'a CategoryDef],
    ) -> impl Iterator<Item = &'a SettingDef> + 'a {
        self.settings
            .values()
            .filter(move |s| categories.iter().any(|c| c.key == s.category))
    }

    /// Hidden settings, or settings under a hidden category
    #[must_use]
    pub fn is_hidden(&self, setting: &SettingDef) -> bool {
        setting.hidden || self.category_path(&setting.category).iter().any(|c| c.hidden)
    }

    /// Human-readable menu location, e.g. `LDAP ➤ Directories ➤ default ➤ Server URL`
    #[must_use]
    pub fn menu_location(&self, setting: &SettingDef, profile: Option<&str>) -> String {
        let mut parts: Vec<&str> = self
            .category_path(&setting.category)
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        if let Some(profile) = profile {
            parts.push(profile);
        }
        parts.push(&setting.label);
        parts.join(MENU_SEPARATOR)
    }

    /// Settings flagged as removed from the product
    pub fn removed_settings(&self) -> impl Iterator<Item = &SettingDef> {
        self.settings.values().filter(|s| s.removed)
    }

    /// Template-type settings
    pub fn template_settings(&self) -> impl Iterator<Item = &SettingDef> {
        self.settings.values().filter(|s| s.template)
    }
}

/// Builder for [`Catalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    inner: Catalog,
}

impl CatalogBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(mut self, category: CategoryDef) -> Self {
        self.inner.categories.insert(category.key.clone(), category);
        self
    }

    #[must_use]
    pub fn setting(mut self, setting: SettingDef) -> Self {
        self.inner.settings.insert(setting.key.clone(), setting);
        self
    }

    #[must_use]
    pub fn locale_bundle(mut self, bundle: LocaleBundleDef) -> Self {
        self.inner.bundles.insert(bundle.name.clone(), bundle);
        self
    }

    #[must_use]
    pub fn domain_list_setting(mut self, key: impl Into<String>) -> Self {
        self.inner.domain_list_setting = Some(key.into());
        self
    }

    #[must_use]
    pub fn config_property(mut self, name: impl Into<String>) -> Self {
        self.inner.config_properties.insert(name.into());
        self
    }

    /// Validate cross references and build
    ///
    /// # Errors
    /// Returns error if a setting names an unknown category, a category names
    /// an unknown parent, the parent chain loops, or a profile setting is not
    /// of [`Syntax::Profile`].
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let catalog = self.inner;

        for category in catalog.categories.values() {
            if let Some(parent) = &category.parent {
                if !catalog.categories.contains_key(parent) {
                    return Err(CatalogError::UnknownCategory {
                        referenced_by: category.key.clone(),
                        category: parent.clone(),
                    });
                }
            }
            let mut seen = BTreeSet::new();
            let mut current = Some(category);
            while let Some(def) = current {
                if !seen.insert(def.key.as_str()) {
                    return Err(CatalogError::CategoryCycle(category.key.clone()));
                }
                current = def.parent.as_deref().and_then(|p| catalog.categories.get(p));
            }
            if let Some(profile_setting) = &category.profile_setting {
                match catalog.settings.get(profile_setting) {
                    Some(def) if def.syntax == Syntax::Profile => {}
                    Some(def) => {
                        return Err(CatalogError::InvalidProfileSetting {
                            category: category.key.clone(),
                            setting: def.key.clone(),
                        })
                    }
                    None => {
                        return Err(CatalogError::UnknownSetting {
                            referenced_by: category.key.clone(),
                            setting: profile_setting.clone(),
                        })
                    }
                }
            }
        }

        for setting in catalog.settings.values() {
            if !catalog.categories.contains_key(&setting.category) {
                return Err(CatalogError::UnknownCategory {
                    referenced_by: setting.key.clone(),
                    category: setting.category.clone(),
                });
            }
        }

        if let Some(domain_list) = &catalog.domain_list_setting {
            if !catalog.settings.contains_key(domain_list) {
                return Err(CatalogError::UnknownSetting {
                    referenced_by: "domainListSetting".to_string(),
                    setting: domain_list.clone(),
                });
            }
        }

        Ok(catalog)
    }
}

/// Catalog construction errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{referenced_by} references unknown category '{category}'")]
    UnknownCategory {
        referenced_by: String,
        category: String,
    },

    #[error("{referenced_by} references unknown setting '{setting}'")]
    UnknownSetting {
        referenced_by: String,
        setting: String,
    },

    #[error("category '{category}' uses '{setting}' as profile list, but it is not a PROFILE setting")]
    InvalidProfileSetting { category: String, setting: String },

    #[error("category parent chain of '{0}' loops")]
    CategoryCycle(String),
}
