//! Per-domain template sets
//!
//! Template-type settings (a select or option list) name the templates that
//! pick defaults for the rest of the domain. The sets are derived once per
//! snapshot.

use cfgstore_model::{
    Catalog, ConfigKey, DecodeContext, DomainId, NativeValue, RecordType, SyntaxRegistry,
    TemplateSet, ValueRef, ValueSecret,
};
use std::collections::{BTreeMap, BTreeSet};

/// Compute the template set of every domain present in `values`
pub(crate) fn compute_template_sets(
    catalog: &Catalog,
    registry: &SyntaxRegistry,
    secret: &ValueSecret,
    values: &im::HashMap<ConfigKey, ValueRef>,
) -> BTreeMap<DomainId, TemplateSet> {
    let mut domains: BTreeSet<DomainId> = values.keys().map(|k| k.domain().clone()).collect();
    domains.insert(DomainId::system());

    let ctx = DecodeContext::new(secret);
    let empty = TemplateSet::new();
    domains
        .into_iter()
        .map(|domain| {
            let mut set = TemplateSet::new();
            for def in catalog.template_settings().filter(|d| !catalog.is_profiled(d)) {
                let key = ConfigKey::unchecked(domain.clone(), RecordType::Setting, &def.key, None);
                let value = match values.get(&key) {
                    Some(value) => value.clone(),
                    None => match registry.default_value(def, &empty, &ctx) {
                        Ok(value) => value,
                        Err(error) => {
                            tracing::warn!(setting = %def.key, %error, "template default does not decode");
                            continue;
                        }
                    },
                };
                match value.to_native() {
                    NativeValue::String(name) if !name.is_empty() => set.insert(name),
                    NativeValue::List(names) => names.into_iter().for_each(|n| set.insert(n)),
                    _ => {}
                }
            }
            (domain, set)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_model::value::{OptionListValue, SelectValue};
    use cfgstore_model::{CatalogBuilder, CategoryDef, SettingDef, Syntax};
    use serde_json::json;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .category(CategoryDef::new("templates"))
            .setting(
                SettingDef::new("template.ldap", "templates", Syntax::Select)
                    .with_option("OPEN", "OpenLDAP")
                    .with_option("AD", "AD")
                    .with_default(json!("OPEN"))
                    .template(),
            )
            .setting(
                SettingDef::new("template.storage", "templates", Syntax::OptionList)
                    .with_option("DB", "Database")
                    .with_option("LOCAL", "Local")
                    .template(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn defaults_and_stored_values_combine() {
        let catalog = catalog();
        let registry = SyntaxRegistry::with_defaults();
        let secret = ValueSecret::derive("t").unwrap();
        let mut values = im::HashMap::new();
        let acme = DomainId::new("acme");
        values.insert(
            ConfigKey::unchecked(acme.clone(), RecordType::Setting, "template.ldap", None),
            Arc::new(SelectValue::new("AD")) as ValueRef,
        );
        values.insert(
            ConfigKey::unchecked(acme.clone(), RecordType::Setting, "template.storage", None),
            Arc::new(OptionListValue::new(["DB", "LOCAL"])) as ValueRef,
        );

        let sets = compute_template_sets(&catalog, &registry, &secret, &values);
        let system: Vec<&str> = sets[&DomainId::system()].iter().collect();
        assert_eq!(system, vec!["OPEN"]);
        let acme: Vec<&str> = sets[&acme].iter().collect();
        assert_eq!(acme, vec!["AD", "DB", "LOCAL"]);
    }
}
