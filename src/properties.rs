//! JSON Schema property synthesis from fieldsets.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::adapters::AdapterScope;
use crate::error::SchemaError;
use crate::fieldsets::iter_fields;
use crate::types::{Fieldset, FormField};
use crate::widgets::WidgetParams;

/// Options for property synthesis.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Namespace prepended to every property key (`prefix.name`).
    pub prefix: String,
    /// Field names left out of the properties. Unknown names are ignored.
    pub excluded_fields: HashSet<String>,
    /// Synthesize only this field and stop at its first occurrence.
    pub only_field: Option<String>,
}

impl SynthesisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn only_field(mut self, field: impl Into<String>) -> Self {
        self.only_field = Some(field.into());
        self
    }
}

/// Build the `properties` mapping for the given fieldsets.
///
/// Properties appear in fieldset order, then in field order within each
/// fieldset. With `only_field` set, the result holds at most that one field:
/// the first field with that name, regardless of exclusions.
///
/// # Errors
///
/// Propagates `SchemaError::AdapterNotFound` and adapter failures.
pub fn synthesize(
    scope: &AdapterScope<'_>,
    fieldsets: &[Fieldset],
    widget_params: &WidgetParams,
    options: &SynthesisOptions,
) -> Result<Map<String, Value>, SchemaError> {
    let mut properties = Map::new();

    for field in iter_fields(fieldsets) {
        let name = field.field_name();

        if let Some(only) = &options.only_field {
            if only != name {
                continue;
            }
            let (key, schema) = property(scope, field, widget_params, &options.prefix)?;
            properties = Map::new();
            properties.insert(key, schema);
            return Ok(properties);
        }

        if options.excluded_fields.contains(name) {
            continue;
        }

        let (key, schema) = property(scope, field, widget_params, &options.prefix)?;
        properties.insert(key, schema);
    }

    Ok(properties)
}

fn property(
    scope: &AdapterScope<'_>,
    field: &FormField,
    widget_params: &WidgetParams,
    prefix: &str,
) -> Result<(String, Value), SchemaError> {
    // Named lookup uses the form-level name so behavior fields can be special-cased
    let mut adapter =
        scope
            .registry
            .resolve(&field.field, scope.context, scope.request, Some(&field.name))?;
    adapter.set_prefix(prefix);

    let mut schema = adapter.get_schema(scope)?;
    if let Some(params) = widget_params.get(field.field_name()) {
        schema.insert("widgetOptions".into(), Value::Object(params.clone()));
    }

    Ok((property_key(prefix, field.field_name()), Value::Object(schema)))
}

/// Key of a property: the field name, namespaced by the prefix when there is one.
pub(crate) fn property_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Unprefixed names of required fields, without duplicates.
pub fn required_fields(fieldsets: &[Fieldset]) -> Vec<String> {
    let mut seen = HashSet::new();
    iter_fields(fieldsets)
        .filter(|field| field.field.required)
        .map(|field| field.field_name().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Attach each field's mode to its synthesized property.
///
/// Fields without a property (excluded ones) are skipped.
pub fn apply_modes(properties: &mut Map<String, Value>, fieldsets: &[Fieldset]) {
    apply_prefixed_modes(properties, fieldsets, "");
}

/// [`apply_modes`] for properties synthesized under a prefix.
pub(crate) fn apply_prefixed_modes(
    properties: &mut Map<String, Value>,
    fieldsets: &[Fieldset],
    prefix: &str,
) {
    for field in iter_fields(fieldsets) {
        let Some(mode) = field.mode else {
            continue;
        };
        let key = property_key(prefix, field.field_name());
        if let Some(Value::Object(property)) = properties.get_mut(&key) {
            property.insert("mode".into(), json!(mode.as_str()));
        }
    }
}
