//! Field adapter registry and the built-in per-field JSON Schema adapters.
//!
//! Adapters are looked up by field type tag. A named registration (keyed by
//! the form-level field name, e.g. `IRelatedItems.relatedItems`) takes
//! precedence over the default registration for the same tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::fieldsets::build_fieldsets;
use crate::form::FormBuilder;
use crate::i18n::Translator;
use crate::properties::{
    apply_prefixed_modes, property_key, required_fields, synthesize, SynthesisOptions,
};
use crate::types::{ChoiceSource, Context, FieldDescriptor, FieldKind, Request};
use crate::widgets::resolve_params;

/// JSON Schema fragment describing one field.
pub type JsonSchemaProperty = Map<String, Value>;

/// Form-level name of the related items behavior field.
pub const RELATED_ITEMS_FIELD: &str = "IRelatedItems.relatedItems";

/// Keys that enumerate choices on a property.
const CHOICE_KEYS: &[&str] = &[
    "vocabulary",
    "querysource",
    "source",
    "enum",
    "enumNames",
    "choices",
];

/// Everything an adapter may consult while producing its fragment.
pub struct AdapterScope<'a> {
    pub registry: &'a AdapterRegistry,
    /// Decides which fields of a nested schema are rendered.
    pub forms: &'a dyn FormBuilder,
    pub context: &'a Context,
    pub request: &'a Request,
    pub translator: &'a dyn Translator,
}

impl AdapterScope<'_> {
    fn translate(&self, msgid: &str) -> Result<String, SchemaError> {
        self.translator.translate(msgid, None, None, self.request)
    }
}

/// Produces the JSON Schema fragment for a single field.
///
/// Adapters are created per lookup; the prefix set on one is consumed by the
/// same synthesis call and never reused.
pub trait FieldAdapter {
    /// Namespace used for nested field names (`parent.child`).
    ///
    /// Only adapters that render nested fields need to keep it.
    fn set_prefix(&mut self, _prefix: &str) {}

    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError>;
}

/// Builds an adapter for a field.
pub type AdapterFactory =
    Arc<dyn Fn(&FieldDescriptor, &Context, &Request) -> Box<dyn FieldAdapter> + Send + Sync>;

/// Two-level adapter registry: `(field type, name)` with fallback to `(field type, default)`.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<(String, Option<String>), AdapterFactory>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("AdapterRegistry")
            .field("registrations", &keys)
            .finish()
    }
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with adapters for every built-in field type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        for spec in SCALARS {
            registry.register(spec.tag, move |field, _, _| {
                Box::new(ScalarAdapter::new(field, spec))
            });
        }
        registry.register("Choice", |field, _, _| Box::new(ChoiceAdapter::new(field)));
        for tag in ["List", "Tuple", "Set"] {
            registry.register(tag, |field, _, _| {
                Box::new(CollectionAdapter::new(field, false))
            });
        }
        registry.register_named("List", RELATED_ITEMS_FIELD, |field, _, _| {
            Box::new(CollectionAdapter::new(field, true))
        });
        registry.register("Dict", |field, _, _| Box::new(DictAdapter::new(field)));
        registry.register("Object", |field, _, _| Box::new(ObjectAdapter::new(field)));

        registry
    }

    /// Register the default adapter for a field type.
    pub fn register<F>(&mut self, field_type: impl Into<String>, factory: F)
    where
        F: Fn(&FieldDescriptor, &Context, &Request) -> Box<dyn FieldAdapter>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert((field_type.into(), None), Arc::new(factory));
    }

    /// Register an adapter used only for fields with the given form-level name.
    pub fn register_named<F>(
        &mut self,
        field_type: impl Into<String>,
        name: impl Into<String>,
        factory: F,
    ) where
        F: Fn(&FieldDescriptor, &Context, &Request) -> Box<dyn FieldAdapter>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert((field_type.into(), Some(name.into())), Arc::new(factory));
    }

    pub fn contains(&self, field_type: &str, name: Option<&str>) -> bool {
        self.factories
            .contains_key(&(field_type.to_string(), name.map(String::from)))
    }

    /// Find the adapter for a field, trying the named registration first.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::AdapterNotFound` when neither a named nor a default
    /// adapter is registered for the field type. This is a configuration error.
    pub fn resolve(
        &self,
        field: &FieldDescriptor,
        context: &Context,
        request: &Request,
        name: Option<&str>,
    ) -> Result<Box<dyn FieldAdapter>, SchemaError> {
        let tag = field.kind.tag();

        if let Some(name) = name {
            if let Some(factory) = self
                .factories
                .get(&(tag.to_string(), Some(name.to_string())))
            {
                tracing::debug!(field_type = tag, name, "using named adapter");
                return Ok(factory(field, context, request));
            }
        }

        self.factories
            .get(&(tag.to_string(), None))
            .map(|factory| factory(field, context, request))
            .ok_or_else(|| SchemaError::AdapterNotFound {
                field_type: tag.to_string(),
                name: name.map(String::from),
            })
    }
}

fn endpoint_url(endpoint: &str, locator: &str, context: &Context, request: &Request) -> String {
    format!("{}/{}/{}", request.base_url(context), endpoint, locator)
}

/// URL of a named vocabulary relative to the context.
pub fn vocabulary_url(vocabulary: &str, context: &Context, request: &Request) -> String {
    endpoint_url("@vocabularies", vocabulary, context, request)
}

/// URL of the query source bound to a field.
pub fn querysource_url(field: &FieldDescriptor, context: &Context, request: &Request) -> String {
    endpoint_url("@querysources", &field.name, context, request)
}

/// URL of the source bound to a field.
pub fn source_url(field: &FieldDescriptor, context: &Context, request: &Request) -> String {
    endpoint_url("@sources", &field.name, context, request)
}

/// Common keys every adapter emits.
fn base_schema(
    field: &FieldDescriptor,
    scope: &AdapterScope<'_>,
    json_type: &str,
    factory: &str,
) -> Result<JsonSchemaProperty, SchemaError> {
    let title = scope.translate(field.title.as_deref().unwrap_or(&field.name))?;
    let description = match field.description.as_deref() {
        Some(description) => scope.translate(description)?,
        None => String::new(),
    };

    let mut schema = Map::new();
    schema.insert("type".into(), json!(json_type));
    schema.insert("title".into(), json!(title));
    schema.insert("description".into(), json!(description));
    schema.insert("factory".into(), json!(factory));
    if let Some(default) = &field.default {
        schema.insert("default".into(), default.clone());
    }
    Ok(schema)
}

/// Presentation of a scalar field type.
#[derive(Debug)]
struct ScalarSpec {
    tag: &'static str,
    json_type: &'static str,
    factory: &'static str,
    format: Option<&'static str>,
    widget: Option<&'static str>,
}

const SCALARS: &[ScalarSpec] = &[
    ScalarSpec {
        tag: "TextLine",
        json_type: "string",
        factory: "Text line (String)",
        format: None,
        widget: None,
    },
    ScalarSpec {
        tag: "Text",
        json_type: "string",
        factory: "Text",
        format: None,
        widget: Some("textarea"),
    },
    ScalarSpec {
        tag: "RichText",
        json_type: "string",
        factory: "Rich Text",
        format: None,
        widget: Some("richtext"),
    },
    ScalarSpec {
        tag: "Password",
        json_type: "string",
        factory: "Password",
        format: None,
        widget: Some("password"),
    },
    ScalarSpec {
        tag: "URI",
        json_type: "string",
        factory: "URL",
        format: Some("uri"),
        widget: Some("url"),
    },
    ScalarSpec {
        tag: "Email",
        json_type: "string",
        factory: "Email",
        format: Some("email"),
        widget: Some("email"),
    },
    ScalarSpec {
        tag: "Bool",
        json_type: "boolean",
        factory: "Yes/No",
        format: None,
        widget: None,
    },
    ScalarSpec {
        tag: "Int",
        json_type: "integer",
        factory: "Integer",
        format: None,
        widget: None,
    },
    ScalarSpec {
        tag: "Float",
        json_type: "number",
        factory: "Floating-point number",
        format: None,
        widget: None,
    },
    ScalarSpec {
        tag: "Decimal",
        json_type: "number",
        factory: "Decimal",
        format: None,
        widget: None,
    },
    ScalarSpec {
        tag: "Date",
        json_type: "string",
        factory: "Date",
        format: Some("date"),
        widget: Some("date"),
    },
    ScalarSpec {
        tag: "Datetime",
        json_type: "string",
        factory: "Date/Time",
        format: Some("date-time"),
        widget: Some("datetime"),
    },
    ScalarSpec {
        tag: "Time",
        json_type: "string",
        factory: "Time",
        format: Some("time"),
        widget: Some("time"),
    },
];

struct ScalarAdapter {
    field: FieldDescriptor,
    spec: &'static ScalarSpec,
}

impl ScalarAdapter {
    fn new(field: &FieldDescriptor, spec: &'static ScalarSpec) -> Self {
        Self {
            field: field.clone(),
            spec,
        }
    }
}

impl FieldAdapter for ScalarAdapter {
    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError> {
        let spec = self.spec;
        let mut schema = base_schema(&self.field, scope, spec.json_type, spec.factory)?;

        if let Some(format) = spec.format {
            schema.insert("format".into(), json!(format));
        }
        if let Some(widget) = spec.widget {
            schema.insert("widget".into(), json!(widget));
        }

        match spec.json_type {
            "string" => {
                if let Some(min) = self.field.min_length {
                    schema.insert("minLength".into(), json!(min));
                }
                if let Some(max) = self.field.max_length {
                    schema.insert("maxLength".into(), json!(max));
                }
            }
            "integer" | "number" => {
                if let Some(min) = self.field.min {
                    schema.insert("minimum".into(), number(min, spec.json_type));
                }
                if let Some(max) = self.field.max {
                    schema.insert("maximum".into(), number(max, spec.json_type));
                }
            }
            _ => {}
        }

        Ok(schema)
    }
}

fn number(value: f64, json_type: &str) -> Value {
    if json_type == "integer" && value.fract() == 0.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

struct ChoiceAdapter {
    field: FieldDescriptor,
}

impl ChoiceAdapter {
    fn new(field: &FieldDescriptor) -> Self {
        Self {
            field: field.clone(),
        }
    }
}

impl FieldAdapter for ChoiceAdapter {
    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError> {
        let mut schema = base_schema(&self.field, scope, "string", "Choice")?;
        let (context, request) = (scope.context, scope.request);

        if let FieldKind::Choice {
            vocabulary,
            source,
            values,
        } = &self.field.kind
        {
            if let Some(vocabulary) = vocabulary {
                let url = vocabulary_url(vocabulary, context, request);
                schema.insert("vocabulary".into(), json!({ "@id": url }));
            } else if let Some(source) = source {
                let (key, url) = match source {
                    ChoiceSource::QuerySource => {
                        ("querysource", querysource_url(&self.field, context, request))
                    }
                    ChoiceSource::Source => ("source", source_url(&self.field, context, request)),
                };
                schema.insert(key.into(), json!({ "@id": url }));
            } else if !values.is_empty() {
                let titles = values
                    .iter()
                    .map(|v| scope.translate(v))
                    .collect::<Result<Vec<_>, _>>()?;
                let choices: Vec<Value> = values
                    .iter()
                    .zip(&titles)
                    .map(|(value, title)| json!([value, title]))
                    .collect();
                schema.insert("enum".into(), json!(values));
                schema.insert("enumNames".into(), json!(titles));
                schema.insert("choices".into(), Value::Array(choices));
            }
        }

        Ok(schema)
    }
}

struct CollectionAdapter {
    field: FieldDescriptor,
    suppress_choices: bool,
}

impl CollectionAdapter {
    fn new(field: &FieldDescriptor, suppress_choices: bool) -> Self {
        Self {
            field: field.clone(),
            suppress_choices,
        }
    }
}

impl FieldAdapter for CollectionAdapter {
    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError> {
        let value_type = self.field.kind.value_type();
        let factory = match value_type.map(|vt| &vt.kind) {
            Some(FieldKind::Choice { .. }) => "Multiple Choice",
            _ => "List",
        };
        let mut schema = base_schema(&self.field, scope, "array", factory)?;

        if let Some(value_type) = value_type {
            let adapter = scope
                .registry
                .resolve(value_type, scope.context, scope.request, None)?;
            let mut items = adapter.get_schema(scope)?;
            if self.suppress_choices {
                for key in CHOICE_KEYS {
                    items.remove(*key);
                }
            }
            schema.insert("items".into(), Value::Object(items));
        }

        let unique = matches!(
            self.field.kind,
            FieldKind::Set { .. } | FieldKind::Tuple { .. }
        );
        schema.insert("uniqueItems".into(), json!(unique));
        schema.insert("additionalItems".into(), json!(true));
        if let Some(min) = self.field.min_length {
            schema.insert("minItems".into(), json!(min));
        }
        if let Some(max) = self.field.max_length {
            schema.insert("maxItems".into(), json!(max));
        }

        Ok(schema)
    }
}

struct DictAdapter {
    field: FieldDescriptor,
}

impl DictAdapter {
    fn new(field: &FieldDescriptor) -> Self {
        Self {
            field: field.clone(),
        }
    }
}

impl FieldAdapter for DictAdapter {
    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError> {
        let mut schema = base_schema(&self.field, scope, "object", "Dict")?;

        if let FieldKind::Dict {
            key_type,
            value_type,
        } = &self.field.kind
        {
            if let Some(key_type) = key_type {
                let adapter = scope
                    .registry
                    .resolve(key_type, scope.context, scope.request, None)?;
                schema.insert("propertyNames".into(), Value::Object(adapter.get_schema(scope)?));
            }
            if let Some(value_type) = value_type {
                let adapter = scope
                    .registry
                    .resolve(value_type, scope.context, scope.request, None)?;
                schema.insert(
                    "additionalProperties".into(),
                    Value::Object(adapter.get_schema(scope)?),
                );
            }
        }

        Ok(schema)
    }
}

/// Renders a sub-schema as nested properties named `prefix.field.child`.
///
/// The sub-schema goes through the form builder like a top-level schema, so
/// omitted and hidden sub-fields are left out and modes are attached.
struct ObjectAdapter {
    field: FieldDescriptor,
    prefix: String,
}

impl ObjectAdapter {
    fn new(field: &FieldDescriptor) -> Self {
        Self {
            field: field.clone(),
            prefix: String::new(),
        }
    }
}

impl FieldAdapter for ObjectAdapter {
    fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    fn get_schema(&self, scope: &AdapterScope<'_>) -> Result<JsonSchemaProperty, SchemaError> {
        let mut schema = base_schema(&self.field, scope, "object", "Object")?;

        let FieldKind::Object { schema: sub_schema } = &self.field.kind else {
            return Ok(schema);
        };

        let fieldsets = build_fieldsets(
            scope.forms,
            scope.translator,
            scope.context,
            scope.request,
            sub_schema,
            &[],
        )?;
        let prefix = property_key(&self.prefix, &self.field.name);

        let params = resolve_params(&[Some(sub_schema.as_ref())]);
        let options = SynthesisOptions::new().prefix(prefix.as_str());
        let mut properties = synthesize(scope, &fieldsets, &params, &options)?;
        apply_prefixed_modes(&mut properties, &fieldsets, &prefix);

        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required_fields(&fieldsets)));
        Ok(schema)
    }
}
