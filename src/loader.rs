//! Model loading: schema interfaces and content types from JSON.
//!
//! A model file declares named schema interfaces and the content types built
//! on them:
//!
//! ```json
//! {
//!   "schemas": {
//!     "IBasic": {
//!       "fields": [{ "name": "title", "type": "TextLine", "required": true }]
//!     }
//!   },
//!   "types": {
//!     "Document": { "title": "Page", "schema": "IBasic", "view_methods": ["document_view"] }
//!   }
//! }
//! ```
//!
//! Schemas may reference each other in any order. A widget parameter written as
//! `{"$env": "NAME"}` is deferred: it reads the environment variable when widget
//! parameters are resolved.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::registry::StaticTypeRegistry;
use crate::types::{
    ChoiceSource, FieldDescriptor, FieldKind, FieldMode, FieldsetDirective, SchemaInterface,
    TypeDefinition,
};
use crate::widgets::{ParamValue, Thunk, WidgetDeclaration};

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| SchemaError::InvalidJson { source })
}

/// Load a type registry from a model file.
pub fn load_registry(path: &Path) -> Result<StaticTypeRegistry, SchemaError> {
    let model = load_json(path)?;
    registry_from_value(&model)
}

/// Load a type registry from a JSON string.
pub fn load_registry_str(content: &str) -> Result<StaticTypeRegistry, SchemaError> {
    let model: Value =
        serde_json::from_str(content).map_err(|source| SchemaError::InvalidJson { source })?;
    registry_from_value(&model)
}

/// Build a type registry from a parsed model document.
pub fn registry_from_value(model: &Value) -> Result<StaticTypeRegistry, SchemaError> {
    let model: ModelFile = parse(model, "")?;

    let mut specs = HashMap::new();
    let mut names = Vec::new();
    for (name, spec) in &model.schemas {
        let spec: SchemaSpec = parse(spec, &format!("/schemas/{}", name))?;
        specs.insert(name.clone(), spec);
        names.push(name.clone());
    }

    let mut resolver = InterfaceResolver {
        specs: &specs,
        built: HashMap::new(),
        in_progress: Vec::new(),
    };
    let mut registry = StaticTypeRegistry::new();

    for name in &names {
        let schema = resolver.build(name, "model")?;
        registry.insert_schema(schema);
    }

    for (id, spec) in &model.types {
        let path = format!("/types/{}", id);
        let spec: TypeSpec = parse(spec, &path)?;
        let referenced_by = format!("type {}", id);

        let mut definition = TypeDefinition::new(id.as_str(), spec.title.as_deref().unwrap_or(id))
            .with_view_methods(spec.view_methods);
        if let Some(schema) = &spec.schema {
            definition = definition.with_schema(resolver.build(schema, &referenced_by)?);
        }
        for behavior in &spec.behaviors {
            definition = definition.with_behavior(resolver.build(behavior, &referenced_by)?);
        }
        registry.insert(definition);
    }

    tracing::debug!(
        schemas = names.len(),
        types = registry.len(),
        "loaded content type model"
    );
    Ok(registry)
}

fn parse<T: DeserializeOwned>(value: &Value, path: &str) -> Result<T, SchemaError> {
    T::deserialize(value).map_err(|e| SchemaError::InvalidModel {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        message: e.to_string(),
    })
}

#[derive(Deserialize)]
struct ModelFile {
    #[serde(default)]
    schemas: Map<String, Value>,
    #[serde(default)]
    types: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaSpec {
    #[serde(default)]
    bases: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    omitted: Vec<String>,
    #[serde(default)]
    modes: BTreeMap<String, FieldMode>,
    #[serde(default)]
    fieldsets: Vec<FieldsetSpec>,
    #[serde(default)]
    widgets: BTreeMap<String, WidgetSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    readonly: bool,
    mode: Option<FieldMode>,
    default: Option<Value>,
    default_factory: Option<String>,
    missing_value: Option<Value>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    min: Option<f64>,
    max: Option<f64>,
    vocabulary: Option<String>,
    source: Option<ChoiceSource>,
    #[serde(default)]
    values: Vec<String>,
    value_type: Option<Box<FieldSpec>>,
    key_type: Option<Box<FieldSpec>>,
    schema: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldsetSpec {
    name: String,
    label: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WidgetSpec {
    widget: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeSpec {
    title: Option<String>,
    schema: Option<String>,
    #[serde(default)]
    behaviors: Vec<String>,
    #[serde(default)]
    view_methods: Vec<String>,
}

/// Builds interfaces on demand so references may appear in any order.
struct InterfaceResolver<'a> {
    specs: &'a HashMap<String, SchemaSpec>,
    built: HashMap<String, Arc<SchemaInterface>>,
    in_progress: Vec<String>,
}

impl InterfaceResolver<'_> {
    fn build(&mut self, name: &str, referenced_by: &str) -> Result<Arc<SchemaInterface>, SchemaError> {
        if let Some(schema) = self.built.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.in_progress.iter().any(|n| n == name) {
            return Err(SchemaError::InheritanceCycle {
                name: name.to_string(),
            });
        }
        let specs = self.specs;
        let spec = specs.get(name).ok_or_else(|| SchemaError::UnknownSchema {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })?;

        self.in_progress.push(name.to_string());

        let mut schema = SchemaInterface::new(name);
        for base in &spec.bases {
            schema = schema.extends(self.build(base, name)?);
        }
        for (i, field) in spec.fields.iter().enumerate() {
            let path = format!("/schemas/{}/fields/{}", name, i);
            schema = schema.field(self.field(field, name, &path)?);
        }
        for field in &spec.omitted {
            schema = schema.omit(field.as_str());
        }
        for (field, mode) in &spec.modes {
            schema = schema.mode_for(field.as_str(), *mode);
        }
        for fieldset in &spec.fieldsets {
            schema = schema.fieldset(FieldsetDirective::new(
                fieldset.name.as_str(),
                fieldset.label.as_deref(),
                fieldset.fields.iter().map(String::as_str),
            ));
        }
        for (field, widget) in &spec.widgets {
            schema = schema.widget(field.as_str(), widget_declaration(widget));
        }

        self.in_progress.pop();
        let schema = Arc::new(schema);
        self.built.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    fn field(
        &mut self,
        spec: &FieldSpec,
        owner: &str,
        path: &str,
    ) -> Result<FieldDescriptor, SchemaError> {
        let kind = match spec.kind.as_str() {
            "TextLine" => FieldKind::TextLine,
            "Text" => FieldKind::Text,
            "RichText" => FieldKind::RichText,
            "Password" => FieldKind::Password,
            "URI" => FieldKind::Uri,
            "Email" => FieldKind::Email,
            "Bool" => FieldKind::Bool,
            "Int" => FieldKind::Int,
            "Float" => FieldKind::Float,
            "Decimal" => FieldKind::Decimal,
            "Date" => FieldKind::Date,
            "Datetime" => FieldKind::Datetime,
            "Time" => FieldKind::Time,
            "Choice" => FieldKind::Choice {
                vocabulary: spec.vocabulary.clone(),
                source: spec.source,
                values: spec.values.clone(),
            },
            "List" => FieldKind::List {
                value_type: self.nested(spec.value_type.as_deref(), owner, path, "value_type")?,
            },
            "Tuple" => FieldKind::Tuple {
                value_type: self.nested(spec.value_type.as_deref(), owner, path, "value_type")?,
            },
            "Set" => FieldKind::Set {
                value_type: self.nested(spec.value_type.as_deref(), owner, path, "value_type")?,
            },
            "Dict" => FieldKind::Dict {
                key_type: self.nested(spec.key_type.as_deref(), owner, path, "key_type")?,
                value_type: self.nested(spec.value_type.as_deref(), owner, path, "value_type")?,
            },
            "Object" => {
                let schema = spec.schema.as_deref().ok_or_else(|| SchemaError::InvalidModel {
                    path: path.to_string(),
                    message: "Object field requires a \"schema\"".to_string(),
                })?;
                FieldKind::Object {
                    schema: self.build(schema, owner)?,
                }
            }
            other => {
                return Err(SchemaError::InvalidModel {
                    path: format!("{}/type", path),
                    message: format!("unknown field type \"{}\"", other),
                })
            }
        };

        let mut field = FieldDescriptor::new(spec.name.as_str(), kind)
            .required(spec.required)
            .readonly(spec.readonly)
            .length(spec.min_length, spec.max_length)
            .range(spec.min, spec.max);
        field.title = spec.title.clone();
        field.description = spec.description.clone();
        field.mode = spec.mode;
        field.default = spec.default.clone();
        field.default_factory = spec.default_factory.clone();
        field.missing_value = spec.missing_value.clone();
        Ok(field)
    }

    fn nested(
        &mut self,
        spec: Option<&FieldSpec>,
        owner: &str,
        path: &str,
        key: &str,
    ) -> Result<Option<Box<FieldDescriptor>>, SchemaError> {
        spec.map(|spec| {
            self.field(spec, owner, &format!("{}/{}", path, key))
                .map(Box::new)
        })
        .transpose()
    }
}

fn widget_declaration(spec: &WidgetSpec) -> WidgetDeclaration {
    WidgetDeclaration {
        widget: spec.widget.clone(),
        params: spec
            .params
            .iter()
            .map(|(key, value)| (key.clone(), param_value(value)))
            .collect(),
    }
}

fn param_value(value: &Value) -> ParamValue {
    let env_var = value
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.get("$env"))
        .and_then(Value::as_str);

    match env_var {
        Some(var) => {
            let var = var.to_string();
            ParamValue::Deferred(Thunk::new(move || {
                std::env::var(&var).map(Value::String).unwrap_or(Value::Null)
            }))
        }
        None => ParamValue::Literal(value.clone()),
    }
}
