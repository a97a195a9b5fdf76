//! Entry points: full type schemas, single-field details, fieldset summaries.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::adapters::{AdapterRegistry, AdapterScope};
use crate::error::SchemaError;
use crate::fieldsets::{build_fieldsets, fieldset_summaries, fieldset_summary};
use crate::form::{DirectiveFormBuilder, FormBuilder};
use crate::i18n::{NullTranslator, Translator};
use crate::properties::{apply_modes, required_fields, synthesize, SynthesisOptions};
use crate::registry::TypeRegistry;
use crate::types::{Context, Fieldset, FieldsetSummary, Request, SchemaInterface, TypeDefinition};
use crate::widgets::{resolve_params, WidgetParams};

/// Message returned when a detail query matches nothing.
pub const NOT_FOUND_MESSAGE: &str = "No entry could be found for the supplied name.";

/// Answer to a single-name detail query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDetail {
    /// The name matched a fieldset id.
    Fieldset(FieldsetSummary),
    /// The name matched a field; the property is decorated with raw field metadata.
    Field(Map<String, Value>),
    NotFound { message: String },
}

impl FieldDetail {
    pub fn not_found() -> Self {
        FieldDetail::NotFound {
            message: NOT_FOUND_MESSAGE.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FieldDetail::NotFound { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            FieldDetail::Fieldset(summary) => json!(summary),
            FieldDetail::Field(property) => Value::Object(property.clone()),
            FieldDetail::NotFound { message } => json!({ "message": message }),
        }
    }
}

/// Fieldsets of a type together with the schemata they came from.
struct TypeFieldsets {
    schema: Option<Arc<SchemaInterface>>,
    additional_schemata: Vec<Arc<SchemaInterface>>,
    fieldsets: Vec<Fieldset>,
}

impl TypeFieldsets {
    fn widget_params(&self) -> WidgetParams {
        let schemas: Vec<Option<&SchemaInterface>> = std::iter::once(self.schema.as_deref())
            .chain(self.additional_schemata.iter().map(|s| Some(s.as_ref())))
            .collect();
        resolve_params(&schemas)
    }
}

/// Builds JSON Schema documents for content types.
///
/// Holds the collaborators every build consults. All state produced by a
/// build is local to that call.
pub struct SchemaBuilder {
    types: Arc<dyn TypeRegistry>,
    forms: Arc<dyn FormBuilder>,
    adapters: AdapterRegistry,
    translator: Arc<dyn Translator>,
}

impl SchemaBuilder {
    /// Create a builder with the directive form builder, the default adapters
    /// and no translation.
    pub fn new(types: Arc<dyn TypeRegistry>) -> Self {
        Self {
            types,
            forms: Arc::new(DirectiveFormBuilder),
            adapters: AdapterRegistry::with_defaults(),
            translator: Arc::new(NullTranslator),
        }
    }

    pub fn with_form_builder(mut self, forms: Arc<dyn FormBuilder>) -> Self {
        self.forms = forms;
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Build the complete JSON Schema document for a registered type.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` for unregistered types and
    /// `SchemaError::AdapterNotFound` when a field type has no adapter.
    pub fn schema_for_type(
        &self,
        portal_type: &str,
        context: &Context,
        request: &Request,
        excluded_fields: &HashSet<String>,
    ) -> Result<Value, SchemaError> {
        let definition = self.types.lookup(portal_type)?;
        self.schema_for_definition(&definition, context, request, excluded_fields)
    }

    /// Build the complete JSON Schema document for a type definition.
    ///
    /// Schema-less types produce empty properties, required and fieldsets but
    /// keep their title and layouts.
    pub fn schema_for_definition(
        &self,
        definition: &TypeDefinition,
        context: &Context,
        request: &Request,
        excluded_fields: &HashSet<String>,
    ) -> Result<Value, SchemaError> {
        let _span = tracing::debug_span!("schema_for_type", portal_type = %definition.id).entered();

        let resolved = self.type_fieldsets(definition, context, request)?;
        let params = resolved.widget_params();
        let scope = self.scope(context, request);

        let options = SynthesisOptions {
            excluded_fields: excluded_fields.clone(),
            ..SynthesisOptions::default()
        };
        let mut properties = synthesize(&scope, &resolved.fieldsets, &params, &options)?;
        let required = required_fields(&resolved.fieldsets);
        apply_modes(&mut properties, &resolved.fieldsets);

        tracing::debug!(
            fieldsets = resolved.fieldsets.len(),
            properties = properties.len(),
            "built type schema"
        );

        Ok(json!({
            "type": "object",
            "title": self.translator.translate(&definition.title, None, None, request)?,
            "properties": properties,
            "required": required,
            "fieldsets": fieldset_summaries(&resolved.fieldsets),
            "layouts": definition.view_methods,
        }))
    }

    /// Describe a single field or fieldset of a registered type.
    ///
    /// A fieldset id takes precedence over a field of the same name within
    /// that fieldset. The first matching field wins. An unmatched name yields
    /// [`FieldDetail::NotFound`], not an error.
    pub fn field_detail(
        &self,
        portal_type: &str,
        field_name: &str,
        context: &Context,
        request: &Request,
    ) -> Result<FieldDetail, SchemaError> {
        let definition = self.types.lookup(portal_type)?;
        let resolved = self.type_fieldsets(&definition, context, request)?;

        for fieldset in &resolved.fieldsets {
            if fieldset.id == field_name {
                return Ok(FieldDetail::Fieldset(fieldset_summary(fieldset)));
            }

            let Some(form_field) = fieldset
                .fields
                .iter()
                .find(|f| f.field_name() == field_name)
            else {
                continue;
            };

            let params = resolved.widget_params();
            let scope = self.scope(context, request);
            let options = SynthesisOptions::new().only_field(field_name);
            let mut properties =
                synthesize(&scope, std::slice::from_ref(fieldset), &params, &options)?;

            let mut property = match properties.remove(field_name) {
                Some(Value::Object(property)) => property,
                _ => Map::new(),
            };
            if let Some(mode) = form_field.mode {
                property.insert("mode".into(), json!(mode.as_str()));
            }

            let field = &form_field.field;
            property.insert("default".into(), field.default.clone().unwrap_or(Value::Null));
            property.insert("defaultFactory".into(), json!(field.default_factory));
            property.insert(
                "interface".into(),
                json!(field.interface.as_deref().unwrap_or_default()),
            );
            property.insert("max_length".into(), json!(field.max_length));
            property.insert("min_length".into(), json!(field.min_length));
            property.insert(
                "missing_value".into(),
                field.missing_value.clone().unwrap_or(Value::Null),
            );
            property.insert("order".into(), json!(field.order));
            property.insert("readonly".into(), json!(field.readonly));
            property.insert("required".into(), json!(field.required));

            return Ok(FieldDetail::Field(property));
        }

        Ok(FieldDetail::not_found())
    }

    /// Fieldset summaries of a registered type, without any property synthesis.
    pub fn fieldset_summaries(
        &self,
        portal_type: &str,
        context: &Context,
        request: &Request,
    ) -> Result<Vec<FieldsetSummary>, SchemaError> {
        let definition = self.types.lookup(portal_type)?;
        let resolved = self.type_fieldsets(&definition, context, request)?;
        Ok(fieldset_summaries(&resolved.fieldsets))
    }

    fn type_fieldsets(
        &self,
        definition: &TypeDefinition,
        context: &Context,
        request: &Request,
    ) -> Result<TypeFieldsets, SchemaError> {
        let schema = match definition.lookup_schema() {
            Ok(schema) => schema,
            Err(err) => {
                tracing::debug!(%err, "treating type as schema-less");
                return Ok(TypeFieldsets {
                    schema: None,
                    additional_schemata: Vec::new(),
                    fieldsets: Vec::new(),
                });
            }
        };

        let additional_schemata = definition.additional_schemata().to_vec();
        let fieldsets = build_fieldsets(
            self.forms.as_ref(),
            self.translator.as_ref(),
            context,
            request,
            &schema,
            &additional_schemata,
        )?;

        Ok(TypeFieldsets {
            schema: Some(schema),
            additional_schemata,
            fieldsets,
        })
    }

    fn scope<'a>(&'a self, context: &'a Context, request: &'a Request) -> AdapterScope<'a> {
        AdapterScope {
            registry: &self.adapters,
            forms: self.forms.as_ref(),
            context,
            request,
            translator: self.translator.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticTypeRegistry;
    use crate::form::ProcessedForm;
    use crate::types::{FieldDescriptor, FieldKind, FormField};

    fn builder() -> SchemaBuilder {
        let schema = Arc::new(
            SchemaInterface::new("IBasic")
                .field(FieldDescriptor::new("title", FieldKind::TextLine).required(true)),
        );
        let mut registry = StaticTypeRegistry::new();
        registry.insert(TypeDefinition::new("Document", "Page").with_schema(schema));
        registry.insert(TypeDefinition::new("Plone Site", "Site").with_view_methods(["listing_view"]));
        SchemaBuilder::new(Arc::new(registry))
    }

    #[test]
    fn not_found_detail_serializes_as_message() {
        assert_eq!(
            json!(FieldDetail::not_found()),
            json!({ "message": "No entry could be found for the supplied name." })
        );
        assert_eq!(
            FieldDetail::not_found().to_value(),
            json!({ "message": NOT_FOUND_MESSAGE })
        );
    }

    #[test]
    fn unknown_type_propagates() {
        let result = builder().schema_for_type(
            "Event",
            &Context::default(),
            &Request::new(),
            &HashSet::new(),
        );
        assert!(matches!(result, Err(SchemaError::UnknownType { .. })));
    }

    #[test]
    fn schema_less_type_keeps_title_and_layouts() {
        let doc = builder()
            .schema_for_type("Plone Site", &Context::default(), &Request::new(), &HashSet::new())
            .unwrap();
        assert_eq!(doc["properties"], json!({}));
        assert_eq!(doc["required"], json!([]));
        assert_eq!(doc["fieldsets"], json!([]));
        assert_eq!(doc["title"], "Site");
        assert_eq!(doc["layouts"], json!(["listing_view"]));
    }

    #[test]
    fn fieldset_id_matches_in_detail_query() {
        let detail = builder()
            .field_detail("Document", "default", &Context::default(), &Request::new())
            .unwrap();
        assert_eq!(
            detail,
            FieldDetail::Fieldset(FieldsetSummary {
                id: "default".into(),
                title: "Default".into(),
                fields: vec!["title".into()],
            })
        );
    }

    #[test]
    fn detail_interface_is_always_text() {
        struct Unstamped;
        impl FormBuilder for Unstamped {
            fn build(
                &self,
                _context: &Context,
                _request: &Request,
                _schema: &SchemaInterface,
                _additional_schemata: &[Arc<SchemaInterface>],
            ) -> Result<ProcessedForm, SchemaError> {
                Ok(ProcessedForm {
                    fields: vec![FormField::new(FieldDescriptor::new("note", FieldKind::Text))],
                    groups: vec![],
                })
            }
        }

        let unstamped = builder().with_form_builder(Arc::new(Unstamped));
        let detail = unstamped
            .field_detail("Document", "note", &Context::default(), &Request::new())
            .unwrap();
        assert_eq!(detail.to_value()["interface"], "");

        let stamped = builder()
            .field_detail("Document", "title", &Context::default(), &Request::new())
            .unwrap();
        assert_eq!(stamped.to_value()["interface"], "IBasic");
    }

    #[test]
    fn fieldset_summaries_for_schema_less_type() {
        let summaries = builder()
            .fieldset_summaries("Plone Site", &Context::default(), &Request::new())
            .unwrap();
        assert!(summaries.is_empty());
    }
}
