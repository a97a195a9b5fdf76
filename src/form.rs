//! Form construction: applies omit, mode and fieldset directives to a schema set.
//!
//! The fieldset builder treats the [`FormBuilder`] as the authority on which
//! fields appear and in which group. [`DirectiveFormBuilder`] reads the
//! directives declared on the schema interfaces themselves; hosts with their own
//! permission or directive handling plug in a different implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::types::{Context, FieldMode, FormField, Request, SchemaInterface};

/// A named group of fields produced by the form collaborator.
#[derive(Debug, Clone)]
pub struct FormGroup {
    pub name: String,
    /// Untranslated label.
    pub label: String,
    pub fields: Vec<FormField>,
}

/// Result of processing a schema set: default-group fields plus named groups.
#[derive(Debug, Clone, Default)]
pub struct ProcessedForm {
    pub fields: Vec<FormField>,
    pub groups: Vec<FormGroup>,
}

/// Builds the processed form for a base schema and additional schemata.
pub trait FormBuilder: Send + Sync {
    fn build(
        &self,
        context: &Context,
        request: &Request,
        schema: &SchemaInterface,
        additional_schemata: &[Arc<SchemaInterface>],
    ) -> Result<ProcessedForm, SchemaError>;
}

/// Form builder driven by the directives declared on the schemata.
///
/// - omitted fields and fields whose effective mode is hidden are dropped
/// - fields of additional schemata get the schema name as form prefix
/// - fieldset directives of the same name are merged; groups keep the order
///   in which they were first declared and empty groups are dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveFormBuilder;

impl FormBuilder for DirectiveFormBuilder {
    fn build(
        &self,
        _context: &Context,
        _request: &Request,
        schema: &SchemaInterface,
        additional_schemata: &[Arc<SchemaInterface>],
    ) -> Result<ProcessedForm, SchemaError> {
        let mut builder = GroupedForm::default();

        builder.add_schema(schema, None);
        for extra in additional_schemata {
            builder.add_schema(extra, Some(extra.name()));
        }

        let mut form = builder.form;
        form.groups.retain(|group| !group.fields.is_empty());
        Ok(form)
    }
}

#[derive(Default)]
struct GroupedForm {
    form: ProcessedForm,
    group_index: HashMap<String, usize>,
    labelled: HashMap<String, bool>,
}

impl GroupedForm {
    fn group(&mut self, name: &str, label: Option<&str>) -> usize {
        let index = match self.group_index.get(name) {
            Some(index) => *index,
            None => {
                self.form.groups.push(FormGroup {
                    name: name.to_string(),
                    label: name.to_string(),
                    fields: Vec::new(),
                });
                let index = self.form.groups.len() - 1;
                self.group_index.insert(name.to_string(), index);
                index
            }
        };

        // The first declaration carrying a label names the group
        if let Some(label) = label {
            let labelled = self.labelled.entry(name.to_string()).or_insert(false);
            if !*labelled {
                self.form.groups[index].label = label.to_string();
                *labelled = true;
            }
        }
        index
    }

    fn add_schema(&mut self, schema: &SchemaInterface, prefix: Option<&str>) {
        let omitted = schema.merged_omitted();
        let modes = schema.merged_modes();

        let mut placement: HashMap<&str, usize> = HashMap::new();
        for directive in schema.merged_fieldsets() {
            let index = self.group(&directive.name, directive.label.as_deref());
            for field in &directive.fields {
                placement.insert(field.as_str(), index);
            }
        }

        for field in schema.all_fields() {
            let name = field.name.as_str();
            if omitted.contains(name) {
                tracing::debug!(schema = schema.name(), field = name, "field omitted");
                continue;
            }

            let mode = modes.get(name).copied().or(field.mode);
            if mode == Some(FieldMode::Hidden) {
                continue;
            }

            let form_field = FormField {
                name: match prefix {
                    Some(prefix) => format!("{}.{}", prefix, name),
                    None => name.to_string(),
                },
                field: field.clone(),
                mode,
            };

            match placement.get(name) {
                Some(index) => self.form.groups[*index].fields.push(form_field),
                None => self.form.fields.push(form_field),
            }
        }
    }
}
