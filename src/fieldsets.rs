//! Fieldset construction from a processed form.

use std::sync::Arc;

use crate::error::SchemaError;
use crate::form::{FormBuilder, ProcessedForm};
use crate::i18n::{Translator, DEFAULT_DOMAIN};
use crate::types::{
    Context, Fieldset, FieldsetSummary, FormField, Request, SchemaInterface, DEFAULT_FIELDSET,
};

/// Message id of the default fieldset title.
pub const DEFAULT_FIELDSET_LABEL: &str = "label_schema_default";

/// Build the ordered fieldsets for a schema plus additional schemata.
///
/// The form builder decides which fields appear and where. The default group
/// becomes the `"default"` fieldset, listed first when it has fields; named
/// groups follow in the order the form builder returns them.
pub fn build_fieldsets(
    form_builder: &dyn FormBuilder,
    translator: &dyn Translator,
    context: &Context,
    request: &Request,
    schema: &SchemaInterface,
    additional_schemata: &[Arc<SchemaInterface>],
) -> Result<Vec<Fieldset>, SchemaError> {
    let form = form_builder.build(context, request, schema, additional_schemata)?;
    form_fieldsets(form, translator, request)
}

/// Convert a processed form into fieldsets, translating titles.
pub fn form_fieldsets(
    form: ProcessedForm,
    translator: &dyn Translator,
    request: &Request,
) -> Result<Vec<Fieldset>, SchemaError> {
    let mut fieldsets = Vec::with_capacity(form.groups.len() + 1);

    if !form.fields.is_empty() {
        fieldsets.push(Fieldset {
            id: DEFAULT_FIELDSET.to_string(),
            title: translator.translate(
                DEFAULT_FIELDSET_LABEL,
                Some("Default"),
                Some(DEFAULT_DOMAIN),
                request,
            )?,
            fields: form.fields,
        });
    }

    for group in form.groups {
        fieldsets.push(Fieldset {
            title: translator.translate(&group.label, None, None, request)?,
            id: group.name,
            fields: group.fields,
        });
    }

    Ok(fieldsets)
}

/// Every field across all fieldsets, in fieldset then field order.
pub fn iter_fields(fieldsets: &[Fieldset]) -> impl Iterator<Item = &FormField> {
    fieldsets.iter().flat_map(|fieldset| fieldset.fields.iter())
}

/// Project fieldsets to id, title and field names.
pub fn fieldset_summaries(fieldsets: &[Fieldset]) -> Vec<FieldsetSummary> {
    fieldsets.iter().map(fieldset_summary).collect()
}

pub fn fieldset_summary(fieldset: &Fieldset) -> FieldsetSummary {
    FieldsetSummary {
        id: fieldset.id.clone(),
        title: fieldset.title.clone(),
        fields: fieldset
            .fields
            .iter()
            .map(|f| f.field_name().to_string())
            .collect(),
    }
}
