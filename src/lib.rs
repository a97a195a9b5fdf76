//! Content Type Schema
//!
//! Synthesizes a JSON Schema description of a content type from its schema
//! interfaces and behaviors, applying the same field processing an edit form
//! would: inherited fields, omitted fields, field modes, fieldsets and widget
//! parameters.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use content_schema::{
//!     Context, FieldDescriptor, FieldKind, Request, SchemaBuilder, SchemaInterface,
//!     StaticTypeRegistry, TypeDefinition,
//! };
//!
//! let schema = Arc::new(
//!     SchemaInterface::new("IDocument")
//!         .field(FieldDescriptor::new("title", FieldKind::TextLine).required(true))
//!         .field(FieldDescriptor::new("summary", FieldKind::Text)),
//! );
//!
//! let mut types = StaticTypeRegistry::new();
//! types.insert(TypeDefinition::new("Document", "Page").with_schema(schema));
//!
//! let builder = SchemaBuilder::new(Arc::new(types));
//! let doc = builder
//!     .schema_for_type("Document", &Context::default(), &Request::new(), &HashSet::new())
//!     .unwrap();
//!
//! assert_eq!(doc["required"][0], "title");
//! assert_eq!(doc["fieldsets"][0]["id"], "default");
//! ```
//!
//! # Output
//!
//! | Key | Content |
//! |-----|---------|
//! | `properties` | one JSON Schema fragment per field, fieldset order then field order |
//! | `required` | names of required fields |
//! | `fieldsets` | `{id, title, fields}` with `"default"` first |
//! | `layouts` | view method names of the type |

mod adapters;
mod error;
mod facade;
mod fieldsets;
mod form;
mod i18n;
mod loader;
mod properties;
mod registry;
mod types;
mod widgets;

pub use adapters::{
    querysource_url, source_url, vocabulary_url, AdapterFactory, AdapterRegistry, AdapterScope,
    FieldAdapter, JsonSchemaProperty, RELATED_ITEMS_FIELD,
};
pub use error::{SchemaError, SchemaLookupError};
pub use facade::{FieldDetail, SchemaBuilder, NOT_FOUND_MESSAGE};
pub use fieldsets::{
    build_fieldsets, fieldset_summaries, fieldset_summary, form_fieldsets, iter_fields,
    DEFAULT_FIELDSET_LABEL,
};
pub use form::{DirectiveFormBuilder, FormBuilder, FormGroup, ProcessedForm};
pub use i18n::{MessageCatalog, NullTranslator, Translator, DEFAULT_DOMAIN};
pub use loader::{load_json, load_registry, load_registry_str, registry_from_value};
pub use properties::{apply_modes, required_fields, synthesize, SynthesisOptions};
pub use registry::{StaticTypeRegistry, TypeRegistry};
pub use types::{
    ChoiceSource, Context, FieldDescriptor, FieldKind, FieldMode, Fieldset, FieldsetDirective,
    FieldsetSummary, FormField, Request, SchemaInterface, TypeDefinition, DEFAULT_FIELDSET,
};
pub use widgets::{resolve_params, ParamValue, Thunk, WidgetDeclaration, WidgetParams};
