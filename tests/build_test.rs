//! Integration tests for type schema synthesis.

use std::collections::HashSet;
use std::sync::Arc;

use content_schema::{
    load_registry_str, AdapterRegistry, Context, FieldDescriptor, FieldDetail, FieldKind,
    FieldMode, FieldsetDirective, MessageCatalog, Request, SchemaBuilder, SchemaError,
    SchemaInterface, StaticTypeRegistry, Thunk, TypeDefinition, WidgetDeclaration,
};
use serde_json::{json, Value};

fn keys(doc: &Value) -> Vec<String> {
    doc["properties"]
        .as_object()
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

fn build(builder: &SchemaBuilder, portal_type: &str, excluded: &[&str]) -> Value {
    let excluded: HashSet<String> = excluded.iter().map(|s| s.to_string()).collect();
    builder
        .schema_for_type(portal_type, &Context::default(), &Request::new(), &excluded)
        .unwrap()
}

/// Page type: `title` (required) and `summary` on the schema, `tags` from a behavior.
fn page_builder() -> SchemaBuilder {
    let schema = Arc::new(
        SchemaInterface::new("IPage")
            .field(
                FieldDescriptor::new("title", FieldKind::TextLine)
                    .title("Title")
                    .required(true)
                    .default_value(json!("Untitled"))
                    .length(None, Some(255)),
            )
            .field(FieldDescriptor::new("summary", FieldKind::Text).title("Summary")),
    );
    let tags = Arc::new(
        SchemaInterface::new("ITags").field(FieldDescriptor::new(
            "tags",
            FieldKind::List {
                value_type: Some(Box::new(FieldDescriptor::new("tag", FieldKind::TextLine))),
            },
        )),
    );

    let mut types = StaticTypeRegistry::new();
    types.insert(
        TypeDefinition::new("Page", "Page")
            .with_schema(schema)
            .with_behavior(tags)
            .with_view_methods(["page_view", "listing_view"]),
    );
    types.insert(TypeDefinition::new("Plone Site", "Site").with_view_methods(["listing_view"]));
    SchemaBuilder::new(Arc::new(types))
}

// === Full document ===

mod full_document {
    use super::*;

    #[test]
    fn schema_and_behavior_fields() {
        let doc = build(&page_builder(), "Page", &[]);

        assert_eq!(doc["type"], "object");
        assert_eq!(doc["title"], "Page");
        assert_eq!(keys(&doc), vec!["title", "summary", "tags"]);
        assert_eq!(doc["required"], json!(["title"]));
        assert_eq!(
            doc["fieldsets"],
            json!([{ "id": "default", "title": "Default", "fields": ["title", "summary", "tags"] }])
        );
        assert_eq!(doc["layouts"], json!(["page_view", "listing_view"]));
    }

    #[test]
    fn document_key_order() {
        let doc = build(&page_builder(), "Page", &[]);
        let top: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(
            top,
            vec!["type", "title", "properties", "required", "fieldsets", "layouts"]
        );
    }

    #[test]
    fn schema_less_type() {
        let doc = build(&page_builder(), "Plone Site", &[]);

        assert_eq!(
            doc,
            json!({
                "type": "object",
                "title": "Site",
                "properties": {},
                "required": [],
                "fieldsets": [],
                "layouts": ["listing_view"]
            })
        );
    }

    #[test]
    fn output_compiles_as_json_schema() {
        let doc = build(&page_builder(), "Page", &[]);
        assert!(jsonschema::validator_for(&doc).is_ok());

        let validator = jsonschema::validator_for(&doc).unwrap();
        assert!(validator.is_valid(&json!({ "title": "Hello", "tags": ["a"] })));
        assert!(!validator.is_valid(&json!({ "summary": "no title" })));
    }

    #[test]
    fn titles_are_translated() {
        let mut catalog = MessageCatalog::new();
        catalog.insert("de", "Page", "Seite");
        catalog.insert("de", "Title", "Titel");
        catalog.insert("de", "label_schema_default", "Standard");
        let builder = page_builder().with_translator(Arc::new(catalog));

        let doc = builder
            .schema_for_type(
                "Page",
                &Context::default(),
                &Request::new().with_language("de"),
                &HashSet::new(),
            )
            .unwrap();

        assert_eq!(doc["title"], "Seite");
        assert_eq!(doc["properties"]["title"]["title"], "Titel");
        assert_eq!(doc["properties"]["summary"]["title"], "Summary");
        assert_eq!(doc["fieldsets"][0]["title"], "Standard");
    }
}

// === Exclusions ===

mod exclusions {
    use super::*;

    #[test]
    fn excluded_fields_are_absent() {
        let doc = build(&page_builder(), "Page", &["summary", "tags"]);
        assert_eq!(keys(&doc), vec!["title"]);
        // Fieldsets and required still describe the form
        assert_eq!(doc["fieldsets"][0]["fields"], json!(["title", "summary", "tags"]));
    }

    #[test]
    fn excluding_required_field() {
        let doc = build(&page_builder(), "Page", &["title"]);
        assert!(doc["properties"].get("title").is_none());
        assert_eq!(doc["required"], json!(["title"]));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let doc = build(&page_builder(), "Page", &["nope", ""]);
        assert_eq!(keys(&doc), vec!["title", "summary", "tags"]);
    }
}

// === Inheritance and directives ===

mod composition {
    use super::*;

    fn composed_builder() -> SchemaBuilder {
        let base = Arc::new(
            SchemaInterface::new("IBase")
                .field(FieldDescriptor::new("title", FieldKind::TextLine))
                .field(FieldDescriptor::new("id", FieldKind::TextLine).required(true))
                .fieldset(FieldsetDirective::new("settings", Some("Settings"), ["id"])),
        );
        let dates = Arc::new(
            SchemaInterface::new("IDates")
                .field(FieldDescriptor::new("effective", FieldKind::Datetime))
                .field(FieldDescriptor::new("expires", FieldKind::Datetime))
                .fieldset(FieldsetDirective::new(
                    "dates",
                    Some("Dates"),
                    ["effective", "expires"],
                )),
        );
        let leaf = Arc::new(
            SchemaInterface::new("IEvent")
                .extends(base)
                .field(FieldDescriptor::new("title", FieldKind::TextLine).required(true))
                .field(FieldDescriptor::new("location", FieldKind::TextLine))
                .field(FieldDescriptor::new("internal_note", FieldKind::Text))
                .field(FieldDescriptor::new("uid", FieldKind::TextLine))
                .omit("internal_note")
                .mode_for("uid", FieldMode::Hidden)
                .mode_for("location", FieldMode::Display),
        );
        let nav = Arc::new(
            SchemaInterface::new("IExcludeFromNavigation")
                .field(FieldDescriptor::new("exclude_from_nav", FieldKind::Bool))
                .fieldset(FieldsetDirective::new("settings", None, ["exclude_from_nav"])),
        );

        let mut types = StaticTypeRegistry::new();
        types.insert(
            TypeDefinition::new("Event", "Event")
                .with_schema(leaf)
                .with_behavior(dates)
                .with_behavior(nav),
        );
        SchemaBuilder::new(Arc::new(types))
    }

    #[test]
    fn fieldset_then_field_order() {
        let doc = build(&composed_builder(), "Event", &[]);

        assert_eq!(
            keys(&doc),
            vec!["title", "location", "id", "exclude_from_nav", "effective", "expires"]
        );
        let ids: Vec<&str> = doc["fieldsets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|fs| fs["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["default", "settings", "dates"]);
    }

    #[test]
    fn leaf_definition_wins() {
        let doc = build(&composed_builder(), "Event", &[]);
        assert_eq!(doc["required"], json!(["title", "id"]));
    }

    #[test]
    fn omitted_and_hidden_fields_are_absent() {
        let doc = build(&composed_builder(), "Event", &[]);
        assert!(doc["properties"].get("internal_note").is_none());
        assert!(doc["properties"].get("uid").is_none());
    }

    #[test]
    fn modes_are_attached() {
        let doc = build(&composed_builder(), "Event", &[]);
        assert_eq!(doc["properties"]["location"]["mode"], "display");
        assert!(doc["properties"]["title"].get("mode").is_none());
    }

    #[test]
    fn fieldset_summaries_only() {
        let summaries = composed_builder()
            .fieldset_summaries("Event", &Context::default(), &Request::new())
            .unwrap();
        assert_eq!(summaries[1].title, "Settings");
        assert_eq!(summaries[1].fields, vec!["id", "exclude_from_nav"]);
    }
}

// === Widget parameters ===

mod widget_params {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn deferred_values_are_resolved() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let schema = Arc::new(
            SchemaInterface::new("IPage")
                .field(FieldDescriptor::new("title", FieldKind::TextLine))
                .widget(
                    "title",
                    WidgetDeclaration::new("text")
                        .param("size", json!(40))
                        .param(
                            "placeholder",
                            Thunk::new(|| {
                                CALLS.fetch_add(1, Ordering::SeqCst);
                                json!("Enter a title")
                            }),
                        ),
                ),
        );
        let mut types = StaticTypeRegistry::new();
        types.insert(TypeDefinition::new("Page", "Page").with_schema(schema));
        let builder = SchemaBuilder::new(Arc::new(types));

        let first = build(&builder, "Page", &[]);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(
            first["properties"]["title"]["widgetOptions"],
            json!({ "size": 40, "placeholder": "Enter a title" })
        );

        let second = build(&builder, "Page", &[]);
        assert_eq!(first, second);
    }
}

// === Field detail ===

mod field_detail {
    use super::*;

    #[test]
    fn field_is_decorated() {
        let detail = page_builder()
            .field_detail("Page", "title", &Context::default(), &Request::new())
            .unwrap();

        let FieldDetail::Field(property) = detail else {
            panic!("expected field detail");
        };
        assert_eq!(property["type"], "string");
        assert_eq!(property["required"], true);
        assert_eq!(property["default"], "Untitled");
        assert_eq!(property["defaultFactory"], Value::Null);
        assert_eq!(property["interface"], "IPage");
        assert_eq!(property["max_length"], 255);
        assert_eq!(property["min_length"], Value::Null);
        assert_eq!(property["missing_value"], Value::Null);
        assert_eq!(property["order"], 0);
        assert_eq!(property["readonly"], false);
        assert!(property.get("mode").is_none());
    }

    #[test]
    fn behavior_field_detail() {
        let detail = page_builder()
            .field_detail("Page", "tags", &Context::default(), &Request::new())
            .unwrap();
        let value = detail.to_value();
        assert_eq!(value["type"], "array");
        assert_eq!(value["interface"], "ITags");
        assert_eq!(value["required"], false);
    }

    #[test]
    fn fieldset_detail() {
        let detail = page_builder()
            .field_detail("Page", "default", &Context::default(), &Request::new())
            .unwrap();
        assert_eq!(
            detail.to_value(),
            json!({ "id": "default", "title": "Default", "fields": ["title", "summary", "tags"] })
        );
    }

    #[test]
    fn nonexistent_name() {
        let detail = page_builder()
            .field_detail("Page", "nonexistent", &Context::default(), &Request::new())
            .unwrap();
        assert!(detail.is_not_found());
        assert_eq!(
            detail.to_value(),
            json!({ "message": "No entry could be found for the supplied name." })
        );
    }

    #[test]
    fn schema_less_type_has_no_entries() {
        let detail = page_builder()
            .field_detail("Plone Site", "title", &Context::default(), &Request::new())
            .unwrap();
        assert!(detail.is_not_found());
    }
}

// === Error handling ===

mod error_handling {
    use super::*;

    #[test]
    fn missing_adapter_aborts_build() {
        let builder = page_builder().with_adapters(AdapterRegistry::new());
        let result = builder.schema_for_type(
            "Page",
            &Context::default(),
            &Request::new(),
            &HashSet::new(),
        );
        assert!(matches!(
            result,
            Err(SchemaError::AdapterNotFound { field_type, .. }) if field_type == "TextLine"
        ));
    }

    #[test]
    fn unknown_type() {
        let result = page_builder().schema_for_type(
            "Event",
            &Context::default(),
            &Request::new(),
            &HashSet::new(),
        );
        assert!(matches!(result, Err(SchemaError::UnknownType { .. })));
    }
}

// === Model files ===

mod model_files {
    use super::*;

    const MODEL: &str = r#"{
        "schemas": {
            "IBasic": {
                "fields": [
                    { "name": "title", "type": "TextLine", "title": "Title", "required": true },
                    { "name": "description", "type": "Text" }
                ]
            },
            "IDocument": {
                "bases": ["IBasic"],
                "fields": [
                    { "name": "language", "type": "Choice", "vocabulary": "plone.app.vocabularies.SupportedContentLanguages" }
                ],
                "fieldsets": [{ "name": "settings", "label": "Settings", "fields": ["language"] }]
            },
            "IRelatedItems": {
                "fields": [
                    {
                        "name": "relatedItems",
                        "type": "List",
                        "value_type": { "name": "item", "type": "Choice", "vocabulary": "plone.app.vocabularies.Catalog" }
                    }
                ]
            }
        },
        "types": {
            "Document": {
                "title": "Page",
                "schema": "IDocument",
                "behaviors": ["IRelatedItems"],
                "view_methods": ["document_view"]
            }
        }
    }"#;

    #[test]
    fn model_builds_document() {
        let registry = load_registry_str(MODEL).unwrap();
        let builder = SchemaBuilder::new(Arc::new(registry));
        let doc = builder
            .schema_for_type(
                "Document",
                &Context::new("http://localhost:8080/Plone/front-page"),
                &Request::new(),
                &HashSet::new(),
            )
            .unwrap();

        assert_eq!(keys(&doc), vec!["title", "description", "relatedItems", "language"]);
        assert_eq!(
            doc["properties"]["language"]["vocabulary"]["@id"],
            "http://localhost:8080/Plone/front-page/@vocabularies/plone.app.vocabularies.SupportedContentLanguages"
        );
        // Related items behavior uses the named adapter without choices
        assert!(doc["properties"]["relatedItems"]["items"]
            .get("vocabulary")
            .is_none());
        assert_eq!(doc["layouts"], json!(["document_view"]));
    }
}
