//! Core types: field descriptors, schema interfaces, type definitions and fieldsets.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaLookupError;
use crate::widgets::WidgetDeclaration;

/// Id of the fieldset holding every field not assigned to a named group.
pub const DEFAULT_FIELDSET: &str = "default";

/// Access mode of a field as the edit form renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// Read-write.
    Input,
    /// Read-only.
    Display,
    /// Not rendered at all; hidden fields never reach the output.
    Hidden,
}

impl FieldMode {
    /// Parse a mode from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(FieldMode::Input),
            "display" => Some(FieldMode::Display),
            "hidden" => Some(FieldMode::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Input => "input",
            FieldMode::Display => "display",
            FieldMode::Hidden => "hidden",
        }
    }
}

/// The type of a field, which selects its JSON Schema adapter.
#[derive(Debug, Clone)]
pub enum FieldKind {
    TextLine,
    Text,
    RichText,
    Password,
    Uri,
    Email,
    Bool,
    Int,
    Float,
    Decimal,
    Date,
    Datetime,
    Time,
    /// Single choice from a named vocabulary, a field-bound source or an inline
    /// list of values.
    Choice {
        vocabulary: Option<String>,
        source: Option<ChoiceSource>,
        values: Vec<String>,
    },
    List {
        value_type: Option<Box<FieldDescriptor>>,
    },
    Tuple {
        value_type: Option<Box<FieldDescriptor>>,
    },
    Set {
        value_type: Option<Box<FieldDescriptor>>,
    },
    Dict {
        key_type: Option<Box<FieldDescriptor>>,
        value_type: Option<Box<FieldDescriptor>>,
    },
    /// Structured value described by its own schema interface.
    Object { schema: Arc<SchemaInterface> },
}

impl FieldKind {
    /// Registry key for adapter lookup.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::TextLine => "TextLine",
            FieldKind::Text => "Text",
            FieldKind::RichText => "RichText",
            FieldKind::Password => "Password",
            FieldKind::Uri => "URI",
            FieldKind::Email => "Email",
            FieldKind::Bool => "Bool",
            FieldKind::Int => "Int",
            FieldKind::Float => "Float",
            FieldKind::Decimal => "Decimal",
            FieldKind::Date => "Date",
            FieldKind::Datetime => "Datetime",
            FieldKind::Time => "Time",
            FieldKind::Choice { .. } => "Choice",
            FieldKind::List { .. } => "List",
            FieldKind::Tuple { .. } => "Tuple",
            FieldKind::Set { .. } => "Set",
            FieldKind::Dict { .. } => "Dict",
            FieldKind::Object { .. } => "Object",
        }
    }

    /// Element type of a collection field.
    pub fn value_type(&self) -> Option<&FieldDescriptor> {
        match self {
            FieldKind::List { value_type }
            | FieldKind::Tuple { value_type }
            | FieldKind::Set { value_type }
            | FieldKind::Dict { value_type, .. } => value_type.as_deref(),
            _ => None,
        }
    }
}

/// Kind of source backing a choice field without a named vocabulary.
///
/// Sources are served per field: `@sources/<field>` or `@querysources/<field>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceSource {
    Source,
    QuerySource,
}

/// Per-field metadata: constraints, defaults, mode and provenance.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub readonly: bool,
    pub mode: Option<FieldMode>,
    pub default: Option<Value>,
    /// Name of the callable producing the default at content creation time.
    pub default_factory: Option<String>,
    pub missing_value: Option<Value>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Declaration position within the owning interface.
    pub order: i64,
    /// Name of the interface that declares this field.
    pub interface: Option<String>,
}

impl FieldDescriptor {
    /// Create an optional, writable field with no constraints.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            kind,
            required: false,
            readonly: false,
            mode: None,
            default: None,
            default_factory: None,
            missing_value: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            order: 0,
            interface: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn mode(mut self, mode: FieldMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn default_factory(mut self, factory: impl Into<String>) -> Self {
        self.default_factory = Some(factory.into());
        self
    }

    pub fn missing_value(mut self, missing: Value) -> Self {
        self.missing_value = Some(missing);
        self
    }

    pub fn length(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Group directive: moves the named fields out of the default fieldset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsetDirective {
    pub name: String,
    pub label: Option<String>,
    pub fields: Vec<String>,
}

impl FieldsetDirective {
    pub fn new<I, S>(name: impl Into<String>, label: Option<&str>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            label: label.map(String::from),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named, ordered field model that may inherit from other interfaces.
///
/// Interfaces are identified by name: two ancestors with the same name are
/// treated as the same interface during linearization.
#[derive(Debug)]
pub struct SchemaInterface {
    name: String,
    bases: Vec<Arc<SchemaInterface>>,
    fields: Vec<FieldDescriptor>,
    omitted: Vec<String>,
    modes: Vec<(String, FieldMode)>,
    fieldsets: Vec<FieldsetDirective>,
    widgets: Vec<(String, WidgetDeclaration)>,
    ancestors: OnceLock<Vec<Arc<SchemaInterface>>>,
}

impl SchemaInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            omitted: Vec::new(),
            modes: Vec::new(),
            fieldsets: Vec::new(),
            widgets: Vec::new(),
            ancestors: OnceLock::new(),
        }
    }

    pub fn extends(mut self, base: Arc<SchemaInterface>) -> Self {
        self.bases.push(base);
        self
    }

    /// Declare a field, stamping its owning interface and declaration order.
    pub fn field(mut self, mut field: FieldDescriptor) -> Self {
        field.interface = Some(self.name.clone());
        field.order = self.fields.len() as i64;
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Omit a field from forms built on this interface.
    pub fn omit(mut self, field: impl Into<String>) -> Self {
        self.omitted.push(field.into());
        self
    }

    pub fn mode_for(mut self, field: impl Into<String>, mode: FieldMode) -> Self {
        self.modes.push((field.into(), mode));
        self
    }

    pub fn fieldset(mut self, directive: FieldsetDirective) -> Self {
        self.fieldsets.push(directive);
        self
    }

    pub fn widget(mut self, field: impl Into<String>, declaration: WidgetDeclaration) -> Self {
        self.widgets.push((field.into(), declaration));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<SchemaInterface>] {
        &self.bases
    }

    /// Fields declared directly on this interface.
    pub fn own_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn fieldset_directives(&self) -> &[FieldsetDirective] {
        &self.fieldsets
    }

    /// Linearized ancestors, closest first, excluding this interface.
    ///
    /// Uses C3 linearization; hierarchies C3 rejects fall back to a depth-first
    /// left-to-right walk keeping the last occurrence of each interface.
    /// Computed once and cached.
    pub fn ancestors(&self) -> &[Arc<SchemaInterface>] {
        self.ancestors.get_or_init(|| {
            c3_linearize(&self.bases).unwrap_or_else(|| {
                tracing::warn!(
                    interface = %self.name,
                    "inconsistent interface hierarchy, using legacy resolution order"
                );
                legacy_linearize(&self.bases)
            })
        })
    }

    /// This interface followed by its linearized ancestors.
    pub fn resolution_order(&self) -> Vec<&SchemaInterface> {
        std::iter::once(self)
            .chain(self.ancestors().iter().map(Arc::as_ref))
            .collect()
    }

    /// Every field visible through this interface.
    ///
    /// Inherited fields come first: bases are visited left to right, each after
    /// its own bases, and this interface last. A redefined field keeps the
    /// position of its first declaration while the descriptor comes from the
    /// declaration closest to this interface.
    pub fn all_fields(&self) -> Vec<&FieldDescriptor> {
        let mut chosen: HashMap<&str, &FieldDescriptor> = HashMap::new();
        for iface in self.resolution_order().into_iter().rev() {
            for field in &iface.fields {
                chosen.insert(field.name.as_str(), field);
            }
        }

        let mut seen = HashSet::new();
        self.declaration_order()
            .into_iter()
            .flat_map(|iface| iface.fields.iter())
            .filter(|field| seen.insert(field.name.as_str()))
            .map(|field| chosen.get(field.name.as_str()).copied().unwrap_or(field))
            .collect()
    }

    /// Interfaces in post-order: bases left to right, then this interface.
    ///
    /// Only the first interface of a given name is visited; a different
    /// interface reusing that name contributes no fields.
    fn declaration_order(&self) -> Vec<&SchemaInterface> {
        fn visit<'a>(
            iface: &'a SchemaInterface,
            seen: &mut HashMap<&'a str, &'a SchemaInterface>,
            out: &mut Vec<&'a SchemaInterface>,
        ) {
            if let Some(first) = seen.get(iface.name.as_str()) {
                if !std::ptr::eq(*first, iface) {
                    tracing::warn!(
                        interface = %iface.name,
                        "distinct interfaces share a name, ignoring the later one"
                    );
                }
                return;
            }
            seen.insert(iface.name.as_str(), iface);
            for base in &iface.bases {
                visit(base, seen, out);
            }
            out.push(iface);
        }

        let mut out = Vec::new();
        visit(self, &mut HashMap::new(), &mut out);
        out
    }

    /// Look up a field by name through the inheritance chain.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.resolution_order()
            .into_iter()
            .find_map(|iface| iface.fields.iter().find(|f| f.name == name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Omitted field names declared anywhere in the resolution order.
    pub fn merged_omitted(&self) -> HashSet<&str> {
        self.resolution_order()
            .into_iter()
            .flat_map(|iface| iface.omitted.iter().map(String::as_str))
            .collect()
    }

    /// Mode directives merged over the resolution order; closer declarations win.
    pub fn merged_modes(&self) -> HashMap<&str, FieldMode> {
        let mut merged = HashMap::new();
        for iface in self.resolution_order().into_iter().rev() {
            for (field, mode) in &iface.modes {
                merged.insert(field.as_str(), *mode);
            }
        }
        merged
    }

    /// Widget declarations merged over the resolution order; closer declarations win.
    pub fn merged_widgets(&self) -> HashMap<&str, &WidgetDeclaration> {
        let mut merged = HashMap::new();
        for iface in self.resolution_order().into_iter().rev() {
            for (field, declaration) in &iface.widgets {
                merged.insert(field.as_str(), declaration);
            }
        }
        merged
    }

    /// Fieldset directives from the most basic ancestor down to this interface.
    pub fn merged_fieldsets(&self) -> Vec<&FieldsetDirective> {
        self.resolution_order()
            .into_iter()
            .rev()
            .flat_map(|iface| iface.fieldsets.iter())
            .collect()
    }
}

fn c3_linearize(bases: &[Arc<SchemaInterface>]) -> Option<Vec<Arc<SchemaInterface>>> {
    let mut sequences: Vec<VecDeque<Arc<SchemaInterface>>> = bases
        .iter()
        .map(|base| {
            std::iter::once(Arc::clone(base))
                .chain(base.ancestors().iter().cloned())
                .collect()
        })
        .collect();
    sequences.push(bases.iter().cloned().collect());

    let mut merged = Vec::new();
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Some(merged);
        }

        // A head qualifies when it does not appear in the tail of any sequence
        let candidate = sequences
            .iter()
            .map(|seq| &seq[0])
            .find(|head| {
                !sequences
                    .iter()
                    .any(|seq| seq.iter().skip(1).any(|other| other.name == head.name))
            })
            .cloned()?;

        for seq in sequences.iter_mut() {
            if seq.front().is_some_and(|head| head.name == candidate.name) {
                seq.pop_front();
            }
        }
        merged.push(candidate);
    }
}

fn legacy_linearize(bases: &[Arc<SchemaInterface>]) -> Vec<Arc<SchemaInterface>> {
    fn walk(iface: &Arc<SchemaInterface>, out: &mut Vec<Arc<SchemaInterface>>) {
        out.push(Arc::clone(iface));
        for base in &iface.bases {
            walk(base, out);
        }
    }

    let mut all = Vec::new();
    for base in bases {
        walk(base, &mut all);
    }

    let mut seen = HashSet::new();
    let mut order: Vec<_> = all
        .into_iter()
        .rev()
        .filter(|iface| seen.insert(iface.name.clone()))
        .collect();
    order.reverse();
    order
}

/// Registry entry describing a content type.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub id: String,
    pub title: String,
    pub schema: Option<Arc<SchemaInterface>>,
    /// Behavior schemata applied after the primary schema.
    pub behaviors: Vec<Arc<SchemaInterface>>,
    pub view_methods: Vec<String>,
}

impl TypeDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            schema: None,
            behaviors: Vec::new(),
            view_methods: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: Arc<SchemaInterface>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_behavior(mut self, behavior: Arc<SchemaInterface>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn with_view_methods<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view_methods = views.into_iter().map(Into::into).collect();
        self
    }

    /// The primary schema, or an error for schema-less types.
    pub fn lookup_schema(&self) -> Result<Arc<SchemaInterface>, SchemaLookupError> {
        self.schema.clone().ok_or_else(|| SchemaLookupError {
            portal_type: self.id.clone(),
        })
    }

    pub fn additional_schemata(&self) -> &[Arc<SchemaInterface>] {
        &self.behaviors
    }
}

/// A field as processed by the form collaborator.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Form-level name; behavior fields carry their schema name as prefix.
    pub name: String,
    pub field: FieldDescriptor,
    pub mode: Option<FieldMode>,
}

impl FormField {
    pub fn new(field: FieldDescriptor) -> Self {
        Self {
            name: field.name.clone(),
            mode: field.mode,
            field,
        }
    }

    /// Short field name without any form prefix.
    pub fn field_name(&self) -> &str {
        &self.field.name
    }
}

/// Named, ordered group of fields.
#[derive(Debug, Clone)]
pub struct Fieldset {
    pub id: String,
    pub title: String,
    pub fields: Vec<FormField>,
}

/// Fieldset projection carrying field names instead of descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsetSummary {
    pub id: String,
    pub title: String,
    pub fields: Vec<String>,
}

/// The content object a schema is built for.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Absolute URL, used for vocabulary and source links.
    pub url: String,
}

impl Context {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Request-scoped settings.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Target language for labels; `None` keeps message defaults.
    pub language: Option<String>,
    /// Site root URL, used for links when the context has no URL of its own.
    pub site_url: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Base URL for vocabulary and source links: the context URL, or the site
    /// URL when the context has none.
    pub fn base_url<'a>(&'a self, context: &'a Context) -> &'a str {
        if context.url.is_empty() {
            self.site_url.as_deref().unwrap_or_default()
        } else {
            &context.url
        }
    }
}
