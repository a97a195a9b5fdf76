//! Widget declarations and parameter resolution.
//!
//! A schema may attach a widget declaration to any of its fields. Declarations
//! with parameters are "parameterized": their parameters end up in the field's
//! JSON Schema as `widgetOptions`. Parameter values may be deferred computations,
//! which are evaluated while resolving and never leak into the output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::types::SchemaInterface;

/// Resolved widget parameters, keyed by field name.
pub type WidgetParams = HashMap<String, Map<String, Value>>;

/// A deferred parameter value.
#[derive(Clone)]
pub struct Thunk(Arc<dyn Fn() -> Value + Send + Sync>);

impl Thunk {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn evaluate(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

/// A widget parameter value as declared on a schema.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Literal(Value),
    Deferred(Thunk),
}

impl ParamValue {
    /// Evaluate to a literal.
    pub fn resolve(&self) -> Value {
        match self {
            ParamValue::Literal(value) => value.clone(),
            ParamValue::Deferred(thunk) => thunk.evaluate(),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Literal(value)
    }
}

impl From<Thunk> for ParamValue {
    fn from(thunk: Thunk) -> Self {
        ParamValue::Deferred(thunk)
    }
}

/// Widget override for one field.
#[derive(Debug, Clone, Default)]
pub struct WidgetDeclaration {
    /// Widget name, e.g. `"autocomplete"`.
    pub widget: Option<String>,
    /// Parameters in declaration order.
    pub params: Vec<(String, ParamValue)>,
}

impl WidgetDeclaration {
    pub fn new(widget: impl Into<String>) -> Self {
        Self {
            widget: Some(widget.into()),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }
}

/// Collect resolved widget parameters for every field of the given schemata.
///
/// Absent schemata are skipped. Declarations are merged across each schema's
/// inheritance chain with the closest declaration winning; a later schema in
/// the sequence overrides an earlier one for the same field name. Deferred
/// values are evaluated here, once per declaration visited.
pub fn resolve_params(schemas: &[Option<&SchemaInterface>]) -> WidgetParams {
    let mut params = WidgetParams::new();

    for schema in schemas.iter().flatten() {
        let declarations = schema.merged_widgets();
        for field in schema.all_fields() {
            let Some(declaration) = declarations.get(field.name.as_str()) else {
                continue;
            };
            if !declaration.is_parameterized() {
                continue;
            }

            let resolved: Map<String, Value> = declaration
                .params
                .iter()
                .map(|(key, value)| (key.clone(), value.resolve()))
                .collect();
            params.insert(field.name.clone(), resolved);
        }
    }

    params
}
