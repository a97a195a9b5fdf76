//! Content type registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::types::{SchemaInterface, TypeDefinition};

/// Resolves content type identifiers to their definitions.
pub trait TypeRegistry: Send + Sync {
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` if no such type is registered.
    fn lookup(&self, portal_type: &str) -> Result<Arc<TypeDefinition>, SchemaError>;

    /// Registered type ids in registration order.
    fn type_ids(&self) -> Vec<String>;
}

/// Registry held entirely in memory, as produced by the model loader.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeRegistry {
    types: Vec<Arc<TypeDefinition>>,
    index: HashMap<String, usize>,
    schemas: HashMap<String, Arc<SchemaInterface>>,
}

impl StaticTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous definition with the same id.
    pub fn insert(&mut self, definition: TypeDefinition) {
        let definition = Arc::new(definition);
        match self.index.get(&definition.id) {
            Some(&position) => self.types[position] = definition,
            None => {
                self.index.insert(definition.id.clone(), self.types.len());
                self.types.push(definition);
            }
        }
    }

    /// Register a named schema interface so it can be looked up later.
    pub fn insert_schema(&mut self, schema: Arc<SchemaInterface>) {
        self.schemas.insert(schema.name().to_string(), schema);
    }

    pub fn schema(&self, name: &str) -> Option<Arc<SchemaInterface>> {
        self.schemas.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeRegistry for StaticTypeRegistry {
    fn lookup(&self, portal_type: &str) -> Result<Arc<TypeDefinition>, SchemaError> {
        self.index
            .get(portal_type)
            .map(|&position| Arc::clone(&self.types[position]))
            .ok_or_else(|| SchemaError::UnknownType {
                portal_type: portal_type.to_string(),
            })
    }

    fn type_ids(&self) -> Vec<String> {
        self.types.iter().map(|t| t.id.clone()).collect()
    }
}
