//! Error types for content type schema synthesis.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a JSON Schema for a content type.
///
/// Schema-less types and unmatched detail queries are not errors; they yield
/// empty documents and a not-found marker respectively.
#[derive(Debug, Error)]
pub enum SchemaError {
    // Configuration errors (exit code 2)
    #[error("no JSON schema adapter registered for field type {field_type}{}", name.as_ref().map(|n| format!(" (name \"{}\")", n)).unwrap_or_default())]
    AdapterNotFound {
        field_type: String,
        name: Option<String>,
    },

    #[error("unknown content type: {portal_type}")]
    UnknownType { portal_type: String },

    #[error("unknown schema interface \"{name}\" referenced from {referenced_by}")]
    UnknownSchema { name: String, referenced_by: String },

    #[error("inheritance cycle through schema interface \"{name}\"")]
    InheritanceCycle { name: String },

    #[error("invalid model at {path}: {message}")]
    InvalidModel { path: String, message: String },

    #[error("cannot translate \"{msgid}\": {message}")]
    Translation { msgid: String, message: String },

    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::FileNotFound { .. } | SchemaError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Signals that a type definition carries no structured schema.
///
/// Callers treat this as "schema-less type", never as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content type {portal_type} has no schema")]
pub struct SchemaLookupError {
    pub portal_type: String,
}
