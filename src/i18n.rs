//! Label translation.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::SchemaError;
use crate::types::Request;

/// Translation domain of the built-in labels.
pub const DEFAULT_DOMAIN: &str = "plone";

/// Translates message ids for the language of a request.
pub trait Translator: Send + Sync {
    /// Translate `msgid`, falling back to `default` and then to `msgid` itself.
    fn translate(
        &self,
        msgid: &str,
        default: Option<&str>,
        domain: Option<&str>,
        request: &Request,
    ) -> Result<String, SchemaError>;
}

/// Translator that returns defaults untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTranslator;

impl Translator for NullTranslator {
    fn translate(
        &self,
        msgid: &str,
        default: Option<&str>,
        _domain: Option<&str>,
        _request: &Request,
    ) -> Result<String, SchemaError> {
        Ok(default.unwrap_or(msgid).to_string())
    }
}

/// In-memory catalog: language → message id → text.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    messages: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        language: impl Into<String>,
        msgid: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.messages
            .entry(language.into())
            .or_default()
            .insert(msgid.into(), text.into());
    }

    /// Build a catalog from `{"<lang>": {"<msgid>": "<text>"}}`.
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let languages = value.as_object().ok_or_else(|| SchemaError::InvalidModel {
            path: "/".to_string(),
            message: "translation catalog must be an object".to_string(),
        })?;

        let mut catalog = Self::new();
        for (language, messages) in languages {
            let messages = messages
                .as_object()
                .ok_or_else(|| SchemaError::InvalidModel {
                    path: format!("/{}", language),
                    message: "expected object of message ids".to_string(),
                })?;
            for (msgid, text) in messages {
                let text = text.as_str().ok_or_else(|| SchemaError::InvalidModel {
                    path: format!("/{}/{}", language, msgid),
                    message: "translation must be a string".to_string(),
                })?;
                catalog.insert(language.as_str(), msgid.as_str(), text);
            }
        }
        Ok(catalog)
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let value = crate::loader::load_json(path)?;
        Self::from_json(&value)
    }
}

impl Translator for MessageCatalog {
    fn translate(
        &self,
        msgid: &str,
        default: Option<&str>,
        _domain: Option<&str>,
        request: &Request,
    ) -> Result<String, SchemaError> {
        let translated = request
            .language
            .as_deref()
            .and_then(|lang| self.messages.get(lang))
            .and_then(|messages| messages.get(msgid));

        Ok(match translated {
            Some(text) => text.clone(),
            None => default.unwrap_or(msgid).to_string(),
        })
    }
}
