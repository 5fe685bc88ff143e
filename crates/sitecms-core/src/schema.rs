//! Schema registry mapping each content type to its compiled validator.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::{
    content::ContentType,
    error::{CoreError, Result},
};

/// A document that does not satisfy its content type's schema.
#[derive(Debug, Clone, Error)]
#[error("{content_type} document violates schema: {}", messages.join("; "))]
pub struct SchemaViolation {
    /// Content type whose schema was applied.
    pub content_type: ContentType,

    /// One message per violated constraint.
    pub messages: Vec<String>,
}

/// Compiled validators for every content type.
pub struct SchemaRegistry {
    validators: HashMap<ContentType, Validator>,
}

impl SchemaRegistry {
    /// Compile the embedded schema of every content type.
    pub fn new() -> Result<Self> {
        let mut validators = HashMap::with_capacity(ContentType::ALL.len());

        for ty in ContentType::ALL {
            let schema: Value = serde_json::from_str(ty.schema_source())
                .map_err(|e| CoreError::schema(ty, e.to_string()))?;
            let validator = jsonschema::validator_for(&schema)
                .map_err(|e| CoreError::schema(ty, e.to_string()))?;
            validators.insert(ty, validator);
        }

        Ok(Self { validators })
    }

    /// Validate a document against the schema of `content_type`.
    pub fn validate(
        &self,
        content_type: ContentType,
        document: &Value,
    ) -> std::result::Result<(), SchemaViolation> {
        let Some(validator) = self.validators.get(&content_type) else {
            return Ok(());
        };

        let messages: Vec<String> = validator
            .iter_errors(document)
            .map(|e| e.to_string())
            .collect();

        if messages.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation {
                content_type,
                messages,
            })
        }
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("content_types", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}
