//! Schema engine capability: compile raw schema bytes into a validator and
//! evaluate documents against it.
//!
//! Schema payloads are opaque to the rest of the pipeline; only this module
//! knows they are JSON Schema documents.

use std::fmt;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::RegistryError;

/// A single schema violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the document.
    pub instance_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// An immutable compiled validator, created once by the resolver and shared
/// read-only across workers.
pub struct CompiledSchema {
    validator: Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile raw schema bytes.
    ///
    /// A payload that is not valid JSON or not a buildable schema is a
    /// structural failure of the source that returned it, so both cases map
    /// to `RegistryError::InvalidSchema` and are terminal for resolution.
    pub fn compile(bytes: &[u8], location: &str) -> Result<Self, RegistryError> {
        let schema: Value =
            serde_json::from_slice(bytes).map_err(|e| RegistryError::InvalidSchema {
                location: location.to_string(),
                details: format!("schema is not valid JSON: {e}"),
            })?;

        let validator =
            jsonschema::validator_for(&schema).map_err(|e| RegistryError::InvalidSchema {
                location: location.to_string(),
                details: e.to_string(),
            })?;

        Ok(Self { validator })
    }

    /// Evaluate a document, returning every violation in document order.
    /// An empty list means the document is valid.
    pub fn validate(&self, document: &Value) -> Vec<Violation> {
        self.validator
            .iter_errors(document)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }
}
