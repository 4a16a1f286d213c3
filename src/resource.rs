//! Resource intake: turning a raw input stream into typed manifest resources.
//!
//! One input (a file or standard input) parses into an ordered batch of
//! resources. A batch is the unit of work a single pipeline worker claims,
//! so per-file result ordering is preserved.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// Identity extracted from a manifest document.
///
/// An empty `kind` means the document carries no type information; such
/// resources are never resolved against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub kind: String,
    pub version: String,
    pub name: String,
    pub namespace: String,
}

impl Signature {
    /// Display form used in reports, e.g. `apps/v1/Deployment/kube-system/coredns`.
    pub fn qualified_name(&self) -> String {
        let mut parts = vec![self.version.as_str(), self.kind.as_str()];
        if !self.namespace.is_empty() {
            parts.push(self.namespace.as_str());
        }
        if !self.name.is_empty() {
            parts.push(self.name.as_str());
        }
        parts.join("/")
    }
}

/// One document from one input, with the raw payload the schema engine
/// validates against.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Name of the input this document came from (file path or "stdin").
    pub source: String,
    /// Zero-based index of the document within its input.
    pub index: usize,
    pub document: Value,
}

impl Resource {
    /// Extract the resource's signature from its document fields.
    pub fn signature(&self) -> Result<Signature> {
        let obj = match &self.document {
            Value::Object(map) => map,
            // Null documents ("---" separators with no content) have no type
            // information; they surface as an Empty result downstream.
            Value::Null => return Ok(Signature::default()),
            other => {
                return Err(ValidationError::Parse {
                    source_name: self.source.clone(),
                    details: format!("document is not a mapping: {}", type_name(other)),
                });
            }
        };

        let str_field = |v: Option<&Value>| -> String {
            v.and_then(Value::as_str).unwrap_or_default().to_string()
        };

        let metadata = obj.get("metadata").and_then(Value::as_object);

        Ok(Signature {
            kind: str_field(obj.get("kind")),
            version: str_field(obj.get("apiVersion")),
            name: str_field(metadata.and_then(|m| m.get("name"))),
            namespace: str_field(metadata.and_then(|m| m.get("namespace"))),
        })
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Parse a named input into an ordered batch of resources.
///
/// Inputs may hold any number of YAML documents (JSON is a YAML subset and
/// parses through the same path). Zero documents is an empty batch, not an
/// error. A parse failure is attributable to this input only; the caller
/// records it and continues with other inputs.
pub fn from_stream(name: &str, contents: &str) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
        let yaml: serde_yaml::Value =
            serde_yaml::Value::deserialize(document).map_err(|e| ValidationError::Parse {
                source_name: name.to_string(),
                details: e.to_string(),
            })?;

        let document = serde_json::to_value(&yaml).map_err(|e| ValidationError::Parse {
            source_name: name.to_string(),
            details: format!("document is not representable as JSON: {e}"),
        })?;

        resources.push(Resource {
            source: name.to_string(),
            index,
            document,
        });
    }

    Ok(resources)
}
