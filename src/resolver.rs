//! Registry chain: resolve a resource signature to a compiled schema by
//! trying schema registries in configured order.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::registry::Registry;
use crate::schema::CompiledSchema;

/// Outcome of a resolution attempt.
///
/// `NotFound` is a deliberate non-error: every registry definitively
/// confirmed it has no such schema. Callers decide whether that is a skip or
/// an error; it is never a success.
#[derive(Clone, Debug)]
pub enum Resolution {
    Found(Arc<CompiledSchema>),
    NotFound,
}

/// Try each registry in order.
///
/// The first successful fetch short-circuits: its bytes are compiled and
/// later registries are never consulted. A definitive not-found moves on to
/// the next registry. Any other failure (network, filesystem, malformed
/// schema payload) aborts immediately; most registries mirror the same
/// canonical schema set, so falling through past a real failure could pair a
/// resource with an unrelated schema.
pub async fn resolve(
    registries: &[Box<dyn Registry>],
    kind: &str,
    version: &str,
    k8s_version: &str,
) -> Result<Resolution> {
    for registry in registries {
        match registry.fetch(kind, version, k8s_version).await {
            Ok(bytes) => {
                let schema = CompiledSchema::compile(&bytes, registry.name())?;
                return Ok(Resolution::Found(Arc::new(schema)));
            }
            Err(e) if e.is_not_found() => {
                debug!(kind, version, registry = registry.name(), "schema not in registry");
                continue;
            }
            Err(e) => return Err(ValidationError::Registry(e)),
        }
    }

    Ok(Resolution::NotFound)
}
