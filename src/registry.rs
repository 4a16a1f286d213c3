//! Schema registries: ordered fetch capabilities keyed by resource signature.
//!
//! A registry is stateless per call and read-only for the run's duration.
//! Fetch failures are classified: a definitive not-found (missing file,
//! HTTP 404) invites the resolver to try the next registry, anything else is
//! terminal.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{RegistryError, ValidationError};

/// Default schema location: the community mirror of the upstream Kubernetes
/// JSON schemas, standalone layout.
pub const DEFAULT_LOCATION: &str = "https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/{k8sversion}-standalone{strictsuffix}/{kind}{kindsuffix}.json";

const USER_AGENT: &str = concat!("validate-manifests/", env!("CARGO_PKG_VERSION"));

/// A single schema source.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Human-readable identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Fetch raw schema bytes for `(kind, version, k8s_version)`, or fail
    /// with a classified error.
    async fn fetch(
        &self,
        kind: &str,
        version: &str,
        k8s_version: &str,
    ) -> Result<Vec<u8>, RegistryError>;
}

/// Expand a location template into a concrete URL or path.
///
/// Recognized placeholders: `{kind}` (lowercased), `{kindsuffix}`
/// (`-group-version` or `-version` for core-group resources), `{version}`,
/// `{group}`, `{k8sversion}`, `{strictsuffix}`.
pub fn build_location(
    template: &str,
    kind: &str,
    api_version: &str,
    k8s_version: &str,
    strict: bool,
) -> String {
    let (group, version) = match api_version.split_once('/') {
        Some((g, v)) => (g, v),
        None => ("", api_version),
    };
    // Group domains keep only their first label: networking.k8s.io -> networking.
    let group = group.split('.').next().unwrap_or("");

    let lower_kind = kind.to_lowercase();
    let kind_suffix = if group.is_empty() {
        format!("-{version}")
    } else {
        format!("-{group}-{version}")
    };

    template
        .replace("{kind}", &lower_kind)
        .replace("{kindsuffix}", &kind_suffix)
        .replace("{version}", version)
        .replace("{group}", group)
        .replace("{k8sversion}", k8s_version)
        .replace("{strictsuffix}", if strict { "-strict" } else { "" })
}

/// Registry backed by an HTTP(S) schema mirror.
pub struct HttpRegistry {
    client: Client,
    template: String,
    strict: bool,
}

impl HttpRegistry {
    pub fn new(template: String, strict: bool, timeout: Duration) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ValidationError::Config(format!("failed building HTTP client: {e}")))?;

        Ok(Self {
            client,
            template,
            strict,
        })
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    fn name(&self) -> &str {
        &self.template
    }

    async fn fetch(
        &self,
        kind: &str,
        version: &str,
        k8s_version: &str,
    ) -> Result<Vec<u8>, RegistryError> {
        let url = build_location(&self.template, kind, version, k8s_version, self.strict);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Request {
                url: url.clone(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound { location: url });
        }
        if !status.is_success() {
            return Err(RegistryError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RegistryError::Request {
            url: url.clone(),
            details: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

/// Registry backed by a local schema directory layout.
pub struct LocalRegistry {
    template: String,
    strict: bool,
}

impl LocalRegistry {
    pub fn new(template: String, strict: bool) -> Self {
        Self { template, strict }
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    fn name(&self) -> &str {
        &self.template
    }

    async fn fetch(
        &self,
        kind: &str,
        version: &str,
        k8s_version: &str,
    ) -> Result<Vec<u8>, RegistryError> {
        let path = build_location(&self.template, kind, version, k8s_version, self.strict);

        match tokio::fs::read(Path::new(&path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RegistryError::NotFound { location: path })
            }
            Err(e) => Err(RegistryError::Io {
                path,
                details: e.to_string(),
            }),
        }
    }
}

/// Construct a registry from a configured schema location. HTTP(S) templates
/// get the remote registry, everything else is treated as a filesystem
/// layout.
pub fn new_registry(
    location: &str,
    strict: bool,
    timeout: Duration,
) -> Result<Box<dyn Registry>, ValidationError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpRegistry::new(
            location.to_string(),
            strict,
            timeout,
        )?))
    } else {
        Ok(Box::new(LocalRegistry::new(location.to_string(), strict)))
    }
}
